use std::sync::Arc;

use tracing::debug;

use crate::areas::types::{CornerSet, Rectangle};
use crate::error::{AreaError, Result};

/// The ordered, immutable list of areas erased during one run
///
/// Manual areas come first in authored order, followed by corner areas in
/// the fixed corner order. Cloning is cheap; clones share the same list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AreaSet {
    areas: Arc<[Rectangle]>,
}

impl AreaSet {
    pub fn new(areas: Vec<Rectangle>) -> Self {
        Self { areas: areas.into() }
    }

    pub fn areas(&self) -> &[Rectangle] {
        &self.areas
    }

    pub fn iter(&self) -> impl Iterator<Item = &Rectangle> {
        self.areas.iter()
    }

    pub fn len(&self) -> usize {
        self.areas.len()
    }

    pub fn is_empty(&self) -> bool {
        self.areas.is_empty()
    }
}

/// Turns corner selections and manual areas into a concrete [`AreaSet`]
#[derive(Debug, Clone, Default)]
pub struct AreaResolver {
    corners: CornerSet,
    manual: Vec<Rectangle>,
}

impl AreaResolver {
    pub fn new(corners: CornerSet, manual: Vec<Rectangle>) -> Self {
        Self { corners, manual }
    }

    pub fn corners(&self) -> CornerSet {
        self.corners
    }

    pub fn manual(&self) -> &[Rectangle] {
        &self.manual
    }

    /// Fails early when nothing at all is selected
    pub fn ensure_selection(&self) -> Result<()> {
        if self.corners.is_empty() && self.manual.is_empty() {
            return Err(AreaError::NoAreasSelected.into());
        }
        Ok(())
    }

    /// Resolve the areas for a `width` x `height` frame
    pub fn resolve(&self, width: u32, height: u32) -> Result<AreaSet> {
        self.ensure_selection()?;

        let mut areas = self.manual.clone();
        areas.extend(self.corners.selected().map(|corner| corner.area(width, height)));

        debug!(
            "Resolved {} areas ({} manual, {} corners) for {}x{} frame",
            areas.len(), self.manual.len(), self.corners.len(), width, height
        );

        Ok(AreaSet::new(areas))
    }
}
