use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::AreaError;

/// Minimum authored width and height, exclusive
pub const MIN_AUTHORED_SIDE: u32 = 10;

/// A watermark area in source-frame pixel coordinates
///
/// Serialized as `[x, y, w, h]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "[u32; 4]", into = "[u32; 4]")]
pub struct Rectangle {
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

impl Rectangle {
    pub const fn new(x: u32, y: u32, w: u32, h: u32) -> Self {
        Self { x, y, w, h }
    }

    /// Convert a drag gesture on a scaled preview into a source-space area
    ///
    /// Corner order does not matter. Returns `None` unless both sides are
    /// longer than [`MIN_AUTHORED_SIDE`] after scaling.
    pub fn from_drag(start: (f64, f64), end: (f64, f64), scale: f64) -> Option<Self> {
        if !(scale > 0.0) {
            return None;
        }

        let (x1, x2) = (start.0.min(end.0).max(0.0), start.0.max(end.0).max(0.0));
        let (y1, y2) = (start.1.min(end.1).max(0.0), start.1.max(end.1).max(0.0));

        let rect = Self {
            x: (x1 / scale) as u32,
            y: (y1 / scale) as u32,
            w: ((x2 - x1) / scale) as u32,
            h: ((y2 - y1) / scale) as u32,
        };

        (rect.w > MIN_AUTHORED_SIDE && rect.h > MIN_AUTHORED_SIDE).then_some(rect)
    }

    /// Exclusive right edge
    pub fn right(&self) -> u32 {
        self.x.saturating_add(self.w)
    }

    /// Exclusive bottom edge
    pub fn bottom(&self) -> u32 {
        self.y.saturating_add(self.h)
    }

    pub fn is_empty(&self) -> bool {
        self.w == 0 || self.h == 0
    }
}

impl From<[u32; 4]> for Rectangle {
    fn from([x, y, w, h]: [u32; 4]) -> Self {
        Self { x, y, w, h }
    }
}

impl From<Rectangle> for [u32; 4] {
    fn from(rect: Rectangle) -> Self {
        [rect.x, rect.y, rect.w, rect.h]
    }
}

impl fmt::Display for Rectangle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{},{}", self.x, self.y, self.w, self.h)
    }
}

impl FromStr for Rectangle {
    type Err = AreaError;

    /// Parses `x,y,w,h`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || AreaError::InvalidSpec { input: s.to_string() };

        let parts: Vec<u32> = s
            .split(',')
            .map(|p| p.trim().parse::<u32>())
            .collect::<Result<_, _>>()
            .map_err(|_| invalid())?;

        match parts.as_slice() {
            &[x, y, w, h] if w > 0 && h > 0 => Ok(Self { x, y, w, h }),
            _ => Err(invalid()),
        }
    }
}

/// A frame corner that can carry a default-sized erasure area
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Corner {
    BottomRight,
    TopLeft,
    BottomLeft,
    TopRight,
}

impl Corner {
    /// Corners in the order their areas are appended
    pub const ALL: [Corner; 4] = [
        Corner::BottomRight,
        Corner::TopLeft,
        Corner::BottomLeft,
        Corner::TopRight,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BottomRight => "bottom_right",
            Self::TopLeft => "top_left",
            Self::BottomLeft => "bottom_left",
            Self::TopRight => "top_right",
        }
    }

    /// The corner's area for a `width` x `height` frame
    pub fn area(&self, width: u32, height: u32) -> Rectangle {
        let w = width as f64;
        let h = height as f64;
        let frac = |total: f64, f: f64| (total * f) as u32;

        match self {
            Self::BottomRight => Rectangle::new(frac(w, 0.75), frac(h, 0.75), frac(w, 0.25), frac(h, 0.25)),
            Self::TopLeft => Rectangle::new(0, 0, frac(w, 0.20), frac(h, 0.20)),
            Self::BottomLeft => Rectangle::new(0, frac(h, 0.80), frac(w, 0.20), frac(h, 0.20)),
            Self::TopRight => Rectangle::new(frac(w, 0.80), 0, frac(w, 0.20), frac(h, 0.20)),
        }
    }
}

impl FromStr for Corner {
    type Err = AreaError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "bottom_right" | "br" => Ok(Self::BottomRight),
            "top_left" | "tl" => Ok(Self::TopLeft),
            "bottom_left" | "bl" => Ok(Self::BottomLeft),
            "top_right" | "tr" => Ok(Self::TopRight),
            _ => Err(AreaError::InvalidSpec { input: s.to_string() }),
        }
    }
}

/// Which corners are selected
///
/// Serialized as the `corners` object of an area profile.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CornerSet {
    pub bottom_right: bool,
    pub top_left: bool,
    pub bottom_left: bool,
    pub top_right: bool,
}

impl CornerSet {
    pub fn contains(&self, corner: Corner) -> bool {
        match corner {
            Corner::BottomRight => self.bottom_right,
            Corner::TopLeft => self.top_left,
            Corner::BottomLeft => self.bottom_left,
            Corner::TopRight => self.top_right,
        }
    }

    pub fn insert(&mut self, corner: Corner) {
        match corner {
            Corner::BottomRight => self.bottom_right = true,
            Corner::TopLeft => self.top_left = true,
            Corner::BottomLeft => self.bottom_left = true,
            Corner::TopRight => self.top_right = true,
        }
    }

    /// Selected corners in append order
    pub fn selected(&self) -> impl Iterator<Item = Corner> + '_ {
        Corner::ALL.into_iter().filter(|c| self.contains(*c))
    }

    pub fn len(&self) -> usize {
        self.selected().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FromIterator<Corner> for CornerSet {
    fn from_iter<I: IntoIterator<Item = Corner>>(iter: I) -> Self {
        let mut set = Self::default();
        for corner in iter {
            set.insert(corner);
        }
        set
    }
}
