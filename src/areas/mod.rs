//! # Erasure Areas
//!
//! Rectangles to erase, the fixed corner presets, and the JSON profile the
//! area editor saves. [`AreaResolver`] turns a selection into the ordered
//! [`AreaSet`] used for a whole run.

pub mod profile;
pub mod resolver;
pub mod types;

pub use profile::{AreaProfile, ProfileSettings};
pub use resolver::{AreaResolver, AreaSet};
pub use types::{Corner, CornerSet, Rectangle};
