//! # Watermark Erasure
//!
//! Per-frame removal of rectangular areas. Each area is expanded by a margin,
//! inpainted, optionally smoothed, and blended back through a soft mask so the
//! repair fades into the untouched surroundings.

pub mod compositor;
pub mod filters;
pub mod inpaint;
pub mod traits;

pub use compositor::{FrameCompositor, WorkingRegion};
pub use inpaint::FastMarchingInpainter;
pub use traits::{Inpaint, Technique};
