//! # Post-Processing
//!
//! Optional cosmetic filters applied to a frame after erasure. Each filter
//! is toggled independently; [`PostProcessor`] always applies the enabled
//! ones in the same order.

pub mod color;
pub mod denoise;
pub mod processor;
pub mod sharpen;
pub mod traits;

pub use color::ColorCorrect;
pub use denoise::Denoise;
pub use processor::PostProcessor;
pub use sharpen::Sharpen;
pub use traits::PostFilter;
