//! # Watermark-Eraser
//!
//! Remove fixed-position watermarks and logos from video by inpainting
//! user-selected rectangles, frame by frame, in parallel, while keeping the
//! output frames in input order.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::path::Path;
//!
//! use watermark_eraser::{
//!     areas::{AreaResolver, Corner},
//!     config::ProcessingConfig,
//!     pipeline::{CancellationToken, NullObserver, VideoPipeline},
//! };
//!
//! # fn main() -> watermark_eraser::Result<()> {
//! let resolver = AreaResolver::new([Corner::BottomRight].into_iter().collect(), Vec::new());
//! let pipeline = VideoPipeline::new(ProcessingConfig::default(), resolver);
//!
//! let report = pipeline.run(
//!     Path::new("input.mp4"),
//!     Path::new("input_no_watermark.mp4"),
//!     &CancellationToken::new(),
//!     &NullObserver,
//! )?;
//! println!("{} frames written", report.state.frames_written);
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! - [`areas`] - Rectangles, corner presets and saved area profiles
//! - [`erase`] - The per-frame erasure algorithm
//! - [`postprocess`] - Optional denoise, sharpen and color correction
//! - [`video`] - Frame I/O through ffmpeg and the order-preserving scheduler
//! - [`pipeline`] - Whole-video and batch runs with progress reporting
//! - [`config`] - Configuration management
//!
//! ## Custom Inpainting
//!
//! The inpainting step is pluggable through the [`Inpaint`](erase::Inpaint) trait:
//!
//! ```rust,no_run
//! use image::{GrayImage, RgbImage};
//! use watermark_eraser::erase::{Inpaint, Technique};
//!
//! struct MeanFill;
//!
//! impl Inpaint for MeanFill {
//!     fn inpaint(&self, image: &RgbImage, mask: &GrayImage, _radius: u32, _technique: Technique) -> RgbImage {
//!         // Your reconstruction here
//!         let _ = mask;
//!         image.clone()
//!     }
//! }
//! ```

pub mod areas;
pub mod config;
pub mod erase;
pub mod error;
pub mod pipeline;
pub mod postprocess;
pub mod video;

// Re-export commonly used types for convenience
pub use crate::{
    areas::{AreaResolver, AreaSet, Corner, CornerSet, Rectangle},
    config::{Config, InpaintMethod, OutputCodec, ProcessingConfig},
    erase::FrameCompositor,
    error::{EraserError, Result},
    pipeline::{CancellationToken, PipelineObserver, VideoPipeline},
    postprocess::PostProcessor,
    video::{Frame, FrameScheduler},
};
