//! # Video Pipeline
//!
//! Runs whole videos: opens the source and sink, resolves the erasure areas
//! from the first frame and drives the [`FrameScheduler`](crate::video::FrameScheduler).
//! Progress, previews and the final result are reported through a
//! [`PipelineObserver`].

pub mod batch;
pub mod engine;
pub mod observer;

pub use batch::{BatchRunner, BatchSummary};
pub use engine::{EraseTask, RunReport, VideoPipeline};
pub use observer::{CancellationToken, NullObserver, PipelineObserver, PreviewSlot};
pub use crate::video::scheduler::PipelineState;
