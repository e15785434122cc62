//! # Video I/O and Scheduling
//!
//! Frame buffers, the ffmpeg-backed source and sink, in-memory stand-ins,
//! and the order-preserving [`FrameScheduler`].

pub mod backend;
pub mod memory;
pub mod scheduler;
pub mod sink;
pub mod source;
pub mod types;

pub use backend::{FfmpegBackend, MediaBackend};
pub use memory::{MemoryBackend, MemorySink, MemorySource};
pub use scheduler::{DrainReason, FrameScheduler, FrameTask, PipelineState, SchedulerState};
pub use sink::{FfmpegSink, FrameSink};
pub use source::{FfmpegSource, FrameSource};
pub use types::{Frame, FrameJob, FrameResult, PreviewFrame, VideoMetadata};
