use std::path::Path;

use crate::config::OutputCodec;
use crate::error::Result;
use crate::video::sink::{FfmpegSink, FrameSink};
use crate::video::source::{FfmpegSource, FrameSource};
use crate::video::types::VideoMetadata;

/// Opens frame sources and sinks for a run
pub trait MediaBackend: Send + Sync {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>>;

    fn open_sink(&self, path: &Path, metadata: &VideoMetadata, codec: OutputCodec) -> Result<Box<dyn FrameSink>>;
}

/// Backend driving the `ffmpeg` and `ffprobe` executables
#[derive(Debug, Clone, Copy, Default)]
pub struct FfmpegBackend {
    hw_accel: bool,
}

impl FfmpegBackend {
    pub fn new(hw_accel: bool) -> Self {
        Self { hw_accel }
    }
}

impl MediaBackend for FfmpegBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        Ok(Box::new(FfmpegSource::open(path, self.hw_accel)?))
    }

    fn open_sink(&self, path: &Path, metadata: &VideoMetadata, codec: OutputCodec) -> Result<Box<dyn FrameSink>> {
        Ok(Box::new(FfmpegSink::create(path, metadata, codec)?))
    }
}
