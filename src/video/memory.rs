//! In-memory sources and sinks, for tests and benchmarks

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::OutputCodec;
use crate::error::{Result, VideoError};
use crate::video::backend::MediaBackend;
use crate::video::sink::FrameSink;
use crate::video::source::FrameSource;
use crate::video::types::{Frame, VideoMetadata};

/// Serves a fixed list of frames
#[derive(Debug, Clone)]
pub struct MemorySource {
    frames: Vec<Frame>,
    position: usize,
    metadata: VideoMetadata,
    fail_at: Option<usize>,
}

impl MemorySource {
    pub fn new(frames: Vec<Frame>, fps: f64) -> Self {
        let (width, height) = frames.first().map(|f| (f.width(), f.height())).unwrap_or((0, 0));
        let metadata = VideoMetadata {
            width,
            height,
            fps,
            frame_count: frames.len() as u64,
            codec: "raw".to_string(),
        };
        Self::with_metadata(frames, metadata)
    }

    pub fn with_metadata(frames: Vec<Frame>, metadata: VideoMetadata) -> Self {
        Self {
            frames,
            position: 0,
            metadata,
            fail_at: None,
        }
    }

    /// Fail the read of frame `index` (counted from the last rewind) as a decode error
    pub fn failing_at(mut self, index: usize) -> Self {
        self.fail_at = Some(index);
        self
    }

    pub fn position(&self) -> usize {
        self.position
    }
}

impl FrameSource for MemorySource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        if self.fail_at == Some(self.position) {
            return Err(VideoError::DecodingFailed {
                reason: format!("unreadable frame {}", self.position),
            }
            .into());
        }

        let frame = self.frames.get(self.position).cloned();
        if frame.is_some() {
            self.position += 1;
        }
        Ok(frame)
    }

    fn rewind(&mut self) -> Result<()> {
        self.position = 0;
        Ok(())
    }
}

/// Collects written frames; clones share the same storage
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    frames: Arc<Mutex<Vec<Frame>>>,
    finished: Arc<AtomicBool>,
    capacity: Option<usize>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Accept `capacity` frames, then fail every write as an encode error
    pub fn with_capacity_limit(capacity: usize) -> Self {
        Self {
            capacity: Some(capacity),
            ..Self::default()
        }
    }

    pub fn frames(&self) -> Vec<Frame> {
        self.frames.lock().map(|frames| frames.clone()).unwrap_or_default()
    }

    pub fn len(&self) -> usize {
        self.frames.lock().map(|frames| frames.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::SeqCst)
    }
}

impl FrameSink for MemorySink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if self.is_finished() {
            return Err(VideoError::EncodingFailed {
                reason: "sink already finished".to_string(),
            }
            .into());
        }

        let mut frames = self.frames.lock().map_err(|_| VideoError::EncodingFailed {
            reason: "sink storage poisoned".to_string(),
        })?;
        if self.capacity.is_some_and(|capacity| frames.len() >= capacity) {
            return Err(VideoError::EncodingFailed {
                reason: format!("no space left after {} frames", frames.len()),
            }
            .into());
        }
        frames.push(frame.clone());
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.finished.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Counts a live source or sink handed out by [`MemoryBackend`]
#[derive(Debug)]
struct HandleGuard(Arc<AtomicUsize>);

impl HandleGuard {
    fn new(counter: &Arc<AtomicUsize>) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(Arc::clone(counter))
    }
}

impl Drop for HandleGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// A source or sink that releases its [`HandleGuard`] when dropped
struct Tracked<T> {
    inner: T,
    _guard: HandleGuard,
}

impl<T: FrameSource> FrameSource for Tracked<T> {
    fn metadata(&self) -> &VideoMetadata {
        self.inner.metadata()
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        self.inner.read_frame()
    }

    fn rewind(&mut self) -> Result<()> {
        self.inner.rewind()
    }
}

impl<T: FrameSink> FrameSink for Tracked<T> {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.inner.write_frame(frame)
    }

    fn finish(&mut self) -> Result<()> {
        self.inner.finish()
    }
}

/// Backend serving registered in-memory videos
///
/// Every opened sink is recorded under its output path.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    sources: HashMap<PathBuf, MemorySource>,
    sinks: Mutex<Vec<(PathBuf, MemorySink)>>,
    refuse_sinks: bool,
    sink_capacity: Option<usize>,
    open_handles: Arc<AtomicUsize>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source<P: Into<PathBuf>>(mut self, path: P, source: MemorySource) -> Self {
        self.sources.insert(path.into(), source);
        self
    }

    /// Make every `open_sink` fail
    pub fn refusing_sinks(mut self) -> Self {
        self.refuse_sinks = true;
        self
    }

    /// Sinks opened from now on fail after `capacity` frames
    pub fn with_sink_capacity(mut self, capacity: usize) -> Self {
        self.sink_capacity = Some(capacity);
        self
    }

    /// Sources and sinks handed out and not yet dropped
    pub fn open_handles(&self) -> usize {
        self.open_handles.load(Ordering::SeqCst)
    }

    pub fn sink_for(&self, path: &Path) -> Option<MemorySink> {
        let sinks = self.sinks.lock().ok()?;
        sinks.iter().rev().find(|(p, _)| p == path).map(|(_, sink)| sink.clone())
    }

    pub fn opened_sinks(&self) -> Vec<PathBuf> {
        self.sinks
            .lock()
            .map(|sinks| sinks.iter().map(|(p, _)| p.clone()).collect())
            .unwrap_or_default()
    }
}

impl MediaBackend for MemoryBackend {
    fn open_source(&self, path: &Path) -> Result<Box<dyn FrameSource>> {
        let source = self.sources.get(path).cloned().ok_or_else(|| VideoError::OpenFailed {
            path: path.display().to_string(),
            reason: "no such video".to_string(),
        })?;
        Ok(Box::new(Tracked {
            inner: source,
            _guard: HandleGuard::new(&self.open_handles),
        }))
    }

    fn open_sink(&self, path: &Path, _metadata: &VideoMetadata, _codec: OutputCodec) -> Result<Box<dyn FrameSink>> {
        if self.refuse_sinks {
            return Err(VideoError::SinkUnavailable {
                path: path.display().to_string(),
                reason: "refused".to_string(),
            }
            .into());
        }

        let sink = match self.sink_capacity {
            Some(capacity) => MemorySink::with_capacity_limit(capacity),
            None => MemorySink::new(),
        };
        if let Ok(mut sinks) = self.sinks.lock() {
            sinks.push((path.to_path_buf(), sink.clone()));
        }
        Ok(Box::new(Tracked {
            inner: sink,
            _guard: HandleGuard::new(&self.open_handles),
        }))
    }
}
