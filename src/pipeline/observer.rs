use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use crate::video::types::PreviewFrame;

/// Receives run events from the coordinating thread
///
/// Every method has a no-op default so consumers implement only what they
/// display. Callbacks run on the coordinator; implementations that drive a
/// UI must hand the data over to their own thread.
pub trait PipelineObserver: Send + Sync {
    fn on_progress(&self, percent: f64, detail: &str) {
        let _ = (percent, detail);
    }

    fn on_preview(&self, preview: PreviewFrame) {
        let _ = preview;
    }

    fn on_complete(&self, frames_written: u64, output_path: &Path, size_bytes: u64) {
        let _ = (frames_written, output_path, size_bytes);
    }

    fn on_error(&self, message: &str) {
        let _ = message;
    }

    /// Free-form status text such as "Opening video..."
    fn on_status(&self, message: &str) {
        let _ = message;
    }
}

/// Observer that ignores every event
#[derive(Debug, Clone, Copy, Default)]
pub struct NullObserver;

impl PipelineObserver for NullObserver {}

/// Cooperative cancellation flag shared with the caller
///
/// Set once from outside; the scheduler checks it once per source read.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

/// Holds the most recent preview; a new one replaces an unconsumed one
#[derive(Debug, Default)]
pub struct PreviewSlot {
    latest: Mutex<Option<PreviewFrame>>,
}

impl PreviewSlot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn offer(&self, preview: PreviewFrame) {
        if let Ok(mut latest) = self.latest.lock() {
            *latest = Some(preview);
        }
    }

    /// Take the pending preview, leaving the slot empty
    pub fn take(&self) -> Option<PreviewFrame> {
        self.latest.lock().ok().and_then(|mut latest| latest.take())
    }
}
