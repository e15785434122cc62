//! Order-preserving parallel frame processing

use std::any::Any;
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use crossbeam_channel::{bounded, Receiver};
use tracing::{debug, info};

use crate::config::ProcessingConfig;
use crate::error::{ProcessingError, Result};
use crate::pipeline::observer::{CancellationToken, PipelineObserver};
use crate::video::sink::FrameSink;
use crate::video::source::FrameSource;
use crate::video::types::{Frame, FrameJob, FrameResult, PreviewFrame};

/// Work applied to every frame on a pool thread
pub trait FrameTask: Send + Sync {
    fn process(&self, frame: Frame) -> Result<Frame>;
}

impl<F> FrameTask for F
where
    F: Fn(Frame) -> Result<Frame> + Send + Sync,
{
    fn process(&self, frame: Frame) -> Result<Frame> {
        self(frame)
    }
}

/// Why the submission loop stopped
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainReason {
    Cancelled,
    SourceExhausted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    Running,
    Draining(DrainReason),
    Finished,
}

/// Counters for one run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PipelineState {
    pub cancelled: bool,
    pub frames_submitted: u64,
    pub frames_written: u64,
}

struct Pending {
    index: u64,
    result: Receiver<Result<FrameResult>>,
}

/// Dispatches frames to a fixed worker pool and writes results in input order
///
/// Up to `buffer_size` jobs are in flight. When the buffer fills, it is
/// drained front to back, blocking on each job in turn, so the sink sees a
/// gapless prefix of the input whatever order the workers finish in.
pub struct FrameScheduler {
    pool: rayon::ThreadPool,
    buffer_size: usize,
    preview_frequency: u64,
    state: SchedulerState,
}

impl FrameScheduler {
    pub fn new(worker_count: usize, buffer_size: usize, preview_frequency: u64) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(worker_count.max(1))
            .thread_name(|i| format!("erase-worker-{}", i))
            .build()
            .map_err(|e| ProcessingError::PoolUnavailable { reason: e.to_string() })?;

        debug!(
            "Scheduler: {} workers, buffer {}, preview every {} frames",
            worker_count, buffer_size, preview_frequency
        );

        Ok(Self {
            pool,
            buffer_size: buffer_size.max(1),
            preview_frequency: preview_frequency.max(1),
            state: SchedulerState::Running,
        })
    }

    pub fn from_config(config: &ProcessingConfig) -> Result<Self> {
        Self::new(config.worker_count, config.buffer_size, config.preview_frequency as u64)
    }

    pub fn state(&self) -> SchedulerState {
        self.state
    }

    /// Process every frame of `source` into `sink`
    ///
    /// Returns early with the counters so far when `cancel` is set; frames
    /// still buffered at that point are discarded, not written.
    pub fn run<T>(
        &mut self,
        source: &mut dyn FrameSource,
        sink: &mut dyn FrameSink,
        task: Arc<T>,
        cancel: &CancellationToken,
        observer: &dyn PipelineObserver,
    ) -> Result<PipelineState>
    where
        T: FrameTask + 'static,
    {
        let total = source.metadata().frame_count;
        let mut state = PipelineState::default();
        let mut buffer: VecDeque<Pending> = VecDeque::with_capacity(self.buffer_size);
        self.state = SchedulerState::Running;

        while self.state == SchedulerState::Running {
            if cancel.is_cancelled() {
                self.state = SchedulerState::Draining(DrainReason::Cancelled);
                break;
            }

            let Some(frame) = source.read_frame()? else {
                self.state = SchedulerState::Draining(DrainReason::SourceExhausted);
                break;
            };

            let job = FrameJob {
                sequence_index: state.frames_submitted,
                frame,
            };
            buffer.push_back(self.submit(job, &task));
            state.frames_submitted += 1;

            let read = state.frames_submitted;
            observer.on_progress(progress_percent(read, total), &format!("Processing frame {}/{}", read, total));

            if buffer.len() >= self.buffer_size {
                self.drain(&mut buffer, sink, observer, &mut state, total)?;
            }
        }

        match self.state {
            SchedulerState::Draining(DrainReason::Cancelled) => {
                info!("Cancelled, discarding {} buffered frames", buffer.len());
                buffer.clear();
                state.cancelled = true;
            }
            _ => self.drain(&mut buffer, sink, observer, &mut state, total)?,
        }

        self.state = SchedulerState::Finished;
        Ok(state)
    }

    fn submit<T>(&self, job: FrameJob, task: &Arc<T>) -> Pending
    where
        T: FrameTask + 'static,
    {
        let (tx, rx) = bounded(1);
        let task = Arc::clone(task);
        let index = job.sequence_index;

        self.pool.spawn(move || {
            let FrameJob { sequence_index, frame } = job;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| task.process(frame)));

            let result = match outcome {
                Ok(Ok(frame)) => Ok(FrameResult { sequence_index, frame }),
                Ok(Err(e)) => Err(ProcessingError::WorkerFailed {
                    index: sequence_index,
                    reason: e.to_string(),
                }
                .into()),
                Err(payload) => Err(ProcessingError::WorkerFailed {
                    index: sequence_index,
                    reason: panic_message(payload.as_ref()),
                }
                .into()),
            };

            // The receiver is gone when the run was cancelled or aborted
            let _ = tx.send(result);
        });

        Pending { index, result: rx }
    }

    /// Write every buffered result, strictly front to back
    fn drain(
        &self,
        buffer: &mut VecDeque<Pending>,
        sink: &mut dyn FrameSink,
        observer: &dyn PipelineObserver,
        state: &mut PipelineState,
        total: u64,
    ) -> Result<()> {
        while let Some(pending) = buffer.pop_front() {
            let result = pending
                .result
                .recv()
                .map_err(|_| ProcessingError::WorkerLost { index: pending.index })??;

            sink.write_frame(&result.frame)?;
            state.frames_written += 1;

            if result.sequence_index % self.preview_frequency == 0 {
                observer.on_preview(PreviewFrame::from_frame(&result.frame, result.sequence_index, total));
            }
        }
        Ok(())
    }
}

pub(crate) fn progress_percent(done: u64, total: u64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    (done as f64 / total as f64 * 100.0).min(100.0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        format!("worker panicked: {}", s)
    } else if let Some(s) = payload.downcast_ref::<String>() {
        format!("worker panicked: {}", s)
    } else {
        "worker panicked".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EraserError;
    use crate::video::memory::{MemorySink, MemorySource};
    use rand::Rng;
    use std::sync::Mutex;
    use std::thread;
    use std::time::Duration;

    #[derive(Default)]
    struct Recorder {
        progress: Mutex<Vec<(f64, String)>>,
        previews: Mutex<Vec<u64>>,
    }

    impl PipelineObserver for Recorder {
        fn on_progress(&self, percent: f64, detail: &str) {
            self.progress.lock().unwrap().push((percent, detail.to_string()));
        }

        fn on_preview(&self, preview: PreviewFrame) {
            self.previews.lock().unwrap().push(preview.index);
        }
    }

    /// Sets the token right after the `after`-th read
    struct CancelAfter {
        inner: MemorySource,
        after: u64,
        reads: u64,
        token: CancellationToken,
    }

    impl FrameSource for CancelAfter {
        fn metadata(&self) -> &crate::video::types::VideoMetadata {
            self.inner.metadata()
        }

        fn read_frame(&mut self) -> Result<Option<Frame>> {
            let frame = self.inner.read_frame()?;
            self.reads += 1;
            if self.reads == self.after {
                self.token.cancel();
            }
            Ok(frame)
        }

        fn rewind(&mut self) -> Result<()> {
            self.inner.rewind()
        }
    }

    fn indexed_frames(n: u64) -> Vec<Frame> {
        (0..n)
            .map(|i| Frame::new_filled(4, 4, [(i % 256) as u8, (i / 256) as u8, 0]))
            .collect()
    }

    fn frame_index(frame: &Frame) -> u64 {
        let [lo, hi, _] = frame.get_pixel(0, 0);
        lo as u64 + hi as u64 * 256
    }

    fn jittered(frame: Frame) -> Result<Frame> {
        let delay = rand::thread_rng().gen_range(0..3);
        thread::sleep(Duration::from_millis(delay));
        Ok(frame)
    }

    fn written_indices(sink: &MemorySink) -> Vec<u64> {
        sink.frames().iter().map(frame_index).collect()
    }

    #[test]
    fn test_output_order_under_jitter() {
        let n = 40;
        for workers in [1, 3, 8] {
            for buffer in [1, 4, 7, 50] {
                let mut scheduler = FrameScheduler::new(workers, buffer, 30).unwrap();
                let mut source = MemorySource::new(indexed_frames(n), 30.0);
                let sink = MemorySink::new();
                let mut writer = sink.clone();

                let state = scheduler
                    .run(&mut source, &mut writer, Arc::new(jittered), &CancellationToken::new(), &Recorder::default())
                    .unwrap();

                assert_eq!(written_indices(&sink), (0..n).collect::<Vec<_>>(), "workers {} buffer {}", workers, buffer);
                assert_eq!(state.frames_written, n);
                assert_eq!(state.frames_submitted, n);
                assert!(!state.cancelled);
                assert_eq!(scheduler.state(), SchedulerState::Finished);
            }
        }
    }

    #[test]
    fn test_cancellation_truncates_at_buffer_boundary() {
        let n = 40;
        for (buffer, k) in [(5u64, 12u64), (4, 8), (1, 3), (10, 7)] {
            let token = CancellationToken::new();
            let mut source = CancelAfter {
                inner: MemorySource::new(indexed_frames(n), 30.0),
                after: k,
                reads: 0,
                token: token.clone(),
            };
            let sink = MemorySink::new();
            let mut writer = sink.clone();
            let mut scheduler = FrameScheduler::new(4, buffer as usize, 30).unwrap();

            let state = scheduler
                .run(&mut source, &mut writer, Arc::new(jittered), &token, &Recorder::default())
                .unwrap();

            let written = written_indices(&sink);
            let expected = (k / buffer) * buffer;
            assert!(state.cancelled);
            assert_eq!(state.frames_submitted, k);
            assert_eq!(written.len() as u64, expected, "buffer {} cancel after {}", buffer, k);
            assert!(written.len() as u64 <= (k + buffer - 1) / buffer * buffer);
            assert_eq!(written, (0..expected).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_cancel_before_start_writes_nothing() {
        let token = CancellationToken::new();
        token.cancel();

        let mut source = MemorySource::new(indexed_frames(5), 30.0);
        let sink = MemorySink::new();
        let mut writer = sink.clone();
        let mut scheduler = FrameScheduler::new(2, 2, 1).unwrap();

        let state = scheduler
            .run(&mut source, &mut writer, Arc::new(jittered), &token, &Recorder::default())
            .unwrap();

        assert_eq!(state, PipelineState { cancelled: true, frames_submitted: 0, frames_written: 0 });
        assert!(sink.is_empty());
    }

    #[test]
    fn test_preview_and_progress() {
        let n = 10;
        let recorder = Recorder::default();
        let mut scheduler = FrameScheduler::new(2, 3, 4).unwrap();
        let mut source = MemorySource::new(indexed_frames(n), 30.0);
        let mut sink = MemorySink::new();

        scheduler
            .run(&mut source, &mut sink, Arc::new(jittered), &CancellationToken::new(), &recorder)
            .unwrap();

        assert_eq!(*recorder.previews.lock().unwrap(), vec![0, 4, 8]);

        let progress = recorder.progress.lock().unwrap();
        assert_eq!(progress.len(), n as usize);
        assert_eq!(progress[0].1, "Processing frame 1/10");
        assert!((progress[0].0 - 10.0).abs() < 1e-9);
        assert_eq!(progress[9], (100.0, "Processing frame 10/10".to_string()));
    }

    #[test]
    fn test_worker_panic_is_reported() {
        let task = |frame: Frame| -> Result<Frame> {
            if frame_index(&frame) == 3 {
                panic!("bad frame");
            }
            Ok(frame)
        };

        let mut scheduler = FrameScheduler::new(2, 2, 30).unwrap();
        let mut source = MemorySource::new(indexed_frames(8), 30.0);
        let sink = MemorySink::new();
        let mut writer = sink.clone();

        let err = scheduler
            .run(&mut source, &mut writer, Arc::new(task), &CancellationToken::new(), &Recorder::default())
            .unwrap_err();

        match err {
            EraserError::Processing(ProcessingError::WorkerFailed { index, reason }) => {
                assert_eq!(index, 3);
                assert!(reason.contains("bad frame"));
            }
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(written_indices(&sink), vec![0, 1, 2]);
    }

    #[test]
    fn test_task_error_is_reported() {
        let task = |frame: Frame| -> Result<Frame> {
            if frame_index(&frame) == 0 {
                return Err(EraserError::generic("no good"));
            }
            Ok(frame)
        };

        let mut scheduler = FrameScheduler::new(1, 1, 30).unwrap();
        let mut source = MemorySource::new(indexed_frames(3), 30.0);
        let mut sink = MemorySink::new();

        let err = scheduler
            .run(&mut source, &mut sink, Arc::new(task), &CancellationToken::new(), &Recorder::default())
            .unwrap_err();
        assert!(matches!(err, EraserError::Processing(ProcessingError::WorkerFailed { index: 0, .. })));
    }

    #[test]
    fn test_progress_percent() {
        assert_eq!(progress_percent(0, 0), 0.0);
        assert_eq!(progress_percent(5, 10), 50.0);
        assert_eq!(progress_percent(12, 10), 100.0);
    }
}
