use std::path::PathBuf;

use tracing::{info, warn};

use crate::config::OutputConfig;
use crate::pipeline::engine::{RunReport, VideoPipeline};
use crate::pipeline::observer::{CancellationToken, PipelineObserver};
use crate::video::scheduler::progress_percent;

/// Result of processing several inputs
#[derive(Debug, Default)]
pub struct BatchSummary {
    pub completed: Vec<RunReport>,
    pub failures: Vec<(PathBuf, String)>,
    pub cancelled: bool,
}

impl BatchSummary {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty() && !self.cancelled
    }
}

/// Runs a pipeline over a list of inputs, one fresh run per file
///
/// A failed file is reported and skipped. Cancellation stops the batch
/// before the next file starts.
pub struct BatchRunner<'a> {
    pipeline: &'a VideoPipeline,
    output: OutputConfig,
}

impl<'a> BatchRunner<'a> {
    pub fn new(pipeline: &'a VideoPipeline, output: OutputConfig) -> Self {
        Self { pipeline, output }
    }

    pub fn run(&self, inputs: &[PathBuf], cancel: &CancellationToken, observer: &dyn PipelineObserver) -> BatchSummary {
        let mut summary = BatchSummary::default();
        let total = inputs.len() as u64;

        for (i, input) in inputs.iter().enumerate() {
            if cancel.is_cancelled() {
                summary.cancelled = true;
                break;
            }

            let output = self.output.output_path_for(input);
            info!("File {}/{}: {}", i + 1, total, input.display());

            match self.pipeline.run(input, &output, cancel, observer) {
                Ok(report) => {
                    let cancelled = report.state.cancelled;
                    summary.completed.push(report);
                    if cancelled {
                        summary.cancelled = true;
                        break;
                    }
                }
                Err(e) => {
                    warn!("Skipping {}: {}", input.display(), e);
                    summary.failures.push((input.clone(), e.user_message()));
                }
            }

            let done = i as u64 + 1;
            observer.on_progress(progress_percent(done, total), &format!("Processed file {}/{}", done, total));
        }

        if !summary.failures.is_empty() {
            warn!("{} of {} files failed", summary.failures.len(), total);
        }
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::{AreaResolver, Corner};
    use crate::config::ProcessingConfig;
    use crate::pipeline::testing::RecordingObserver;
    use crate::video::memory::{MemoryBackend, MemorySource};
    use crate::video::types::Frame;
    use std::path::Path;
    use std::sync::Arc;

    fn pipeline(backend: Arc<MemoryBackend>) -> VideoPipeline {
        let config = ProcessingConfig {
            worker_count: 2,
            buffer_size: 2,
            margin: 4,
            ..ProcessingConfig::default()
        };
        let resolver = AreaResolver::new([Corner::TopLeft].into_iter().collect(), Vec::new());
        VideoPipeline::new(config, resolver).with_backend(backend)
    }

    fn source(n: usize) -> MemorySource {
        MemorySource::new(vec![Frame::new_filled(20, 20, [60, 90, 120]); n], 30.0)
    }

    fn output_config() -> OutputConfig {
        OutputConfig {
            directory: Some(PathBuf::from("out")),
            ..OutputConfig::default()
        }
    }

    #[test]
    fn test_failed_file_does_not_stop_batch() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_source("a.mp4", source(3))
                .with_source("c.avi", source(2)),
        );
        let pipeline = pipeline(backend.clone());
        let observer = RecordingObserver::default();
        let inputs = vec![PathBuf::from("a.mp4"), PathBuf::from("b.mp4"), PathBuf::from("c.avi")];

        let summary = BatchRunner::new(&pipeline, output_config()).run(&inputs, &CancellationToken::new(), &observer);

        assert_eq!(summary.completed.len(), 2);
        assert_eq!(summary.failures.len(), 1);
        assert_eq!(summary.failures[0].0, PathBuf::from("b.mp4"));
        assert!(!summary.is_success());
        assert_eq!(observer.errors().len(), 1);

        assert_eq!(
            backend.opened_sinks(),
            vec![PathBuf::from("out/a_no_watermark.mp4"), PathBuf::from("out/c_no_watermark.avi")]
        );
        assert_eq!(backend.sink_for(Path::new("out/c_no_watermark.avi")).unwrap().len(), 2);

        let details: Vec<String> = observer
            .progress()
            .into_iter()
            .filter(|(_, d)| d.starts_with("Processed file"))
            .map(|(_, d)| d)
            .collect();
        assert_eq!(details, vec!["Processed file 1/3", "Processed file 2/3", "Processed file 3/3"]);
    }

    #[test]
    fn test_cancel_stops_before_next_file() {
        let backend = Arc::new(MemoryBackend::new().with_source("a.mp4", source(3)));
        let pipeline = pipeline(backend.clone());
        let token = CancellationToken::new();
        token.cancel();

        let summary = BatchRunner::new(&pipeline, output_config()).run(
            &[PathBuf::from("a.mp4")],
            &token,
            &RecordingObserver::default(),
        );

        assert!(summary.cancelled);
        assert!(summary.completed.is_empty());
        assert!(backend.opened_sinks().is_empty());
    }
}
