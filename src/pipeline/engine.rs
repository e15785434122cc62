use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::areas::{AreaResolver, AreaSet};
use crate::config::ProcessingConfig;
use crate::erase::{FrameCompositor, Inpaint};
use crate::error::{Result, VideoError};
use crate::pipeline::observer::{CancellationToken, PipelineObserver};
use crate::postprocess::PostProcessor;
use crate::video::backend::{FfmpegBackend, MediaBackend};
use crate::video::scheduler::{FrameScheduler, FrameTask, PipelineState};
use crate::video::types::Frame;

/// Erasure followed by post-processing, run on the worker threads
pub struct EraseTask {
    compositor: FrameCompositor,
    post: PostProcessor,
    areas: AreaSet,
}

impl EraseTask {
    pub fn new(compositor: FrameCompositor, post: PostProcessor, areas: AreaSet) -> Self {
        Self { compositor, post, areas }
    }

    pub fn areas(&self) -> &AreaSet {
        &self.areas
    }
}

impl FrameTask for EraseTask {
    fn process(&self, mut frame: Frame) -> Result<Frame> {
        self.compositor.erase(&mut frame, &self.areas);
        Ok(self.post.process(frame))
    }
}

/// Outcome of one video run
#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub state: PipelineState,
    pub size_bytes: u64,
}

/// Drives one input video through erasure into one output video
///
/// The run order is fixed: open the source, check it has frames, open the
/// sink, resolve areas from the first frame, rewind, then hand both ends to
/// the [`FrameScheduler`].
pub struct VideoPipeline {
    config: ProcessingConfig,
    resolver: AreaResolver,
    backend: Arc<dyn MediaBackend>,
    inpainter: Option<Arc<dyn Inpaint>>,
}

impl VideoPipeline {
    pub fn new(config: ProcessingConfig, resolver: AreaResolver) -> Self {
        Self {
            resolver,
            backend: Arc::new(FfmpegBackend::new(config.hw_accel)),
            inpainter: None,
            config,
        }
    }

    pub fn with_backend(mut self, backend: Arc<dyn MediaBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Replace the default fast-marching inpainter
    pub fn with_inpainter(mut self, inpainter: Arc<dyn Inpaint>) -> Self {
        self.inpainter = Some(inpainter);
        self
    }

    pub fn config(&self) -> &ProcessingConfig {
        &self.config
    }

    pub fn resolver(&self) -> &AreaResolver {
        &self.resolver
    }

    /// Process `input` into `output`
    ///
    /// Failures are reported to `observer.on_error` and returned. A cancelled
    /// run is not a failure: it returns a report whose state is marked
    /// cancelled, with a truncated but complete output file.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
        observer: &dyn PipelineObserver,
    ) -> Result<RunReport> {
        match self.execute(input, output, cancel, observer) {
            Ok(report) => Ok(report),
            Err(e) => {
                error!("Processing {} failed: {}", input.display(), e);
                observer.on_error(&e.user_message());
                Err(e)
            }
        }
    }

    fn compositor(&self) -> FrameCompositor {
        match &self.inpainter {
            Some(inpainter) => FrameCompositor::with_inpainter(&self.config, Arc::clone(inpainter)),
            None => FrameCompositor::new(&self.config),
        }
    }

    fn execute(
        &self,
        input: &Path,
        output: &Path,
        cancel: &CancellationToken,
        observer: &dyn PipelineObserver,
    ) -> Result<RunReport> {
        self.config.validate()?;
        self.resolver.ensure_selection()?;

        info!("🎬 Erasing watermarks from {}", input.display());
        observer.on_status("Opening video...");

        let mut source = self.backend.open_source(input)?;
        let metadata = source.metadata().clone();
        if metadata.frame_count == 0 {
            return Err(VideoError::EmptySource {
                path: input.display().to_string(),
            }
            .into());
        }

        let codec = self.config.output_codec;
        let mut sink = self.backend.open_sink(output, &metadata, codec)?;

        let first = source.read_frame()?.ok_or_else(|| VideoError::NoFirstFrame {
            path: input.display().to_string(),
        })?;
        let areas = self.resolver.resolve(first.width(), first.height())?;
        source.rewind()?;

        for rect in areas.iter() {
            debug!("Erasing area {}", rect);
        }
        info!(
            "   {} frames at {:.2} fps, {} area(s), method {}",
            metadata.frame_count,
            metadata.fps,
            areas.len(),
            self.config.inpaint_method
        );

        let task = Arc::new(EraseTask::new(self.compositor(), PostProcessor::new(&self.config), areas));
        let mut scheduler = FrameScheduler::from_config(&self.config)?;
        let state = scheduler.run(source.as_mut(), sink.as_mut(), task, cancel, observer)?;

        sink.finish()?;
        drop(source);

        let size_bytes = match fs::metadata(output) {
            Ok(meta) => meta.len(),
            Err(e) => {
                warn!("Cannot read size of {}: {}", output.display(), e);
                0
            }
        };
        let report = RunReport {
            input_path: input.to_path_buf(),
            output_path: output.to_path_buf(),
            state,
            size_bytes,
        };

        if state.cancelled {
            info!("Cancelled after {} frames", state.frames_written);
            observer.on_status("Processing cancelled");
        } else {
            info!("✅ Wrote {} frames to {}", state.frames_written, output.display());
            observer.on_status(&format!(
                "Saved: {} ({:.1} MB)",
                output.display(),
                size_bytes as f64 / (1024.0 * 1024.0)
            ));
            observer.on_complete(state.frames_written, output, size_bytes);
        }

        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::areas::{Corner, CornerSet, Rectangle};
    use crate::error::{AreaError, EraserError};
    use crate::pipeline::testing::RecordingObserver;
    use crate::video::memory::{MemoryBackend, MemorySource};
    use crate::video::types::VideoMetadata;
    use image::{Rgb, RgbImage};

    fn test_config() -> ProcessingConfig {
        ProcessingConfig {
            margin: 6,
            blur_strength: 3,
            worker_count: 2,
            buffer_size: 3,
            preview_frequency: 2,
            ..ProcessingConfig::default()
        }
    }

    fn watermarked_frame() -> Frame {
        Frame::new(RgbImage::from_fn(40, 40, |x, y| {
            if x >= 30 && y >= 30 { Rgb([255, 255, 255]) } else { Rgb([120, 120, 120]) }
        }))
    }

    fn bottom_right() -> AreaResolver {
        AreaResolver::new([Corner::BottomRight].into_iter().collect(), Vec::new())
    }

    fn backend_with(frames: Vec<Frame>) -> Arc<MemoryBackend> {
        Arc::new(MemoryBackend::new().with_source("in.mp4", MemorySource::new(frames, 25.0)))
    }

    #[test]
    fn test_full_run_erases_every_frame() {
        let backend = backend_with(vec![watermarked_frame(); 7]);
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend.clone());
        let observer = RecordingObserver::default();

        let report = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &observer)
            .unwrap();

        assert_eq!(report.state.frames_written, 7);
        assert!(!report.state.cancelled);

        let sink = backend.sink_for(Path::new("out.mp4")).unwrap();
        assert!(sink.is_finished());
        let frames = sink.frames();
        assert_eq!(frames.len(), 7);
        for frame in &frames {
            assert!(frame.get_pixel(35, 35)[0] < 230);
            assert_eq!(frame.get_pixel(0, 0), [120, 120, 120]);
        }

        assert_eq!(observer.completed(), vec![(7, PathBuf::from("out.mp4"))]);
        assert_eq!(observer.previews(), vec![0, 2, 4, 6]);
        let statuses = observer.statuses();
        assert_eq!(statuses.first().map(String::as_str), Some("Opening video..."));
        assert!(statuses.last().unwrap().starts_with("Saved: out.mp4"));
        assert!(observer.errors().is_empty());
    }

    #[test]
    fn test_manual_area_is_erased() {
        let frames = vec![Frame::new(RgbImage::from_fn(40, 40, |x, y| {
            if (10..16).contains(&x) && (10..16).contains(&y) { Rgb([0, 0, 0]) } else { Rgb([200, 200, 200]) }
        }))];
        let backend = backend_with(frames);
        let resolver = AreaResolver::new(CornerSet::default(), vec![Rectangle::new(10, 10, 6, 6)]);
        let pipeline = VideoPipeline::new(test_config(), resolver).with_backend(backend.clone());

        pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &RecordingObserver::default())
            .unwrap();

        let out = backend.sink_for(Path::new("out.mp4")).unwrap().frames();
        assert!(out[0].get_pixel(12, 12)[0] > 25);
    }

    #[test]
    fn test_zero_frame_source_fails_before_sink() {
        let metadata = VideoMetadata {
            width: 40,
            height: 40,
            fps: 25.0,
            frame_count: 0,
            codec: "raw".to_string(),
        };
        let backend = Arc::new(
            MemoryBackend::new().with_source("in.mp4", MemorySource::with_metadata(vec![watermarked_frame()], metadata)),
        );
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend.clone());
        let observer = RecordingObserver::default();

        let err = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &observer)
            .unwrap_err();

        assert!(matches!(err, EraserError::Video(VideoError::EmptySource { .. })));
        assert!(backend.opened_sinks().is_empty());
        assert_eq!(observer.errors().len(), 1);
    }

    #[test]
    fn test_sink_failure_is_reported() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_source("in.mp4", MemorySource::new(vec![watermarked_frame()], 25.0))
                .refusing_sinks(),
        );
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend);
        let observer = RecordingObserver::default();

        let err = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &observer)
            .unwrap_err();

        assert!(err.is_open_error());
        assert_eq!(observer.errors().len(), 1);
        assert!(observer.completed().is_empty());
    }

    #[test]
    fn test_missing_source() {
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend_with(Vec::new()));
        let err = pipeline
            .run(Path::new("other.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &RecordingObserver::default())
            .unwrap_err();
        assert!(matches!(err, EraserError::Video(VideoError::OpenFailed { .. })));
    }

    #[test]
    fn test_empty_selection_is_rejected() {
        let resolver = AreaResolver::new(CornerSet::default(), Vec::new());
        let backend = backend_with(vec![watermarked_frame()]);
        let pipeline = VideoPipeline::new(test_config(), resolver).with_backend(backend.clone());
        let observer = RecordingObserver::default();

        let err = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &observer)
            .unwrap_err();

        assert!(matches!(err, EraserError::Area(AreaError::NoAreasSelected)));
        assert_eq!(observer.errors(), vec!["Please select at least one area to remove!".to_string()]);
        assert!(backend.opened_sinks().is_empty());
    }

    #[test]
    fn test_cancelled_run_reports_status_not_completion() {
        let backend = backend_with(vec![watermarked_frame(); 5]);
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend.clone());
        let observer = RecordingObserver::default();
        let token = CancellationToken::new();
        token.cancel();

        let report = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &token, &observer)
            .unwrap();

        assert!(report.state.cancelled);
        assert_eq!(report.state.frames_written, 0);
        assert!(observer.completed().is_empty());
        assert_eq!(observer.statuses().last().map(String::as_str), Some("Processing cancelled"));
        assert!(backend.sink_for(Path::new("out.mp4")).unwrap().is_finished());
    }

    #[test]
    fn test_post_processing_runs_after_erasure() {
        let config = ProcessingConfig {
            sharpen: true,
            ..test_config()
        };
        let frame = watermarked_frame();
        let areas = bottom_right().resolve(40, 40).unwrap();

        let plain = EraseTask::new(FrameCompositor::new(&test_config()), PostProcessor::new(&test_config()), areas.clone());
        let sharpened = EraseTask::new(FrameCompositor::new(&config), PostProcessor::new(&config), areas);

        let erased = plain.process(frame.clone()).unwrap();
        let expected = PostProcessor::new(&config).process(erased);
        assert_eq!(sharpened.process(frame).unwrap(), expected);
    }

    #[test]
    fn test_read_failure_mid_run_aborts() {
        let source = MemorySource::new(vec![watermarked_frame(); 6], 25.0).failing_at(4);
        let backend = Arc::new(MemoryBackend::new().with_source("in.mp4", source));
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend.clone());
        let observer = RecordingObserver::default();

        let err = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &observer)
            .unwrap_err();

        assert!(matches!(err, EraserError::Video(VideoError::DecodingFailed { .. })));
        assert!(!err.is_open_error());
        assert_eq!(observer.errors().len(), 1);
        assert!(observer.completed().is_empty());
        assert!(!backend.sink_for(Path::new("out.mp4")).unwrap().is_finished());
        assert_eq!(backend.open_handles(), 0);
    }

    #[test]
    fn test_write_failure_mid_run_aborts() {
        let backend = Arc::new(
            MemoryBackend::new()
                .with_source("in.mp4", MemorySource::new(vec![watermarked_frame(); 7], 25.0))
                .with_sink_capacity(2),
        );
        let pipeline = VideoPipeline::new(test_config(), bottom_right()).with_backend(backend.clone());
        let observer = RecordingObserver::default();

        let err = pipeline
            .run(Path::new("in.mp4"), Path::new("out.mp4"), &CancellationToken::new(), &observer)
            .unwrap_err();

        assert!(matches!(err, EraserError::Video(VideoError::EncodingFailed { .. })));
        assert_eq!(observer.errors().len(), 1);
        assert!(observer.completed().is_empty());
        assert_eq!(backend.sink_for(Path::new("out.mp4")).unwrap().len(), 2);
        assert_eq!(backend.open_handles(), 0);
    }
}
