use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{bail, Result};
use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use watermark_eraser::{
    areas::{AreaProfile, AreaResolver, Corner, CornerSet, Rectangle},
    config::{Config, InpaintMethod, OutputCodec, ProcessingConfig},
    pipeline::{BatchRunner, CancellationToken, PipelineObserver, PreviewSlot, VideoPipeline},
    video::PreviewFrame,
};

#[derive(Parser)]
#[command(
    name = "watermark-eraser",
    version,
    about = "Erase fixed-position watermarks from videos",
    long_about = "Watermark-Eraser removes logos and watermarks that sit at a fixed place in a video by inpainting the selected areas of every frame."
)]
struct Cli {
    /// Input video files, processed one after another
    #[arg(required = true)]
    inputs: Vec<PathBuf>,

    /// Manual area to erase as x,y,w,h (repeatable)
    #[arg(short, long = "area")]
    areas: Vec<Rectangle>,

    /// Corner preset to erase: bottom-right, top-left, bottom-left, top-right (repeatable)
    #[arg(long = "corner")]
    corners: Vec<Corner>,

    /// Load areas and algorithm settings from a saved JSON profile
    #[arg(short, long)]
    profile: Option<PathBuf>,

    /// Save the resulting areas and settings as a JSON profile
    #[arg(long)]
    save_profile: Option<PathBuf>,

    /// Configuration file (optional)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Inpainting method (telea, ns, mixed)
    #[arg(short, long)]
    method: Option<InpaintMethod>,

    /// Smoothing filter diameter over the erased area (1 disables it)
    #[arg(long)]
    blur: Option<u32>,

    /// Context margin around each area, in pixels
    #[arg(long)]
    margin: Option<u32>,

    /// Denoise frames after erasure
    #[arg(long)]
    denoise: bool,

    /// Sharpen frames after erasure
    #[arg(long)]
    sharpen: bool,

    /// Equalize frame lightness after erasure
    #[arg(long)]
    color_correct: bool,

    /// Number of worker threads
    #[arg(short, long)]
    workers: Option<usize>,

    /// Frames in flight before results are written
    #[arg(long)]
    buffer: Option<usize>,

    /// Process one frame at a time
    #[arg(long, conflicts_with = "buffer")]
    no_buffering: bool,

    /// Produce a preview every N frames
    #[arg(long)]
    preview_frequency: Option<u32>,

    /// Write the latest preview frame to this image file when done
    #[arg(long)]
    preview_out: Option<PathBuf>,

    /// Output codec (mp4v, h264, xvid)
    #[arg(long)]
    codec: Option<String>,

    /// Let the decoder use hardware acceleration when available
    #[arg(long)]
    hw_accel: bool,

    /// Directory for output files (default: next to each input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn apply_overrides(&self, processing: &mut ProcessingConfig) {
        if let Some(method) = self.method {
            processing.inpaint_method = method;
        }
        if let Some(blur) = self.blur {
            processing.blur_strength = blur;
        }
        if let Some(margin) = self.margin {
            processing.margin = margin;
        }
        processing.denoise |= self.denoise;
        processing.sharpen |= self.sharpen;
        processing.color_correct |= self.color_correct;
        processing.hw_accel |= self.hw_accel;
        if let Some(workers) = self.workers {
            processing.worker_count = workers;
        }
        if let Some(buffer) = self.buffer {
            processing.buffer_size = buffer;
        }
        if self.no_buffering {
            processing.buffer_size = 1;
        }
        if let Some(frequency) = self.preview_frequency {
            processing.preview_frequency = frequency;
        }
        if let Some(codec) = &self.codec {
            let resolved = OutputCodec::resolve(codec);
            if resolved.as_str() != codec.to_ascii_lowercase() {
                warn!("Unknown codec '{}', using {}", codec, resolved);
            }
            processing.output_codec = resolved;
        }
    }
}

/// Logs run events and keeps the latest preview
struct CliObserver {
    last_logged: AtomicU64,
    preview: PreviewSlot,
}

impl CliObserver {
    fn new() -> Self {
        Self {
            last_logged: AtomicU64::new(u64::MAX),
            preview: PreviewSlot::new(),
        }
    }
}

impl PipelineObserver for CliObserver {
    fn on_progress(&self, percent: f64, detail: &str) {
        let bucket = (percent / 10.0) as u64;
        if self.last_logged.swap(bucket, Ordering::Relaxed) != bucket {
            info!("{:>5.1}% {}", percent, detail);
        }
    }

    fn on_preview(&self, preview: PreviewFrame) {
        self.preview.offer(preview);
    }

    fn on_complete(&self, frames_written: u64, output_path: &Path, size_bytes: u64) {
        info!(
            "🎉 {} frames saved to {:?} ({:.1} MB)",
            frames_written,
            output_path,
            size_bytes as f64 / (1024.0 * 1024.0)
        );
    }

    fn on_error(&self, message: &str) {
        error!("{}", message);
    }

    fn on_status(&self, message: &str) {
        info!("{}", message);
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn build_resolver(cli: &Cli, processing: &mut ProcessingConfig) -> Result<AreaResolver> {
    let (mut corners, mut manual) = match &cli.profile {
        Some(profile_path) => {
            let profile = AreaProfile::load(profile_path)?;
            profile.apply_settings(processing);
            (profile.corners, profile.areas)
        }
        None => (CornerSet::default(), Vec::new()),
    };

    manual.extend(cli.areas.iter().copied());
    for corner in &cli.corners {
        corners.insert(*corner);
    }

    Ok(AreaResolver::new(corners, manual))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    info!("Starting Watermark-Eraser v{}", env!("CARGO_PKG_VERSION"));

    // Load configuration
    let mut config = match &cli.config {
        Some(config_path) => {
            info!("Loading configuration from {:?}", config_path);
            Config::from_file(config_path)?
        }
        None => {
            info!("Using default configuration");
            let mut config = Config::default();
            config.processing.worker_count = ProcessingConfig::default_worker_count();
            config
        }
    };

    let resolver = build_resolver(&cli, &mut config.processing)?;
    cli.apply_overrides(&mut config.processing);
    if let Some(dir) = &cli.output_dir {
        config.output.directory = Some(dir.clone());
    }
    config.validate()?;
    resolver.ensure_selection()?;

    if let Some(path) = &cli.save_profile {
        AreaProfile::capture(&resolver, &config.processing).save(path)?;
    }

    info!(
        "Method {}, blur {}, margin {}, {} workers, buffer {}",
        config.processing.inpaint_method,
        config.processing.blur_strength,
        config.processing.margin,
        config.processing.worker_count,
        config.processing.buffer_size
    );

    let cancel = CancellationToken::new();
    let signal_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current frame");
            signal_token.cancel();
        }
    });

    let inputs = cli.inputs.clone();
    let preview_out = cli.preview_out.clone();
    let summary = tokio::task::spawn_blocking(move || {
        let observer = CliObserver::new();
        let pipeline = VideoPipeline::new(config.processing, resolver);
        let summary = BatchRunner::new(&pipeline, config.output).run(&inputs, &cancel, &observer);

        if let (Some(path), Some(preview)) = (preview_out, observer.preview.take()) {
            match preview.frame.save(&path) {
                Ok(()) => info!("Preview of frame {}/{} saved to {:?}", preview.index, preview.total, path),
                Err(e) => warn!("Could not save preview: {}", e),
            }
        }
        summary
    })
    .await?;

    if summary.cancelled {
        warn!("Processing cancelled");
    }
    for (path, reason) in &summary.failures {
        error!("{:?}: {}", path, reason);
    }
    if !summary.failures.is_empty() {
        bail!("{} of {} files failed", summary.failures.len(), cli.inputs.len());
    }

    info!("Done: {} file(s) processed", summary.completed.len());
    Ok(())
}
