// Erase areas from a single still image, for tuning areas and settings

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use watermark_eraser::{
    areas::{AreaProfile, AreaResolver, Corner, CornerSet, Rectangle},
    config::{InpaintMethod, ProcessingConfig},
    erase::FrameCompositor,
    postprocess::PostProcessor,
    video::Frame,
};

#[derive(Parser)]
#[command(name = "erase-frame", about = "Erase watermark areas from one image")]
struct Args {
    /// Input image
    input: PathBuf,

    /// Output image (format from extension)
    output: PathBuf,

    /// Manual area as x,y,w,h (repeatable)
    #[arg(short, long = "area")]
    areas: Vec<Rectangle>,

    /// Corner preset (repeatable)
    #[arg(long = "corner")]
    corners: Vec<Corner>,

    /// Saved area profile
    #[arg(short, long)]
    profile: Option<PathBuf>,

    #[arg(short, long)]
    method: Option<InpaintMethod>,

    #[arg(long)]
    blur: Option<u32>,

    #[arg(long)]
    margin: Option<u32>,

    #[arg(long)]
    denoise: bool,

    #[arg(long)]
    sharpen: bool,

    #[arg(long)]
    color_correct: bool,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();
    let args = Args::parse();

    let mut config = ProcessingConfig::default();
    let (mut corners, mut manual) = match &args.profile {
        Some(path) => {
            let profile = AreaProfile::load(path)?;
            profile.apply_settings(&mut config);
            (profile.corners, profile.areas)
        }
        None => (CornerSet::default(), Vec::new()),
    };
    manual.extend(args.areas.iter().copied());
    args.corners.iter().for_each(|c| corners.insert(*c));

    if let Some(method) = args.method {
        config.inpaint_method = method;
    }
    if let Some(blur) = args.blur {
        config.blur_strength = blur;
    }
    if let Some(margin) = args.margin {
        config.margin = margin;
    }
    config.denoise = args.denoise;
    config.sharpen = args.sharpen;
    config.color_correct = args.color_correct;
    config.validate()?;

    let image = image::open(&args.input)
        .with_context(|| format!("Failed to open {:?}", args.input))?
        .to_rgb8();
    let mut frame = Frame::new(image);

    let areas = AreaResolver::new(corners, manual).resolve(frame.width(), frame.height())?;
    info!("🖼️  {}x{} image, {} area(s), method {}", frame.width(), frame.height(), areas.len(), config.inpaint_method);

    let start = Instant::now();
    FrameCompositor::new(&config).erase(&mut frame, &areas);
    let frame = PostProcessor::new(&config).process(frame);
    info!("Processed in {:.1?}", start.elapsed());

    frame
        .save(&args.output)
        .with_context(|| format!("Failed to save {:?}", args.output))?;
    info!("✅ Saved to {:?}", args.output);
    Ok(())
}
