use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Main configuration for the Watermark-Eraser
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Per-run processing settings
    #[serde(default)]
    pub processing: ProcessingConfig,

    /// Where and how output files are written
    #[serde(default)]
    pub output: OutputConfig,
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .map_err(|_| ConfigError::FileNotFound { path: path.display().to_string() })?;

        let config: Config = toml::from_str(&content)
            .map_err(|_| ConfigError::ParseFailed { path: path.display().to_string() })?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::InvalidValue {
                key: "config".to_string(),
                value: e.to_string()
            })?;

        std::fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        self.processing.validate()?;
        self.output.validate()?;
        Ok(())
    }
}

/// Inpainting technique selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InpaintMethod {
    /// Fast-marching inpainting (sharper on textured content)
    Telea,
    /// Isophote-following inpainting (smoother on flat content)
    #[serde(alias = "ns")]
    NavierStokes,
    /// Pick per region from its texture score
    Mixed,
}

impl InpaintMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Telea => "telea",
            Self::NavierStokes => "ns",
            Self::Mixed => "mixed",
        }
    }
}

impl fmt::Display for InpaintMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for InpaintMethod {
    type Err = ConfigError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "telea" => Ok(Self::Telea),
            "ns" | "navier_stokes" | "navier-stokes" => Ok(Self::NavierStokes),
            "mixed" => Ok(Self::Mixed),
            other => Err(ConfigError::InvalidValue {
                key: "inpaint_method".to_string(),
                value: other.to_string(),
            }),
        }
    }
}

/// Output video codec identifier
///
/// Deserialization goes through [`OutputCodec::resolve`], so an unknown name
/// in a config file falls back to `mp4v` instead of failing the load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum OutputCodec {
    Mp4v,
    H264,
    Xvid,
}

impl OutputCodec {
    /// Resolve a user-supplied codec name; anything unknown falls back to `mp4v`
    pub fn resolve(name: &str) -> Self {
        match name.to_ascii_lowercase().as_str() {
            "h264" => Self::H264,
            "xvid" => Self::Xvid,
            _ => Self::Mp4v,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Mp4v => "mp4v",
            Self::H264 => "h264",
            Self::Xvid => "xvid",
        }
    }
}

impl From<String> for OutputCodec {
    fn from(name: String) -> Self {
        Self::resolve(&name)
    }
}

impl fmt::Display for OutputCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Settings snapshot for one processing run
///
/// Shared read-only by every worker for the duration of the run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessingConfig {
    /// Inpainting technique
    pub inpaint_method: InpaintMethod,

    /// Bilateral filter diameter applied over the erased area (1 disables it)
    pub blur_strength: u32,

    /// Context margin around each area, in pixels
    pub margin: u32,

    /// Non-local-means color denoise after erasure
    pub denoise: bool,

    /// 3x3 sharpening after erasure
    pub sharpen: bool,

    /// Luma histogram equalization after erasure
    pub color_correct: bool,

    /// Emit a preview every N frames
    pub preview_frequency: u32,

    /// Size of the worker pool
    pub worker_count: usize,

    /// Number of in-flight frames before results are drained in order
    pub buffer_size: usize,

    /// Codec used for the output video
    pub output_codec: OutputCodec,

    /// Ask the decoder for hardware-accelerated decoding when available
    pub hw_accel: bool,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            inpaint_method: InpaintMethod::Mixed,
            blur_strength: 11,
            margin: 20,
            denoise: false,
            sharpen: false,
            color_correct: false,
            preview_frequency: 30,
            worker_count: 4,
            buffer_size: 10,
            output_codec: OutputCodec::Mp4v,
            hw_accel: false,
        }
    }
}

impl ProcessingConfig {
    /// Worker count suited to this machine, capped at 8
    pub fn default_worker_count() -> usize {
        num_cpus::get().clamp(1, 8)
    }

    /// True when any post-processing stage is enabled
    pub fn has_post_processing(&self) -> bool {
        self.denoise || self.sharpen || self.color_correct
    }

    pub fn validate(&self) -> Result<()> {
        let checks: [(&str, u64); 4] = [
            ("processing.blur_strength", self.blur_strength as u64),
            ("processing.preview_frequency", self.preview_frequency as u64),
            ("processing.worker_count", self.worker_count as u64),
            ("processing.buffer_size", self.buffer_size as u64),
        ];

        for (key, value) in checks {
            if value == 0 {
                return Err(ConfigError::InvalidValue {
                    key: key.to_string(),
                    value: value.to_string()
                }.into());
            }
        }

        Ok(())
    }
}

/// Output file placement
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory for output files; `None` writes next to the input
    pub directory: Option<PathBuf>,

    /// Appended to the input file stem
    pub suffix: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: None,
            suffix: "_no_watermark".to_string(),
        }
    }
}

impl OutputConfig {
    fn validate(&self) -> Result<()> {
        if self.suffix.is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "output.suffix".to_string(),
                value: String::new()
            }.into());
        }
        Ok(())
    }

    /// `<dir>/<stem><suffix><ext>`, keeping the source extension
    pub fn output_path_for(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let file_name = match input.extension() {
            Some(ext) => format!("{}{}.{}", stem, self.suffix, ext.to_string_lossy()),
            None => format!("{}{}", stem, self.suffix),
        };

        let dir = match &self.directory {
            Some(dir) => dir.clone(),
            None => input.parent().map(Path::to_path_buf).unwrap_or_default(),
        };
        dir.join(file_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let file_path = dir.path().join("test_config.toml");

        let mut original_config = Config::default();
        original_config.processing.inpaint_method = InpaintMethod::NavierStokes;
        original_config.processing.output_codec = OutputCodec::Xvid;

        original_config.save_to_file(&file_path).unwrap();
        let loaded_config = Config::from_file(&file_path).unwrap();

        assert_eq!(original_config.processing, loaded_config.processing);
        assert_eq!(original_config.output.suffix, loaded_config.output.suffix);
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: Config = toml::from_str("[processing]\nmargin = 5\n").unwrap();
        assert_eq!(config.processing.margin, 5);
        assert_eq!(config.processing.blur_strength, 11);
        assert_eq!(config.processing.inpaint_method, InpaintMethod::Mixed);
    }

    #[test]
    fn test_zero_values_rejected() {
        let mut config = Config::default();
        config.processing.buffer_size = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.worker_count = 0;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.processing.blur_strength = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_codec_fallback() {
        assert_eq!(OutputCodec::resolve("h264"), OutputCodec::H264);
        assert_eq!(OutputCodec::resolve("XVID"), OutputCodec::Xvid);
        assert_eq!(OutputCodec::resolve("av1"), OutputCodec::Mp4v);
    }

    #[test]
    fn test_unknown_codec_in_file_falls_back() {
        let config: Config = toml::from_str("[processing]\noutput_codec = \"divx\"\n").unwrap();
        assert_eq!(config.processing.output_codec, OutputCodec::Mp4v);

        let config: Config = toml::from_str("[processing]\noutput_codec = \"H264\"\n").unwrap();
        assert_eq!(config.processing.output_codec, OutputCodec::H264);
        assert!(!config.processing.hw_accel);
    }

    #[test]
    fn test_method_parsing() {
        assert_eq!("ns".parse::<InpaintMethod>().unwrap(), InpaintMethod::NavierStokes);
        assert_eq!("Telea".parse::<InpaintMethod>().unwrap(), InpaintMethod::Telea);
        assert!("blur".parse::<InpaintMethod>().is_err());
    }

    #[test]
    fn test_output_path_keeps_extension() {
        let output = OutputConfig::default();
        let path = output.output_path_for(Path::new("/videos/clip.mkv"));
        assert_eq!(path, PathBuf::from("/videos/clip_no_watermark.mkv"));

        let output = OutputConfig {
            directory: Some(PathBuf::from("/out")),
            ..OutputConfig::default()
        };
        let path = output.output_path_for(Path::new("clip.mp4"));
        assert_eq!(path, PathBuf::from("/out/clip_no_watermark.mp4"));
    }
}
