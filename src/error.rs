use thiserror::Error;

/// Main error type for the Watermark-Eraser library
#[derive(Error, Debug)]
pub enum EraserError {
    #[error("Video error: {0}")]
    Video(#[from] VideoError),

    #[error("Area error: {0}")]
    Area(#[from] AreaError),

    #[error("Processing error: {0}")]
    Processing(#[from] ProcessingError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Generic error: {0}")]
    Generic(String),
}

/// Errors raised while opening, decoding or encoding video
#[derive(Error, Debug)]
pub enum VideoError {
    #[error("Failed to open video source: {path} ({reason})")]
    OpenFailed { path: String, reason: String },

    #[error("Video contains no frames or is corrupted: {path}")]
    EmptySource { path: String },

    #[error("Cannot create output file: {path} ({reason})")]
    SinkUnavailable { path: String, reason: String },

    #[error("Required tool not found: {tool}")]
    ToolMissing { tool: String },

    #[error("Cannot read first frame: {path}")]
    NoFirstFrame { path: String },

    #[error("Video decoding failed: {reason}")]
    DecodingFailed { reason: String },

    #[error("Video encoding failed: {reason}")]
    EncodingFailed { reason: String },

    #[error("Frame size mismatch: expected {expected} bytes, got {actual}")]
    FrameSizeMismatch { expected: usize, actual: usize },
}

/// Errors raised while resolving erasure areas
#[derive(Error, Debug)]
pub enum AreaError {
    #[error("No areas selected: choose at least one corner or draw an area")]
    NoAreasSelected,

    #[error("Failed to read area profile: {path} ({reason})")]
    ProfileLoadFailed { path: String, reason: String },

    #[error("Failed to write area profile: {path} ({reason})")]
    ProfileSaveFailed { path: String, reason: String },

    #[error("Invalid area specification: {input}")]
    InvalidSpec { input: String },
}

/// Errors raised by the frame processing workers
#[derive(Error, Debug)]
pub enum ProcessingError {
    #[error("Frame {index} failed: {reason}")]
    WorkerFailed { index: u64, reason: String },

    #[error("Worker for frame {index} exited without a result")]
    WorkerLost { index: u64 },

    #[error("Failed to build worker pool: {reason}")]
    PoolUnavailable { reason: String },
}

/// Configuration-specific errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to parse configuration file: {path}")]
    ParseFailed { path: String },

    #[error("Invalid configuration value: {key} = {value}")]
    InvalidValue { key: String, value: String },

    #[error("Configuration file not found: {path}")]
    FileNotFound { path: String },
}

/// Convenience type alias for Results using EraserError
pub type Result<T> = std::result::Result<T, EraserError>;

impl EraserError {
    /// Create a generic error with a custom message
    pub fn generic<S: Into<String>>(message: S) -> Self {
        Self::Generic(message.into())
    }

    /// Every failure terminates the run it occurred in; nothing is retried
    /// locally. Batch callers move on by starting a fresh run.
    pub fn is_fatal(&self) -> bool {
        true
    }

    /// True when the error happened before any frame was processed
    pub fn is_open_error(&self) -> bool {
        matches!(
            self,
            Self::Video(VideoError::OpenFailed { .. })
                | Self::Video(VideoError::EmptySource { .. })
                | Self::Video(VideoError::SinkUnavailable { .. })
                | Self::Video(VideoError::ToolMissing { .. })
                | Self::Video(VideoError::NoFirstFrame { .. })
        )
    }

    /// Get a user-friendly error message
    pub fn user_message(&self) -> String {
        match self {
            Self::Video(VideoError::OpenFailed { path, .. }) => {
                format!("Could not open video '{}'. Please check the file exists and is a supported format.", path)
            }
            Self::Video(VideoError::ToolMissing { tool }) => {
                format!("'{}' was not found on PATH. Please install FFmpeg.", tool)
            }
            Self::Area(AreaError::NoAreasSelected) => {
                "Please select at least one area to remove!".to_string()
            }
            Self::Config(ConfigError::FileNotFound { path }) => {
                format!("Configuration file '{}' not found.", path)
            }
            _ => self.to_string(),
        }
    }
}
