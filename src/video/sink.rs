use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdin, Command, Output, Stdio};

use tracing::{debug, info, warn};

use crate::config::OutputCodec;
use crate::error::{Result, VideoError};
use crate::video::source::spawn_error;
use crate::video::types::{Frame, VideoMetadata};

/// Sequential writer of processed frames
pub trait FrameSink: Send {
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the output; further writes are an error
    fn finish(&mut self) -> Result<()>;
}

/// Encoder arguments for an output codec identifier
pub fn codec_args(codec: OutputCodec) -> Vec<&'static str> {
    match codec {
        OutputCodec::Mp4v => vec!["-c:v", "mpeg4", "-q:v", "3", "-pix_fmt", "yuv420p"],
        OutputCodec::H264 => vec!["-c:v", "libx264", "-preset", "medium", "-crf", "18", "-pix_fmt", "yuv420p"],
        OutputCodec::Xvid => vec!["-c:v", "mpeg4", "-vtag", "xvid", "-q:v", "3", "-pix_fmt", "yuv420p"],
    }
}

/// Encodes frames through an `ffmpeg` child reading raw rgb24 on stdin
pub struct FfmpegSink {
    path: PathBuf,
    width: u32,
    height: u32,
    child: Option<Child>,
    writer: Option<BufWriter<ChildStdin>>,
}

/// `<io error>: <encoder diagnostics>`, or the exit status when it printed nothing
fn describe_failure(context: &str, output: &Output) -> String {
    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    if stderr.is_empty() {
        format!("{} (encoder exited with {})", context, output.status)
    } else {
        format!("{}: {}", context, stderr)
    }
}

fn encoder_command(path: &Path, metadata: &VideoMetadata, codec: OutputCodec) -> Command {
    let mut command = Command::new("ffmpeg");
    command
        .args(["-v", "error", "-y", "-f", "rawvideo", "-pix_fmt", "rgb24", "-s"])
        .arg(format!("{}x{}", metadata.width, metadata.height))
        .arg("-r")
        .arg(format!("{}", metadata.fps))
        .args(["-i", "-"])
        .args(codec_args(codec))
        .arg(path);
    command
}

impl FfmpegSink {
    pub fn create<P: AsRef<Path>>(path: P, metadata: &VideoMetadata, codec: OutputCodec) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        // Surface an unwritable destination now rather than on the first frame
        File::create(&path).map_err(|e| VideoError::SinkUnavailable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;

        let command = encoder_command(&path, metadata, codec);
        let sink = Self::spawn(command, path, metadata)?;
        info!("Writing {} with codec {}", sink.path.display(), codec);
        Ok(sink)
    }

    fn spawn(mut command: Command, path: PathBuf, metadata: &VideoMetadata) -> Result<Self> {
        let unavailable = |reason: String| VideoError::SinkUnavailable {
            path: path.display().to_string(),
            reason,
        };

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| match spawn_error("ffmpeg", e, &path) {
                VideoError::OpenFailed { reason, .. } => unavailable(reason),
                other => other,
            })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| unavailable("encoder has no input pipe".to_string()))?;

        // An encoder that rejects its arguments exits before reading any input
        if let Ok(Some(_)) = child.try_wait() {
            drop(stdin);
            let reason = match child.wait_with_output() {
                Ok(output) => describe_failure("encoder exited at startup", &output),
                Err(e) => e.to_string(),
            };
            return Err(unavailable(reason).into());
        }

        Ok(Self {
            width: metadata.width,
            height: metadata.height,
            writer: Some(BufWriter::with_capacity(metadata.frame_bytes(), stdin)),
            child: Some(child),
            path,
        })
    }

    /// Reap the encoder after a failed write or flush and explain the failure
    fn encoder_failure(&mut self, err: io::Error) -> VideoError {
        self.writer = None;
        let reason = match self.child.take().map(Child::wait_with_output) {
            Some(Ok(output)) => describe_failure(&err.to_string(), &output),
            Some(Err(wait_err)) => format!("{} ({})", err, wait_err),
            None => err.to_string(),
        };
        warn!("Encoder for {} failed: {}", self.path.display(), reason);
        VideoError::EncodingFailed { reason }
    }
}

impl FrameSink for FfmpegSink {
    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let expected = Frame::byte_len(self.width, self.height);
        let actual = frame.as_rgb_bytes().len();
        if actual != expected {
            return Err(VideoError::FrameSizeMismatch { expected, actual }.into());
        }

        let writer = self.writer.as_mut().ok_or_else(|| VideoError::EncodingFailed {
            reason: "sink already finished".to_string(),
        })?;

        if let Err(e) = writer.write_all(frame.as_rgb_bytes()) {
            return Err(self.encoder_failure(e).into());
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            let flushed = writer.flush();
            drop(writer);
            if let Err(e) = flushed {
                return Err(self.encoder_failure(e).into());
            }
        }

        let Some(child) = self.child.take() else {
            return Ok(());
        };

        let output = child
            .wait_with_output()
            .map_err(|e| VideoError::EncodingFailed { reason: e.to_string() })?;

        if !output.status.success() {
            return Err(VideoError::EncodingFailed {
                reason: describe_failure("FFmpeg failed", &output),
            }
            .into());
        }

        debug!("Encoder for {} exited cleanly", self.path.display());
        Ok(())
    }
}

impl Drop for FfmpegSink {
    fn drop(&mut self) {
        self.writer = None;
        if let Some(mut child) = self.child.take() {
            warn!("Encoder for {} dropped before finish", self.path.display());
            let _ = child.kill();
            let _ = child.wait();
        }
    }
}
