use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, ChildStdout, Command, Stdio};
use std::thread::{self, JoinHandle};

use serde::Deserialize;
use tracing::{debug, info, warn};

use crate::error::{Result, VideoError};
use crate::video::types::{Frame, VideoMetadata};

/// Sequential reader of decoded frames
pub trait FrameSource: Send {
    fn metadata(&self) -> &VideoMetadata;

    /// Next frame in decode order, or `None` once the source is exhausted
    fn read_frame(&mut self) -> Result<Option<Frame>>;

    /// Reposition to the first frame
    fn rewind(&mut self) -> Result<()>;
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    codec_name: Option<String>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
    nb_frames: Option<String>,
    duration: Option<String>,
}

/// Parse an ffprobe rate such as `30000/1001`
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 || num <= 0.0 {
        return None;
    }
    Some(num / den)
}

/// Build metadata from `ffprobe -of json` output
fn metadata_from_probe(json: &str, path: &Path) -> Result<VideoMetadata> {
    let open_failed = |reason: String| VideoError::OpenFailed {
        path: path.display().to_string(),
        reason,
    };

    let probe: ProbeOutput = serde_json::from_str(json).map_err(|e| open_failed(format!("invalid ffprobe output: {}", e)))?;
    let stream = probe
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| open_failed("no video stream".to_string()))?;

    let (width, height) = match (stream.width, stream.height) {
        (Some(w), Some(h)) if w > 0 && h > 0 => (w, h),
        _ => return Err(open_failed("video stream has no dimensions".to_string()).into()),
    };

    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(30.0);

    let frame_count = stream
        .nb_frames
        .as_deref()
        .and_then(|n| n.parse::<u64>().ok())
        .or_else(|| {
            let duration = stream.duration.as_deref()?.parse::<f64>().ok()?;
            Some((duration * fps).round() as u64)
        })
        .unwrap_or(0);

    Ok(VideoMetadata {
        width,
        height,
        fps,
        frame_count,
        codec: stream.codec_name.unwrap_or_else(|| "unknown".to_string()),
    })
}

pub(crate) fn spawn_error(tool: &str, err: io::Error, path: &Path) -> VideoError {
    if err.kind() == io::ErrorKind::NotFound {
        VideoError::ToolMissing { tool: tool.to_string() }
    } else {
        VideoError::OpenFailed {
            path: path.display().to_string(),
            reason: err.to_string(),
        }
    }
}

/// Run ffprobe on the first video stream of `path`
pub fn probe<P: AsRef<Path>>(path: P) -> Result<VideoMetadata> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(VideoError::OpenFailed {
            path: path.display().to_string(),
            reason: "file does not exist".to_string(),
        }
        .into());
    }

    let output = Command::new("ffprobe")
        .args([
            "-v", "error",
            "-select_streams", "v:0",
            "-show_entries", "stream=width,height,codec_name,r_frame_rate,avg_frame_rate,nb_frames,duration",
            "-of", "json",
        ])
        .arg(path)
        .output()
        .map_err(|e| spawn_error("ffprobe", e, path))?;

    if !output.status.success() {
        return Err(VideoError::OpenFailed {
            path: path.display().to_string(),
            reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        }
        .into());
    }

    let metadata = metadata_from_probe(&String::from_utf8_lossy(&output.stdout), path)?;
    info!(
        "Video metadata: {}x{} @ {:.2}fps, {} frames ({})",
        metadata.width, metadata.height, metadata.fps, metadata.frame_count, metadata.codec
    );
    Ok(metadata)
}

/// Fill `buf` from `reader`, stopping early only at end of stream
///
/// Returns the number of bytes read.
pub(crate) fn read_full<R: Read>(reader: &mut R, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// A running decoder process and the thread collecting its diagnostics
struct DecoderProcess {
    child: Child,
    reader: BufReader<ChildStdout>,
    stderr: Option<JoinHandle<String>>,
}

impl DecoderProcess {
    fn spawn(mut command: Command, frame_bytes: usize, path: &Path) -> Result<Self> {
        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| spawn_error("ffmpeg", e, path))?;

        let stdout = child.stdout.take().ok_or_else(|| VideoError::OpenFailed {
            path: path.display().to_string(),
            reason: "decoder has no output pipe".to_string(),
        })?;

        // Drained on its own thread so a chatty decoder never blocks on a full pipe
        let stderr = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut text = Vec::new();
                if let Err(e) = pipe.read_to_end(&mut text) {
                    debug!("Decoder diagnostics unreadable: {}", e);
                }
                String::from_utf8_lossy(&text).trim().to_string()
            })
        });

        Ok(Self {
            child,
            reader: BufReader::with_capacity(frame_bytes, stdout),
            stderr,
        })
    }

    fn diagnostics(&mut self) -> String {
        self.stderr
            .take()
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default()
    }

    /// Reap a decoder whose output reached end of stream
    ///
    /// A non-zero exit means the stream ended early, not that the input was exhausted.
    fn finish(mut self) -> Result<()> {
        let status = self
            .child
            .wait()
            .map_err(|e| VideoError::DecodingFailed { reason: e.to_string() })?;
        let diagnostics = self.diagnostics();

        if status.success() {
            return Ok(());
        }

        let reason = if diagnostics.is_empty() {
            format!("decoder exited with {}", status)
        } else {
            diagnostics
        };
        Err(VideoError::DecodingFailed { reason }.into())
    }

    fn kill(mut self) {
        if let Err(e) = self.child.kill() {
            debug!("Decoder already exited: {}", e);
        }
        if let Err(e) = self.child.wait() {
            warn!("Failed to reap decoder: {}", e);
        }
        self.diagnostics();
    }
}

/// Decodes a video through an `ffmpeg` child emitting raw rgb24 frames
pub struct FfmpegSource {
    path: PathBuf,
    metadata: VideoMetadata,
    hw_accel: bool,
    decoder: Option<DecoderProcess>,
}

impl FfmpegSource {
    pub fn open<P: AsRef<Path>>(path: P, hw_accel: bool) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let metadata = probe(&path)?;

        let mut source = Self {
            path,
            metadata,
            hw_accel,
            decoder: None,
        };
        source.start_decoder()?;
        Ok(source)
    }

    fn decoder_command(&self) -> Command {
        let mut command = Command::new("ffmpeg");
        command.args(["-v", "error", "-nostdin"]);
        if self.hw_accel {
            command.args(["-hwaccel", "auto"]);
        }
        command
            .arg("-i")
            .arg(&self.path)
            .args(["-map", "0:v:0", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"]);
        command
    }

    fn start_decoder(&mut self) -> Result<()> {
        self.stop_decoder();
        let decoder = DecoderProcess::spawn(self.decoder_command(), self.metadata.frame_bytes(), &self.path)?;
        debug!("Started decoder for {} (hwaccel {})", self.path.display(), self.hw_accel);
        self.decoder = Some(decoder);
        Ok(())
    }

    fn stop_decoder(&mut self) {
        if let Some(decoder) = self.decoder.take() {
            decoder.kill();
        }
    }
}

impl FrameSource for FfmpegSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn read_frame(&mut self) -> Result<Option<Frame>> {
        let Some(decoder) = self.decoder.as_mut() else {
            return Ok(None);
        };

        let expected = self.metadata.frame_bytes();
        let mut data = vec![0u8; expected];
        let read = read_full(&mut decoder.reader, &mut data)
            .map_err(|e| VideoError::DecodingFailed { reason: e.to_string() })?;

        if read < expected {
            let finished = self.decoder.take().map_or(Ok(()), DecoderProcess::finish);
            finished?;
            if read == 0 {
                return Ok(None);
            }
            return Err(VideoError::FrameSizeMismatch { expected, actual: read }.into());
        }

        let frame = Frame::from_rgb_bytes(self.metadata.width, self.metadata.height, data)
            .ok_or(VideoError::FrameSizeMismatch { expected, actual: read })?;
        Ok(Some(frame))
    }

    fn rewind(&mut self) -> Result<()> {
        self.start_decoder()
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        self.stop_decoder();
    }
}
