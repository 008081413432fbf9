//! FFmpeg command builder and runner.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use reel_models::EncodingConfig;

use crate::error::{MediaError, MediaResult};
use crate::progress::FfmpegProgress;

/// Lines of non-progress stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;
/// FFmpeg log level; progress still arrives through `-progress`.
const LOG_LEVEL: &str = "error";

/// Builder for FFmpeg commands.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    /// Input file paths, in `-i` order
    inputs: Vec<PathBuf>,
    /// Output file path
    output: PathBuf,
    /// Output arguments (after the last -i)
    output_args: Vec<String>,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
        }
    }

    /// Add input files in `-i` order.
    pub fn inputs<I, P>(mut self, paths: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: AsRef<Path>,
    {
        self.inputs
            .extend(paths.into_iter().map(|p| p.as_ref().to_path_buf()));
        self
    }

    /// Add output arguments (after -i).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set filter complex.
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a stream or filter label into the output.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Set video codec.
    pub fn video_codec(self, codec: impl Into<String>) -> Self {
        self.output_arg("-c:v").output_arg(codec)
    }

    /// Set CRF (quality).
    pub fn crf(self, crf: u8) -> Self {
        self.output_arg("-crf").output_arg(crf.to_string())
    }

    /// Set preset.
    pub fn preset(self, preset: impl Into<String>) -> Self {
        self.output_arg("-preset").output_arg(preset)
    }

    /// Set output pixel format.
    pub fn pixel_format(self, format: impl Into<String>) -> Self {
        self.output_arg("-pix_fmt").output_arg(format)
    }

    /// Set output frame rate.
    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Drop all audio streams.
    pub fn no_audio(self) -> Self {
        self.output_arg("-an")
    }

    /// Apply codec, preset, CRF, pixel format and extra args.
    pub fn encoding(self, encoding: &EncodingConfig) -> Self {
        self.video_codec(encoding.codec.clone())
            .preset(encoding.preset.clone())
            .crf(encoding.crf)
            .pixel_format(encoding.pixel_format.clone())
            .output_args(encoding.extra_args.iter().cloned())
    }

    /// Build the command arguments. The output is always overwritten.
    pub fn build_args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", LOG_LEVEL, "-progress", "pipe:2"]
            .iter()
            .map(|a| a.to_string())
            .collect();

        for input in &self.inputs {
            args.push("-i".to_string());
            args.push(input.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());

        args.push(self.output.to_string_lossy().to_string());

        args
    }
}

/// Runner for FFmpeg commands with progress tracking and an optional timeout.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    /// Timeout in seconds
    timeout_secs: Option<u64>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set timeout.
    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = Some(secs);
        self
    }

    pub fn timeout_secs(&self) -> Option<u64> {
        self.timeout_secs
    }

    /// Run an FFmpeg command with progress callback.
    ///
    /// Stderr lines that are not progress records are kept, and the last few are
    /// attached to [`MediaError::FfmpegFailed`] when FFmpeg exits non-zero.
    pub async fn run_with_progress<F>(
        &self,
        cmd: &FfmpegCommand,
        progress_callback: F,
    ) -> MediaResult<()>
    where
        F: Fn(FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.build_args();
        debug!("Running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::ffmpeg_failed("FFmpeg stderr not captured", None, None))?;
        let mut reader = BufReader::new(stderr).lines();

        let stderr_handle = tokio::spawn(async move {
            let mut current_progress = FfmpegProgress::default();
            let mut tail = VecDeque::with_capacity(STDERR_TAIL_LINES);

            while let Ok(Some(line)) = reader.next_line().await {
                if is_progress_line(&line) {
                    if let Some(progress) = current_progress.apply_line(&line) {
                        progress_callback(progress);
                    }
                } else if !line.trim().is_empty() {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.pop_front();
                    }
                    tail.push_back(line);
                }
            }

            Vec::from(tail).join("\n")
        });

        let result = self.wait_for_completion(&mut child).await;
        let tail = stderr_handle.await.unwrap_or_default();

        match result {
            Err(MediaError::FfmpegFailed {
                message,
                exit_code,
                ..
            }) => Err(MediaError::ffmpeg_failed(
                message,
                (!tail.is_empty()).then_some(tail),
                exit_code,
            )),
            other => other,
        }
    }

    /// Wait for child process with an optional timeout.
    async fn wait_for_completion(&self, child: &mut Child) -> MediaResult<()> {
        let status = match self.timeout_secs {
            Some(timeout_secs) => {
                match tokio::time::timeout(Duration::from_secs(timeout_secs), child.wait()).await {
                    Ok(status) => status?,
                    Err(_) => {
                        warn!("FFmpeg timed out after {} seconds, killing process", timeout_secs);
                        let _ = child.kill().await;
                        return Err(MediaError::Timeout(timeout_secs));
                    }
                }
            }
            None => child.wait().await?,
        };

        if status.success() {
            Ok(())
        } else {
            Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                None,
                status.code(),
            ))
        }
    }
}

/// Keys emitted by `-progress`.
const PROGRESS_KEYS: &[&str] = &[
    "frame",
    "fps",
    "bitrate",
    "total_size",
    "out_time_us",
    "out_time_ms",
    "out_time",
    "dup_frames",
    "drop_frames",
    "speed",
    "progress",
];

fn is_progress_line(line: &str) -> bool {
    line.trim()
        .split_once('=')
        .map(|(key, _)| PROGRESS_KEYS.contains(&key) || key.starts_with("stream_"))
        .unwrap_or(false)
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Check if FFprobe is available.
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}
