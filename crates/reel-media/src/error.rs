//! Error types for media operations.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for media operations.
pub type MediaResult<T> = Result<T, MediaError>;

/// Errors that can occur during media processing.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("FFmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("FFprobe not found in PATH")]
    FfprobeNotFound,

    #[error("FFmpeg command failed: {message}")]
    FfmpegFailed {
        message: String,
        stderr: Option<String>,
        exit_code: Option<i32>,
    },

    #[error("FFprobe command failed: {message}")]
    FfprobeFailed {
        message: String,
        stderr: Option<String>,
    },

    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    #[error("Invalid video file: {0}")]
    InvalidVideo(String),

    #[error("No usable clips to merge")]
    NothingToMerge,

    #[error("Merge failed: {0}")]
    Merge(String),
}

impl MediaError {
    /// Create an FFmpeg failure error.
    pub fn ffmpeg_failed(
        message: impl Into<String>,
        stderr: Option<String>,
        exit_code: Option<i32>,
    ) -> Self {
        Self::FfmpegFailed {
            message: message.into(),
            stderr,
            exit_code,
        }
    }

    /// Create a merge failure error.
    pub fn merge(message: impl Into<String>) -> Self {
        Self::Merge(message.into())
    }

    /// A merge failure carrying the cause, including any FFmpeg stderr.
    pub fn merge_from(err: MediaError) -> Self {
        match err {
            MediaError::Merge(_) | MediaError::NothingToMerge => err,
            MediaError::FfmpegFailed {
                message,
                stderr: Some(stderr),
                ..
            } if !stderr.is_empty() => Self::Merge(format!("{}: {}", message, stderr)),
            other => Self::Merge(other.to_string()),
        }
    }
}
