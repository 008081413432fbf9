//! FFmpeg CLI wrapper for storyreel.
//!
//! This crate provides:
//! - Type-safe FFmpeg command building with multiple inputs
//! - Progress parsing from `-progress pipe:2`
//! - FFprobe video inspection
//! - Concatenation of generated clips into a single re-encoded video

pub mod command;
pub mod error;
pub mod merge;
pub mod probe;
pub mod progress;

pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use merge::{MergeEngine, MergeOutcome, MergePlan, MergeSegment};
pub use probe::{probe_video, VideoInfo};
pub use progress::FfmpegProgress;
