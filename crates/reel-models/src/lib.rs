//! Shared data models for storyreel.
//!
//! This crate provides Serde-serializable types for:
//! - Storyboard scenes and analysis results
//! - Draft/commit editing of individual scenes
//! - Per-scene generation status and generated clips
//! - Remote file handles used by the resumable upload
//! - Aspect ratio and encoding configuration

pub mod aspect;
pub mod clip;
pub mod encoding;
pub mod remote_file;
pub mod scene;
pub mod storyboard;
pub mod utils;

// Re-export common types
pub use aspect::{AspectRatio, AspectRatioParseError};
pub use clip::{GeneratedClip, SceneStatus};
pub use encoding::EncodingConfig;
pub use remote_file::{FileState, RemoteFileHandle};
pub use scene::{AnalysisResult, ConformanceError, SceneDraft, SceneId, StoryboardScene};
pub use storyboard::{SceneEntry, Storyboard, StoryboardError};
pub use utils::output_filename;
