//! Studio configuration.

use std::path::PathBuf;

use reel_media::MergeEngine;
use reel_models::{AspectRatio, EncodingConfig};

use crate::error::{StudioError, StudioResult};

/// FFmpeg gets this long to merge before it is killed.
pub const DEFAULT_MERGE_TIMEOUT_SECS: u64 = 1800;

/// Studio configuration.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Directory for downloaded clips
    pub work_dir: PathBuf,
    /// Directory the merged video is written to
    pub output_dir: PathBuf,
    /// Aspect ratio used when none is given
    pub default_aspect: AspectRatio,
    /// Re-encode settings for the merged video
    pub encoding: EncodingConfig,
    /// Merge time limit in seconds, `None` for no limit
    pub merge_timeout_secs: Option<u64>,
}

impl Default for StudioConfig {
    fn default() -> Self {
        Self {
            work_dir: std::env::temp_dir().join("storyreel"),
            output_dir: PathBuf::from("."),
            default_aspect: AspectRatio::default(),
            encoding: EncodingConfig::default(),
            merge_timeout_secs: Some(DEFAULT_MERGE_TIMEOUT_SECS),
        }
    }
}

impl StudioConfig {
    /// Create config from environment variables.
    pub fn from_env() -> StudioResult<Self> {
        let defaults = Self::default();

        let default_aspect = match std::env::var("REEL_DEFAULT_ASPECT") {
            Ok(value) => value
                .parse()
                .map_err(|e| StudioError::Config(format!("REEL_DEFAULT_ASPECT: {}", e)))?,
            Err(_) => defaults.default_aspect,
        };

        Ok(Self {
            work_dir: std::env::var("REEL_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            output_dir: std::env::var("REEL_OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            default_aspect,
            encoding: defaults.encoding,
            merge_timeout_secs: std::env::var("REEL_MERGE_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .map_or(defaults.merge_timeout_secs, merge_timeout),
        })
    }

    /// Merge engine with this config's encoding and time limit.
    pub fn merge_engine(&self) -> MergeEngine {
        let engine = MergeEngine::new(self.encoding.clone());
        match self.merge_timeout_secs {
            Some(secs) => engine.with_timeout(secs),
            None => engine,
        }
    }
}

/// `0` disables the limit.
fn merge_timeout(secs: u64) -> Option<u64> {
    (secs > 0).then_some(secs)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StudioConfig::default();
        assert!(config.work_dir.ends_with("storyreel"));
        assert_eq!(config.output_dir, PathBuf::from("."));
        assert_eq!(config.default_aspect, AspectRatio::Landscape16x9);
        assert_eq!(config.merge_timeout_secs, Some(DEFAULT_MERGE_TIMEOUT_SECS));
    }

    #[test]
    fn test_zero_merge_timeout_disables_limit() {
        assert_eq!(merge_timeout(0), None);
        assert_eq!(merge_timeout(90), Some(90));
    }

    #[test]
    fn test_merge_engine_carries_timeout() {
        let config = StudioConfig {
            merge_timeout_secs: Some(42),
            ..StudioConfig::default()
        };
        assert_eq!(config.merge_engine().timeout_secs(), Some(42));

        let unlimited = StudioConfig {
            merge_timeout_secs: None,
            ..StudioConfig::default()
        };
        assert_eq!(unlimited.merge_engine().timeout_secs(), None);
    }
}
