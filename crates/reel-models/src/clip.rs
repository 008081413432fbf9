//! Generated clip and per-scene generation status.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::scene::SceneId;

/// A locally held video produced for one scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct GeneratedClip {
    /// Scene this clip was generated for
    pub scene_id: SceneId,

    /// Local file holding the downloaded video
    pub path: PathBuf,

    /// Size of the downloaded file in bytes
    pub bytes: u64,

    /// When the download finished
    pub created_at: DateTime<Utc>,
}

impl GeneratedClip {
    pub fn new(scene_id: SceneId, path: impl Into<PathBuf>, bytes: u64) -> Self {
        Self {
            scene_id,
            path: path.into(),
            bytes,
            created_at: Utc::now(),
        }
    }
}

/// Generation status of a single scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Default)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SceneStatus {
    /// No clip requested yet
    #[default]
    Idle,
    /// A generation request is in flight; `previous` is the clip it will replace
    Generating {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<GeneratedClip>,
    },
    /// A clip is available
    Ready { clip: GeneratedClip },
    /// The last generation attempt failed; an earlier clip is kept in `previous`
    Failed {
        message: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        previous: Option<GeneratedClip>,
    },
}

impl SceneStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SceneStatus::Idle => "idle",
            SceneStatus::Generating { .. } => "generating",
            SceneStatus::Ready { .. } => "ready",
            SceneStatus::Failed { .. } => "failed",
        }
    }

    pub fn is_generating(&self) -> bool {
        matches!(self, SceneStatus::Generating { .. })
    }

    /// Clip usable for a merge. A scene whose regeneration failed keeps its
    /// earlier clip; an in-flight scene has none.
    pub fn clip(&self) -> Option<&GeneratedClip> {
        match self {
            SceneStatus::Ready { clip } => Some(clip),
            SceneStatus::Failed { previous, .. } => previous.as_ref(),
            _ => None,
        }
    }

    /// Take the clip out of this status, leaving nothing behind.
    pub fn into_clip(self) -> Option<GeneratedClip> {
        match self {
            SceneStatus::Ready { clip } => Some(clip),
            SceneStatus::Failed { previous, .. } | SceneStatus::Generating { previous } => previous,
            SceneStatus::Idle => None,
        }
    }
}

impl std::fmt::Display for SceneStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_serializes_with_tag() {
        let status = SceneStatus::Failed {
            message: "quota".to_string(),
            previous: None,
        };
        let json = serde_json::to_value(&status).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "quota");
        assert!(json.get("previous").is_none());
    }

    #[test]
    fn test_clip_only_when_ready() {
        assert!(SceneStatus::Idle.clip().is_none());
        assert!(SceneStatus::Generating { previous: None }.clip().is_none());

        let clip = GeneratedClip::new(SceneId(2), "/tmp/2.mp4", 1024);
        let status = SceneStatus::Ready { clip: clip.clone() };
        assert_eq!(status.clip(), Some(&clip));
        assert_eq!(status.as_str(), "ready");
    }

    #[test]
    fn test_failed_status_keeps_previous_clip() {
        let clip = GeneratedClip::new(SceneId(4), "/tmp/4.mp4", 2048);
        let status = SceneStatus::Failed {
            message: "timed out".to_string(),
            previous: Some(clip.clone()),
        };
        assert_eq!(status.clip(), Some(&clip));
        assert_eq!(status.into_clip(), Some(clip));

        let generating = SceneStatus::Generating {
            previous: Some(GeneratedClip::new(SceneId(4), "/tmp/4.mp4", 2048)),
        };
        assert!(generating.clip().is_none());
        assert!(generating.into_clip().is_some());
    }
}
