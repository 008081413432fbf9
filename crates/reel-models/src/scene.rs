//! Storyboard scene models.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Stable identity and ordering key of a storyboard scene.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, JsonSchema,
)]
#[serde(transparent)]
pub struct SceneId(pub u32);

impl SceneId {
    pub fn get(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u32> for SceneId {
    fn from(id: u32) -> Self {
        Self(id)
    }
}

/// One decomposed segment of the analyzed video with derived prompts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StoryboardScene {
    /// Unique ID within the storyboard
    pub id: SceneId,

    /// Time range in the reference video (e.g. "00:00 - 00:04")
    pub time_range: String,

    /// What is visible in the scene
    pub visual_description: String,

    /// Camera movement (pan, dolly, static...)
    pub camera_movement: String,

    /// Prompt for a downstream image generator
    pub ai_image_prompt: String,

    /// Prompt for a downstream video generator
    pub ai_video_prompt: String,

    /// Optional narration for the scene
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub voiceover_script: Option<String>,
}

impl StoryboardScene {
    /// Start an in-progress edit of this scene.
    pub fn draft(&self) -> SceneDraft {
        SceneDraft {
            id: self.id,
            time_range: self.time_range.clone(),
            visual_description: self.visual_description.clone(),
            camera_movement: self.camera_movement.clone(),
            ai_image_prompt: self.ai_image_prompt.clone(),
            ai_video_prompt: self.ai_video_prompt.clone(),
            voiceover_script: self.voiceover_script.clone(),
        }
    }

    /// Replace every editable field with the draft's values.
    ///
    /// The scene id is never touched.
    pub(crate) fn apply(&mut self, draft: SceneDraft) {
        self.time_range = draft.time_range;
        self.visual_description = draft.visual_description;
        self.camera_movement = draft.camera_movement;
        self.ai_image_prompt = draft.ai_image_prompt;
        self.ai_video_prompt = draft.ai_video_prompt;
        self.voiceover_script = draft.voiceover_script;
    }

    fn check_required(&self) -> Result<(), ConformanceError> {
        let required = [
            ("timeRange", &self.time_range),
            ("visualDescription", &self.visual_description),
            ("cameraMovement", &self.camera_movement),
            ("aiImagePrompt", &self.ai_image_prompt),
            ("aiVideoPrompt", &self.ai_video_prompt),
        ];

        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(ConformanceError::EmptySceneField {
                    scene_id: self.id,
                    field,
                });
            }
        }
        Ok(())
    }
}

/// In-progress edit of a single scene.
///
/// Reconciled with the canonical storyboard only through
/// [`Storyboard::commit`](crate::Storyboard::commit). Dropping a draft discards it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SceneDraft {
    id: SceneId,
    pub time_range: String,
    pub visual_description: String,
    pub camera_movement: String,
    pub ai_image_prompt: String,
    pub ai_video_prompt: String,
    pub voiceover_script: Option<String>,
}

impl SceneDraft {
    /// Scene this draft belongs to.
    pub fn id(&self) -> SceneId {
        self.id
    }
}

/// Structured storyboard returned by the analysis service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    /// Storyboard title
    pub title: String,

    /// Short summary of the reference video
    pub summary: String,

    /// Ordered scenes
    pub scenes: Vec<StoryboardScene>,
}

impl AnalysisResult {
    /// Check that the decoded value has every required field populated.
    pub fn validate(&self) -> Result<(), ConformanceError> {
        if self.title.trim().is_empty() {
            return Err(ConformanceError::EmptyField("title"));
        }
        if self.summary.trim().is_empty() {
            return Err(ConformanceError::EmptyField("summary"));
        }
        if self.scenes.is_empty() {
            return Err(ConformanceError::NoScenes);
        }

        let mut seen = std::collections::HashSet::new();
        for scene in &self.scenes {
            if !seen.insert(scene.id) {
                return Err(ConformanceError::DuplicateSceneId(scene.id));
            }
            scene.check_required()?;
        }
        Ok(())
    }
}

/// Ways a decoded analysis response can violate the storyboard shape.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConformanceError {
    #[error("Field '{0}' is empty")]
    EmptyField(&'static str),

    #[error("Storyboard has no scenes")]
    NoScenes,

    #[error("Scene {scene_id} has an empty '{field}'")]
    EmptySceneField {
        scene_id: SceneId,
        field: &'static str,
    },

    #[error("Scene id {0} appears more than once")]
    DuplicateSceneId(SceneId),
}
