//! Canonical storyboard held by a session.
//!
//! The storyboard is built wholesale from an [`AnalysisResult`] and is never
//! partially merged with a later analysis. Individual scenes are edited through
//! [`SceneDraft`] values, and each entry carries its own [`SceneStatus`].

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::clip::{GeneratedClip, SceneStatus};
use crate::scene::{AnalysisResult, SceneDraft, SceneId, StoryboardScene};

/// Errors raised by storyboard mutations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoryboardError {
    #[error("Scene {0} not found")]
    SceneNotFound(SceneId),

    #[error("Scene {0} already has a generation in flight")]
    AlreadyGenerating(SceneId),

    #[error("Scene {0} has no generation in flight")]
    NotGenerating(SceneId),
}

/// A committed scene plus its generation status.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SceneEntry {
    pub scene: StoryboardScene,
    #[serde(default)]
    pub status: SceneStatus,
}

/// Session storyboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Storyboard {
    pub title: String,
    pub summary: String,
    entries: Vec<SceneEntry>,
}

impl From<AnalysisResult> for Storyboard {
    fn from(result: AnalysisResult) -> Self {
        Self {
            title: result.title,
            summary: result.summary,
            entries: result
                .scenes
                .into_iter()
                .map(|scene| SceneEntry {
                    scene,
                    status: SceneStatus::Idle,
                })
                .collect(),
        }
    }
}

impl Storyboard {
    /// Entries in storyboard order.
    pub fn entries(&self) -> &[SceneEntry] {
        &self.entries
    }

    /// Scenes in storyboard order.
    pub fn scenes(&self) -> impl Iterator<Item = &StoryboardScene> {
        self.entries.iter().map(|e| &e.scene)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, id: SceneId) -> Option<&SceneEntry> {
        self.entries.iter().find(|e| e.scene.id == id)
    }

    fn get_mut(&mut self, id: SceneId) -> Result<&mut SceneEntry, StoryboardError> {
        self.entries
            .iter_mut()
            .find(|e| e.scene.id == id)
            .ok_or(StoryboardError::SceneNotFound(id))
    }

    /// Start editing a scene. The storyboard is untouched until the draft is committed.
    pub fn begin_edit(&self, id: SceneId) -> Result<SceneDraft, StoryboardError> {
        self.get(id)
            .map(|e| e.scene.draft())
            .ok_or(StoryboardError::SceneNotFound(id))
    }

    /// Commit a draft onto its scene.
    ///
    /// Only the target scene's editable fields change; ordering and every other
    /// scene are preserved. The scene's generation status is kept.
    pub fn commit(&mut self, draft: SceneDraft) -> Result<&StoryboardScene, StoryboardError> {
        let entry = self.get_mut(draft.id())?;
        entry.scene.apply(draft);
        Ok(&entry.scene)
    }

    /// Mark a scene as generating and return a copy of it to generate from.
    ///
    /// A clip the scene already has stays in the storyboard until the new
    /// generation succeeds.
    pub fn start_generation(&mut self, id: SceneId) -> Result<StoryboardScene, StoryboardError> {
        let entry = self.get_mut(id)?;
        if entry.status.is_generating() {
            return Err(StoryboardError::AlreadyGenerating(id));
        }
        let previous = std::mem::take(&mut entry.status).into_clip();
        entry.status = SceneStatus::Generating { previous };
        Ok(entry.scene.clone())
    }

    /// Record a finished generation.
    ///
    /// On success, returns the clip the new one supersedes. On failure the
    /// earlier clip is kept on the failed scene and still merges.
    pub fn finish_generation(
        &mut self,
        id: SceneId,
        outcome: Result<GeneratedClip, String>,
    ) -> Result<Option<GeneratedClip>, StoryboardError> {
        let entry = self.get_mut(id)?;
        let previous = match std::mem::take(&mut entry.status) {
            SceneStatus::Generating { previous } => previous,
            other => {
                entry.status = other;
                return Err(StoryboardError::NotGenerating(id));
            }
        };

        match outcome {
            Ok(clip) => {
                entry.status = SceneStatus::Ready { clip };
                Ok(previous)
            }
            Err(message) => {
                entry.status = SceneStatus::Failed { message, previous };
                Ok(None)
            }
        }
    }

    /// Clips available for merging, sorted by ascending scene id.
    pub fn ready_clips(&self) -> Vec<GeneratedClip> {
        let mut clips: Vec<GeneratedClip> = self
            .entries
            .iter()
            .filter_map(|e| e.status.clip().cloned())
            .collect();
        clips.sort_by_key(|c| c.scene_id);
        clips
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::tests::analysis;

    fn ready(board: &mut Storyboard, id: u32) {
        board.start_generation(SceneId(id)).unwrap();
        board
            .finish_generation(
                SceneId(id),
                Ok(GeneratedClip::new(SceneId(id), format!("/tmp/{}.mp4", id), 10)),
            )
            .unwrap();
    }

    #[test]
    fn test_commit_only_touches_target_scene() {
        let mut board = Storyboard::from(analysis(&[1, 2, 3]));
        let before = board.clone();

        let mut draft = board.begin_edit(SceneId(2)).unwrap();
        draft.visual_description = "Rain on the window".to_string();
        board.commit(draft).unwrap();

        let ids: Vec<u32> = board.scenes().map(|s| s.id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(board.entries()[0], before.entries()[0]);
        assert_eq!(board.entries()[2], before.entries()[2]);

        let edited = &board.get(SceneId(2)).unwrap().scene;
        assert_eq!(edited.visual_description, "Rain on the window");
        assert_eq!(edited.camera_movement, before.entries()[1].scene.camera_movement);
    }

    #[test]
    fn test_dropped_draft_changes_nothing() {
        let board = Storyboard::from(analysis(&[1, 2]));
        let before = board.clone();

        let mut draft = board.begin_edit(SceneId(1)).unwrap();
        draft.ai_video_prompt = "discarded".to_string();
        drop(draft);

        assert_eq!(board, before);
    }

    #[test]
    fn test_begin_edit_unknown_scene() {
        let board = Storyboard::from(analysis(&[1]));
        assert_eq!(
            board.begin_edit(SceneId(9)),
            Err(StoryboardError::SceneNotFound(SceneId(9)))
        );
    }

    #[test]
    fn test_second_generation_rejected_while_in_flight() {
        let mut board = Storyboard::from(analysis(&[1, 2]));
        board.start_generation(SceneId(1)).unwrap();

        assert_eq!(
            board.start_generation(SceneId(1)).unwrap_err(),
            StoryboardError::AlreadyGenerating(SceneId(1))
        );
        // Other scenes are independent
        assert!(board.start_generation(SceneId(2)).is_ok());
    }

    #[test]
    fn test_finish_without_start_rejected() {
        let mut board = Storyboard::from(analysis(&[1]));
        let clip = GeneratedClip::new(SceneId(1), "/tmp/1.mp4", 1);
        assert_eq!(
            board.finish_generation(SceneId(1), Ok(clip)).unwrap_err(),
            StoryboardError::NotGenerating(SceneId(1))
        );
    }

    #[test]
    fn test_failed_generation_recorded() {
        let mut board = Storyboard::from(analysis(&[1]));
        board.start_generation(SceneId(1)).unwrap();
        board
            .finish_generation(SceneId(1), Err("safety filter".to_string()))
            .unwrap();

        let status = &board.get(SceneId(1)).unwrap().status;
        assert_eq!(
            status,
            &SceneStatus::Failed {
                message: "safety filter".to_string(),
                previous: None,
            }
        );
        assert!(board.ready_clips().is_empty());
    }

    #[test]
    fn test_ready_clips_sorted_by_scene_id() {
        let mut board = Storyboard::from(analysis(&[1, 2, 3]));
        ready(&mut board, 3);
        ready(&mut board, 1);
        ready(&mut board, 2);

        let ids: Vec<u32> = board.ready_clips().iter().map(|c| c.scene_id.get()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_ready_clips_skip_scenes_without_clip() {
        let mut board = Storyboard::from(analysis(&[1, 2, 3, 4, 5]));
        ready(&mut board, 3);
        ready(&mut board, 1);

        let ids: Vec<u32> = board.ready_clips().iter().map(|c| c.scene_id.get()).collect();
        assert_eq!(ids, vec![1, 3]);
    }

    #[test]
    fn test_regeneration_hands_back_replaced_clip() {
        let mut board = Storyboard::from(analysis(&[1]));
        ready(&mut board, 1);

        let scene = board.start_generation(SceneId(1)).unwrap();
        assert_eq!(scene.id, SceneId(1));
        assert!(board.ready_clips().is_empty());

        let replaced = board
            .finish_generation(
                SceneId(1),
                Ok(GeneratedClip::new(SceneId(1), "/tmp/1-b.mp4", 20)),
            )
            .unwrap();
        assert_eq!(replaced.unwrap().path, std::path::PathBuf::from("/tmp/1.mp4"));
        assert_eq!(
            board.ready_clips()[0].path,
            std::path::PathBuf::from("/tmp/1-b.mp4")
        );
    }

    #[test]
    fn test_failed_regeneration_keeps_earlier_clip() {
        let mut board = Storyboard::from(analysis(&[1, 2]));
        ready(&mut board, 1);
        let earlier = board.ready_clips();

        board.start_generation(SceneId(1)).unwrap();
        let replaced = board
            .finish_generation(SceneId(1), Err("quota exceeded".to_string()))
            .unwrap();

        assert!(replaced.is_none());
        assert_eq!(board.get(SceneId(1)).unwrap().status.as_str(), "failed");
        assert_eq!(board.ready_clips(), earlier);

        // A later retry still carries the earlier clip along
        board.start_generation(SceneId(1)).unwrap();
        let replaced = board
            .finish_generation(
                SceneId(1),
                Ok(GeneratedClip::new(SceneId(1), "/tmp/1-c.mp4", 30)),
            )
            .unwrap();
        assert_eq!(replaced, earlier.into_iter().next());
    }

    #[test]
    fn test_commit_keeps_generation_status() {
        let mut board = Storyboard::from(analysis(&[1]));
        ready(&mut board, 1);

        let mut draft = board.begin_edit(SceneId(1)).unwrap();
        draft.camera_movement = "Static".to_string();
        board.commit(draft).unwrap();

        assert_eq!(board.ready_clips().len(), 1);
    }
}
