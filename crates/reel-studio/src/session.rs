//! Storyboard session.
//!
//! A session owns at most one storyboard. Analysis replaces it wholesale, edits
//! go through drafts, and each scene is generated independently before the
//! ready clips are merged. Every failure is recorded in session or scene state
//! before it is returned.

use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, Instrument};

use reel_gemini::{
    AnalysisClient, GeminiResult, GeneratedVideo, GenerationClient, GenerationRequest,
    ReferenceImage,
};
use reel_media::{MediaError, MediaResult, MergeEngine, MergeOutcome};
use reel_models::encoding::MERGE_EXTENSION;
use reel_models::{
    output_filename, AnalysisResult, AspectRatio, GeneratedClip, SceneDraft, SceneId, Storyboard,
    StoryboardScene,
};

use crate::error::{StudioError, StudioResult};
use crate::logging::SessionLogger;

/// Turns a reference video into a storyboard.
#[async_trait]
pub trait VideoAnalyzer: Send + Sync {
    async fn analyze(&self, video: &Path) -> GeminiResult<AnalysisResult>;
}

/// Produces one clip per request.
#[async_trait]
pub trait VideoGenerator: Send + Sync {
    async fn generate(
        &self,
        request: &GenerationRequest,
        dest_dir: &Path,
    ) -> GeminiResult<GeneratedVideo>;
}

/// Concatenates clips into one video.
#[async_trait]
pub trait ClipMerger: Send + Sync {
    async fn merge(&self, clips: &[GeneratedClip], output: &Path) -> MediaResult<MergeOutcome>;
}

#[async_trait]
impl VideoAnalyzer for AnalysisClient {
    async fn analyze(&self, video: &Path) -> GeminiResult<AnalysisResult> {
        AnalysisClient::analyze(self, video).await
    }
}

#[async_trait]
impl VideoGenerator for GenerationClient {
    async fn generate(
        &self,
        request: &GenerationRequest,
        dest_dir: &Path,
    ) -> GeminiResult<GeneratedVideo> {
        GenerationClient::generate(self, request, dest_dir).await
    }
}

#[async_trait]
impl ClipMerger for MergeEngine {
    async fn merge(&self, clips: &[GeneratedClip], output: &Path) -> MediaResult<MergeOutcome> {
        self.merge_with_progress(clips, output, |percent| {
            debug!(percent, "Merge progress");
        })
        .await
    }
}

/// Where the session is in the analyze flow.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionPhase {
    #[default]
    Idle,
    Analyzing,
    Ready,
    Failed {
        message: String,
        hint: Option<String>,
    },
}

impl SessionPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Analyzing => "analyzing",
            SessionPhase::Ready => "ready",
            SessionPhase::Failed { .. } => "failed",
        }
    }
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the most recent merge.
#[derive(Debug, Clone, PartialEq)]
pub enum MergeStatus {
    Merged(MergeOutcome),
    Failed {
        message: String,
        hint: Option<String>,
    },
}

/// Interactive storyboard session.
///
/// Mutating operations take `&mut self`, so a session runs at most one merge
/// or analysis at a time.
pub struct Session<A, G, M> {
    analyzer: A,
    generator: G,
    merger: M,
    phase: SessionPhase,
    storyboard: Option<Storyboard>,
    last_merge: Option<MergeStatus>,
    work_dir: PathBuf,
    logger: SessionLogger,
}

impl<A, G, M> Session<A, G, M>
where
    A: VideoAnalyzer,
    G: VideoGenerator,
    M: ClipMerger,
{
    /// Create a session writing generated clips under `work_dir`.
    pub fn new(analyzer: A, generator: G, merger: M, work_dir: impl Into<PathBuf>) -> Self {
        Self {
            analyzer,
            generator,
            merger,
            phase: SessionPhase::Idle,
            storyboard: None,
            last_merge: None,
            work_dir: work_dir.into(),
            logger: SessionLogger::new("session"),
        }
    }

    pub fn phase(&self) -> &SessionPhase {
        &self.phase
    }

    pub fn storyboard(&self) -> Option<&Storyboard> {
        self.storyboard.as_ref()
    }

    /// Outcome of the last merge since the storyboard was analyzed.
    pub fn last_merge(&self) -> Option<&MergeStatus> {
        self.last_merge.as_ref()
    }

    pub fn session_id(&self) -> &str {
        self.logger.session_id()
    }

    fn storyboard_mut(&mut self) -> StudioResult<&mut Storyboard> {
        self.storyboard.as_mut().ok_or(StudioError::NoStoryboard)
    }

    /// Analyze a reference video, replacing any previous storyboard.
    ///
    /// A failed analysis leaves the session in [`SessionPhase::Failed`] with no
    /// storyboard.
    pub async fn analyze(&mut self, video: &Path) -> StudioResult<&Storyboard> {
        let logger = self.logger.for_operation("analyze");
        logger.log_start(&video.display().to_string());

        self.phase = SessionPhase::Analyzing;
        self.storyboard = None;
        self.last_merge = None;

        let result = self
            .analyzer
            .analyze(video)
            .instrument(logger.create_span())
            .await;

        match result {
            Ok(analysis) => {
                logger.log_completion(&format!(
                    "'{}' with {} scenes",
                    analysis.title,
                    analysis.scenes.len()
                ));
                self.phase = SessionPhase::Ready;
                Ok(&*self.storyboard.insert(Storyboard::from(analysis)))
            }
            Err(e) => {
                let err = StudioError::from(e);
                logger.log_error(&err.to_string());
                self.phase = SessionPhase::Failed {
                    message: err.to_string(),
                    hint: err.user_hint().map(str::to_string),
                };
                Err(err)
            }
        }
    }

    /// Start editing a scene.
    pub fn begin_edit(&self, id: SceneId) -> StudioResult<SceneDraft> {
        let storyboard = self.storyboard.as_ref().ok_or(StudioError::NoStoryboard)?;
        Ok(storyboard.begin_edit(id)?)
    }

    /// Commit an edit onto the storyboard.
    pub fn commit_edit(&mut self, draft: SceneDraft) -> StudioResult<&StoryboardScene> {
        let id = draft.id();
        let scene = self.storyboard_mut()?.commit(draft)?;
        debug!(scene_id = %id, "Scene edit committed");
        Ok(scene)
    }

    /// Generate a clip for one scene from its video prompt.
    ///
    /// The scene ends up ready with the new clip or failed with the error
    /// message. A clip replaced by a successful regeneration is deleted; a
    /// failed regeneration keeps the earlier clip.
    pub async fn generate_scene(
        &mut self,
        id: SceneId,
        aspect_ratio: AspectRatio,
        reference_image: Option<ReferenceImage>,
    ) -> StudioResult<GeneratedClip> {
        let logger = self.logger.for_operation("generate_scene");
        let scene = self.storyboard_mut()?.start_generation(id)?;
        logger.log_start(&format!("scene {} ({})", id, aspect_ratio));

        let mut request = GenerationRequest::new(scene.ai_video_prompt, aspect_ratio);
        if let Some(image) = reference_image {
            request = request.with_reference_image(image);
        }

        let result = match tokio::fs::create_dir_all(&self.work_dir).await {
            Ok(()) => self
                .generator
                .generate(&request, &self.work_dir)
                .instrument(logger.create_span())
                .await
                .map_err(StudioError::from),
            Err(e) => Err(StudioError::from(e)),
        };

        let storyboard = self.storyboard_mut()?;
        match result {
            Ok(video) => {
                let clip = GeneratedClip::new(id, video.path, video.bytes);
                let replaced = storyboard.finish_generation(id, Ok(clip.clone()))?;
                logger.log_completion(&format!("scene {} -> {}", id, clip.path.display()));

                if let Some(old) = replaced.filter(|old| old.path != clip.path) {
                    if let Err(e) = tokio::fs::remove_file(&old.path).await {
                        logger.log_warning(&format!(
                            "could not remove replaced clip {}: {}",
                            old.path.display(),
                            e
                        ));
                    }
                }
                Ok(clip)
            }
            Err(err) => {
                storyboard.finish_generation(id, Err(err.to_string()))?;
                logger.log_error(&format!("scene {}: {}", id, err));
                Err(err)
            }
        }
    }

    /// Merge every ready clip in scene order into `output_dir`.
    ///
    /// The file is named after the storyboard title. The outcome, success or
    /// failure, is kept in [`Session::last_merge`].
    pub async fn merge(&mut self, output_dir: &Path) -> StudioResult<MergeOutcome> {
        let result = self.run_merge(output_dir).await;
        self.last_merge = Some(match &result {
            Ok(outcome) => MergeStatus::Merged(outcome.clone()),
            Err(err) => MergeStatus::Failed {
                message: err.to_string(),
                hint: err.user_hint().map(str::to_string),
            },
        });
        result
    }

    async fn run_merge(&self, output_dir: &Path) -> StudioResult<MergeOutcome> {
        let logger = self.logger.for_operation("merge");
        let storyboard = self.storyboard.as_ref().ok_or(StudioError::NoStoryboard)?;

        let clips = storyboard.ready_clips();
        if clips.is_empty() {
            logger.log_warning("no generated clips");
            return Err(MediaError::NothingToMerge.into());
        }

        let output = output_dir.join(output_filename(&storyboard.title, MERGE_EXTENSION));
        logger.log_start(&format!("{} clips -> {}", clips.len(), output.display()));

        match self
            .merger
            .merge(&clips, &output)
            .instrument(logger.create_span())
            .await
        {
            Ok(outcome) => {
                if !outcome.skipped.is_empty() {
                    logger.log_warning(&format!("skipped scenes {:?}", outcome.skipped));
                }
                logger.log_completion(&outcome.path.display().to_string());
                Ok(outcome)
            }
            Err(e) => {
                logger.log_error(&e.to_string());
                Err(e.into())
            }
        }
    }

    /// Return to the initial state, dropping the storyboard.
    pub fn reset(&mut self) {
        self.logger.log_progress("reset");
        self.phase = SessionPhase::Idle;
        self.storyboard = None;
        self.last_merge = None;
    }
}
