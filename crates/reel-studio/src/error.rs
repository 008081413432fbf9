//! Studio error types.

use thiserror::Error;

use reel_gemini::GeminiError;
use reel_media::MediaError;
use reel_models::StoryboardError;

pub type StudioResult<T> = Result<T, StudioError>;

#[derive(Debug, Error)]
pub enum StudioError {
    #[error("{0}")]
    Gemini(#[from] GeminiError),

    #[error("{0}")]
    Media(#[from] MediaError),

    #[error("{0}")]
    Storyboard(#[from] StoryboardError),

    #[error("No storyboard has been analyzed yet")]
    NoStoryboard,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl StudioError {
    /// Recovery hint for the user, if one applies.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            StudioError::Gemini(e) => e.user_hint(),
            StudioError::Media(MediaError::NothingToMerge) => {
                Some("Generate at least one scene before merging.")
            }
            StudioError::Media(MediaError::FfmpegNotFound | MediaError::FfprobeNotFound) => {
                Some("Install FFmpeg and make sure it is on PATH.")
            }
            StudioError::NoStoryboard => Some("Analyze a video first."),
            _ => None,
        }
    }
}
