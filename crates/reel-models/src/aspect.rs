//! Aspect ratios accepted by the video generation endpoint.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Output aspect ratio for a generated clip.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
pub enum AspectRatio {
    /// Landscape (16:9)
    #[default]
    #[serde(rename = "16:9")]
    Landscape16x9,
    /// Portrait (9:16) for Shorts/Reels
    #[serde(rename = "9:16")]
    Portrait9x16,
}

impl AspectRatio {
    pub fn as_str(&self) -> &'static str {
        match self {
            AspectRatio::Landscape16x9 => "16:9",
            AspectRatio::Portrait9x16 => "9:16",
        }
    }
}

impl fmt::Display for AspectRatio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AspectRatio {
    type Err = AspectRatioParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "16:9" => Ok(AspectRatio::Landscape16x9),
            "9:16" => Ok(AspectRatio::Portrait9x16),
            other => Err(AspectRatioParseError::Unsupported(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AspectRatioParseError {
    #[error("Unsupported aspect ratio: {0}, expected '16:9' or '9:16'")]
    Unsupported(String),
}
