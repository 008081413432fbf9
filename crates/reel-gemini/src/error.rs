//! Gemini client error types.

use std::fmt;

use thiserror::Error;

/// Result type for Gemini operations.
pub type GeminiResult<T> = Result<T, GeminiError>;

/// Transport-level failure classes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkErrorKind {
    /// The service refused the request body as too large
    PayloadTooLarge,
    /// The connection could not be made or was dropped
    Connectivity,
    /// The request did not finish in time
    Timeout,
}

impl NetworkErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkErrorKind::PayloadTooLarge => "payload_too_large",
            NetworkErrorKind::Connectivity => "connectivity",
            NetworkErrorKind::Timeout => "timeout",
        }
    }
}

impl fmt::Display for NetworkErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Errors that can occur while talking to the remote service.
#[derive(Debug, Error)]
pub enum GeminiError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Upload initiation failed ({status}): {body}")]
    Initiation { status: u16, body: String },

    #[error("Upload transfer failed ({status}): {body}")]
    Transfer { status: u16, body: String },

    #[error("Remote file {name} failed processing")]
    FileProcessingFailed { name: String },

    #[error("Timed out waiting for {what} after {attempts} polls")]
    PollTimeout { what: String, attempts: u32 },

    #[error("Service returned no text payload")]
    EmptyResponse,

    #[error("Failed to parse response: {0}")]
    Parse(String),

    #[error("Network error ({kind}): {message}")]
    Network {
        kind: NetworkErrorKind,
        message: String,
    },

    #[error("API returned {status}: {body}")]
    Api { status: u16, body: String },

    #[error("Video generation failed: {message}")]
    Generation { message: String },

    #[error("Video download failed ({status})")]
    Download { status: u16 },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl GeminiError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }

    pub fn generation(msg: impl Into<String>) -> Self {
        Self::Generation {
            message: msg.into(),
        }
    }

    pub fn poll_timeout(what: impl Into<String>, attempts: u32) -> Self {
        Self::PollTimeout {
            what: what.into(),
            attempts,
        }
    }

    /// Map a non-success HTTP status to an error.
    ///
    /// 413 is reported as a network failure so callers can tell size limits apart
    /// from other API errors.
    pub fn from_http_status(status: u16, body: impl Into<String>) -> Self {
        let body = body.into();
        match status {
            413 => Self::Network {
                kind: NetworkErrorKind::PayloadTooLarge,
                message: body,
            },
            _ => Self::Api { status, body },
        }
    }

    /// Check if error is retryable.
    pub fn is_retryable(&self) -> bool {
        match self {
            GeminiError::Network { kind, .. } => *kind != NetworkErrorKind::PayloadTooLarge,
            GeminiError::Api { status, .. } | GeminiError::Download { status } => {
                *status == 429 || *status >= 500
            }
            _ => false,
        }
    }

    /// User-facing hint for recovering from this error.
    pub fn user_hint(&self) -> Option<&'static str> {
        match self {
            GeminiError::Network {
                kind: NetworkErrorKind::PayloadTooLarge,
                ..
            } => Some("The video is too large for the service. Try again with a smaller file."),
            GeminiError::Network { .. } => {
                Some("The connection to the service failed. Check your network and try again, or use a smaller file.")
            }
            GeminiError::PollTimeout { .. } => {
                Some("The service is taking too long. Try again later.")
            }
            GeminiError::Parse(_) | GeminiError::EmptyResponse => {
                Some("The service returned an unexpected answer. Try analyzing again.")
            }
            _ => None,
        }
    }
}

impl From<reqwest::Error> for GeminiError {
    fn from(err: reqwest::Error) -> Self {
        if let Some(status) = err.status() {
            return Self::from_http_status(status.as_u16(), err.to_string());
        }

        if err.is_decode() {
            return Self::Parse(err.to_string());
        }

        let kind = if err.is_timeout() {
            NetworkErrorKind::Timeout
        } else {
            NetworkErrorKind::Connectivity
        };

        Self::Network {
            kind,
            message: err.to_string(),
        }
    }
}
