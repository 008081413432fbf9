//! Client configuration.

use std::time::Duration;

use crate::error::{GeminiError, GeminiResult};
use crate::retry::RetryConfig;

/// Default API host.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Files below this size are sent inline as base64.
pub const DEFAULT_INLINE_THRESHOLD_BYTES: u64 = 20 * 1024 * 1024;
/// Default models for storyboard analysis, tried in order.
pub const DEFAULT_ANALYSIS_MODELS: &[&str] = &["gemini-2.5-flash", "gemini-2.5-pro"];
/// Default model for video generation.
pub const DEFAULT_VIDEO_MODEL: &str = "veo-3.1-fast-generate-preview";

/// Interval and attempt cap for a polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay between status fetches
    pub interval: Duration,
    /// Status fetches allowed before giving up
    pub max_attempts: u32,
}

impl PollPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }
}

/// Gemini client configuration.
#[derive(Debug, Clone)]
pub struct GeminiConfig {
    /// API key sent as the `key` query parameter
    pub api_key: String,
    /// API host, without a trailing slash
    pub base_url: String,
    /// Analysis models, tried in order
    pub analysis_models: Vec<String>,
    /// Video generation model
    pub video_model: String,
    /// Size at which uploads switch from inline to resumable
    pub inline_threshold_bytes: u64,
    /// Polling for uploaded files to become active
    pub file_poll: PollPolicy,
    /// Polling for long-running generation operations
    pub operation_poll: PollPolicy,
    /// Retry of transient failures on status fetches and downloads
    pub retry: RetryConfig,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl GeminiConfig {
    /// Create a config with defaults for everything but the key.
    pub fn new(api_key: impl Into<String>) -> Self {
        let interval = Duration::from_secs(5);
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
            analysis_models: DEFAULT_ANALYSIS_MODELS.iter().map(|m| m.to_string()).collect(),
            video_model: DEFAULT_VIDEO_MODEL.to_string(),
            inline_threshold_bytes: DEFAULT_INLINE_THRESHOLD_BYTES,
            file_poll: PollPolicy::new(interval, 60),
            operation_poll: PollPolicy::new(interval, 120),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(300),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Create config from environment variables.
    pub fn from_env() -> GeminiResult<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| GeminiError::config("GEMINI_API_KEY not set"))?;

        if api_key.trim().is_empty() {
            return Err(GeminiError::config("GEMINI_API_KEY cannot be empty"));
        }

        let defaults = Self::new(api_key);

        let interval = Duration::from_secs(
            std::env::var("GEMINI_POLL_INTERVAL_SECS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(5),
        );

        let analysis_models = std::env::var("GEMINI_ANALYSIS_MODELS")
            .map(|s| {
                s.split(',')
                    .map(|m| m.trim().to_string())
                    .filter(|m| !m.is_empty())
                    .collect::<Vec<_>>()
            })
            .ok()
            .filter(|models| !models.is_empty())
            .unwrap_or(defaults.analysis_models);

        Ok(Self {
            base_url: std::env::var("GEMINI_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            analysis_models,
            video_model: std::env::var("GEMINI_VIDEO_MODEL").unwrap_or(defaults.video_model),
            inline_threshold_bytes: std::env::var("GEMINI_INLINE_THRESHOLD_BYTES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(DEFAULT_INLINE_THRESHOLD_BYTES),
            file_poll: PollPolicy::new(
                interval,
                std::env::var("GEMINI_FILE_POLL_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            operation_poll: PollPolicy::new(
                interval,
                std::env::var("GEMINI_OPERATION_POLL_MAX_ATTEMPTS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            retry: RetryConfig::default(),
            timeout: Duration::from_secs(
                std::env::var("GEMINI_REQUEST_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(300),
            ),
            connect_timeout: Duration::from_secs(
                std::env::var("GEMINI_CONNECT_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            api_key: defaults.api_key,
        })
    }

    /// Point the client at another host (used by tests).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Set the inline threshold.
    pub fn with_inline_threshold(mut self, bytes: u64) -> Self {
        self.inline_threshold_bytes = bytes;
        self
    }

    /// Use the same polling interval for files and operations.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.file_poll.interval = interval;
        self.operation_poll.interval = interval;
        self
    }

    /// Set the file polling policy.
    pub fn with_file_poll(mut self, policy: PollPolicy) -> Self {
        self.file_poll = policy;
        self
    }

    /// Set the operation polling policy.
    pub fn with_operation_poll(mut self, policy: PollPolicy) -> Self {
        self.operation_poll = policy;
        self
    }

    /// Set the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Set the analysis models.
    pub fn with_analysis_models<I, S>(mut self, models: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.analysis_models = models.into_iter().map(Into::into).collect();
        self
    }
}
