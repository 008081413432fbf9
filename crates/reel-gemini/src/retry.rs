//! Retry policy with exponential backoff and jitter.
//!
//! Used only for idempotent GETs (status polls, downloads). Uploads and
//! generation submissions are never retried automatically.

use std::time::Duration;

use tracing::{info_span, warn, Instrument};

use crate::error::GeminiResult;
use crate::metrics::record_retry;

/// Retry policy configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryConfig {
    /// Maximum number of retry attempts.
    pub max_retries: u32,
    /// Base delay for exponential backoff (in milliseconds).
    pub base_delay_ms: u64,
    /// Maximum delay cap (in milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 250,
            max_delay_ms: 5000,
        }
    }
}

impl RetryConfig {
    /// A policy that never retries.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }
}

/// Execute an async operation with retry.
///
/// Retries only errors where [`GeminiError::is_retryable`](crate::GeminiError::is_retryable) holds.
pub async fn with_retry<T, F, Fut>(config: &RetryConfig, operation: &str, op: F) -> GeminiResult<T>
where
    F: Fn() -> Fut,
    Fut: std::future::Future<Output = GeminiResult<T>>,
{
    let mut attempt = 0u32;

    loop {
        let span = info_span!("gemini_retry", operation = %operation, attempt = attempt + 1);

        match op().instrument(span).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_retryable() && attempt < config.max_retries => {
                let delay = calculate_delay(config, attempt);

                warn!(
                    operation = %operation,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    "Gemini request failed, retrying: {}",
                    e
                );

                record_retry(operation);
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}

/// Calculate retry delay with exponential backoff and full jitter.
fn calculate_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp_delay = config
        .base_delay_ms
        .saturating_mul(2u64.saturating_pow(attempt));
    let capped_delay = exp_delay.min(config.max_delay_ms);

    // Full jitter: random value between 0 and capped_delay
    let jittered = if capped_delay > 0 {
        use std::time::SystemTime;
        let nanos = SystemTime::now()
            .duration_since(SystemTime::UNIX_EPOCH)
            .map(|d| d.subsec_nanos())
            .unwrap_or(0);
        let random_factor = (nanos % 1000) as f64 / 1000.0;
        ((capped_delay as f64) * random_factor) as u64
    } else {
        0
    };

    Duration::from_millis(jittered.max(config.base_delay_ms).min(config.max_delay_ms))
}
