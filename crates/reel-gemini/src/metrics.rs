//! Gemini client metrics.
//!
//! Provides standardized metrics for monitoring remote calls:
//! - Request counters by operation and status
//! - Latency histograms
//! - Poll and retry counters

use metrics::{counter, histogram};

/// Metric name constants for consistency.
pub mod names {
    /// Total requests by operation and status.
    pub const REQUESTS_TOTAL: &str = "gemini_requests_total";

    /// Request latency in seconds by operation.
    pub const LATENCY_SECONDS: &str = "gemini_latency_seconds";

    /// Status fetches made while polling, by operation.
    pub const POLL_ATTEMPTS_TOTAL: &str = "gemini_poll_attempts_total";

    /// Total retry attempts by operation.
    pub const RETRIES_TOTAL: &str = "gemini_retries_total";
}

/// Record metrics for a completed request.
///
/// `status` is 0 when no HTTP response was received.
pub fn record_request(operation: &str, status: u16, latency_ms: f64) {
    counter!(
        names::REQUESTS_TOTAL,
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    histogram!(
        names::LATENCY_SECONDS,
        "operation" => operation.to_string()
    )
    .record(latency_ms / 1000.0);
}

/// Record one status fetch of a polling loop.
pub fn record_poll(operation: &str) {
    counter!(
        names::POLL_ATTEMPTS_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

/// Record a retry attempt.
pub fn record_retry(operation: &str) {
    counter!(
        names::RETRIES_TOTAL,
        "operation" => operation.to_string()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metric_names() {
        assert!(names::REQUESTS_TOTAL.starts_with("gemini_"));
        assert!(names::POLL_ATTEMPTS_TOTAL.contains("poll"));
        assert!(names::LATENCY_SECONDS.contains("latency"));
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_request("generate_content", 200, 12.0);
        record_poll("file_status");
        record_retry("file_status");
    }
}
