//! Structured session logging utilities.
//!
//! Provides consistent, structured logging for session operations with
//! tracing spans and contextual information.

use tracing::{error, info, warn, Span};
use uuid::Uuid;

/// Session logger for structured logging with consistent formatting.
///
/// Every event carries the session id and the operation being run.
#[derive(Debug, Clone)]
pub struct SessionLogger {
    session_id: String,
    operation: String,
}

impl SessionLogger {
    /// Create a logger for a new session.
    pub fn new(operation: &str) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            operation: operation.to_string(),
        }
    }

    /// Logger for another operation of the same session.
    pub fn for_operation(&self, operation: &str) -> Self {
        Self {
            session_id: self.session_id.clone(),
            operation: operation.to_string(),
        }
    }

    pub fn log_start(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Started: {}", message
        );
    }

    pub fn log_progress(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Progress: {}", message
        );
    }

    pub fn log_warning(&self, message: &str) {
        warn!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Warning: {}", message
        );
    }

    pub fn log_error(&self, message: &str) {
        error!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Failed: {}", message
        );
    }

    pub fn log_completion(&self, message: &str) {
        info!(
            session_id = %self.session_id,
            operation = %self.operation,
            "Completed: {}", message
        );
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Create a tracing span for this operation.
    pub fn create_span(&self) -> Span {
        tracing::info_span!(
            "session",
            session_id = %self.session_id,
            operation = %self.operation
        )
    }
}
