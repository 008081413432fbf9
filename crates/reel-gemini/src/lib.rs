//! Gemini clients for storyboard analysis and Veo clip generation.
//!
//! This crate provides:
//! - Size-based upload: inline payloads or the resumable Files API protocol
//! - Structured storyboard analysis with model fallback
//! - Long-running video generation with bounded polling and download
//! - Retry, metrics and a classified error taxonomy shared by all of the above

pub mod analysis;
pub mod client;
pub mod config;
pub mod error;
pub mod generation;
pub mod metrics;
mod poll;
pub mod retry;
pub mod transfer;
pub mod upload;

pub use analysis::{parse_storyboard, response_schema, AnalysisClient, ANALYSIS_INSTRUCTION};
pub use client::GeminiClient;
pub use config::{GeminiConfig, PollPolicy};
pub use error::{GeminiError, GeminiResult, NetworkErrorKind};
pub use generation::{GeneratedVideo, GenerationClient, GenerationRequest, ReferenceImage};
pub use retry::{with_retry, RetryConfig};
pub use transfer::{TransferOrchestrator, TransferState};
pub use upload::{mime_type_for, Uploader, VideoPayload};
