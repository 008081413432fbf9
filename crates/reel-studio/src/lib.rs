//! Storyboard sessions.
//!
//! This crate provides:
//! - The session that ties analysis, per-scene generation and merging together
//! - Async seams over the remote clients and the merge engine
//! - Studio configuration and structured session logging

pub mod config;
pub mod error;
pub mod logging;
pub mod session;

pub use config::StudioConfig;
pub use error::{StudioError, StudioResult};
pub use logging::SessionLogger;
pub use session::{
    ClipMerger, MergeStatus, Session, SessionPhase, VideoAnalyzer, VideoGenerator,
};
