//! Domain layer - Core business logic
//!
//! Contains value objects, entities, the retry state machine and domain errors.
//! This layer has no dependencies on external systems.

pub mod config;
pub mod error;
pub mod retry;
pub mod transcription;

// Re-export common types
pub use config::AppConfig;
pub use error::*;
pub use retry::{classify, AttemptState, ErrorClass, RetryPolicies, RetryPolicy, TerminalError, UpstreamFailure};
pub use transcription::{AudioData, AudioMimeType, Job, JobId};
