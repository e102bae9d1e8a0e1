//! Application layer - Use cases and port interfaces
//!
//! Contains the request queue, the retry orchestrator, and trait
//! definitions for external system interactions.

pub mod orchestrator;
pub mod ports;
pub mod queue;

// Re-export use cases
pub use orchestrator::{RetryOrchestrator, NO_TEXT_PLACEHOLDER};
pub use queue::{JobError, JobHandle, RequestQueue};
