//! Retry domain module

mod attempt;
mod error_class;
mod policy;

pub use attempt::{AttemptState, RetryDecision, TerminalError};
pub use error_class::{classify, ErrorClass, UpstreamFailure};
pub use policy::{RetryPolicies, RetryPolicy};
