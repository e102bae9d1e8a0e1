//! Per-job attempt state and retry decisions

use std::time::Duration;

use rand::Rng;
use thiserror::Error;

use super::error_class::{classify, ErrorClass, UpstreamFailure};
use super::policy::RetryPolicies;
use crate::domain::transcription::Job;

/// Terminal outcome of a job that could not be transcribed.
/// Each variant names the failure class that ended the job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TerminalError {
    #[error("Transcription failed: rate limit exceeded after {attempts} attempts. Please wait a few minutes and try again.")]
    RateLimitExceeded { attempts: u32 },

    #[error("Transcription failed: network error after {attempts} attempts. Please check your internet connection and try again.")]
    NetworkError { attempts: u32 },

    #[error("Transcription failed: DNS resolution failed after {attempts} attempts. Unable to reach the transcription service; check your internet connection and DNS settings.")]
    DnsResolutionFailed { attempts: u32 },

    #[error("{message}")]
    Upstream { message: String },
}

impl TerminalError {
    /// Build the terminal error for a class after `attempts` tries
    pub fn for_class(class: ErrorClass, attempts: u32, failure: &UpstreamFailure) -> Self {
        match class {
            ErrorClass::RateLimited => Self::RateLimitExceeded { attempts },
            ErrorClass::TransientNetwork => Self::NetworkError { attempts },
            ErrorClass::DnsFailure => Self::DnsResolutionFailed { attempts },
            ErrorClass::Fatal => {
                let message = if failure.message.trim().is_empty() {
                    "Transcription failed due to an error.".to_string()
                } else {
                    failure.message.clone()
                };
                Self::Upstream { message }
            }
        }
    }

    /// The failure class that ended the job
    pub fn class(&self) -> ErrorClass {
        match self {
            Self::RateLimitExceeded { .. } => ErrorClass::RateLimited,
            Self::NetworkError { .. } => ErrorClass::TransientNetwork,
            Self::DnsResolutionFailed { .. } => ErrorClass::DnsFailure,
            Self::Upstream { .. } => ErrorClass::Fatal,
        }
    }
}

/// What to do after a failed attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Sleep for `delay`, then try again
    Retry { class: ErrorClass, delay: Duration },
    /// Stop; the job resolves with this error
    GiveUp(TerminalError),
}

/// Progress of one job through its attempts.
///
/// `attempt_number` counts attempts made so far, starting at 1 for the
/// attempt currently in flight.
#[derive(Debug)]
pub struct AttemptState<'a> {
    pub job: &'a Job,
    pub attempt_number: u32,
    pub last_error: Option<ErrorClass>,
}

impl<'a> AttemptState<'a> {
    /// State for the first attempt of a job
    pub fn new(job: &'a Job) -> Self {
        Self {
            job,
            attempt_number: 1,
            last_error: None,
        }
    }

    /// Retries performed before the attempt in flight
    pub fn retries_so_far(&self) -> u32 {
        self.attempt_number.saturating_sub(1)
    }

    /// Classify a failed attempt and decide whether to retry
    pub fn record_failure<R: Rng + ?Sized>(
        &mut self,
        failure: &UpstreamFailure,
        policies: &RetryPolicies,
        rng: &mut R,
    ) -> RetryDecision {
        let class = classify(failure);
        self.last_error = Some(class);

        let policy = policies.for_class(class);
        if !class.is_retryable() || self.attempt_number >= policy.max_attempts {
            return RetryDecision::GiveUp(TerminalError::for_class(
                class,
                self.attempt_number,
                failure,
            ));
        }

        let hint = match class {
            ErrorClass::RateLimited => failure.retry_after_secs(),
            _ => None,
        };
        let jitter = policy.sample_jitter(rng);
        let delay = policy.delay_with_jitter(self.retries_so_far(), hint, jitter);

        RetryDecision::Retry { class, delay }
    }

    /// Move on to the next attempt
    pub fn advance(&mut self) {
        self.attempt_number += 1;
    }
}
