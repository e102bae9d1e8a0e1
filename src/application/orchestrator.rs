//! Retry orchestration for a single job
//!
//! Drives one job through `Attempting → {Success | Backoff → Attempting | TerminalFailure}`.
//! Each failed attempt is classified, looked up in the per-class policy table,
//! and either retried after a backoff sleep or turned into a terminal error.

use std::time::Duration;

use tracing::{debug, error, info, warn};

use crate::domain::config::DEFAULT_ATTEMPT_TIMEOUT_SECS;
use crate::domain::retry::{
    AttemptState, RetryDecision, RetryPolicies, TerminalError, UpstreamFailure,
};
use crate::domain::transcription::Job;

use super::ports::Transcriber;

/// Returned when the upstream answers without a text field
pub const NO_TEXT_PLACEHOLDER: &str = "No text found in response";

/// Runs transcription attempts for one job until success or a terminal failure
pub struct RetryOrchestrator<T: Transcriber> {
    transcriber: T,
    policies: RetryPolicies,
    attempt_timeout: Duration,
}

impl<T: Transcriber> RetryOrchestrator<T> {
    /// Create an orchestrator with the default per-attempt timeout
    pub fn new(transcriber: T, policies: RetryPolicies) -> Self {
        Self {
            transcriber,
            policies,
            attempt_timeout: Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS),
        }
    }

    /// Override the ceiling on a single upstream call
    pub fn with_attempt_timeout(mut self, attempt_timeout: Duration) -> Self {
        self.attempt_timeout = attempt_timeout;
        self
    }

    /// Transcribe a job, retrying per policy.
    pub async fn run(&self, job: &Job) -> Result<String, TerminalError> {
        let mut state = AttemptState::new(job);

        loop {
            debug!(
                job_id = %state.job.id(),
                attempt = state.attempt_number,
                size = %state.job.payload().human_readable_size(),
                "Calling transcription service"
            );

            let failure = match self.attempt(state.job).await {
                Ok(text) => {
                    info!(
                        job_id = %state.job.id(),
                        attempt = state.attempt_number,
                        "Transcription succeeded"
                    );
                    return Ok(text
                        .filter(|t| !t.is_empty())
                        .unwrap_or_else(|| NO_TEXT_PLACEHOLDER.to_string()));
                }
                Err(failure) => failure,
            };

            let decision = state.record_failure(&failure, &self.policies, &mut rand::thread_rng());

            match decision {
                RetryDecision::Retry { class, delay } => {
                    warn!(
                        job_id = %state.job.id(),
                        class = %class,
                        attempt = state.attempt_number,
                        max_attempts = self.policies.for_class(class).max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %failure,
                        "Upstream call failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    state.advance();
                }
                RetryDecision::GiveUp(terminal) => {
                    error!(
                        job_id = %state.job.id(),
                        class = %terminal.class(),
                        attempt = state.attempt_number,
                        status = ?failure.status,
                        code = ?failure.code,
                        error = %failure,
                        "Giving up on job"
                    );
                    return Err(terminal);
                }
            }
        }
    }

    /// One upstream call, bounded by the attempt timeout
    async fn attempt(&self, job: &Job) -> Result<Option<String>, UpstreamFailure> {
        let call = self.transcriber.transcribe(job.payload());
        match tokio::time::timeout(self.attempt_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(UpstreamFailure::timed_out(self.attempt_timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use tokio::time::Instant;

    use crate::domain::retry::{ErrorClass, RetryPolicy};
    use crate::domain::transcription::AudioData;

    /// Replays scripted outcomes and records when each call started
    struct ScriptedTranscriber {
        outcomes: Mutex<VecDeque<Result<Option<String>, UpstreamFailure>>>,
        calls: Mutex<Vec<Instant>>,
    }

    impl ScriptedTranscriber {
        fn new(outcomes: Vec<Result<Option<String>, UpstreamFailure>>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_times(&self) -> Vec<Instant> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transcriber for ScriptedTranscriber {
        async fn transcribe(&self, _audio: &AudioData) -> Result<Option<String>, UpstreamFailure> {
            self.calls.lock().unwrap().push(Instant::now());
            let next = self.outcomes.lock().unwrap().pop_front();
            next.unwrap_or_else(|| Err(UpstreamFailure::new("script exhausted")))
        }
    }

    /// Never answers, so every attempt hits the timeout
    struct HangingTranscriber {
        calls: Mutex<u32>,
    }

    #[async_trait]
    impl Transcriber for HangingTranscriber {
        async fn transcribe(&self, _audio: &AudioData) -> Result<Option<String>, UpstreamFailure> {
            *self.calls.lock().unwrap() += 1;
            std::future::pending().await
        }
    }

    fn no_jitter() -> RetryPolicies {
        let mut policies = RetryPolicies::default();
        for class in ErrorClass::ALL {
            policies.for_class_mut(class).jitter_ms = 0;
        }
        policies
    }

    fn gaps(times: &[Instant]) -> Vec<Duration> {
        times.windows(2).map(|w| w[1] - w[0]).collect()
    }

    /// Paused-clock timers fire on millisecond ticks
    fn assert_gaps(actual: &[Duration], expected_ms: &[u64]) {
        assert_eq!(actual.len(), expected_ms.len(), "gaps {:?}", actual);
        for (gap, ms) in actual.iter().zip(expected_ms) {
            let expected = Duration::from_millis(*ms);
            assert!(
                *gap >= expected && *gap <= expected + Duration::from_millis(2),
                "gap {:?}, expected {:?}",
                gap,
                expected
            );
        }
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let upstream = ScriptedTranscriber::new(vec![Ok(Some("hello".to_string()))]);
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), no_jitter());

        let text = orchestrator.run(&Job::new(vec![1])).await.unwrap();

        assert_eq!(text, "hello");
        assert_eq!(upstream.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn missing_text_yields_placeholder() {
        let upstream = ScriptedTranscriber::new(vec![Ok(None)]);
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), no_jitter());

        let text = orchestrator.run(&Job::new(vec![1])).await.unwrap();
        assert_eq!(text, NO_TEXT_PLACEHOLDER);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_makes_exactly_one_attempt() {
        let upstream = ScriptedTranscriber::new(vec![
            Err(UpstreamFailure::http(400, "Invalid file format.")),
            Ok(Some("never reached".to_string())),
        ]);
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), no_jitter());

        let err = orchestrator.run(&Job::new(vec![1])).await.unwrap_err();

        assert_eq!(
            err,
            TerminalError::Upstream {
                message: "Invalid file format.".to_string()
            }
        );
        assert_eq!(upstream.call_times().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn recovers_after_transient_failures() {
        let reset = || Err(UpstreamFailure::with_code("ECONNRESET", "socket hang up"));
        let upstream = ScriptedTranscriber::new(vec![reset(), reset(), Ok(Some("ok".to_string()))]);
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), no_jitter());

        let text = orchestrator.run(&Job::new(vec![1])).await.unwrap();

        assert_eq!(text, "ok");
        assert_gaps(&gaps(&upstream.call_times()), &[2_000, 4_000]);
    }

    #[tokio::test(start_paused = true)]
    async fn retry_after_sets_next_attempt() {
        let upstream = ScriptedTranscriber::new(vec![
            Err(UpstreamFailure::http(429, "Rate limit reached").with_retry_after("5")),
            Ok(Some("done".to_string())),
        ]);
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), RetryPolicies::default());

        orchestrator.run(&Job::new(vec![1])).await.unwrap();

        let gap = gaps(&upstream.call_times())[0];
        assert!(gap >= Duration::from_millis(5_000), "gap {:?}", gap);
        assert!(gap < Duration::from_millis(6_000), "gap {:?}", gap);
    }

    #[tokio::test(start_paused = true)]
    async fn timeouts_exhaust_network_policy() {
        let upstream = Arc::new(HangingTranscriber {
            calls: Mutex::new(0),
        });
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), no_jitter())
            .with_attempt_timeout(Duration::from_secs(60));

        let err = orchestrator.run(&Job::new(vec![1])).await.unwrap_err();

        assert_eq!(err, TerminalError::NetworkError { attempts: 3 });
        assert_eq!(err.class(), ErrorClass::TransientNetwork);
        assert!(err.to_string().contains("network error"));
        assert_eq!(*upstream.calls.lock().unwrap(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_exhaustion_honors_its_own_limit() {
        let mut policies = no_jitter();
        policies.rate_limited = RetryPolicy {
            max_attempts: 4,
            base_delay_ms: 100,
            max_delay_ms: 250,
            jitter_ms: 0,
            honors_server_hint: true,
        };
        let throttled = || Err(UpstreamFailure::http(429, "Too Many Requests"));
        let upstream = ScriptedTranscriber::new((0..10).map(|_| throttled()).collect());
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), policies);

        let err = orchestrator.run(&Job::new(vec![1])).await.unwrap_err();

        assert_eq!(err, TerminalError::RateLimitExceeded { attempts: 4 });
        assert_gaps(&gaps(&upstream.call_times()), &[100, 200, 250]);
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_never_exceeds_ceiling() {
        let mut policies = RetryPolicies::default();
        policies.transient_network.max_attempts = 8;
        let reset = || Err(UpstreamFailure::with_code("ECONNRESET", "reset"));
        let upstream = ScriptedTranscriber::new((0..8).map(|_| reset()).collect());
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), policies);

        orchestrator.run(&Job::new(vec![1])).await.unwrap_err();

        let ceiling = Duration::from_millis(policies.transient_network.max_delay_ms + 2);
        let jitter = Duration::from_millis(policies.transient_network.jitter_ms);
        let observed = gaps(&upstream.call_times());
        assert_eq!(observed.len(), 7);
        for pair in observed.windows(2) {
            assert!(pair[1] + jitter >= pair[0]);
        }
        for gap in observed {
            assert!(gap <= ceiling, "gap {:?} over ceiling", gap);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn class_change_uses_new_class_limits() {
        let upstream = ScriptedTranscriber::new(vec![
            Err(UpstreamFailure::http(429, "slow down")),
            Err(UpstreamFailure::with_code("ENOTFOUND", "getaddrinfo ENOTFOUND api.openai.com")),
            Err(UpstreamFailure::with_code("ENOTFOUND", "getaddrinfo ENOTFOUND api.openai.com")),
        ]);
        let orchestrator = RetryOrchestrator::new(Arc::clone(&upstream), no_jitter());

        let err = orchestrator.run(&Job::new(vec![1])).await.unwrap_err();

        assert_eq!(err, TerminalError::DnsResolutionFailed { attempts: 3 });
        assert_eq!(upstream.call_times().len(), 3);
    }
}
