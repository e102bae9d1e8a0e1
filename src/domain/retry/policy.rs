//! Per-class retry policies and backoff computation

use std::time::Duration;

use rand::Rng;

use super::error_class::ErrorClass;

/// Retry limits and backoff shape for one error class
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts allowed, counting the first one
    pub max_attempts: u32,
    /// Delay before the first retry; doubles on each further retry
    pub base_delay_ms: u64,
    /// Ceiling for any computed delay, jitter included
    pub max_delay_ms: u64,
    /// Upper bound (exclusive) of the random jitter added to each delay
    pub jitter_ms: u64,
    /// Whether a server `Retry-After` hint replaces the exponential base
    pub honors_server_hint: bool,
}

impl RetryPolicy {
    /// Policy that never retries
    pub const fn never() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 0,
            max_delay_ms: 0,
            jitter_ms: 0,
            honors_server_hint: false,
        }
    }

    /// Exponential delay before the next attempt, clamped to the ceiling.
    /// `retries_so_far` is zero before the first retry.
    pub fn base_delay(&self, retries_so_far: u32, retry_after_secs: Option<u64>) -> u64 {
        let raw = match retry_after_secs.filter(|_| self.honors_server_hint) {
            Some(secs) => secs.saturating_mul(1000),
            None => 2u64
                .checked_pow(retries_so_far)
                .and_then(|factor| self.base_delay_ms.checked_mul(factor))
                .unwrap_or(u64::MAX),
        };

        raw.min(self.max_delay_ms)
    }

    /// Full delay with a pre-drawn jitter sample. Jitter never pushes past the ceiling.
    pub fn delay_with_jitter(
        &self,
        retries_so_far: u32,
        retry_after_secs: Option<u64>,
        jitter_sample_ms: u64,
    ) -> Duration {
        let base = self.base_delay(retries_so_far, retry_after_secs);
        let total = base.saturating_add(jitter_sample_ms).min(self.max_delay_ms);
        Duration::from_millis(total)
    }

    /// Draw a jitter sample in `[0, jitter_ms)`
    pub fn sample_jitter<R: Rng + ?Sized>(&self, rng: &mut R) -> u64 {
        if self.jitter_ms == 0 {
            0
        } else {
            rng.gen_range(0..self.jitter_ms)
        }
    }
}

/// Fixed table of policies, one per [`ErrorClass`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicies {
    pub rate_limited: RetryPolicy,
    pub transient_network: RetryPolicy,
    pub dns_failure: RetryPolicy,
    pub fatal: RetryPolicy,
}

impl RetryPolicies {
    /// Look up the policy for a class
    pub fn for_class(&self, class: ErrorClass) -> &RetryPolicy {
        match class {
            ErrorClass::RateLimited => &self.rate_limited,
            ErrorClass::TransientNetwork => &self.transient_network,
            ErrorClass::DnsFailure => &self.dns_failure,
            ErrorClass::Fatal => &self.fatal,
        }
    }

    /// Mutable lookup, used while assembling the table from config
    pub fn for_class_mut(&mut self, class: ErrorClass) -> &mut RetryPolicy {
        match class {
            ErrorClass::RateLimited => &mut self.rate_limited,
            ErrorClass::TransientNetwork => &mut self.transient_network,
            ErrorClass::DnsFailure => &mut self.dns_failure,
            ErrorClass::Fatal => &mut self.fatal,
        }
    }
}

impl Default for RetryPolicies {
    fn default() -> Self {
        let network = RetryPolicy {
            max_attempts: 3,
            base_delay_ms: 2_000,
            max_delay_ms: 10_000,
            jitter_ms: 1_000,
            honors_server_hint: false,
        };

        Self {
            rate_limited: RetryPolicy {
                max_attempts: 10,
                base_delay_ms: 2_000,
                max_delay_ms: 300_000,
                jitter_ms: 1_000,
                honors_server_hint: true,
            },
            transient_network: network,
            dns_failure: network,
            fatal: RetryPolicy::never(),
        }
    }
}
