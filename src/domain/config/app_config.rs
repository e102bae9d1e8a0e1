//! Application configuration value object

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::domain::retry::{ErrorClass, RetryPolicies, RetryPolicy};

/// OpenAI transcription endpoint
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/audio/transcriptions";

/// Model identifier sent with every upload
pub const DEFAULT_MODEL: &str = "whisper-1";

/// Address the relay listens on
pub const DEFAULT_LISTEN: &str = "127.0.0.1:5000";

/// Pause between consecutive upstream calls
pub const DEFAULT_PACING_MS: u64 = 1_000;

/// Ceiling on a single upstream call
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 60;

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(format!(
                "Invalid log format \"{}\". Valid formats are: pretty, json",
                other
            )),
        }
    }
}

/// Partial override of one retry policy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicyConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub jitter_ms: Option<u64>,
    pub honors_server_hint: Option<bool>,
}

impl RetryPolicyConfig {
    fn from_policy(policy: &RetryPolicy) -> Self {
        Self {
            max_attempts: Some(policy.max_attempts),
            base_delay_ms: Some(policy.base_delay_ms),
            max_delay_ms: Some(policy.max_delay_ms),
            jitter_ms: Some(policy.jitter_ms),
            honors_server_hint: Some(policy.honors_server_hint),
        }
    }

    fn merge(self, other: Self) -> Self {
        Self {
            max_attempts: other.max_attempts.or(self.max_attempts),
            base_delay_ms: other.base_delay_ms.or(self.base_delay_ms),
            max_delay_ms: other.max_delay_ms.or(self.max_delay_ms),
            jitter_ms: other.jitter_ms.or(self.jitter_ms),
            honors_server_hint: other.honors_server_hint.or(self.honors_server_hint),
        }
    }

    /// Overlay the set fields onto a base policy
    fn apply_to(&self, base: RetryPolicy) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.max_attempts.unwrap_or(base.max_attempts).max(1),
            base_delay_ms: self.base_delay_ms.unwrap_or(base.base_delay_ms),
            max_delay_ms: self.max_delay_ms.unwrap_or(base.max_delay_ms),
            jitter_ms: self.jitter_ms.unwrap_or(base.jitter_ms),
            honors_server_hint: self.honors_server_hint.unwrap_or(base.honors_server_hint),
        }
    }
}

/// Retry policy overrides, one optional section per error class
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    pub rate_limited: Option<RetryPolicyConfig>,
    pub transient_network: Option<RetryPolicyConfig>,
    pub dns_failure: Option<RetryPolicyConfig>,
    pub fatal: Option<RetryPolicyConfig>,
}

impl RetryConfig {
    pub fn section(&self, class: ErrorClass) -> Option<&RetryPolicyConfig> {
        match class {
            ErrorClass::RateLimited => self.rate_limited.as_ref(),
            ErrorClass::TransientNetwork => self.transient_network.as_ref(),
            ErrorClass::DnsFailure => self.dns_failure.as_ref(),
            ErrorClass::Fatal => self.fatal.as_ref(),
        }
    }

    /// Section for a class, created empty if missing
    pub fn section_mut(&mut self, class: ErrorClass) -> &mut RetryPolicyConfig {
        let slot = match class {
            ErrorClass::RateLimited => &mut self.rate_limited,
            ErrorClass::TransientNetwork => &mut self.transient_network,
            ErrorClass::DnsFailure => &mut self.dns_failure,
            ErrorClass::Fatal => &mut self.fatal,
        };
        slot.get_or_insert_with(RetryPolicyConfig::default)
    }

    fn merge(self, other: Self) -> Self {
        fn pick(
            base: Option<RetryPolicyConfig>,
            other: Option<RetryPolicyConfig>,
        ) -> Option<RetryPolicyConfig> {
            match (base, other) {
                (None, None) => None,
                (Some(b), None) => Some(b),
                (None, Some(o)) => Some(o),
                (Some(b), Some(o)) => Some(b.merge(o)),
            }
        }

        Self {
            rate_limited: pick(self.rate_limited, other.rate_limited),
            transient_network: pick(self.transient_network, other.transient_network),
            dns_failure: pick(self.dns_failure, other.dns_failure),
            fatal: pick(self.fatal, other.fatal),
        }
    }
}

/// Application configuration.
/// All fields are optional to support partial configs and merging.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub api_key: Option<String>,
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub listen: Option<String>,
    pub pacing_ms: Option<u64>,
    pub attempt_timeout_secs: Option<u64>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub retry: Option<RetryConfig>,
}

impl AppConfig {
    /// Create config with default values
    pub fn defaults() -> Self {
        let policies = RetryPolicies::default();
        let mut retry = RetryConfig::default();
        for class in ErrorClass::ALL {
            *retry.section_mut(class) = RetryPolicyConfig::from_policy(policies.for_class(class));
        }

        Self {
            api_key: None,
            endpoint: Some(DEFAULT_ENDPOINT.to_string()),
            model: Some(DEFAULT_MODEL.to_string()),
            listen: Some(DEFAULT_LISTEN.to_string()),
            pacing_ms: Some(DEFAULT_PACING_MS),
            attempt_timeout_secs: Some(DEFAULT_ATTEMPT_TIMEOUT_SECS),
            log_level: Some(DEFAULT_LOG_LEVEL.to_string()),
            log_format: Some("pretty".to_string()),
            retry: Some(retry),
        }
    }

    /// Create an empty config (all None)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Merge this config with another, where other takes precedence.
    /// Only non-None values from other will override this.
    pub fn merge(self, other: Self) -> Self {
        Self {
            api_key: other.api_key.or(self.api_key),
            endpoint: other.endpoint.or(self.endpoint),
            model: other.model.or(self.model),
            listen: other.listen.or(self.listen),
            pacing_ms: other.pacing_ms.or(self.pacing_ms),
            attempt_timeout_secs: other.attempt_timeout_secs.or(self.attempt_timeout_secs),
            log_level: other.log_level.or(self.log_level),
            log_format: other.log_format.or(self.log_format),
            retry: match (self.retry, other.retry) {
                (Some(b), Some(o)) => Some(b.merge(o)),
                (b, o) => o.or(b),
            },
        }
    }

    pub fn endpoint_or_default(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    pub fn model_or_default(&self) -> &str {
        self.model.as_deref().unwrap_or(DEFAULT_MODEL)
    }

    pub fn listen_or_default(&self) -> &str {
        self.listen.as_deref().unwrap_or(DEFAULT_LISTEN)
    }

    pub fn pacing_or_default(&self) -> Duration {
        Duration::from_millis(self.pacing_ms.unwrap_or(DEFAULT_PACING_MS))
    }

    pub fn attempt_timeout_or_default(&self) -> Duration {
        Duration::from_secs(
            self.attempt_timeout_secs
                .filter(|secs| *secs > 0)
                .unwrap_or(DEFAULT_ATTEMPT_TIMEOUT_SECS),
        )
    }

    pub fn log_level_or_default(&self) -> &str {
        self.log_level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    /// Get log format, or pretty if not set/invalid
    pub fn log_format_or_default(&self) -> LogFormat {
        self.log_format
            .as_ref()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }

    /// Built-in policies with any configured overrides applied
    pub fn retry_policies(&self) -> RetryPolicies {
        let mut policies = RetryPolicies::default();
        if let Some(retry) = self.retry.as_ref() {
            for class in ErrorClass::ALL {
                if let Some(section) = retry.section(class) {
                    let policy = policies.for_class_mut(class);
                    *policy = section.apply_to(*policy);
                }
            }
        }
        policies
    }
}
