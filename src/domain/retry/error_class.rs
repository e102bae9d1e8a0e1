//! Upstream failure record and error classification

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error codes that indicate the upstream host name could not be resolved
const DNS_CODES: &[&str] = &["EAI_AGAIN", "ENOTFOUND"];

/// Message fragments that indicate address resolution failed
const DNS_MESSAGES: &[&str] = &["getaddrinfo", "dns error", "failed to lookup address"];

/// Error codes that indicate a dropped or stalled connection
const TRANSIENT_CODES: &[&str] = &["ECONNRESET", "ETIMEDOUT"];

/// Message fragments that indicate a dropped or stalled connection
const TRANSIENT_MESSAGES: &[&str] = &["ECONNRESET", "ETIMEDOUT", "connection reset", "timed out"];

/// Closed taxonomy of upstream failures. Each class has its own retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    RateLimited,
    TransientNetwork,
    DnsFailure,
    Fatal,
}

impl ErrorClass {
    pub const ALL: [ErrorClass; 4] = [
        Self::RateLimited,
        Self::TransientNetwork,
        Self::DnsFailure,
        Self::Fatal,
    ];

    /// Get the string representation
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::RateLimited => "rate_limited",
            Self::TransientNetwork => "transient_network",
            Self::DnsFailure => "dns_failure",
            Self::Fatal => "fatal",
        }
    }

    /// Whether failures of this class may be retried at all
    pub const fn is_retryable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }
}

impl fmt::Display for ErrorClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Normalized description of one failed upstream call.
///
/// Adapters translate their library-specific errors into this record so the
/// classifier never sees HTTP client types.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamFailure {
    /// HTTP status, if a response was received
    pub status: Option<u16>,
    /// Low-level error code such as `ECONNRESET` or `ENOTFOUND`
    pub code: Option<String>,
    /// Human-readable message, preferably the upstream's own
    pub message: String,
    /// Raw `Retry-After` header value
    pub retry_after: Option<String>,
}

impl UpstreamFailure {
    /// Failure with only a message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Failure carrying an HTTP status
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            status: Some(status),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Failure carrying a low-level error code
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
            ..Default::default()
        }
    }

    /// Failure produced when an attempt outlives its timeout
    pub fn timed_out(after: std::time::Duration) -> Self {
        Self::with_code(
            "ETIMEDOUT",
            format!("upstream call timed out after {:?}", after),
        )
    }

    /// Attach a `Retry-After` header value
    pub fn with_retry_after(mut self, value: impl Into<String>) -> Self {
        self.retry_after = Some(value.into());
        self
    }

    /// Retry-after hint in whole seconds.
    ///
    /// Accepts a leading integer (`"5"`, `"5.7"` → 5). HTTP-date values are ignored.
    pub fn retry_after_secs(&self) -> Option<u64> {
        let raw = self.retry_after.as_deref()?.trim();
        let digits: String = raw.chars().take_while(|c| c.is_ascii_digit()).collect();
        digits.parse().ok()
    }

    fn code_is(&self, codes: &[&str]) -> bool {
        self.code
            .as_deref()
            .is_some_and(|code| codes.iter().any(|c| code.eq_ignore_ascii_case(c)))
    }

    fn message_mentions(&self, fragments: &[&str]) -> bool {
        let message = self.message.to_ascii_lowercase();
        fragments
            .iter()
            .any(|f| message.contains(&f.to_ascii_lowercase()))
    }
}

impl fmt::Display for UpstreamFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.status, self.code.as_deref()) {
            (Some(status), _) => write!(f, "HTTP {}: {}", status, self.message),
            (None, Some(code)) => write!(f, "{}: {}", code, self.message),
            (None, None) => write!(f, "{}", self.message),
        }
    }
}

/// Classify an upstream failure. Checks run in priority order:
/// rate limit, DNS, transient network, then everything else is fatal.
pub fn classify(failure: &UpstreamFailure) -> ErrorClass {
    if failure.status == Some(429) {
        return ErrorClass::RateLimited;
    }

    if failure.code_is(DNS_CODES) || failure.message_mentions(DNS_MESSAGES) {
        return ErrorClass::DnsFailure;
    }

    if failure.code_is(TRANSIENT_CODES) || failure.message_mentions(TRANSIENT_MESSAGES) {
        return ErrorClass::TransientNetwork;
    }

    ErrorClass::Fatal
}
