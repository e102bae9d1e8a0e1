//! Configuration domain module

mod app_config;

pub use app_config::{
    AppConfig, LogFormat, RetryConfig, RetryPolicyConfig, DEFAULT_ATTEMPT_TIMEOUT_SECS,
    DEFAULT_ENDPOINT, DEFAULT_LISTEN, DEFAULT_MODEL, DEFAULT_PACING_MS,
};
