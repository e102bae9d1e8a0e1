//! CLI argument definitions using Clap

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use crate::domain::config::AppConfig;
use crate::domain::retry::ErrorClass;

/// whisper-relay - serialized audio transcription relay with retry handling
#[derive(Parser, Debug)]
#[command(name = "whisper-relay")]
#[command(version)]
#[command(about = "Relay audio to an OpenAI-compatible transcription API, one request at a time")]
#[command(long_about = None)]
pub struct Cli {
    /// Address to listen on (serve mode)
    #[arg(short = 'l', long, value_name = "ADDR", global = true)]
    pub listen: Option<String>,

    /// Transcription endpoint URL
    #[arg(long, value_name = "URL", global = true)]
    pub endpoint: Option<String>,

    /// Model identifier sent with each upload
    #[arg(short = 'm', long, value_name = "MODEL", global = true)]
    pub model: Option<String>,

    /// Pause between consecutive upstream calls, in milliseconds
    #[arg(long, value_name = "MS", global = true)]
    pub pacing_ms: Option<u64>,

    /// Per-attempt timeout, in seconds
    #[arg(long, value_name = "SECS", global = true)]
    pub timeout_secs: Option<u64>,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, value_name = "LEVEL", global = true)]
    pub log_level: Option<String>,

    /// Log output format
    #[arg(long, value_name = "FORMAT", global = true)]
    pub log_format: Option<LogFormatArg>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the relay server (default)
    Serve,
    /// Transcribe audio files through the queue and print the results
    Transcribe {
        /// Audio files, transcribed in the order given
        #[arg(required = true, value_name = "FILE")]
        files: Vec<PathBuf>,
    },
    /// Manage configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config action subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Create config file with defaults
    Init,
    /// Set a config value
    Set {
        /// Config key
        key: String,
        /// Config value
        value: String,
    },
    /// Get a config value
    Get {
        /// Config key
        key: String,
    },
    /// List all config values
    List,
    /// Show config file path
    Path,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Json,
}

impl Cli {
    /// Config layer built from flags; unset flags stay None
    pub fn to_config(&self) -> AppConfig {
        AppConfig {
            api_key: None, // API key comes from env/file only
            endpoint: self.endpoint.clone(),
            model: self.model.clone(),
            listen: self.listen.clone(),
            pacing_ms: self.pacing_ms,
            attempt_timeout_secs: self.timeout_secs,
            log_level: self.log_level.clone(),
            log_format: self.log_format.map(|f| match f {
                LogFormatArg::Pretty => "pretty".to_string(),
                LogFormatArg::Json => "json".to_string(),
            }),
            retry: None,
        }
    }
}

/// Valid top-level config keys
pub const VALID_CONFIG_KEYS: &[&str] = &[
    "api_key",
    "endpoint",
    "model",
    "listen",
    "pacing_ms",
    "attempt_timeout_secs",
    "log_level",
    "log_format",
];

/// Fields of a `retry.<class>` section
pub const RETRY_FIELDS: &[&str] = &[
    "max_attempts",
    "base_delay_ms",
    "max_delay_ms",
    "jitter_ms",
    "honors_server_hint",
];

/// Split `retry.<class>.<field>` into its class and field
pub fn parse_retry_key(key: &str) -> Option<(ErrorClass, &'static str)> {
    let rest = key.strip_prefix("retry.")?;
    let (class, field) = rest.split_once('.')?;
    let class = ErrorClass::ALL.into_iter().find(|c| c.as_str() == class)?;
    let field = RETRY_FIELDS.iter().copied().find(|f| *f == field)?;
    Some((class, field))
}

/// Every settable key, including the expanded retry keys
pub fn all_config_keys() -> Vec<String> {
    let mut keys: Vec<String> = VALID_CONFIG_KEYS.iter().map(|k| k.to_string()).collect();
    for class in ErrorClass::ALL {
        for field in RETRY_FIELDS {
            keys.push(format!("retry.{}.{}", class.as_str(), field));
        }
    }
    keys
}

/// Check if a config key is valid
pub fn is_valid_config_key(key: &str) -> bool {
    VALID_CONFIG_KEYS.contains(&key) || parse_retry_key(key).is_some()
}
