//! Domain error types

use thiserror::Error;

/// Error when a client payload cannot be turned into audio bytes
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PayloadError {
    #[error("No audio data received.")]
    Empty,

    #[error("Unsupported audio data format: {0}")]
    UnsupportedFormat(String),

    #[error("Audio data is not valid base64: {0}")]
    InvalidBase64(String),

    #[error("Audio payload nested deeper than {0} levels")]
    TooDeep(usize),
}

/// Error when configuration fails
#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(String),

    #[error("Failed to parse config file: {0}")]
    ParseError(String),

    #[error("Failed to write config file: {0}")]
    WriteError(String),

    #[error("Invalid config value for '{key}': {message}")]
    ValidationError { key: String, message: String },

    #[error("Config file already exists at: {0}")]
    AlreadyExists(String),
}
