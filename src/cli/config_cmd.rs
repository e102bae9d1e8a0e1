//! Config command handler

use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::application::ports::ConfigStore;
use crate::domain::config::{AppConfig, LogFormat, RetryPolicyConfig};
use crate::domain::error::ConfigError;

use super::args::{all_config_keys, is_valid_config_key, parse_retry_key, ConfigAction, VALID_CONFIG_KEYS};
use super::presenter::Presenter;

const NOT_SET: &str = "(not set)";

/// Handle config subcommand
pub async fn handle_config_command<S: ConfigStore>(
    action: ConfigAction,
    store: &S,
    presenter: &Presenter,
) -> Result<(), ConfigError> {
    match action {
        ConfigAction::Init => handle_init(store, presenter).await,
        ConfigAction::Set { key, value } => handle_set(store, presenter, &key, &value).await,
        ConfigAction::Get { key } => handle_get(store, presenter, &key).await,
        ConfigAction::List => handle_list(store, presenter).await,
        ConfigAction::Path => handle_path(store, presenter),
    }
}

async fn handle_init<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    store.init().await?;
    presenter.success(&format!(
        "Config file created at: {}",
        store.path().display()
    ));
    Ok(())
}

async fn handle_set<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
    value: &str,
) -> Result<(), ConfigError> {
    ensure_valid_key(key)?;

    let mut config = store.load().await?;
    set_value(&mut config, key, value)?;
    store.save(&config).await?;

    let shown = if key == "api_key" {
        mask_api_key(value)
    } else {
        value.to_string()
    };
    presenter.success(&format!("{} = {}", key, shown));

    Ok(())
}

async fn handle_get<S: ConfigStore>(
    store: &S,
    presenter: &Presenter,
    key: &str,
) -> Result<(), ConfigError> {
    ensure_valid_key(key)?;

    let config = store.load().await?;
    match get_value(&config, key) {
        Some(v) => presenter.output(&v),
        None => presenter.output(NOT_SET),
    }

    Ok(())
}

async fn handle_list<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    let config = store.load().await?;

    for key in all_config_keys() {
        let value = get_value(&config, &key).unwrap_or_else(|| NOT_SET.to_string());
        presenter.key_value(&key, &value);
    }

    Ok(())
}

fn handle_path<S: ConfigStore>(store: &S, presenter: &Presenter) -> Result<(), ConfigError> {
    presenter.output(&store.path().to_string_lossy());
    Ok(())
}

fn ensure_valid_key(key: &str) -> Result<(), ConfigError> {
    if is_valid_config_key(key) {
        return Ok(());
    }
    Err(ConfigError::ValidationError {
        key: key.to_string(),
        message: format!(
            "Unknown key. Valid keys: {}, retry.<class>.<field>",
            VALID_CONFIG_KEYS.join(", ")
        ),
    })
}

/// Validate `value` for `key` and store it in `config`
fn set_value(config: &mut AppConfig, key: &str, value: &str) -> Result<(), ConfigError> {
    match key {
        "api_key" => config.api_key = Some(value.to_string()),
        "endpoint" => {
            if !(value.starts_with("http://") || value.starts_with("https://")) {
                return Err(invalid(key, "Value must be an http:// or https:// URL"));
            }
            config.endpoint = Some(value.to_string());
        }
        "model" => {
            if value.trim().is_empty() {
                return Err(invalid(key, "Value must not be empty"));
            }
            config.model = Some(value.to_string());
        }
        "listen" => {
            value
                .parse::<SocketAddr>()
                .map_err(|e| invalid(key, &format!("Invalid address '{}': {}", value, e)))?;
            config.listen = Some(value.to_string());
        }
        "pacing_ms" => config.pacing_ms = Some(parse_number(key, value)?),
        "attempt_timeout_secs" => {
            let secs: u64 = parse_number(key, value)?;
            if secs == 0 {
                return Err(invalid(key, "Value must be greater than 0"));
            }
            config.attempt_timeout_secs = Some(secs);
        }
        "log_level" => {
            EnvFilter::try_new(value).map_err(|e| invalid(key, &e.to_string()))?;
            config.log_level = Some(value.to_string());
        }
        "log_format" => {
            value.parse::<LogFormat>().map_err(|e| invalid(key, &e))?;
            config.log_format = Some(value.to_ascii_lowercase());
        }
        _ => {
            let (class, field) = parse_retry_key(key)
                .ok_or_else(|| invalid(key, "Unknown key"))?;
            let section = config
                .retry
                .get_or_insert_with(Default::default)
                .section_mut(class);
            set_retry_field(section, key, field, value)?;
        }
    }
    Ok(())
}

fn set_retry_field(
    section: &mut RetryPolicyConfig,
    key: &str,
    field: &str,
    value: &str,
) -> Result<(), ConfigError> {
    match field {
        "max_attempts" => {
            let attempts: u32 = parse_number(key, value)?;
            if attempts == 0 {
                return Err(invalid(key, "Value must be at least 1"));
            }
            section.max_attempts = Some(attempts);
        }
        "base_delay_ms" => section.base_delay_ms = Some(parse_number(key, value)?),
        "max_delay_ms" => section.max_delay_ms = Some(parse_number(key, value)?),
        "jitter_ms" => section.jitter_ms = Some(parse_number(key, value)?),
        "honors_server_hint" => {
            section.honors_server_hint = Some(
                parse_bool(value).map_err(|_| invalid(key, "Value must be 'true' or 'false'"))?,
            )
        }
        _ => return Err(invalid(key, "Unknown retry field")),
    }
    Ok(())
}

/// Current value for `key`, with the API key masked
fn get_value(config: &AppConfig, key: &str) -> Option<String> {
    match key {
        "api_key" => config.api_key.as_deref().map(mask_api_key),
        "endpoint" => config.endpoint.clone(),
        "model" => config.model.clone(),
        "listen" => config.listen.clone(),
        "pacing_ms" => config.pacing_ms.map(|v| v.to_string()),
        "attempt_timeout_secs" => config.attempt_timeout_secs.map(|v| v.to_string()),
        "log_level" => config.log_level.clone(),
        "log_format" => config.log_format.clone(),
        _ => {
            let (class, field) = parse_retry_key(key)?;
            let section = config.retry.as_ref()?.section(class)?;
            match field {
                "max_attempts" => section.max_attempts.map(|v| v.to_string()),
                "base_delay_ms" => section.base_delay_ms.map(|v| v.to_string()),
                "max_delay_ms" => section.max_delay_ms.map(|v| v.to_string()),
                "jitter_ms" => section.jitter_ms.map(|v| v.to_string()),
                "honors_server_hint" => section.honors_server_hint.map(|v| v.to_string()),
                _ => None,
            }
        }
    }
}

fn invalid(key: &str, message: &str) -> ConfigError {
    ConfigError::ValidationError {
        key: key.to_string(),
        message: message.to_string(),
    }
}

fn parse_number<N: std::str::FromStr>(key: &str, value: &str) -> Result<N, ConfigError> {
    value
        .trim()
        .parse()
        .map_err(|_| invalid(key, &format!("Invalid number '{}'", value)))
}

/// Parse a boolean value
fn parse_bool(value: &str) -> Result<bool, ()> {
    match value.to_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(()),
    }
}

/// Mask API key for display (show first 4 and last 4 chars)
fn mask_api_key(key: &str) -> String {
    let chars: Vec<char> = key.chars().collect();
    if chars.len() <= 8 {
        "*".repeat(chars.len())
    } else {
        let head: String = chars[..4].iter().collect();
        let tail: String = chars[chars.len() - 4..].iter().collect();
        format!("{}...{}", head, tail)
    }
}
