//! Tracing subscriber setup

use tracing_subscriber::EnvFilter;

use crate::domain::config::LogFormat;

/// Initialize the global subscriber.
///
/// `RUST_LOG` wins over `level`; an unparsable level falls back to `info`.
/// Logs go to stderr so stdout stays reserved for transcripts. Calling this
/// more than once is a no-op.
pub fn init_logging(level: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    let _ = match format {
        LogFormat::Json => builder.json().try_init(),
        LogFormat::Pretty => builder.compact().try_init(),
    };
}
