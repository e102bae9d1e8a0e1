//! CLI layer - Command-line interface
//!
//! Argument parsing, config commands, logging setup, the TCP relay server,
//! signal handling and the application runners.

pub mod app;
pub mod args;
pub mod config_cmd;
pub mod logging;
pub mod presenter;
pub mod server;
pub mod signals;

// Re-export commonly used types
pub use app::{run_server, run_transcribe, EXIT_ERROR, EXIT_SUCCESS, EXIT_USAGE_ERROR};
pub use args::{Cli, Commands, ConfigAction};
pub use presenter::Presenter;
pub use server::{RelayServer, Reply, ServerError};
