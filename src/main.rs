//! whisper-relay CLI entry point

use std::process::ExitCode;

use clap::Parser;

use whisper_relay::cli::{
    app::{load_merged_config, run_server, run_transcribe, EXIT_ERROR},
    args::{Cli, Commands},
    config_cmd::handle_config_command,
    logging::init_logging,
    presenter::Presenter,
};
use whisper_relay::domain::config::AppConfig;
use whisper_relay::infrastructure::XdgConfigStore;

#[tokio::main(flavor = "multi_thread", worker_threads = 2)]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let presenter = Presenter::new();
    let cli_config = cli.to_config();

    match cli.command {
        Some(Commands::Config { action }) => {
            let store = XdgConfigStore::new();
            if let Err(e) = handle_config_command(action, &store, &presenter).await {
                presenter.error(&e.to_string());
                return ExitCode::from(EXIT_ERROR);
            }
            ExitCode::SUCCESS
        }
        Some(Commands::Transcribe { files }) => {
            let config = prepare(cli_config, &presenter).await;
            run_transcribe(config, files).await
        }
        Some(Commands::Serve) | None => {
            let config = prepare(cli_config, &presenter).await;
            run_server(config).await
        }
    }
}

/// Merge config layers and start logging
async fn prepare(cli_config: AppConfig, presenter: &Presenter) -> AppConfig {
    let config = load_merged_config(cli_config, presenter).await;
    init_logging(config.log_level_or_default(), config.log_format_or_default());
    config
}
