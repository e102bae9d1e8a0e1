//! App runners for serve and transcribe modes

use std::env;
use std::path::PathBuf;
use std::process::ExitCode;

use tracing::info;

use crate::application::ports::ConfigStore;
use crate::application::{RequestQueue, RetryOrchestrator};
use crate::domain::config::AppConfig;
use crate::domain::transcription::{AudioData, AudioMimeType};
use crate::infrastructure::{OpenAiTranscriber, XdgConfigStore};

use super::presenter::{format_summary, Presenter};
use super::server::RelayServer;
use super::signals::ShutdownSignal;

/// Exit codes
pub const EXIT_SUCCESS: u8 = 0;
pub const EXIT_ERROR: u8 = 1;
pub const EXIT_USAGE_ERROR: u8 = 2;

/// Environment variable holding the upstream API key
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Environment variable overriding the upstream endpoint
pub const ENDPOINT_ENV: &str = "WHISPER_RELAY_ENDPOINT";

/// Run the relay server until SIGINT/SIGTERM
pub async fn run_server(config: AppConfig) -> ExitCode {
    let presenter = Presenter::new();

    let queue = match build_queue(&config) {
        Ok(queue) => queue,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let mut signals = match ShutdownSignal::install() {
        Ok(signals) => signals,
        Err(e) => {
            presenter.error(&format!("Failed to setup signal handler: {}", e));
            return ExitCode::from(EXIT_ERROR);
        }
    };

    let server = match RelayServer::bind(config.listen_or_default(), queue).await {
        Ok(server) => server,
        Err(e) => {
            presenter.error(&e.to_string());
            return ExitCode::from(EXIT_ERROR);
        }
    };

    if let Ok(addr) = server.local_addr() {
        presenter.info(&format!("Relay listening on {}", addr));
    }

    let shutdown = async move {
        let name = signals.recv().await;
        info!(signal = name, "Shutdown signal received");
    };

    match server.run_until(shutdown).await {
        Ok(()) => {
            presenter.success("Relay stopped");
            ExitCode::from(EXIT_SUCCESS)
        }
        Err(e) => {
            presenter.error(&e.to_string());
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Transcribe files through one queue and print results in input order
pub async fn run_transcribe(config: AppConfig, files: Vec<PathBuf>) -> ExitCode {
    let mut presenter = Presenter::new();

    let queue = match build_queue(&config) {
        Ok(queue) => queue,
        Err(e) => {
            presenter.error(&e);
            return ExitCode::from(EXIT_ERROR);
        }
    };

    // Enqueue everything up front so the queue paces the whole batch
    let mut pending = Vec::with_capacity(files.len());
    for path in files {
        match tokio::fs::read(&path).await {
            Ok(bytes) => {
                let audio = AudioData::new(bytes, AudioMimeType::from_path(&path));
                pending.push((path, Ok(queue.enqueue(audio))));
            }
            Err(e) => {
                let message = format!("Failed to read {}: {}", path.display(), e);
                pending.push((path, Err(message)));
            }
        }
    }

    let total = pending.len();
    let show_path = total > 1;
    let mut failed = 0;

    presenter.start_spinner(&format!("Transcribing (0/{})...", total));

    for (index, (path, slot)) in pending.into_iter().enumerate() {
        let outcome = match slot {
            Ok(handle) => handle.await.map_err(|e| e.to_string()),
            Err(message) => Err(message),
        };

        presenter.update_spinner(&format!("Transcribing ({}/{})...", index + 1, total));

        match outcome {
            Ok(text) => presenter.transcript(&path, &text, show_path),
            Err(message) => {
                failed += 1;
                presenter.error(&format!("{}: {}", path.display(), message));
            }
        }
    }

    presenter.stop_spinner();

    if failed == 0 {
        presenter.success(&format_summary(total, 0));
        ExitCode::from(EXIT_SUCCESS)
    } else {
        presenter.warn(&format_summary(total - failed, failed));
        ExitCode::from(EXIT_ERROR)
    }
}

/// Wire the OpenAI adapter, orchestrator and queue from config
pub fn build_queue(config: &AppConfig) -> Result<RequestQueue<OpenAiTranscriber>, String> {
    let api_key = require_api_key(config)?;

    let transcriber = OpenAiTranscriber::new(api_key)
        .with_endpoint(config.endpoint_or_default())
        .with_model(config.model_or_default());

    let orchestrator = RetryOrchestrator::new(transcriber, config.retry_policies())
        .with_attempt_timeout(config.attempt_timeout_or_default());

    info!(
        endpoint = config.endpoint_or_default(),
        model = config.model_or_default(),
        pacing_ms = config.pacing_or_default().as_millis() as u64,
        "Request queue ready"
    );

    Ok(RequestQueue::with_pacing(orchestrator, config.pacing_or_default()))
}

/// API key from the merged config (environment already applied)
pub fn require_api_key(config: &AppConfig) -> Result<String, String> {
    config
        .api_key
        .clone()
        .filter(|key| !key.trim().is_empty())
        .ok_or_else(|| {
            format!(
                "Missing API key. Set {} environment variable or run 'whisper-relay config set api_key <key>'",
                API_KEY_ENV
            )
        })
}

/// Load and merge configuration from file, env, and CLI
pub async fn load_merged_config(cli_config: AppConfig, presenter: &Presenter) -> AppConfig {
    let store = XdgConfigStore::new();
    let file_config = match store.load().await {
        Ok(config) => config,
        Err(e) => {
            presenter.warn(&format!("Ignoring config file: {}", e));
            AppConfig::empty()
        }
    };

    // Merge: defaults < file < env < cli
    AppConfig::defaults()
        .merge(file_config)
        .merge(env_config())
        .merge(cli_config)
}

fn env_config() -> AppConfig {
    AppConfig {
        api_key: env::var(API_KEY_ENV).ok().filter(|s| !s.is_empty()),
        endpoint: env::var(ENDPOINT_ENV).ok().filter(|s| !s.is_empty()),
        ..Default::default()
    }
}
