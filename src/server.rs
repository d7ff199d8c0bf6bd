//! Server initialization and startup logic for pagechat.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pagechat_channel_bridge::WebBridge;
use pagechat_config::{Config, ConfigValidator, FileSettingsStore};
use pagechat_provider_openai::OpenAIProvider;
use pagechat_router::{ChatParams, MessageRouter};

/// Get the .pagechat directory path.
pub(crate) fn pagechat_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".pagechat"))
        .unwrap_or_else(|| PathBuf::from(".pagechat"))
}

/// Initialize tracing with console and file output.
///
/// Log files are written to ~/.pagechat/logs/ with daily rotation.
pub(crate) fn init_tracing() -> anyhow::Result<()> {
    let log_dir = pagechat_dir().join("logs");
    std::fs::create_dir_all(&log_dir)
        .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("pagechat")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Keeps the file writer flushing for the life of the process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            fmt::layer()
                .with_target(true)
                .with_ansi(true)
        )
        .with(
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
        )
        .init();

    Ok(())
}

/// Validate `config`, logging warnings. Fails on the first batch of errors.
pub(crate) fn validate(config: &Config) -> anyhow::Result<()> {
    let result = ConfigValidator::validate(config)?;
    for warning in &result.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        let errors: Vec<String> = result
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.path, e.message))
            .collect();
        bail!("Invalid configuration: {}", errors.join("; "));
    }
    Ok(())
}

/// Run the bridge and router until Ctrl-C.
pub(crate) async fn run_server(config: Config) -> anyhow::Result<()> {
    validate(&config)?;
    info!("Starting pagechat v{}", env!("CARGO_PKG_VERSION"));

    let settings = Arc::new(FileSettingsStore::from_config_path(&config.settings.path));
    info!("Settings file: {}", settings.path().display());

    let completion = Arc::new(
        OpenAIProvider::with_url(config.openai.api_url.clone())
            .with_timeout(Duration::from_secs(config.openai.timeout_seconds)),
    );
    info!("Completion model: {}", config.openai.model);

    let bridge = WebBridge::new(config.bridge.clone());
    let router = MessageRouter::new(
        completion,
        settings,
        Arc::new(bridge.clone()),
        Arc::new(bridge.clone()),
        Arc::new(bridge.clone()),
    )
    .with_config(config.router.clone())
    .with_params(ChatParams::from(&config.openai));
    bridge.attach(Arc::new(router));

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let bound = bridge
        .start(&addr)
        .await
        .with_context(|| format!("Failed to start bridge on {}", addr))?;
    info!("pagechat ready on ws://{}/ws", bound);

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;
    info!("Shutting down");
    bridge.stop();

    Ok(())
}
