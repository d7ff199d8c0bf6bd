//! pagechat - message router for a page-aware browser chat assistant
//!
//! Main entry point for the pagechat CLI and server.

mod cli;
mod server;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use pagechat_config::ConfigLoader;

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    server::init_tracing()?;

    let mut config = ConfigLoader::load_or_default(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config.display()))?;

    match cli.command {
        None => server::run_server(config).await,
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            server::run_server(config).await
        }
        Some(Commands::Check) => {
            server::validate(&config)?;
            info!("Configuration OK: {}", cli.config.display());
            Ok(())
        }
    }
}
