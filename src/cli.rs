//! CLI definitions for pagechat.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// pagechat CLI.
#[derive(Parser)]
#[command(name = "pagechat")]
#[command(about = "Message router for a page-aware browser chat assistant")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/default.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the bridge server in foreground (default)
    Run {
        /// Bind host, overrides [server].host
        #[arg(long)]
        host: Option<String>,

        /// Bind port, overrides [server].port
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration file and exit
    Check,
}
