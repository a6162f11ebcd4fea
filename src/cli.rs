//! CLI definitions for dispatchq.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// dispatchq CLI.
#[derive(Parser)]
#[command(name = "dispatchq")]
#[command(about = "Priority task queue and dispatcher for coding agents")]
#[command(version)]
pub(crate) struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config/dispatchq.toml", global = true, env = "DISPATCHQ_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub(crate) enum Commands {
    /// Run the API server and reaper in foreground (default)
    Run {
        /// Server host (overrides config)
        #[arg(long)]
        host: Option<String>,

        /// Server port (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },

    /// Validate the configuration file and print findings
    CheckConfig,

    /// Reclaim stale claims once and exit
    Reap,
}
