//! dispatchq - priority task queue and dispatcher for coding agents
//!
//! Main entry point for the CLI and server.

mod cli;
mod cmd_admin;
mod server;

use clap::Parser;
use tracing::{info, warn};

use dispatchq_api::ApiConfig;
use dispatchq_config::{ConfigLoader, ConfigValidator};

use crate::cli::{Cli, Commands};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let (mut config, from_file) = ConfigLoader::load_or_default(&cli.config)?;

    if let Some(Commands::CheckConfig) = cli.command {
        return cmd_admin::check_config(&cli.config, &config, from_file);
    }

    server::init_tracing(&config.logging)?;
    if from_file {
        info!("Loaded configuration from {}", cli.config.display());
    } else {
        warn!("{} not found, using defaults", cli.config.display());
    }
    for warning in ConfigValidator::ensure_valid(&config)? {
        warn!("Config {}: {}", warning.path, warning.message);
    }

    match cli.command {
        None => {
            let api = ApiConfig::from(&config.server);
            server::run_server(config, api).await
        }
        Some(Commands::Run { host, port }) => {
            if let Some(host) = host {
                config.server.host = host;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            let api = ApiConfig::from(&config.server);
            server::run_server(config, api).await
        }
        Some(Commands::Reap) => cmd_admin::reap_once(&config).await,
        Some(Commands::CheckConfig) => Ok(()),
    }
}
