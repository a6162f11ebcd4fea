//! Tracing setup and the foreground server.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{error, info};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use dispatchq_api::{ApiConfig, ApiServer, AppState};
use dispatchq_config::{Config, ConfigLoader, LoggingConfig};
use dispatchq_queue::QueueEngine;

/// Initialize tracing with console and file output.
///
/// Log files rotate daily under the configured directory; 30 are kept.
pub(crate) fn init_tracing(logging: &LoggingConfig) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = ConfigLoader::expand_path(&logging.directory);
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(logging.file_prefix.as_str())
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // Flushes on drop, so it must live for the whole process.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Run the API server and the claim reaper until Ctrl-C.
pub(crate) async fn run_server(config: Config, api: ApiConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting dispatchq v{}", env!("CARGO_PKG_VERSION"));

    let engine = Arc::new(QueueEngine::from_config(&config).await?);

    let (cancel_tx, cancel_rx) = watch::channel(false);
    let reaper = if config.reaper.enabled {
        Some(engine.spawn_reaper(cancel_rx))
    } else {
        info!("Claim reaper disabled");
        None
    };

    let server = ApiServer::new(api, Arc::new(AppState::new(engine)));
    info!("dispatchq ready at http://{}", server.addr());

    let shutdown = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for Ctrl-C: {}", e);
        }
        info!("Shutdown requested");
    };
    let served = server.run(shutdown).await;

    let _ = cancel_tx.send(true);
    if let Some(handle) = reaper {
        if let Err(e) = handle.await {
            error!("Claim reaper task failed: {}", e);
        }
    }

    served?;
    info!("Shutting down...");
    Ok(())
}
