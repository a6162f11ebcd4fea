//! HTTP server for the queue engine.

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use dispatchq_config::ServerConfig;
use tokio::net::TcpListener;
use tracing::info;

use crate::error::ApiError;
use crate::http::routes::create_router;
use crate::state::AppState;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
}

impl ApiConfig {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self::from(&ServerConfig::default())
    }
}

impl From<&ServerConfig> for ApiConfig {
    fn from(config: &ServerConfig) -> Self {
        Self::new(config.host.clone(), config.port)
    }
}

/// The API server.
pub struct ApiServer {
    config: ApiConfig,
    state: Arc<AppState>,
}

impl ApiServer {
    pub fn new(config: ApiConfig, state: Arc<AppState>) -> Self {
        Self { config, state }
    }

    /// Get the server address.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.config.host, self.config.port)
    }

    /// Serve until `shutdown` resolves, then finish in-flight requests.
    pub async fn run<F>(&self, shutdown: F) -> Result<(), ApiError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = create_router(self.state.clone());

        let addr: SocketAddr = self
            .addr()
            .parse()
            .map_err(|e| ApiError::InvalidAddress(format!("{}: {}", self.addr(), e)))?;
        let listener = TcpListener::bind(addr).await?;

        info!("API server listening on {}", listener.local_addr()?);
        axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;
        info!("API server stopped");

        Ok(())
    }
}
