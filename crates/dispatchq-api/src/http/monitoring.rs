//! Health check handlers.

use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Json};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::state::AppState;

/// Health status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    /// Service is healthy.
    Healthy,
    /// Service is unhealthy.
    Unhealthy,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub version: String,
    pub uptime_seconds: u64,
    pub components: Vec<ComponentHealth>,
}

/// Component health status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// GET /health
///
/// Runs a trivial read against the store; 503 if it fails.
pub async fn health_check(State(state): State<Arc<AppState>>) -> (StatusCode, Json<HealthResponse>) {
    let storage = match state.engine.list_queues("", None).await {
        Ok(_) => ComponentHealth {
            name: "storage".to_string(),
            status: HealthStatus::Healthy,
            message: None,
        },
        Err(e) => {
            warn!("Health check: storage unavailable: {}", e);
            ComponentHealth {
                name: "storage".to_string(),
                status: HealthStatus::Unhealthy,
                message: Some(e.to_string()),
            }
        }
    };

    let status = storage.status;
    let code = match status {
        HealthStatus::Healthy => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };
    (
        code,
        Json(HealthResponse {
            status,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.uptime().as_secs(),
            components: vec![storage],
        }),
    )
}

/// Liveness probe.
pub async fn liveness_probe() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "alive"
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_status_serialize() {
        assert_eq!(serde_json::to_string(&HealthStatus::Healthy).unwrap(), "\"healthy\"");
        assert_eq!(serde_json::to_string(&HealthStatus::Unhealthy).unwrap(), "\"unhealthy\"");
    }

    #[tokio::test]
    async fn test_liveness_probe() {
        let response = liveness_probe().await;
        assert_eq!(response.0["status"], "alive");
    }
}
