//! API error types and their HTTP mapping.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dispatchq_queue::{ErrorKind, QueueError};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error};

/// API error types.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Queue engine error.
    #[error(transparent)]
    Queue(#[from] QueueError),

    /// Listen address could not be parsed.
    #[error("Invalid listen address: {0}")]
    InvalidAddress(String),

    /// Socket error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Error body returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

impl ApiError {
    /// HTTP status and machine-readable code.
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::Queue(e) => match e.kind() {
                ErrorKind::NotFound => (StatusCode::NOT_FOUND, "not_found"),
                ErrorKind::Conflict => (StatusCode::CONFLICT, "conflict"),
                ErrorKind::Validation => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
                ErrorKind::Storage if e.is_retryable() => (StatusCode::SERVICE_UNAVAILABLE, "storage_busy"),
                ErrorKind::Storage => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            },
            ApiError::InvalidAddress(_) | ApiError::Io(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "internal")
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code) = self.status();
        if status.is_server_error() {
            error!("Request failed: {}", self);
        } else {
            debug!("Request rejected ({}): {}", code, self);
        }
        (status, Json(ErrorResponse::new(self.to_string(), code))).into_response()
    }
}
