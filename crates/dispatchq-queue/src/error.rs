//! Queue errors.

use thiserror::Error;
use uuid::Uuid;

/// Coarse error classes reported to callers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NotFound,
    Conflict,
    Validation,
    Storage,
}

/// Queue error types.
#[derive(Debug, Error)]
pub enum QueueError {
    /// Queue does not exist.
    #[error("Queue not found: {0}")]
    QueueNotFound(Uuid),

    /// Queue item does not exist.
    #[error("Queue item not found: {0}")]
    ItemNotFound(Uuid),

    /// Ticket is unknown to the ticket source.
    #[error("Ticket not found: {0}")]
    TicketNotFound(String),

    /// Project is unknown to the ticket source.
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    /// Illegal state transition, lost race, or operation against a claimed item.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Malformed request.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Backend failure.
    #[error("Storage error: {message}")]
    Storage { message: String, retryable: bool },
}

impl QueueError {
    pub fn conflict(message: impl Into<String>) -> Self {
        Self::Conflict(message.into())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            retryable: false,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueueNotFound(_)
            | Self::ItemNotFound(_)
            | Self::TicketNotFound(_)
            | Self::ProjectNotFound(_) => ErrorKind::NotFound,
            Self::Conflict(_) => ErrorKind::Conflict,
            Self::Validation(_) => ErrorKind::Validation,
            Self::Storage { .. } => ErrorKind::Storage,
        }
    }

    /// True for transient storage failures (busy or locked database).
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage { retryable: true, .. })
    }
}

impl From<rusqlite::Error> for QueueError {
    fn from(err: rusqlite::Error) -> Self {
        let retryable = matches!(
            &err,
            rusqlite::Error::SqliteFailure(e, _)
                if matches!(e.code, rusqlite::ErrorCode::DatabaseBusy | rusqlite::ErrorCode::DatabaseLocked)
        );
        Self::Storage {
            message: err.to_string(),
            retryable,
        }
    }
}

impl From<tokio_rusqlite::Error> for QueueError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        match err {
            tokio_rusqlite::Error::Rusqlite(e) => Self::from(e),
            // Domain errors raised inside a store transaction travel back boxed.
            tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<QueueError>() {
                Ok(domain) => *domain,
                Err(other) => Self::storage(other.to_string()),
            },
            other => Self::storage(other.to_string()),
        }
    }
}
