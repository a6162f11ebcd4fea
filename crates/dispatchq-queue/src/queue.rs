//! Queue entity.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

/// Queue status. Only `active` queues hand out work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueStatus {
    Active,
    Paused,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Active => "active",
            QueueStatus::Paused => "paused",
        }
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "active" => Ok(QueueStatus::Active),
            "paused" => Ok(QueueStatus::Paused),
            other => Err(QueueError::validation(format!("unknown queue status '{other}'"))),
        }
    }
}

/// A named, project-scoped container of work items.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Queue {
    pub id: Uuid,
    pub project_id: String,
    pub name: String,
    pub description: Option<String>,
    pub status: QueueStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Queue {
    /// Create a new active queue.
    pub fn new(project_id: impl Into<String>, name: impl Into<String>, description: Option<String>) -> Self {
        let now = crate::store::now();
        Self {
            id: Uuid::new_v4(),
            project_id: project_id.into(),
            name: name.into(),
            description,
            status: QueueStatus::Active,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_paused(&self) -> bool {
        self.status == QueueStatus::Paused
    }
}

/// Editable queue fields. Status is changed through pause/resume.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueuePatch {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl QueuePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.description.is_none()
    }
}
