//! Queue item definition and status machine.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;

#[cfg(test)]
#[path = "item_tests.rs"]
mod tests;

/// Item status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    /// Waiting to be claimed.
    Queued,
    /// Claimed by an agent.
    InProgress,
    /// Finished successfully.
    Completed,
    /// Finished with an error (may be retried).
    Failed,
    /// Withdrawn by an operator.
    Cancelled,
}

impl ItemStatus {
    pub const ALL: [ItemStatus; 5] = [
        ItemStatus::Queued,
        ItemStatus::InProgress,
        ItemStatus::Completed,
        ItemStatus::Failed,
        ItemStatus::Cancelled,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Queued => "queued",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::Completed => "completed",
            ItemStatus::Failed => "failed",
            ItemStatus::Cancelled => "cancelled",
        }
    }

    /// Whether `self -> next` is a legal transition.
    ///
    /// queued -> in_progress | cancelled
    /// in_progress -> completed | failed | cancelled
    /// failed -> queued
    pub fn can_transition_to(&self, next: ItemStatus) -> bool {
        use ItemStatus::*;
        matches!(
            (self, next),
            (Queued, InProgress)
                | (Queued, Cancelled)
                | (InProgress, Completed)
                | (InProgress, Failed)
                | (InProgress, Cancelled)
                | (Failed, Queued)
        )
    }
}

impl fmt::Display for ItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ItemStatus {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ItemStatus::ALL
            .into_iter()
            .find(|status| status.as_str() == s)
            .ok_or_else(|| QueueError::validation(format!("unknown item status '{s}'")))
    }
}

/// Where an item came from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceType {
    /// One task of a ticket.
    TicketTask,
    /// Directly enqueued work.
    #[default]
    Adhoc,
}

impl SourceType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceType::TicketTask => "ticket-task",
            SourceType::Adhoc => "adhoc",
        }
    }
}

impl FromStr for SourceType {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "ticket-task" => Ok(SourceType::TicketTask),
            "adhoc" => Ok(SourceType::Adhoc),
            other => Err(QueueError::validation(format!("unknown source type '{other}'"))),
        }
    }
}

/// One unit of dispatchable work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueItem {
    pub id: Uuid,
    pub queue_id: Uuid,
    pub source_type: SourceType,
    /// Ticket task id for ticket-task items.
    pub source_ref_id: Option<String>,
    pub ticket_id: Option<String>,
    pub title: String,
    pub payload: serde_json::Value,
    pub status: ItemStatus,
    /// Dispatch ordering key.
    pub priority: i64,
    /// FIFO tie-break within the queue.
    pub position: i64,
    /// Owner while claimed.
    pub agent_id: Option<String>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
    pub retry_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueueItem {
    /// Whether `agent_id` currently holds the claim.
    pub fn is_claimed_by(&self, agent_id: &str) -> bool {
        self.status == ItemStatus::InProgress && self.agent_id.as_deref() == Some(agent_id)
    }
}

/// Request to enqueue an ad-hoc (or pre-resolved) item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewItem {
    pub title: String,
    #[serde(default)]
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub source_type: SourceType,
    #[serde(default)]
    pub source_ref_id: Option<String>,
    #[serde(default)]
    pub ticket_id: Option<String>,
}

impl NewItem {
    pub fn adhoc(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn with_priority(mut self, priority: i64) -> Self {
        self.priority = Some(priority);
        self
    }

    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

/// Fully resolved item ready for insertion. The store assigns id,
/// position and timestamps.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemDraft {
    pub source_type: SourceType,
    pub source_ref_id: Option<String>,
    pub ticket_id: Option<String>,
    pub title: String,
    pub payload: serde_json::Value,
    pub priority: i64,
}

/// Requested change to an item.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPatch {
    #[serde(default)]
    pub status: Option<ItemStatus>,
    #[serde(default)]
    pub priority: Option<i64>,
    #[serde(default)]
    pub error_message: Option<String>,
    /// Reporting agent; must match the claim holder when present.
    #[serde(default)]
    pub agent_id: Option<String>,
}

impl ItemPatch {
    pub fn status(status: ItemStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn by_agent(mut self, agent_id: impl Into<String>) -> Self {
        self.agent_id = Some(agent_id.into());
        self
    }

    pub fn with_error(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}

/// One entry of a batch update.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemUpdate {
    pub item_id: Uuid,
    #[serde(flatten)]
    pub patch: ItemPatch,
}
