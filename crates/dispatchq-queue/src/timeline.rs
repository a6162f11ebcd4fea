//! Item lifecycle history.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::QueueError;
use crate::retry::RetryPolicy;
use crate::store::QueueStore;

/// What happened to an item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    Enqueued,
    Claimed,
    Completed,
    Failed,
    Cancelled,
    /// Failed item put back in the queue.
    Requeued,
    /// Stale claim recovered by the reaper.
    Reclaimed,
    /// Item moved between queues.
    Moved,
}

impl EventKind {
    const ALL: [EventKind; 8] = [
        EventKind::Enqueued,
        EventKind::Claimed,
        EventKind::Completed,
        EventKind::Failed,
        EventKind::Cancelled,
        EventKind::Requeued,
        EventKind::Reclaimed,
        EventKind::Moved,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::Enqueued => "enqueued",
            EventKind::Claimed => "claimed",
            EventKind::Completed => "completed",
            EventKind::Failed => "failed",
            EventKind::Cancelled => "cancelled",
            EventKind::Requeued => "requeued",
            EventKind::Reclaimed => "reclaimed",
            EventKind::Moved => "moved",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventKind {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| QueueError::validation(format!("unknown event kind '{s}'")))
    }
}

/// A recorded lifecycle event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// Store-assigned sequence; strictly increasing.
    pub seq: i64,
    pub item_id: Uuid,
    /// Queue the item was in when the event happened.
    pub queue_id: Uuid,
    pub kind: EventKind,
    pub agent_id: Option<String>,
    pub message: Option<String>,
    pub at: DateTime<Utc>,
}

/// Event to append alongside an item mutation.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub agent_id: Option<String>,
    pub message: Option<String>,
}

impl NewEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            agent_id: None,
            message: None,
        }
    }

    pub fn agent(mut self, agent_id: Option<String>) -> Self {
        self.agent_id = agent_id;
        self
    }

    pub fn message(mut self, message: Option<String>) -> Self {
        self.message = message;
        self
    }
}

/// Read-only access to queue history.
pub struct TimelineService {
    store: Arc<dyn QueueStore>,
    retry: RetryPolicy,
}

impl TimelineService {
    pub fn new(store: Arc<dyn QueueStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Events for the items currently in `queue_id`, oldest first.
    ///
    /// With a `limit`, the most recent `limit` events are returned (still oldest first).
    pub async fn queue_timeline(
        &self,
        queue_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<TimelineEvent>, QueueError> {
        let store = self.store.as_ref();
        if store.get_queue(queue_id).await?.is_none() {
            return Err(QueueError::QueueNotFound(queue_id));
        }

        self.retry
            .run("queue_timeline", move || store.timeline(queue_id, limit))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemPatch, ItemStatus, NewItem};
    use crate::test_support::TestEngine;

    #[test]
    fn test_event_kind_strings() {
        for kind in EventKind::ALL {
            assert_eq!(kind.as_str().parse::<EventKind>().unwrap(), kind);
        }
        assert!("exploded".parse::<EventKind>().is_err());
    }

    #[tokio::test]
    async fn test_timeline_records_lifecycle_in_order() {
        let t = TestEngine::new().await;
        let queue = t.queue("timeline").await;
        let item = t.engine.enqueue_item(queue.id, NewItem::adhoc("task")).await.unwrap();

        t.engine.get_next_task(queue.id, "agent-1").await.unwrap().unwrap();
        t.engine
            .update_queue_item(item.id, ItemPatch::status(ItemStatus::Failed).with_error("boom"))
            .await
            .unwrap();
        t.engine
            .update_queue_item(item.id, ItemPatch::status(ItemStatus::Queued))
            .await
            .unwrap();

        let events = t.engine.get_queue_timeline(queue.id, None).await.unwrap();
        let kinds: Vec<EventKind> = events.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![EventKind::Enqueued, EventKind::Claimed, EventKind::Failed, EventKind::Requeued]
        );
        assert_eq!(events[1].agent_id.as_deref(), Some("agent-1"));
        assert_eq!(events[2].message.as_deref(), Some("boom"));
        assert!(events.windows(2).all(|w| w[0].seq < w[1].seq));
    }

    #[tokio::test]
    async fn test_timeline_limit_keeps_latest() {
        let t = TestEngine::new().await;
        let queue = t.queue("limited").await;
        for i in 0..5 {
            t.engine.enqueue_item(queue.id, NewItem::adhoc(format!("t{i}"))).await.unwrap();
        }
        t.engine.get_next_task(queue.id, "agent-1").await.unwrap();

        let events = t.engine.get_queue_timeline(queue.id, Some(2)).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[1].kind, EventKind::Claimed);
    }

    #[tokio::test]
    async fn test_timeline_unknown_queue() {
        let t = TestEngine::new().await;
        let result = t.engine.get_queue_timeline(Uuid::new_v4(), None).await;
        assert!(matches!(result, Err(QueueError::QueueNotFound(_))));
    }
}
