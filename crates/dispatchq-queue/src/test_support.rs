//! Fixtures shared by the unit tests.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::Notify;
use uuid::Uuid;

use crate::config::{EngineConfig, PriorityOrder};
use crate::engine::QueueEngine;
use crate::error::QueueError;
use crate::item::{ItemDraft, ItemStatus, QueueItem};
use crate::queue::{Queue, QueueStatus};
use crate::retry::RetryPolicy;
use crate::stats::QueueStats;
use crate::store::{QueueStore, SqliteQueueStore};
use crate::ticket::{MemoryTicketSource, Ticket, TicketTask};
use crate::timeline::{NewEvent, TimelineEvent};

pub const PROJECT: &str = "proj-1";

/// Engine over an in-memory store with a memory ticket source.
pub struct TestEngine {
    pub engine: QueueEngine,
    pub store: Arc<SqliteQueueStore>,
    pub tickets: Arc<MemoryTicketSource>,
}

impl TestEngine {
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: EngineConfig) -> Self {
        let store = Arc::new(SqliteQueueStore::in_memory().await.unwrap());
        let tickets = Arc::new(MemoryTicketSource::new());
        tickets.add_project(PROJECT).await;
        let engine = QueueEngine::new(store.clone(), tickets.clone(), config);
        Self {
            engine,
            store,
            tickets,
        }
    }

    pub async fn queue(&self, name: &str) -> Queue {
        self.engine.create_queue(PROJECT, name, None).await.unwrap()
    }

    /// Ticket 42: t1-t3 pending, t4 done.
    pub async fn ticket_42(&self) -> Ticket {
        let ticket = Ticket::new("42", PROJECT, "Add login flow").with_tasks(vec![
            TicketTask::new("t1", "add route", 0),
            TicketTask::new("t2", "write handler", 1),
            TicketTask::new("t3", "add tests", 2),
            TicketTask::new("t4", "spike", 3).done(),
        ]);
        self.tickets.put_ticket(ticket.clone()).await;
        ticket
    }
}

/// Default settings without the stats cache or retry delays.
pub fn test_config() -> EngineConfig {
    EngineConfig {
        stats_cache_ttl: Duration::ZERO,
        retry: RetryPolicy::none(),
        ..EngineConfig::default()
    }
}

/// A one-shot pause point inside a store call.
///
/// Once armed, the next call that passes the gate signals `reached` and
/// waits for `release`.
#[derive(Default)]
pub struct Gate {
    armed: AtomicBool,
    reached: Notify,
    release: Notify,
}

impl Gate {
    pub fn arm(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    pub async fn reached(&self) {
        self.reached.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }

    async fn pass(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.reached.notify_one();
            self.release.notified().await;
        }
    }
}

/// SQLite store whose reads can be held open after they complete.
pub struct GatedStore {
    inner: SqliteQueueStore,
    pub get_queue: Gate,
    pub get_item: Gate,
    pub count: Gate,
}

#[async_trait]
impl QueueStore for GatedStore {
    async fn insert_queue(&self, queue: &Queue) -> Result<(), QueueError> {
        self.inner.insert_queue(queue).await
    }

    async fn get_queue(&self, queue_id: Uuid) -> Result<Option<Queue>, QueueError> {
        let queue = self.inner.get_queue(queue_id).await?;
        self.get_queue.pass().await;
        Ok(queue)
    }

    async fn list_queues(
        &self,
        project_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Queue>, QueueError> {
        self.inner.list_queues(project_id, status).await
    }

    async fn save_queue(&self, queue: &Queue) -> Result<bool, QueueError> {
        self.inner.save_queue(queue).await
    }

    async fn set_queue_status(
        &self,
        queue_id: Uuid,
        status: QueueStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Queue>, QueueError> {
        self.inner.set_queue_status(queue_id, status, now).await
    }

    async fn delete_queue(&self, queue_id: Uuid) -> Result<Option<u64>, QueueError> {
        self.inner.delete_queue(queue_id).await
    }

    async fn insert_items(
        &self,
        queue_id: Uuid,
        drafts: Vec<ItemDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        self.inner.insert_items(queue_id, drafts, now).await
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<QueueItem>, QueueError> {
        let item = self.inner.get_item(item_id).await?;
        self.get_item.pass().await;
        Ok(item)
    }

    async fn list_items(
        &self,
        queue_id: Uuid,
        status: Option<ItemStatus>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        self.inner.list_items(queue_id, status).await
    }

    async fn claim_next(
        &self,
        queue_id: Uuid,
        agent_id: &str,
        order: PriorityOrder,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>, QueueError> {
        self.inner.claim_next(queue_id, agent_id, order, now).await
    }

    async fn update_item_if(
        &self,
        previous: &QueueItem,
        updated: &QueueItem,
        event: Option<NewEvent>,
    ) -> Result<Option<QueueItem>, QueueError> {
        self.inner.update_item_if(previous, updated, event).await
    }

    async fn delete_item(&self, item_id: Uuid, expected: ItemStatus) -> Result<bool, QueueError> {
        self.inner.delete_item(item_id, expected).await
    }

    async fn clear_queue(&self, queue_id: Uuid) -> Result<u64, QueueError> {
        self.inner.clear_queue(queue_id).await
    }

    async fn reorder_items(
        &self,
        queue_id: Uuid,
        ordered: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        self.inner.reorder_items(queue_id, ordered, now).await
    }

    async fn move_items(
        &self,
        item_ids: Vec<Uuid>,
        target: Uuid,
        positions: Option<Vec<i64>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, QueueError> {
        self.inner.move_items(item_ids, target, positions, now).await
    }

    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        self.inner.reclaim_expired(cutoff, max_attempts, now).await
    }

    async fn count_by_status(&self, queue_id: Uuid) -> Result<QueueStats, QueueError> {
        let stats = self.inner.count_by_status(queue_id).await?;
        self.count.pass().await;
        Ok(stats)
    }

    async fn represented_task_ids(
        &self,
        project_id: &str,
        live_only: bool,
    ) -> Result<HashSet<String>, QueueError> {
        self.inner.represented_task_ids(project_id, live_only).await
    }

    async fn timeline(
        &self,
        queue_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<TimelineEvent>, QueueError> {
        self.inner.timeline(queue_id, limit).await
    }
}

/// Engine over a [`GatedStore`], shareable with spawned tasks.
pub struct GatedEngine {
    pub engine: Arc<QueueEngine>,
    pub store: Arc<GatedStore>,
}

impl GatedEngine {
    /// Stats are cached for a minute so stale entries would show.
    pub async fn new() -> Self {
        let store = Arc::new(GatedStore {
            inner: SqliteQueueStore::in_memory().await.unwrap(),
            get_queue: Gate::default(),
            get_item: Gate::default(),
            count: Gate::default(),
        });
        let tickets = Arc::new(MemoryTicketSource::new());
        tickets.add_project(PROJECT).await;
        let config = EngineConfig {
            stats_cache_ttl: Duration::from_secs(60),
            ..test_config()
        };
        let engine = Arc::new(QueueEngine::new(store.clone(), tickets, config));
        Self { engine, store }
    }

    pub async fn queue(&self, name: &str) -> Queue {
        self.engine.create_queue(PROJECT, name, None).await.unwrap()
    }
}
