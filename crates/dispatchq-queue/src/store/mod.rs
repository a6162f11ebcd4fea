//! Durable queue state.
//!
//! Every mutation that touches more than one row runs in a single
//! transaction, and every item mutation appends its timeline event in that
//! same transaction.

use std::collections::HashSet;

use async_trait::async_trait;
use chrono::{DateTime, SubsecRound, Utc};
use uuid::Uuid;

use crate::config::PriorityOrder;
use crate::error::QueueError;
use crate::item::{ItemDraft, ItemStatus, QueueItem};
use crate::queue::{Queue, QueueStatus};
use crate::stats::QueueStats;
use crate::timeline::{NewEvent, TimelineEvent};

mod rows;
mod schema;
mod sqlite;

pub use sqlite::{SqliteQueueStore, CLAIM_TIMED_OUT};

/// Current time at the precision the store keeps.
pub fn now() -> DateTime<Utc> {
    Utc::now().trunc_subsecs(6)
}

/// Storage backend for queues, items and their history.
#[async_trait]
pub trait QueueStore: Send + Sync {
    /// Insert a new queue. Duplicate names within a project are a conflict.
    async fn insert_queue(&self, queue: &Queue) -> Result<(), QueueError>;

    async fn get_queue(&self, queue_id: Uuid) -> Result<Option<Queue>, QueueError>;

    /// Queues of a project, oldest first.
    async fn list_queues(
        &self,
        project_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Queue>, QueueError>;

    /// Overwrite a queue's name and description. Returns false if it does not exist.
    async fn save_queue(&self, queue: &Queue) -> Result<bool, QueueError>;

    /// Set only the status of a queue. Returns `None` if it does not exist.
    async fn set_queue_status(
        &self,
        queue_id: Uuid,
        status: QueueStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Queue>, QueueError>;

    /// Delete a queue and its items. Returns the number of items removed,
    /// or `None` if the queue does not exist.
    async fn delete_queue(&self, queue_id: Uuid) -> Result<Option<u64>, QueueError>;

    /// Append items to the end of a queue, in order, atomically.
    async fn insert_items(
        &self,
        queue_id: Uuid,
        drafts: Vec<ItemDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, QueueError>;

    async fn get_item(&self, item_id: Uuid) -> Result<Option<QueueItem>, QueueError>;

    /// Items of a queue ordered by position.
    async fn list_items(
        &self,
        queue_id: Uuid,
        status: Option<ItemStatus>,
    ) -> Result<Vec<QueueItem>, QueueError>;

    /// Atomically select and claim the next queued item of an active queue.
    async fn claim_next(
        &self,
        queue_id: Uuid,
        agent_id: &str,
        order: PriorityOrder,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>, QueueError>;

    /// Write the state fields of `updated` if the stored item still has the
    /// status, owner and priority of `previous`. Returns the stored row, or
    /// `None` when another writer got there first.
    async fn update_item_if(
        &self,
        previous: &QueueItem,
        updated: &QueueItem,
        event: Option<NewEvent>,
    ) -> Result<Option<QueueItem>, QueueError>;

    /// Delete an item if it still has status `expected`.
    async fn delete_item(&self, item_id: Uuid, expected: ItemStatus) -> Result<bool, QueueError>;

    /// Delete every item of a queue. Returns the number removed.
    async fn clear_queue(&self, queue_id: Uuid) -> Result<u64, QueueError>;

    /// Renumber a queue: `ordered` first, then the rest in their current order.
    async fn reorder_items(
        &self,
        queue_id: Uuid,
        ordered: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError>;

    /// Move items into `target`, optionally at explicit positions.
    /// Returns the distinct source queues.
    async fn move_items(
        &self,
        item_ids: Vec<Uuid>,
        target: Uuid,
        positions: Option<Vec<i64>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, QueueError>;

    /// Requeue (or fail, once `max_attempts` is reached) items claimed before `cutoff`.
    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, QueueError>;

    async fn count_by_status(&self, queue_id: Uuid) -> Result<QueueStats, QueueError>;

    /// Ticket task ids with an item in any queue of the project.
    async fn represented_task_ids(
        &self,
        project_id: &str,
        live_only: bool,
    ) -> Result<HashSet<String>, QueueError>;

    /// Events of the items currently in a queue, oldest first.
    async fn timeline(
        &self,
        queue_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<TimelineEvent>, QueueError>;
}
