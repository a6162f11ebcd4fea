//! Item status transitions, updates and deletion.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::QueueError;
use crate::item::{ItemPatch, ItemStatus, ItemUpdate, QueueItem};
use crate::store::{now, QueueStore};
use crate::timeline::{EventKind, NewEvent};

/// Enforces the item state machine.
pub struct ItemLifecycleManager {
    store: Arc<dyn QueueStore>,
    config: EngineConfig,
}

impl ItemLifecycleManager {
    pub fn new(store: Arc<dyn QueueStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    pub async fn get_item(&self, item_id: Uuid) -> Result<QueueItem, QueueError> {
        let store = self.store.as_ref();
        self.config
            .retry
            .run("get_item", move || store.get_item(item_id))
            .await?
            .ok_or(QueueError::ItemNotFound(item_id))
    }

    /// Items of a queue in position order, optionally filtered by status.
    pub async fn list_items(
        &self,
        queue_id: Uuid,
        status: Option<ItemStatus>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let store = self.store.as_ref();
        if store.get_queue(queue_id).await?.is_none() {
            return Err(QueueError::QueueNotFound(queue_id));
        }
        self.config
            .retry
            .run("list_items", move || store.list_items(queue_id, status))
            .await
    }

    /// Apply a patch to an item.
    ///
    /// The write only lands if nobody changed the item's status, owner or
    /// priority since it was read; otherwise the update fails with
    /// `Conflict`. The returned item is the row as stored, so it reflects
    /// the queue the item is in now.
    pub async fn update_item(&self, item_id: Uuid, patch: ItemPatch) -> Result<QueueItem, QueueError> {
        let current = self.get_item(item_id).await?;
        let (updated, event) = plan_update(&current, &patch, &self.config, now())?;

        let store = self.store.as_ref();
        let (previous, next, event) = (&current, &updated, &event);
        let stored = self
            .config
            .retry
            .run("update_item", move || {
                store.update_item_if(previous, next, event.clone())
            })
            .await?;
        let Some(stored) = stored else {
            warn!("Item {} changed while being updated", item_id);
            return Err(QueueError::conflict(format!(
                "item {item_id} was modified concurrently"
            )));
        };

        if current.status != stored.status {
            info!(
                "Item {} in queue {}: {} -> {}",
                item_id, stored.queue_id, current.status, stored.status
            );
        }
        Ok(stored)
    }

    /// Apply each update independently; one failure does not stop the rest.
    pub async fn batch_update(&self, updates: Vec<ItemUpdate>) -> Vec<Result<QueueItem, QueueError>> {
        let mut results = Vec::with_capacity(updates.len());
        for update in updates {
            results.push(self.update_item(update.item_id, update.patch).await);
        }
        results
    }

    /// Delete an item. Claimed items need `force`.
    ///
    /// Returns the item as it was before deletion.
    pub async fn delete_item(&self, item_id: Uuid, force: bool) -> Result<QueueItem, QueueError> {
        let item = self.get_item(item_id).await?;
        if item.status == ItemStatus::InProgress && !force {
            return Err(QueueError::conflict(format!(
                "item {item_id} is in_progress; pass force to delete it"
            )));
        }

        let store = self.store.as_ref();
        let expected = item.status;
        let deleted = self
            .config
            .retry
            .run("delete_item", move || store.delete_item(item_id, expected))
            .await?;
        if !deleted {
            return Err(QueueError::conflict(format!(
                "item {item_id} was modified concurrently"
            )));
        }

        info!("Deleted item {} ({}) from queue {}", item_id, item.status, item.queue_id);
        Ok(item)
    }

    /// Remove every item of a queue regardless of status.
    pub async fn clear_queue(&self, queue_id: Uuid) -> Result<u64, QueueError> {
        let store = self.store.as_ref();
        if store.get_queue(queue_id).await?.is_none() {
            return Err(QueueError::QueueNotFound(queue_id));
        }
        let removed = self
            .config
            .retry
            .run("clear_queue", move || store.clear_queue(queue_id))
            .await?;

        info!("Cleared {} items from queue {}", removed, queue_id);
        Ok(removed)
    }
}

/// Compute the item that results from `patch`, and the event to record.
fn plan_update(
    current: &QueueItem,
    patch: &ItemPatch,
    config: &EngineConfig,
    at: DateTime<Utc>,
) -> Result<(QueueItem, Option<NewEvent>), QueueError> {
    if patch.status.is_none() && patch.priority.is_none() && patch.error_message.is_none() {
        return Err(QueueError::validation("patch changes nothing"));
    }

    if let Some(agent_id) = &patch.agent_id {
        if current.agent_id.as_deref() != Some(agent_id.as_str()) {
            return Err(QueueError::conflict(format!(
                "item {} is not held by agent {}",
                current.id, agent_id
            )));
        }
    }

    let mut item = current.clone();
    let mut event = None;

    if let Some(priority) = patch.priority {
        if !matches!(current.status, ItemStatus::Queued | ItemStatus::Failed) {
            return Err(QueueError::conflict(format!(
                "priority of a {} item cannot change",
                current.status
            )));
        }
        item.priority = config.check_priority(priority)?;
    }

    if let Some(next) = patch.status {
        let kind = match next {
            ItemStatus::InProgress => {
                return Err(QueueError::conflict("items are claimed through dispatch only"));
            }
            ItemStatus::Completed => EventKind::Completed,
            ItemStatus::Failed => EventKind::Failed,
            ItemStatus::Cancelled => EventKind::Cancelled,
            ItemStatus::Queued => EventKind::Requeued,
        };
        if !current.status.can_transition_to(next) {
            return Err(QueueError::conflict(format!(
                "illegal transition {} -> {}",
                current.status, next
            )));
        }

        item.status = next;
        if next == ItemStatus::Queued {
            item.agent_id = None;
            item.claimed_at = None;
            item.completed_at = None;
            item.error_message = None;
            item.retry_count += 1;
        } else {
            item.completed_at = Some(at);
        }
        event = Some(
            NewEvent::new(kind)
                .agent(patch.agent_id.clone().or_else(|| current.agent_id.clone()))
                .message(patch.error_message.clone()),
        );
    }

    if let Some(message) = &patch.error_message {
        if !matches!(item.status, ItemStatus::Failed | ItemStatus::Cancelled) {
            return Err(QueueError::validation(
                "errorMessage applies to failed or cancelled items only",
            ));
        }
        item.error_message = Some(message.clone());
    }

    item.updated_at = at;
    Ok((item, event))
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
