//! Queue lifecycle: create, update, delete, pause, resume.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::error::QueueError;
use crate::queue::{Queue, QueuePatch, QueueStatus};
use crate::retry::RetryPolicy;
use crate::store::{now, QueueStore};
use crate::ticket::TicketSource;

/// Owns queue records.
pub struct QueueManager {
    store: Arc<dyn QueueStore>,
    tickets: Arc<dyn TicketSource>,
    retry: RetryPolicy,
}

fn normalize_name(name: &str) -> Result<String, QueueError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(QueueError::validation("queue name must not be empty"));
    }
    Ok(name.to_string())
}

/// An empty description clears it.
fn normalize_description(description: Option<String>) -> Option<String> {
    description
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
}

impl QueueManager {
    pub fn new(store: Arc<dyn QueueStore>, tickets: Arc<dyn TicketSource>, retry: RetryPolicy) -> Self {
        Self {
            store,
            tickets,
            retry,
        }
    }

    /// Create an active queue in an existing project.
    pub async fn create_queue(
        &self,
        project_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Queue, QueueError> {
        let name = normalize_name(name)?;
        if !self.tickets.project_exists(project_id).await? {
            return Err(QueueError::ProjectNotFound(project_id.to_string()));
        }

        let queue = Queue::new(project_id, name, normalize_description(description));
        let store = self.store.as_ref();
        let record = &queue;
        self.retry
            .run("insert_queue", move || store.insert_queue(record))
            .await?;

        info!("Created queue '{}' ({}) in project {}", queue.name, queue.id, project_id);
        Ok(queue)
    }

    pub async fn get_queue(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        let store = self.store.as_ref();
        self.retry
            .run("get_queue", move || store.get_queue(queue_id))
            .await?
            .ok_or(QueueError::QueueNotFound(queue_id))
    }

    pub async fn list_queues(
        &self,
        project_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Queue>, QueueError> {
        let store = self.store.as_ref();
        self.retry
            .run("list_queues", move || store.list_queues(project_id, status))
            .await
    }

    /// Apply a name/description patch.
    pub async fn update_queue(&self, queue_id: Uuid, patch: QueuePatch) -> Result<Queue, QueueError> {
        let mut queue = self.get_queue(queue_id).await?;
        if patch.is_empty() {
            return Ok(queue);
        }

        if let Some(name) = patch.name {
            queue.name = normalize_name(&name)?;
        }
        if patch.description.is_some() {
            queue.description = normalize_description(patch.description);
        }
        queue.updated_at = now();

        self.save(&queue).await?;
        info!("Updated queue {}", queue_id);
        Ok(queue)
    }

    /// Delete a queue and all of its items. Returns the number of items removed.
    pub async fn delete_queue(&self, queue_id: Uuid) -> Result<u64, QueueError> {
        let store = self.store.as_ref();
        let removed = self
            .retry
            .run("delete_queue", move || store.delete_queue(queue_id))
            .await?
            .ok_or(QueueError::QueueNotFound(queue_id))?;

        info!("Deleted queue {} with {} items", queue_id, removed);
        Ok(removed)
    }

    /// Stop dispatch from a queue. Pausing a paused queue is a no-op.
    pub async fn pause(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        self.set_status(queue_id, QueueStatus::Paused).await
    }

    /// Resume dispatch. Resuming an active queue is a no-op.
    pub async fn resume(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        self.set_status(queue_id, QueueStatus::Active).await
    }

    async fn set_status(&self, queue_id: Uuid, status: QueueStatus) -> Result<Queue, QueueError> {
        let queue = self.get_queue(queue_id).await?;
        if queue.status == status {
            debug!("Queue {} already {}", queue_id, status);
            return Ok(queue);
        }

        let store = self.store.as_ref();
        let at = now();
        let queue = self
            .retry
            .run("set_queue_status", move || store.set_queue_status(queue_id, status, at))
            .await?
            .ok_or(QueueError::QueueNotFound(queue_id))?;
        info!("Queue {} is now {}", queue_id, status);
        Ok(queue)
    }

    async fn save(&self, queue: &Queue) -> Result<(), QueueError> {
        let store = self.store.as_ref();
        let saved = self
            .retry
            .run("save_queue", move || store.save_queue(queue))
            .await?;
        if saved {
            Ok(())
        } else {
            Err(QueueError::QueueNotFound(queue.id))
        }
    }
}

#[cfg(test)]
#[path = "manager_tests.rs"]
mod tests;
