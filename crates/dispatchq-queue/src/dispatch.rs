//! Handing queued work to agents.

use std::sync::Arc;

use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::QueueError;
use crate::item::QueueItem;
use crate::store::{now, QueueStore};

/// Claims the next eligible item for an agent.
///
/// Selection and claim are a single store operation, so concurrent callers
/// can never receive the same item.
pub struct DispatchCoordinator {
    store: Arc<dyn QueueStore>,
    config: EngineConfig,
}

impl DispatchCoordinator {
    pub fn new(store: Arc<dyn QueueStore>, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// Claim the next queued item of `queue_id` for `agent_id`.
    ///
    /// Returns `None` when the queue is paused or has nothing queued.
    pub async fn get_next_task(
        &self,
        queue_id: Uuid,
        agent_id: &str,
    ) -> Result<Option<QueueItem>, QueueError> {
        let agent_id = agent_id.trim();
        if agent_id.is_empty() {
            return Err(QueueError::validation("agentId must not be empty"));
        }

        let store = self.store.as_ref();
        let queue = self
            .config
            .retry
            .run("get_queue", move || store.get_queue(queue_id))
            .await?
            .ok_or(QueueError::QueueNotFound(queue_id))?;
        if queue.is_paused() {
            debug!("Queue {} is paused, nothing dispatched to {}", queue_id, agent_id);
            return Ok(None);
        }

        let order = self.config.priority_order;
        let claimed = self
            .config
            .retry
            .run("claim_next", move || store.claim_next(queue_id, agent_id, order, now()))
            .await?;

        match &claimed {
            Some(item) => info!(
                "Agent {} claimed item {} (priority {}, position {}) from queue {}",
                agent_id, item.id, item.priority, item.position, queue_id
            ),
            None => debug!("Queue {} has no queued items for {}", queue_id, agent_id),
        }
        Ok(claimed)
    }
}

#[cfg(test)]
#[path = "dispatch_tests.rs"]
mod tests;
