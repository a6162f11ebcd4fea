//! The queue engine: every component wired over one store.

use std::sync::Arc;
use std::time::Duration;

use dispatchq_config::{Config, ConfigLoader};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::dispatch::DispatchCoordinator;
use crate::error::QueueError;
use crate::expander::{TicketExpander, UnqueuedTask};
use crate::item::{ItemPatch, ItemStatus, ItemUpdate, NewItem, QueueItem};
use crate::lifecycle::ItemLifecycleManager;
use crate::manager::QueueManager;
use crate::queue::{Queue, QueuePatch, QueueStatus};
use crate::reaper::ClaimReaper;
use crate::reorg::ReorgService;
use crate::stats::{QueueStats, QueueWithStats, StatsAggregator};
use crate::store::{QueueStore, SqliteQueueStore};
use crate::ticket::{FileTicketSource, TicketSource};
use crate::timeline::{TimelineEvent, TimelineService};

#[cfg(test)]
#[path = "engine_tests.rs"]
mod tests;

/// Entry point for every queue operation.
///
/// Mutations go through here so the stats cache entry of each touched
/// queue is dropped as soon as the change commits.
pub struct QueueEngine {
    config: EngineConfig,
    manager: QueueManager,
    expander: TicketExpander,
    dispatcher: DispatchCoordinator,
    lifecycle: ItemLifecycleManager,
    reorg: ReorgService,
    stats: Arc<StatsAggregator>,
    timeline: TimelineService,
    reaper: Arc<ClaimReaper>,
}

impl QueueEngine {
    pub fn new(store: Arc<dyn QueueStore>, tickets: Arc<dyn TicketSource>, config: EngineConfig) -> Self {
        let retry = config.retry.clone();
        let stats = Arc::new(StatsAggregator::new(
            store.clone(),
            retry.clone(),
            config.stats_cache_ttl,
        ));

        Self {
            manager: QueueManager::new(store.clone(), tickets.clone(), retry.clone()),
            expander: TicketExpander::new(store.clone(), tickets, config.clone()),
            dispatcher: DispatchCoordinator::new(store.clone(), config.clone()),
            lifecycle: ItemLifecycleManager::new(store.clone(), config.clone()),
            reorg: ReorgService::new(store.clone(), retry.clone()),
            timeline: TimelineService::new(store.clone(), retry),
            reaper: Arc::new(ClaimReaper::new(store, stats.clone(), config.clone())),
            stats,
            config,
        }
    }

    /// Build an engine from file configuration: SQLite store plus the
    /// file-based ticket source.
    pub async fn from_config(config: &Config) -> Result<Self, QueueError> {
        let store = if config.storage.is_in_memory() {
            warn!("Using an in-memory queue database; state is lost on exit");
            SqliteQueueStore::in_memory().await?
        } else {
            let path = ConfigLoader::expand_path(&config.storage.database_path);
            SqliteQueueStore::open(path, Duration::from_millis(config.storage.busy_timeout_ms)).await?
        };

        let tickets = FileTicketSource::new(
            ConfigLoader::expand_path(&config.tickets.storage_path),
            ConfigLoader::expand_path(&config.tickets.projects_index),
        );

        let engine_config = EngineConfig::from(config);
        info!(
            "Queue engine: priority order {:?}, priorities [{}, {}] (default {}), claim timeout {:?}",
            engine_config.priority_order,
            engine_config.min_priority,
            engine_config.max_priority,
            engine_config.default_priority,
            engine_config.claim_timeout
        );
        Ok(Self::new(Arc::new(store), Arc::new(tickets), engine_config))
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Start the claim reaper on the current runtime.
    pub fn spawn_reaper(&self, cancel: watch::Receiver<bool>) -> JoinHandle<()> {
        let reaper = self.reaper.clone();
        tokio::spawn(reaper.run(cancel))
    }

    /// One reaper pass, outside the background loop.
    pub async fn sweep_stale_claims(&self) -> Result<Vec<QueueItem>, QueueError> {
        self.reaper.sweep_once().await
    }

    // Queues

    pub async fn create_queue(
        &self,
        project_id: &str,
        name: &str,
        description: Option<String>,
    ) -> Result<Queue, QueueError> {
        self.manager.create_queue(project_id, name, description).await
    }

    pub async fn get_queue(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        self.manager.get_queue(queue_id).await
    }

    pub async fn list_queues(
        &self,
        project_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Queue>, QueueError> {
        self.manager.list_queues(project_id, status).await
    }

    pub async fn update_queue(&self, queue_id: Uuid, patch: QueuePatch) -> Result<Queue, QueueError> {
        self.manager.update_queue(queue_id, patch).await
    }

    pub async fn delete_queue(&self, queue_id: Uuid) -> Result<u64, QueueError> {
        let removed = self.manager.delete_queue(queue_id).await?;
        self.stats.invalidate(queue_id);
        Ok(removed)
    }

    pub async fn pause_queue(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        self.manager.pause(queue_id).await
    }

    pub async fn resume_queue(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        self.manager.resume(queue_id).await
    }

    // Enqueue

    pub async fn enqueue_ticket(
        &self,
        queue_id: Uuid,
        ticket_id: &str,
        priority: Option<i64>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let items = self.expander.enqueue_ticket(queue_id, ticket_id, priority).await?;
        self.stats.invalidate(queue_id);
        Ok(items)
    }

    pub async fn enqueue_item(&self, queue_id: Uuid, item: NewItem) -> Result<QueueItem, QueueError> {
        let item = self.expander.enqueue_item(queue_id, item).await?;
        self.stats.invalidate(queue_id);
        Ok(item)
    }

    pub async fn batch_enqueue(
        &self,
        queue_id: Uuid,
        items: Vec<NewItem>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let items = self.expander.batch_enqueue(queue_id, items).await?;
        self.stats.invalidate(queue_id);
        Ok(items)
    }

    pub async fn get_unqueued_items(&self, project_id: &str) -> Result<Vec<UnqueuedTask>, QueueError> {
        self.expander.unqueued_tasks(project_id).await
    }

    // Dispatch

    pub async fn get_next_task(
        &self,
        queue_id: Uuid,
        agent_id: &str,
    ) -> Result<Option<QueueItem>, QueueError> {
        let claimed = self.dispatcher.get_next_task(queue_id, agent_id).await?;
        if claimed.is_some() {
            self.stats.invalidate(queue_id);
        }
        Ok(claimed)
    }

    // Items

    pub async fn get_item(&self, item_id: Uuid) -> Result<QueueItem, QueueError> {
        self.lifecycle.get_item(item_id).await
    }

    pub async fn list_items(
        &self,
        queue_id: Uuid,
        status: Option<ItemStatus>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        self.lifecycle.list_items(queue_id, status).await
    }

    pub async fn update_queue_item(
        &self,
        item_id: Uuid,
        patch: ItemPatch,
    ) -> Result<QueueItem, QueueError> {
        let item = self.lifecycle.update_item(item_id, patch).await?;
        self.stats.invalidate(item.queue_id);
        Ok(item)
    }

    pub async fn batch_update_items(
        &self,
        updates: Vec<ItemUpdate>,
    ) -> Vec<Result<QueueItem, QueueError>> {
        let results = self.lifecycle.batch_update(updates).await;
        for item in results.iter().flatten() {
            self.stats.invalidate(item.queue_id);
        }
        results
    }

    pub async fn delete_queue_item(&self, item_id: Uuid, force: bool) -> Result<QueueItem, QueueError> {
        let item = self.lifecycle.delete_item(item_id, force).await?;
        self.stats.invalidate(item.queue_id);
        Ok(item)
    }

    pub async fn clear_queue(&self, queue_id: Uuid) -> Result<u64, QueueError> {
        let removed = self.lifecycle.clear_queue(queue_id).await?;
        self.stats.invalidate(queue_id);
        Ok(removed)
    }

    // Reorganisation

    pub async fn reorder_queue_items(&self, queue_id: Uuid, ordered: Vec<Uuid>) -> Result<(), QueueError> {
        self.reorg.reorder(queue_id, ordered).await
    }

    pub async fn bulk_move_items(
        &self,
        item_ids: Vec<Uuid>,
        target: Uuid,
        positions: Option<Vec<i64>>,
    ) -> Result<(), QueueError> {
        let sources = self.reorg.bulk_move(item_ids, target, positions).await?;
        self.stats.invalidate(target);
        for source in sources {
            self.stats.invalidate(source);
        }
        Ok(())
    }

    // Reads

    pub async fn get_queue_stats(&self, queue_id: Uuid) -> Result<QueueStats, QueueError> {
        self.stats.queue_stats(queue_id).await
    }

    pub async fn get_queues_with_stats(&self, project_id: &str) -> Result<Vec<QueueWithStats>, QueueError> {
        self.stats.queues_with_stats(project_id).await
    }

    pub async fn get_queue_timeline(
        &self,
        queue_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<TimelineEvent>, QueueError> {
        self.timeline.queue_timeline(queue_id, limit).await
    }
}
