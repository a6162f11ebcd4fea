//! Per-queue status counts with a short-lived read cache.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::error::QueueError;
use crate::item::ItemStatus;
use crate::queue::Queue;
use crate::retry::RetryPolicy;
use crate::store::QueueStore;

/// Item counts by status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub queued: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub failed: u64,
    pub cancelled: u64,
    pub total: u64,
}

impl QueueStats {
    /// Add `count` items of `status`.
    pub fn add(&mut self, status: ItemStatus, count: u64) {
        match status {
            ItemStatus::Queued => self.queued += count,
            ItemStatus::InProgress => self.in_progress += count,
            ItemStatus::Completed => self.completed += count,
            ItemStatus::Failed => self.failed += count,
            ItemStatus::Cancelled => self.cancelled += count,
        }
        self.total += count;
    }
}

/// A queue together with its current counts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueWithStats {
    #[serde(flatten)]
    pub queue: Queue,
    pub stats: QueueStats,
}

struct CachedStats {
    stats: QueueStats,
    computed_at: Instant,
    generation: u64,
}

/// Computes queue statistics for dashboards.
///
/// Results may be served from a TTL cache; the dispatcher never reads it.
/// Each invalidation bumps the queue's generation, and an entry is only
/// served while its generation is current, so a count that started before
/// a write can never be served after it.
pub struct StatsAggregator {
    store: Arc<dyn QueueStore>,
    retry: RetryPolicy,
    ttl: Duration,
    cache: DashMap<Uuid, CachedStats>,
    generations: DashMap<Uuid, u64>,
}

impl StatsAggregator {
    pub fn new(store: Arc<dyn QueueStore>, retry: RetryPolicy, ttl: Duration) -> Self {
        Self {
            store,
            retry,
            ttl,
            cache: DashMap::new(),
            generations: DashMap::new(),
        }
    }

    /// Drop the cached entry for `queue_id`.
    pub fn invalidate(&self, queue_id: Uuid) {
        *self.generations.entry(queue_id).or_insert(0) += 1;
        self.cache.remove(&queue_id);
    }

    fn generation(&self, queue_id: Uuid) -> u64 {
        self.generations.get(&queue_id).map(|g| *g).unwrap_or(0)
    }

    /// Counts for one queue.
    pub async fn queue_stats(&self, queue_id: Uuid) -> Result<QueueStats, QueueError> {
        if let Some(cached) = self.cached(queue_id) {
            return Ok(cached);
        }

        let store = self.store.as_ref();
        if store.get_queue(queue_id).await?.is_none() {
            return Err(QueueError::QueueNotFound(queue_id));
        }
        self.compute(queue_id).await
    }

    /// Every queue of a project with its counts.
    pub async fn queues_with_stats(&self, project_id: &str) -> Result<Vec<QueueWithStats>, QueueError> {
        let store = self.store.as_ref();
        let queues = self
            .retry
            .run("list_queues", move || store.list_queues(project_id, None))
            .await?;

        let mut result = Vec::with_capacity(queues.len());
        for queue in queues {
            let stats = match self.cached(queue.id) {
                Some(stats) => stats,
                None => self.compute(queue.id).await?,
            };
            result.push(QueueWithStats { queue, stats });
        }
        Ok(result)
    }

    fn cached(&self, queue_id: Uuid) -> Option<QueueStats> {
        if self.ttl.is_zero() {
            return None;
        }
        let generation = self.generation(queue_id);
        let entry = self.cache.get(&queue_id)?;
        if entry.generation == generation && entry.computed_at.elapsed() < self.ttl {
            Some(entry.stats)
        } else {
            None
        }
    }

    async fn compute(&self, queue_id: Uuid) -> Result<QueueStats, QueueError> {
        let generation = self.generation(queue_id);
        let store = self.store.as_ref();
        let stats = self
            .retry
            .run("count_by_status", move || store.count_by_status(queue_id))
            .await?;

        if self.ttl.is_zero() {
            return Ok(stats);
        }
        if self.generation(queue_id) != generation {
            debug!("Queue {} changed while counting, not caching", queue_id);
            return Ok(stats);
        }
        debug!("Caching stats for queue {}: {:?}", queue_id, stats);
        self.cache.insert(
            queue_id,
            CachedStats {
                stats,
                computed_at: Instant::now(),
                generation,
            },
        );
        Ok(stats)
    }
}

#[cfg(test)]
#[path = "stats_tests.rs"]
mod tests;
