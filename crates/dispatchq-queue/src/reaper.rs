//! Background recovery of claims whose agent went away.

use std::sync::Arc;

use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::QueueError;
use crate::item::{ItemStatus, QueueItem};
use crate::stats::StatsAggregator;
use crate::store::{now, QueueStore};

/// Periodically returns stale `in_progress` items to the queue.
///
/// This does not stop an agent that is still working; its later status
/// report will simply conflict.
pub struct ClaimReaper {
    store: Arc<dyn QueueStore>,
    stats: Arc<StatsAggregator>,
    config: EngineConfig,
}

impl ClaimReaper {
    pub fn new(store: Arc<dyn QueueStore>, stats: Arc<StatsAggregator>, config: EngineConfig) -> Self {
        Self { store, stats, config }
    }

    /// Reclaim everything claimed longer than the claim timeout.
    pub async fn sweep_once(&self) -> Result<Vec<QueueItem>, QueueError> {
        let at = now();
        let timeout = chrono::Duration::from_std(self.config.claim_timeout)
            .map_err(|e| QueueError::validation(format!("claim timeout out of range: {e}")))?;
        let cutoff = at - timeout;
        let max_attempts = self.config.max_attempts;

        let store = self.store.as_ref();
        let reclaimed = self
            .config
            .retry
            .run("reclaim_expired", move || store.reclaim_expired(cutoff, max_attempts, at))
            .await?;

        for item in &reclaimed {
            self.stats.invalidate(item.queue_id);
            if item.status == ItemStatus::Failed {
                warn!(
                    "Item {} in queue {} failed after {} reclaims",
                    item.id, item.queue_id, item.retry_count
                );
            } else {
                info!(
                    "Reclaimed item {} in queue {} (retry {})",
                    item.id, item.queue_id, item.retry_count
                );
            }
        }
        if reclaimed.is_empty() {
            debug!("Reaper sweep found no stale claims");
        }
        Ok(reclaimed)
    }

    /// Sweep on every interval tick until `cancel` fires.
    pub async fn run(self: Arc<Self>, cancel: tokio::sync::watch::Receiver<bool>) {
        info!(
            "Claim reaper started (interval: {:?}, claim timeout: {:?})",
            self.config.reaper_interval, self.config.claim_timeout
        );

        if self.config.reaper_interval.is_zero() {
            warn!("Reaper interval is zero, not starting");
            return;
        }

        let mut interval = time::interval(self.config.reaper_interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut cancel = cancel;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.sweep_once().await {
                        error!("Reaper sweep failed: {}", e);
                    }
                }
                _ = cancel.changed() => {
                    info!("Claim reaper shutting down");
                    break;
                }
            }
        }
    }
}

#[cfg(test)]
#[path = "reaper_tests.rs"]
mod tests;
