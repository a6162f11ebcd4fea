//! Reordering within a queue and moving items between queues.
//!
//! Items that are in progress are never reordered or moved: listing one is
//! a `Conflict` and the whole operation is rejected.

use std::collections::HashSet;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::error::QueueError;
use crate::retry::RetryPolicy;
use crate::store::{now, QueueStore};

pub struct ReorgService {
    store: Arc<dyn QueueStore>,
    retry: RetryPolicy,
}

fn ensure_unique(ids: &[Uuid]) -> Result<(), QueueError> {
    let mut seen = HashSet::with_capacity(ids.len());
    match ids.iter().find(|id| !seen.insert(**id)) {
        Some(id) => Err(QueueError::validation(format!("item {id} is listed more than once"))),
        None => Ok(()),
    }
}

impl ReorgService {
    pub fn new(store: Arc<dyn QueueStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Give the listed items positions `0..n` in the given order; the rest of
    /// the queue follows in its existing order.
    pub async fn reorder(&self, queue_id: Uuid, ordered: Vec<Uuid>) -> Result<(), QueueError> {
        ensure_unique(&ordered)?;

        let store = self.store.as_ref();
        let ids = &ordered;
        let at = now();
        self.retry
            .run("reorder_items", move || store.reorder_items(queue_id, ids.clone(), at))
            .await?;

        info!("Reordered {} items in queue {}", ordered.len(), queue_id);
        Ok(())
    }

    /// Move items into `target`, atomically.
    ///
    /// With `positions`, each item is inserted at its position and target
    /// items at or after it shift down by one; without, items are appended
    /// in order. Returns the queues the items came from.
    pub async fn bulk_move(
        &self,
        item_ids: Vec<Uuid>,
        target: Uuid,
        positions: Option<Vec<i64>>,
    ) -> Result<Vec<Uuid>, QueueError> {
        if item_ids.is_empty() {
            return Err(QueueError::validation("no items to move"));
        }
        ensure_unique(&item_ids)?;
        if let Some(positions) = &positions {
            if positions.len() != item_ids.len() {
                return Err(QueueError::validation(format!(
                    "{} positions given for {} items",
                    positions.len(),
                    item_ids.len()
                )));
            }
            if let Some(bad) = positions.iter().find(|p| **p < 0) {
                return Err(QueueError::validation(format!("position {bad} is negative")));
            }
        }

        let store = self.store.as_ref();
        let (ids, positions_ref) = (&item_ids, &positions);
        let at = now();
        let sources = self
            .retry
            .run("move_items", move || {
                store.move_items(ids.clone(), target, positions_ref.clone(), at)
            })
            .await?;

        info!(
            "Moved {} items from {} queue(s) to queue {}",
            item_ids.len(),
            sources.len(),
            target
        );
        Ok(sources)
    }
}

#[cfg(test)]
#[path = "reorg_tests.rs"]
mod tests;
