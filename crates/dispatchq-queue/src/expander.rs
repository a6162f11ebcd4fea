//! Turning tickets and ad-hoc requests into queue items.

use std::collections::HashSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::error::QueueError;
use crate::item::{ItemDraft, NewItem, QueueItem, SourceType};
use crate::queue::Queue;
use crate::store::{now, QueueStore};
use crate::ticket::{Ticket, TicketSource};

/// A ticket task with no queue item yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnqueuedTask {
    pub ticket_id: String,
    pub ticket_title: String,
    pub task_id: String,
    pub content: String,
    pub order_index: i64,
}

/// Creates queue items from tickets and direct enqueue requests.
pub struct TicketExpander {
    store: Arc<dyn QueueStore>,
    tickets: Arc<dyn TicketSource>,
    config: EngineConfig,
}

impl TicketExpander {
    pub fn new(store: Arc<dyn QueueStore>, tickets: Arc<dyn TicketSource>, config: EngineConfig) -> Self {
        Self {
            store,
            tickets,
            config,
        }
    }

    /// Enqueue every undone task of a ticket, in task order.
    ///
    /// Tasks that already have a queued or in-progress item somewhere in the
    /// project are skipped. All items are created in one transaction.
    pub async fn enqueue_ticket(
        &self,
        queue_id: Uuid,
        ticket_id: &str,
        priority: Option<i64>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let priority = self.config.resolve_priority(priority)?;
        let queue = self.queue(queue_id).await?;
        let ticket = self
            .tickets
            .get_ticket(ticket_id)
            .await?
            .ok_or_else(|| QueueError::TicketNotFound(ticket_id.to_string()))?;

        if ticket.project_id != queue.project_id {
            return Err(QueueError::validation(format!(
                "ticket {} belongs to project {}, queue {} to project {}",
                ticket.id, ticket.project_id, queue.id, queue.project_id
            )));
        }

        let store = self.store.as_ref();
        let project_id = queue.project_id.as_str();
        let live = self
            .config
            .retry
            .run("represented_task_ids", move || store.represented_task_ids(project_id, true))
            .await?;

        let drafts = ticket_drafts(&ticket, &live, priority);
        if drafts.is_empty() {
            return Err(QueueError::validation(format!(
                "ticket {} has no pending tasks to enqueue",
                ticket.id
            )));
        }

        let items = self.insert(queue_id, drafts).await?;
        info!(
            "Enqueued {} tasks of ticket {} into queue {}",
            items.len(),
            ticket.id,
            queue_id
        );
        Ok(items)
    }

    /// Enqueue a single item at the end of the queue.
    pub async fn enqueue_item(&self, queue_id: Uuid, item: NewItem) -> Result<QueueItem, QueueError> {
        let mut items = self.batch_enqueue(queue_id, vec![item]).await?;
        items
            .pop()
            .ok_or_else(|| QueueError::storage("insert returned no item"))
    }

    /// Enqueue several items atomically, keeping their order.
    pub async fn batch_enqueue(
        &self,
        queue_id: Uuid,
        items: Vec<NewItem>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        if items.is_empty() {
            return Err(QueueError::validation("batch must contain at least one item"));
        }
        let drafts = items
            .into_iter()
            .map(|item| self.draft(item))
            .collect::<Result<Vec<_>, _>>()?;

        let items = self.insert(queue_id, drafts).await?;
        info!("Enqueued {} items into queue {}", items.len(), queue_id);
        Ok(items)
    }

    /// Undone ticket tasks of a project that no queue item represents.
    pub async fn unqueued_tasks(&self, project_id: &str) -> Result<Vec<UnqueuedTask>, QueueError> {
        if !self.tickets.project_exists(project_id).await? {
            return Err(QueueError::ProjectNotFound(project_id.to_string()));
        }

        let tickets = self.tickets.list_tickets(project_id).await?;
        let store = self.store.as_ref();
        let represented = self
            .config
            .retry
            .run("represented_task_ids", move || store.represented_task_ids(project_id, false))
            .await?;

        let represented = &represented;
        let unqueued: Vec<UnqueuedTask> = tickets
            .iter()
            .flat_map(|ticket| {
                ticket
                    .pending_tasks()
                    .filter(move |task| !represented.contains(&task.id))
                    .map(move |task| UnqueuedTask {
                        ticket_id: ticket.id.clone(),
                        ticket_title: ticket.title.clone(),
                        task_id: task.id.clone(),
                        content: task.content.clone(),
                        order_index: task.order_index,
                    })
            })
            .collect();
        debug!("Project {} has {} unqueued tasks", project_id, unqueued.len());
        Ok(unqueued)
    }

    fn draft(&self, item: NewItem) -> Result<ItemDraft, QueueError> {
        let title = item.title.trim();
        if title.is_empty() {
            return Err(QueueError::validation("item title must not be empty"));
        }
        if item.source_type == SourceType::TicketTask && item.source_ref_id.is_none() {
            return Err(QueueError::validation("ticket-task items need a sourceRefId"));
        }

        Ok(ItemDraft {
            source_type: item.source_type,
            source_ref_id: item.source_ref_id,
            ticket_id: item.ticket_id,
            title: title.to_string(),
            payload: item.payload,
            priority: self.config.resolve_priority(item.priority)?,
        })
    }

    async fn queue(&self, queue_id: Uuid) -> Result<Queue, QueueError> {
        let store = self.store.as_ref();
        self.config
            .retry
            .run("get_queue", move || store.get_queue(queue_id))
            .await?
            .ok_or(QueueError::QueueNotFound(queue_id))
    }

    async fn insert(&self, queue_id: Uuid, drafts: Vec<ItemDraft>) -> Result<Vec<QueueItem>, QueueError> {
        let store = self.store.as_ref();
        let drafts = &drafts;
        let at = now();
        self.config
            .retry
            .run("insert_items", move || store.insert_items(queue_id, drafts.clone(), at))
            .await
    }
}

/// One draft per pending task not already live in the project.
fn ticket_drafts(ticket: &Ticket, live: &HashSet<String>, priority: i64) -> Vec<ItemDraft> {
    ticket
        .pending_tasks()
        .filter(|task| !live.contains(&task.id))
        .map(|task| ItemDraft {
            source_type: SourceType::TicketTask,
            source_ref_id: Some(task.id.clone()),
            ticket_id: Some(ticket.id.clone()),
            title: task.content.clone(),
            payload: serde_json::Value::Null,
            priority,
        })
        .collect()
}

#[cfg(test)]
#[path = "expander_tests.rs"]
mod tests;
