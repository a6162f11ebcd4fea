//! SQLite queue store.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, ErrorCode, OptionalExtension, Transaction, TransactionBehavior};
use tokio_rusqlite::Connection;
use tracing::{debug, info};
use uuid::Uuid;

use super::rows::{
    event_from_row, item_from_row, opt_ts, queue_from_row, ts, EVENT_COLUMNS, ITEM_COLUMNS,
    QUEUE_COLUMNS,
};
use super::schema::init_schema;
use super::QueueStore;
use crate::config::PriorityOrder;
use crate::error::QueueError;
use crate::item::{ItemDraft, ItemStatus, QueueItem};
use crate::queue::{Queue, QueueStatus};
use crate::stats::QueueStats;
use crate::timeline::{EventKind, NewEvent, TimelineEvent};

#[cfg(test)]
#[path = "sqlite_tests.rs"]
mod tests;

/// Message recorded when the reaper takes an item back.
pub const CLAIM_TIMED_OUT: &str = "claim timed out";

/// SQLite-backed queue store.
///
/// Multi-row mutations run inside `BEGIN IMMEDIATE` transactions so that
/// several processes can share one database file.
pub struct SqliteQueueStore {
    conn: Connection,
}

/// Carry a domain error out of the connection thread.
fn domain(err: QueueError) -> tokio_rusqlite::Error {
    tokio_rusqlite::Error::Other(Box::new(err))
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

fn immediate(conn: &mut rusqlite::Connection) -> rusqlite::Result<Transaction<'_>> {
    conn.transaction_with_behavior(TransactionBehavior::Immediate)
}

fn record_event(
    tx: &Transaction<'_>,
    item_id: Uuid,
    queue_id: Uuid,
    event: &NewEvent,
    at: &str,
) -> rusqlite::Result<()> {
    tx.execute(
        "INSERT INTO queue_item_events (item_id, queue_id, kind, agent_id, message, at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            item_id.to_string(),
            queue_id.to_string(),
            event.kind.as_str(),
            event.agent_id,
            event.message,
            at
        ],
    )?;
    Ok(())
}

fn queue_exists(tx: &Transaction<'_>, queue_id: Uuid) -> rusqlite::Result<bool> {
    tx.query_row(
        "SELECT 1 FROM queues WHERE id = ?1",
        [queue_id.to_string()],
        |_| Ok(()),
    )
    .optional()
    .map(|found| found.is_some())
}

fn next_position(tx: &Transaction<'_>, queue_id: Uuid) -> rusqlite::Result<i64> {
    tx.query_row(
        "SELECT COALESCE(MAX(position), -1) + 1 FROM queue_items WHERE queue_id = ?1",
        [queue_id.to_string()],
        |row| row.get(0),
    )
}

impl SqliteQueueStore {
    /// Create a new in-memory database.
    pub async fn in_memory() -> Result<Self, QueueError> {
        let conn = Connection::open_in_memory().await?;
        conn.call(|conn| {
            conn.pragma_update(None, "foreign_keys", "ON")?;
            init_schema(conn)
        })
        .await?;

        Ok(Self { conn })
    }

    /// Open (or create) a file-backed database.
    pub async fn open(path: impl AsRef<Path>, busy_timeout: Duration) -> Result<Self, QueueError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                QueueError::storage(format!("Failed to create {}: {}", parent.display(), e))
            })?;
        }

        let conn = Connection::open(&path).await?;
        conn.call(move |conn| {
            conn.busy_timeout(busy_timeout)?;
            conn.pragma_update(None, "foreign_keys", "ON")?;
            let mode: String =
                conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get(0))?;
            debug!("SQLite journal mode: {}", mode);
            init_schema(conn)
        })
        .await?;

        info!("Opened queue database at {}", path.display());
        Ok(Self { conn })
    }
}

#[async_trait]
impl QueueStore for SqliteQueueStore {
    async fn insert_queue(&self, queue: &Queue) -> Result<(), QueueError> {
        let queue = queue.clone();
        self.conn
            .call(move |conn| {
                let result = conn.execute(
                    "INSERT INTO queues (id, project_id, name, description, status, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        queue.id.to_string(),
                        queue.project_id,
                        queue.name,
                        queue.description,
                        queue.status.as_str(),
                        ts(&queue.created_at),
                        ts(&queue.updated_at)
                    ],
                );
                match result {
                    Ok(_) => Ok(()),
                    Err(e) if is_constraint_violation(&e) => Err(domain(QueueError::conflict(format!(
                        "queue '{}' already exists in project {}",
                        queue.name, queue.project_id
                    )))),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(QueueError::from)
    }

    async fn get_queue(&self, queue_id: Uuid) -> Result<Option<Queue>, QueueError> {
        let sql = format!("SELECT {QUEUE_COLUMNS} FROM queues WHERE id = ?1");
        self.conn
            .call(move |conn| {
                Ok(conn
                    .query_row(&sql, [queue_id.to_string()], queue_from_row)
                    .optional()?)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn list_queues(
        &self,
        project_id: &str,
        status: Option<QueueStatus>,
    ) -> Result<Vec<Queue>, QueueError> {
        let project_id = project_id.to_string();
        let status = status.map(|s| s.as_str());
        let sql = format!(
            "SELECT {QUEUE_COLUMNS} FROM queues
             WHERE project_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY created_at, name"
        );
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let queues = stmt
                    .query_map(params![project_id, status], queue_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(queues)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn save_queue(&self, queue: &Queue) -> Result<bool, QueueError> {
        let queue = queue.clone();
        self.conn
            .call(move |conn| {
                let result = conn.execute(
                    "UPDATE queues SET name = ?2, description = ?3, updated_at = ?4
                     WHERE id = ?1",
                    params![
                        queue.id.to_string(),
                        queue.name,
                        queue.description,
                        ts(&queue.updated_at)
                    ],
                );
                match result {
                    Ok(changed) => Ok(changed == 1),
                    Err(e) if is_constraint_violation(&e) => Err(domain(QueueError::conflict(format!(
                        "queue '{}' already exists in project {}",
                        queue.name, queue.project_id
                    )))),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(QueueError::from)
    }

    async fn set_queue_status(
        &self,
        queue_id: Uuid,
        status: QueueStatus,
        now: DateTime<Utc>,
    ) -> Result<Option<Queue>, QueueError> {
        let sql = format!(
            "UPDATE queues SET status = ?2, updated_at = ?3 WHERE id = ?1
             RETURNING {QUEUE_COLUMNS}"
        );
        self.conn
            .call(move |conn| {
                Ok(conn
                    .query_row(
                        &sql,
                        params![queue_id.to_string(), status.as_str(), ts(&now)],
                        queue_from_row,
                    )
                    .optional()?)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn delete_queue(&self, queue_id: Uuid) -> Result<Option<u64>, QueueError> {
        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                let id = queue_id.to_string();
                let items: u64 = tx.query_row(
                    "SELECT COUNT(*) FROM queue_items WHERE queue_id = ?1",
                    [&id],
                    |row| row.get(0),
                )?;
                let deleted = tx.execute("DELETE FROM queues WHERE id = ?1", [&id])?;
                tx.commit()?;
                Ok((deleted == 1).then_some(items))
            })
            .await
            .map_err(QueueError::from)
    }

    async fn insert_items(
        &self,
        queue_id: Uuid,
        drafts: Vec<ItemDraft>,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                if !queue_exists(&tx, queue_id)? {
                    return Err(domain(QueueError::QueueNotFound(queue_id)));
                }

                let at = ts(&now);
                let base = next_position(&tx, queue_id)?;
                let mut items = Vec::with_capacity(drafts.len());
                for (offset, draft) in drafts.into_iter().enumerate() {
                    let item = QueueItem {
                        id: Uuid::new_v4(),
                        queue_id,
                        source_type: draft.source_type,
                        source_ref_id: draft.source_ref_id,
                        ticket_id: draft.ticket_id,
                        title: draft.title,
                        payload: draft.payload,
                        status: ItemStatus::Queued,
                        priority: draft.priority,
                        position: base + offset as i64,
                        agent_id: None,
                        claimed_at: None,
                        completed_at: None,
                        error_message: None,
                        retry_count: 0,
                        created_at: now,
                        updated_at: now,
                    };
                    tx.execute(
                        "INSERT INTO queue_items (id, queue_id, source_type, source_ref_id, ticket_id,
                             title, payload, status, priority, position, retry_count, created_at, updated_at)
                         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 0, ?11, ?11)",
                        params![
                            item.id.to_string(),
                            queue_id.to_string(),
                            item.source_type.as_str(),
                            item.source_ref_id,
                            item.ticket_id,
                            item.title,
                            item.payload.to_string(),
                            item.status.as_str(),
                            item.priority,
                            item.position,
                            at
                        ],
                    )?;
                    record_event(&tx, item.id, queue_id, &NewEvent::new(EventKind::Enqueued), &at)?;
                    items.push(item);
                }

                tx.commit()?;
                Ok(items)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn get_item(&self, item_id: Uuid) -> Result<Option<QueueItem>, QueueError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE id = ?1");
        self.conn
            .call(move |conn| {
                Ok(conn
                    .query_row(&sql, [item_id.to_string()], item_from_row)
                    .optional()?)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn list_items(
        &self,
        queue_id: Uuid,
        status: Option<ItemStatus>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let status = status.map(|s| s.as_str());
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM queue_items
             WHERE queue_id = ?1 AND (?2 IS NULL OR status = ?2)
             ORDER BY position, created_at"
        );
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let items = stmt
                    .query_map(params![queue_id.to_string(), status], item_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(items)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn claim_next(
        &self,
        queue_id: Uuid,
        agent_id: &str,
        order: PriorityOrder,
        now: DateTime<Utc>,
    ) -> Result<Option<QueueItem>, QueueError> {
        let direction = match order {
            PriorityOrder::HigherFirst => "DESC",
            PriorityOrder::LowerFirst => "ASC",
        };
        // Selection and claim in one statement: no window between read and write.
        let sql = format!(
            "UPDATE queue_items
             SET status = 'in_progress', agent_id = ?2, claimed_at = ?3, updated_at = ?3
             WHERE id = (
                 SELECT i.id FROM queue_items i
                 JOIN queues q ON q.id = i.queue_id
                 WHERE i.queue_id = ?1 AND i.status = 'queued' AND q.status = 'active'
                 ORDER BY i.priority {direction}, i.position ASC
                 LIMIT 1
             )
             AND status = 'queued'
             RETURNING {ITEM_COLUMNS}"
        );
        let agent_id = agent_id.to_string();

        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                let at = ts(&now);
                let claimed = tx
                    .query_row(&sql, params![queue_id.to_string(), agent_id, at], item_from_row)
                    .optional()?;
                if let Some(item) = &claimed {
                    let event = NewEvent::new(EventKind::Claimed).agent(Some(agent_id.clone()));
                    record_event(&tx, item.id, queue_id, &event, &at)?;
                }
                tx.commit()?;
                Ok(claimed)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn update_item_if(
        &self,
        previous: &QueueItem,
        updated: &QueueItem,
        event: Option<NewEvent>,
    ) -> Result<Option<QueueItem>, QueueError> {
        let expected_status = previous.status.as_str();
        let expected_agent = previous.agent_id.clone();
        let expected_priority = previous.priority;
        let item = updated.clone();
        // queue_id and position are not written, so a concurrent move stands.
        let sql = format!(
            "UPDATE queue_items
             SET status = ?3, priority = ?4, agent_id = ?5, claimed_at = ?6,
                 completed_at = ?7, error_message = ?8, retry_count = ?9, updated_at = ?10
             WHERE id = ?1 AND status = ?2 AND agent_id IS ?11 AND priority = ?12
             RETURNING {ITEM_COLUMNS}"
        );

        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                let stored = tx
                    .query_row(
                        &sql,
                        params![
                            item.id.to_string(),
                            expected_status,
                            item.status.as_str(),
                            item.priority,
                            item.agent_id,
                            opt_ts(&item.claimed_at),
                            opt_ts(&item.completed_at),
                            item.error_message,
                            item.retry_count,
                            ts(&item.updated_at),
                            expected_agent,
                            expected_priority
                        ],
                        item_from_row,
                    )
                    .optional()?;
                let Some(stored) = stored else {
                    return Ok(None);
                };

                if let Some(event) = event {
                    record_event(&tx, stored.id, stored.queue_id, &event, &ts(&stored.updated_at))?;
                }
                tx.commit()?;
                Ok(Some(stored))
            })
            .await
            .map_err(QueueError::from)
    }

    async fn delete_item(&self, item_id: Uuid, expected: ItemStatus) -> Result<bool, QueueError> {
        self.conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM queue_items WHERE id = ?1 AND status = ?2",
                    params![item_id.to_string(), expected.as_str()],
                )?;
                Ok(deleted == 1)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn clear_queue(&self, queue_id: Uuid) -> Result<u64, QueueError> {
        self.conn
            .call(move |conn| {
                let deleted = conn.execute(
                    "DELETE FROM queue_items WHERE queue_id = ?1",
                    [queue_id.to_string()],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn reorder_items(
        &self,
        queue_id: Uuid,
        ordered: Vec<Uuid>,
        now: DateTime<Utc>,
    ) -> Result<(), QueueError> {
        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                if !queue_exists(&tx, queue_id)? {
                    return Err(domain(QueueError::QueueNotFound(queue_id)));
                }

                let current: Vec<(String, String, i64)> = {
                    let mut stmt = tx.prepare(
                        "SELECT id, status, position FROM queue_items
                         WHERE queue_id = ?1 ORDER BY position, created_at",
                    )?;
                    let rows = stmt
                        .query_map([queue_id.to_string()], |row| {
                            Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                        })?
                        .collect::<Result<_, _>>()?;
                    rows
                };
                let statuses: HashMap<&str, &str> = current
                    .iter()
                    .map(|(id, status, _)| (id.as_str(), status.as_str()))
                    .collect();

                let mut listed: Vec<String> = Vec::with_capacity(ordered.len());
                let mut seen = HashSet::with_capacity(ordered.len());
                for id in &ordered {
                    let key = id.to_string();
                    if !seen.insert(*id) {
                        return Err(domain(QueueError::validation(format!(
                            "item {id} is listed more than once"
                        ))));
                    }
                    match statuses.get(key.as_str()) {
                        None => {
                            return Err(domain(QueueError::validation(format!(
                                "item {id} is not in queue {queue_id}"
                            ))));
                        }
                        Some(&status) if status == ItemStatus::InProgress.as_str() => {
                            return Err(domain(QueueError::conflict(format!(
                                "item {id} is in_progress and cannot be reordered"
                            ))));
                        }
                        Some(_) => listed.push(key),
                    }
                }

                let listed_set: HashSet<&str> = listed.iter().map(String::as_str).collect();
                let positions: HashMap<&str, i64> = current
                    .iter()
                    .map(|(id, _, position)| (id.as_str(), *position))
                    .collect();
                let final_order = listed.iter().map(String::as_str).chain(
                    current
                        .iter()
                        .map(|(id, _, _)| id.as_str())
                        .filter(|id| !listed_set.contains(id)),
                );

                let at = ts(&now);
                let mut stmt = tx.prepare(
                    "UPDATE queue_items SET position = ?2, updated_at = ?3 WHERE id = ?1",
                )?;
                for (position, id) in final_order.enumerate() {
                    let position = position as i64;
                    if positions.get(id) != Some(&position) {
                        stmt.execute(params![id, position, at])?;
                    }
                }
                drop(stmt);

                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(QueueError::from)
    }

    async fn move_items(
        &self,
        item_ids: Vec<Uuid>,
        target: Uuid,
        positions: Option<Vec<i64>>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Uuid>, QueueError> {
        let sql = format!("SELECT {ITEM_COLUMNS} FROM queue_items WHERE id = ?1");
        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                if !queue_exists(&tx, target)? {
                    return Err(domain(QueueError::QueueNotFound(target)));
                }

                let mut items = Vec::with_capacity(item_ids.len());
                for id in &item_ids {
                    let item = tx
                        .query_row(&sql, [id.to_string()], item_from_row)
                        .optional()?
                        .ok_or_else(|| domain(QueueError::ItemNotFound(*id)))?;
                    if item.status == ItemStatus::InProgress {
                        return Err(domain(QueueError::conflict(format!(
                            "item {id} is in_progress and cannot be moved"
                        ))));
                    }
                    items.push(item);
                }

                let at = ts(&now);
                let target_key = target.to_string();
                let mut sources = Vec::new();
                for (index, item) in items.iter().enumerate() {
                    let key = item.id.to_string();
                    let position = match positions.as_ref().and_then(|p| p.get(index)) {
                        Some(&position) => {
                            tx.execute(
                                "UPDATE queue_items SET position = position + 1
                                 WHERE queue_id = ?1 AND position >= ?2 AND id != ?3",
                                params![target_key, position, key],
                            )?;
                            position
                        }
                        None => next_position(&tx, target)?,
                    };
                    tx.execute(
                        "UPDATE queue_items SET queue_id = ?2, position = ?3, updated_at = ?4 WHERE id = ?1",
                        params![key, target_key, position, at],
                    )?;

                    let event = NewEvent::new(EventKind::Moved)
                        .message(Some(format!("moved from queue {}", item.queue_id)));
                    record_event(&tx, item.id, target, &event, &at)?;

                    if !sources.contains(&item.queue_id) {
                        sources.push(item.queue_id);
                    }
                }

                tx.commit()?;
                Ok(sources)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn reclaim_expired(
        &self,
        cutoff: DateTime<Utc>,
        max_attempts: u32,
        now: DateTime<Utc>,
    ) -> Result<Vec<QueueItem>, QueueError> {
        let sql = format!(
            "SELECT {ITEM_COLUMNS} FROM queue_items
             WHERE status = 'in_progress' AND claimed_at < ?1
             ORDER BY claimed_at"
        );
        self.conn
            .call(move |conn| {
                let tx = immediate(conn)?;
                let expired: Vec<QueueItem> = {
                    let mut stmt = tx.prepare(&sql)?;
                    let rows = stmt
                        .query_map([ts(&cutoff)], item_from_row)?
                        .collect::<Result<_, _>>()?;
                    rows
                };

                let at = ts(&now);
                let mut reclaimed = Vec::with_capacity(expired.len());
                for mut item in expired {
                    let previous_agent = item.agent_id.clone();
                    let exhausted = max_attempts > 0 && item.retry_count >= max_attempts;
                    let kind = if exhausted {
                        item.status = ItemStatus::Failed;
                        item.completed_at = Some(now);
                        item.error_message = Some(CLAIM_TIMED_OUT.to_string());
                        EventKind::Failed
                    } else {
                        item.status = ItemStatus::Queued;
                        item.agent_id = None;
                        item.claimed_at = None;
                        item.retry_count += 1;
                        EventKind::Reclaimed
                    };
                    item.updated_at = now;

                    tx.execute(
                        "UPDATE queue_items
                         SET status = ?2, agent_id = ?3, claimed_at = ?4, completed_at = ?5,
                             error_message = ?6, retry_count = ?7, updated_at = ?8
                         WHERE id = ?1 AND status = 'in_progress'",
                        params![
                            item.id.to_string(),
                            item.status.as_str(),
                            item.agent_id,
                            opt_ts(&item.claimed_at),
                            opt_ts(&item.completed_at),
                            item.error_message,
                            item.retry_count,
                            at
                        ],
                    )?;
                    let event = NewEvent::new(kind)
                        .agent(previous_agent)
                        .message(Some(CLAIM_TIMED_OUT.to_string()));
                    record_event(&tx, item.id, item.queue_id, &event, &at)?;
                    reclaimed.push(item);
                }

                tx.commit()?;
                Ok(reclaimed)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn count_by_status(&self, queue_id: Uuid) -> Result<QueueStats, QueueError> {
        let counts: Vec<(String, u64)> = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT status, COUNT(*) FROM queue_items WHERE queue_id = ?1 GROUP BY status",
                )?;
                let counts = stmt
                    .query_map([queue_id.to_string()], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(counts)
            })
            .await?;

        let mut stats = QueueStats::default();
        for (status, count) in counts {
            stats.add(status.parse()?, count);
        }
        Ok(stats)
    }

    async fn represented_task_ids(
        &self,
        project_id: &str,
        live_only: bool,
    ) -> Result<HashSet<String>, QueueError> {
        let project_id = project_id.to_string();
        self.conn
            .call(move |conn| {
                let mut stmt = conn.prepare(
                    "SELECT DISTINCT i.source_ref_id FROM queue_items i
                     JOIN queues q ON q.id = i.queue_id
                     WHERE q.project_id = ?1
                       AND i.source_type = 'ticket-task'
                       AND i.source_ref_id IS NOT NULL
                       AND (?2 = 0 OR i.status IN ('queued', 'in_progress'))",
                )?;
                let ids = stmt
                    .query_map(params![project_id, live_only], |row| row.get(0))?
                    .collect::<Result<HashSet<String>, _>>()?;
                Ok(ids)
            })
            .await
            .map_err(QueueError::from)
    }

    async fn timeline(
        &self,
        queue_id: Uuid,
        limit: Option<u32>,
    ) -> Result<Vec<TimelineEvent>, QueueError> {
        let columns = EVENT_COLUMNS
            .split(", ")
            .map(|c| format!("e.{c}"))
            .collect::<Vec<_>>()
            .join(", ");
        // Newest first so LIMIT keeps the latest events; reversed below.
        let sql = format!(
            "SELECT {columns} FROM queue_item_events e
             JOIN queue_items i ON i.id = e.item_id
             WHERE i.queue_id = ?1
             ORDER BY e.at DESC, e.seq DESC
             LIMIT ?2"
        );
        let limit = limit.map(i64::from).unwrap_or(-1);

        let mut events = self
            .conn
            .call(move |conn| {
                let mut stmt = conn.prepare(&sql)?;
                let events = stmt
                    .query_map(params![queue_id.to_string(), limit], event_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(events)
            })
            .await?;
        events.reverse();
        Ok(events)
    }
}
