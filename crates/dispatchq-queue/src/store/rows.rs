//! Row mapping between SQLite and the entity types.

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use rusqlite::types::Type;
use uuid::Uuid;

use crate::error::QueueError;
use crate::item::QueueItem;
use crate::queue::Queue;
use crate::timeline::TimelineEvent;

pub const QUEUE_COLUMNS: &str = "id, project_id, name, description, status, created_at, updated_at";

pub const ITEM_COLUMNS: &str = "id, queue_id, source_type, source_ref_id, ticket_id, title, payload, \
     status, priority, position, agent_id, claimed_at, completed_at, error_message, retry_count, \
     created_at, updated_at";

pub const EVENT_COLUMNS: &str = "seq, item_id, queue_id, kind, agent_id, message, at";

/// Fixed-width UTC text, so stored timestamps compare lexically.
pub fn ts(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn opt_ts(at: &Option<DateTime<Utc>>) -> Option<String> {
    at.as_ref().map(ts)
}

fn conversion_error<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: Into<Box<dyn std::error::Error + Send + Sync>>,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, err.into())
}

fn get_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e))
}

fn parse_time(idx: usize, raw: &str) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e))
}

fn get_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    parse_time(idx, &raw)
}

fn get_opt_time(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|raw| parse_time(idx, &raw)).transpose()
}

fn get_parsed<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: FromStr<Err = QueueError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|e: QueueError| conversion_error(idx, e))
}

/// Map a row selected with [`QUEUE_COLUMNS`].
pub fn queue_from_row(row: &Row<'_>) -> rusqlite::Result<Queue> {
    Ok(Queue {
        id: get_uuid(row, 0)?,
        project_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        status: get_parsed(row, 4)?,
        created_at: get_time(row, 5)?,
        updated_at: get_time(row, 6)?,
    })
}

/// Map a row selected with [`ITEM_COLUMNS`].
pub fn item_from_row(row: &Row<'_>) -> rusqlite::Result<QueueItem> {
    let payload: String = row.get(6)?;
    Ok(QueueItem {
        id: get_uuid(row, 0)?,
        queue_id: get_uuid(row, 1)?,
        source_type: get_parsed(row, 2)?,
        source_ref_id: row.get(3)?,
        ticket_id: row.get(4)?,
        title: row.get(5)?,
        payload: serde_json::from_str(&payload).map_err(|e| conversion_error(6, e))?,
        status: get_parsed(row, 7)?,
        priority: row.get(8)?,
        position: row.get(9)?,
        agent_id: row.get(10)?,
        claimed_at: get_opt_time(row, 11)?,
        completed_at: get_opt_time(row, 12)?,
        error_message: row.get(13)?,
        retry_count: row.get(14)?,
        created_at: get_time(row, 15)?,
        updated_at: get_time(row, 16)?,
    })
}

/// Map a row selected with [`EVENT_COLUMNS`].
pub fn event_from_row(row: &Row<'_>) -> rusqlite::Result<TimelineEvent> {
    Ok(TimelineEvent {
        seq: row.get(0)?,
        item_id: get_uuid(row, 1)?,
        queue_id: get_uuid(row, 2)?,
        kind: get_parsed(row, 3)?,
        agent_id: row.get(4)?,
        message: row.get(5)?,
        at: get_time(row, 6)?,
    })
}
