//! Database schema management.

use rusqlite::Connection;
use tokio_rusqlite::Error;

/// Initialize the database schema.
pub fn init_schema(conn: &Connection) -> Result<(), Error> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS queues (
    id TEXT PRIMARY KEY,
    project_id TEXT NOT NULL,
    name TEXT NOT NULL,
    description TEXT,
    status TEXT NOT NULL DEFAULT 'active' CHECK (status IN ('active', 'paused')),
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE (project_id, name)
);

-- Positions are kept ordered by the store, not by a unique index:
-- shifting a range of positions passes through duplicates.
CREATE TABLE IF NOT EXISTS queue_items (
    id TEXT PRIMARY KEY,
    queue_id TEXT NOT NULL REFERENCES queues(id) ON DELETE CASCADE,
    source_type TEXT NOT NULL CHECK (source_type IN ('ticket-task', 'adhoc')),
    source_ref_id TEXT,
    ticket_id TEXT,
    title TEXT NOT NULL,
    payload TEXT NOT NULL DEFAULT 'null',
    status TEXT NOT NULL CHECK (status IN ('queued', 'in_progress', 'completed', 'failed', 'cancelled')),
    priority INTEGER NOT NULL,
    position INTEGER NOT NULL,
    agent_id TEXT,
    claimed_at TEXT,
    completed_at TEXT,
    error_message TEXT,
    retry_count INTEGER NOT NULL DEFAULT 0,
    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS queue_item_events (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    item_id TEXT NOT NULL REFERENCES queue_items(id) ON DELETE CASCADE,
    queue_id TEXT NOT NULL,
    kind TEXT NOT NULL,
    agent_id TEXT,
    message TEXT,
    at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_items_dispatch ON queue_items(queue_id, status, priority, position);
CREATE INDEX IF NOT EXISTS idx_items_source_ref ON queue_items(source_ref_id);
CREATE INDEX IF NOT EXISTS idx_items_claimed ON queue_items(status, claimed_at);
CREATE INDEX IF NOT EXISTS idx_events_item ON queue_item_events(item_id);
"#;
