//! # dispatchq queue engine
//!
//! Work queues for autonomous coding agents.
//!
//! ## Features
//!
//! - Project-scoped queues that can be paused and resumed
//! - Ticket expansion into ordered queue items
//! - Atomic claim: one item, one agent
//! - Item state machine with compare-and-swap updates
//! - Reordering and cross-queue moves
//! - Stale claim reaper
//! - Per-queue statistics and item timelines (SQLite)

pub mod config;
pub mod dispatch;
pub mod engine;
pub mod error;
pub mod expander;
pub mod item;
pub mod lifecycle;
pub mod manager;
pub mod queue;
pub mod reaper;
pub mod reorg;
pub mod retry;
pub mod stats;
pub mod store;
pub mod ticket;
pub mod timeline;

#[cfg(test)]
pub(crate) mod test_support;

pub use config::{EngineConfig, PriorityOrder};
pub use engine::QueueEngine;
pub use error::{ErrorKind, QueueError};
pub use expander::UnqueuedTask;
pub use item::{ItemPatch, ItemStatus, ItemUpdate, NewItem, QueueItem, SourceType};
pub use queue::{Queue, QueuePatch, QueueStatus};
pub use retry::RetryPolicy;
pub use stats::{QueueStats, QueueWithStats};
pub use store::{QueueStore, SqliteQueueStore};
pub use ticket::{FileTicketSource, MemoryTicketSource, Ticket, TicketPriority, TicketSource, TicketTask};
pub use timeline::{EventKind, TimelineEvent};
