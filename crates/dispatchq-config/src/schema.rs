//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub dispatch: DispatchConfig,

    #[serde(default)]
    pub reaper: ReaperConfig,

    #[serde(default)]
    pub stats: StatsConfig,

    #[serde(default)]
    pub tickets: TicketsConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8686
}

/// Queue store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database file. `:memory:` keeps everything in process.
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,

    /// How long SQLite waits on a locked database before reporting busy.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    /// Retries for transient (busy/locked) storage failures.
    #[serde(default = "default_storage_retries")]
    pub max_retries: u32,

    /// First retry delay; doubled per attempt.
    #[serde(default = "default_retry_base_delay_ms")]
    pub retry_base_delay_ms: u64,

    /// Upper bound for a single retry delay.
    #[serde(default = "default_retry_max_delay_ms")]
    pub retry_max_delay_ms: u64,
}

impl StorageConfig {
    pub fn is_in_memory(&self) -> bool {
        self.database_path.as_os_str() == ":memory:"
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            max_retries: default_storage_retries(),
            retry_base_delay_ms: default_retry_base_delay_ms(),
            retry_max_delay_ms: default_retry_max_delay_ms(),
        }
    }
}

fn default_database_path() -> PathBuf {
    dispatchq_home().join("queue.db")
}

fn default_busy_timeout_ms() -> u64 {
    5000
}

fn default_storage_retries() -> u32 {
    3
}

fn default_retry_base_delay_ms() -> u64 {
    50
}

fn default_retry_max_delay_ms() -> u64 {
    2000
}

/// Which end of the priority scale is served first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriorityOrder {
    /// Larger priority values are dispatched first.
    #[default]
    HigherFirst,
    /// Smaller priority values are dispatched first.
    LowerFirst,
}

/// Dispatch configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DispatchConfig {
    #[serde(default)]
    pub priority_order: PriorityOrder,

    /// Priority used when an enqueue request does not carry one.
    #[serde(default = "default_priority")]
    pub default_priority: i64,

    #[serde(default = "default_min_priority")]
    pub min_priority: i64,

    #[serde(default = "default_max_priority")]
    pub max_priority: i64,
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            priority_order: PriorityOrder::default(),
            default_priority: default_priority(),
            min_priority: default_min_priority(),
            max_priority: default_max_priority(),
        }
    }
}

fn default_priority() -> i64 {
    5
}

fn default_min_priority() -> i64 {
    0
}

fn default_max_priority() -> i64 {
    10
}

/// Background reclaim of abandoned claims.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReaperConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_reaper_interval")]
    pub interval_secs: u64,

    /// Claims older than this are considered lost.
    #[serde(default = "default_claim_timeout")]
    pub claim_timeout_secs: u64,

    /// Retry budget for reclaimed items (0 = unlimited).
    #[serde(default)]
    pub max_attempts: u32,
}

impl Default for ReaperConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            interval_secs: default_reaper_interval(),
            claim_timeout_secs: default_claim_timeout(),
            max_attempts: 0,
        }
    }
}

fn default_reaper_interval() -> u64 {
    30
}

fn default_claim_timeout() -> u64 {
    1800
}

/// Statistics read cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsConfig {
    /// Cache lifetime for dashboard stats (0 disables caching).
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            cache_ttl_ms: default_cache_ttl_ms(),
        }
    }
}

fn default_cache_ttl_ms() -> u64 {
    2000
}

/// Location of the ticket store the expander reads from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketsConfig {
    /// Directory with `tickets.json` and `ticket_data/<id>/tasks.json`.
    #[serde(default = "default_tickets_path")]
    pub storage_path: PathBuf,

    /// Project index file.
    #[serde(default = "default_projects_index")]
    pub projects_index: PathBuf,
}

impl Default for TicketsConfig {
    fn default() -> Self {
        Self {
            storage_path: default_tickets_path(),
            projects_index: default_projects_index(),
        }
    }
}

fn default_tickets_path() -> PathBuf {
    PathBuf::from("data").join("ticket_storage")
}

fn default_projects_index() -> PathBuf {
    PathBuf::from("data").join("project_storage").join("projects.json")
}

/// Log output configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_dir")]
    pub directory: PathBuf,

    #[serde(default = "default_log_prefix")]
    pub file_prefix: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_log_dir(),
            file_prefix: default_log_prefix(),
        }
    }
}

fn default_log_dir() -> PathBuf {
    dispatchq_home().join("logs")
}

fn default_log_prefix() -> String {
    "dispatchq".to_string()
}

fn default_true() -> bool {
    true
}

/// The `~/.dispatchq` directory.
pub fn dispatchq_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".dispatchq")
}
