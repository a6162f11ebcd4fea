//! Read-only access to tickets and their task lists.
//!
//! Tickets are authored elsewhere; the engine only reads them to expand
//! pending tasks into queue items.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::error::QueueError;

/// Ticket priority as set by its author.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
}

/// One step of a ticket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketTask {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    pub content: String,
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub order_index: i64,
}

impl TicketTask {
    pub fn new(id: impl Into<String>, content: impl Into<String>, order_index: i64) -> Self {
        Self {
            id: id.into(),
            content: content.into(),
            done: false,
            order_index,
        }
    }

    pub fn done(mut self) -> Self {
        self.done = true;
        self
    }
}

/// A ticket with its tasks in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(deserialize_with = "id_string")]
    pub id: String,
    #[serde(deserialize_with = "id_string")]
    pub project_id: String,
    pub title: String,
    #[serde(default)]
    pub priority: TicketPriority,
    #[serde(default = "default_ticket_status")]
    pub status: String,
    #[serde(default)]
    pub tasks: Vec<TicketTask>,
}

fn default_ticket_status() -> String {
    "open".to_string()
}

impl Ticket {
    pub fn new(id: impl Into<String>, project_id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            project_id: project_id.into(),
            title: title.into(),
            priority: TicketPriority::default(),
            status: default_ticket_status(),
            tasks: Vec::new(),
        }
    }

    pub fn with_tasks(mut self, tasks: Vec<TicketTask>) -> Self {
        self.tasks = tasks;
        sort_tasks(&mut self.tasks);
        self
    }

    /// Undone tasks in order.
    pub fn pending_tasks(&self) -> impl Iterator<Item = &TicketTask> {
        self.tasks.iter().filter(|task| !task.done)
    }
}

/// Ascending `orderIndex`, ties by id.
fn sort_tasks(tasks: &mut [TicketTask]) {
    tasks.sort_by(|a, b| a.order_index.cmp(&b.order_index).then_with(|| a.id.cmp(&b.id)));
}

/// Ids appear as numbers or strings depending on who wrote the file.
fn id_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawId {
        Number(i64),
        Text(String),
    }

    Ok(match RawId::deserialize(deserializer)? {
        RawId::Number(n) => n.to_string(),
        RawId::Text(s) => s,
    })
}

/// Source of tickets and projects.
#[async_trait]
pub trait TicketSource: Send + Sync {
    /// Whether the project exists.
    async fn project_exists(&self, project_id: &str) -> Result<bool, QueueError>;

    /// Load a ticket with its tasks sorted.
    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, QueueError>;

    /// All tickets of a project.
    async fn list_tickets(&self, project_id: &str) -> Result<Vec<Ticket>, QueueError>;
}

/// In-process ticket source.
#[derive(Default)]
pub struct MemoryTicketSource {
    projects: RwLock<Vec<String>>,
    tickets: RwLock<HashMap<String, Ticket>>,
}

impl MemoryTicketSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn add_project(&self, project_id: impl Into<String>) {
        let project_id = project_id.into();
        let mut projects = self.projects.write().await;
        if !projects.contains(&project_id) {
            projects.push(project_id);
        }
    }

    /// Insert or replace a ticket. Its project is registered too.
    pub async fn put_ticket(&self, mut ticket: Ticket) {
        sort_tasks(&mut ticket.tasks);
        self.add_project(ticket.project_id.clone()).await;
        self.tickets.write().await.insert(ticket.id.clone(), ticket);
    }
}

#[async_trait]
impl TicketSource for MemoryTicketSource {
    async fn project_exists(&self, project_id: &str) -> Result<bool, QueueError> {
        Ok(self.projects.read().await.iter().any(|p| p == project_id))
    }

    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, QueueError> {
        Ok(self.tickets.read().await.get(ticket_id).cloned())
    }

    async fn list_tickets(&self, project_id: &str) -> Result<Vec<Ticket>, QueueError> {
        let tickets = self.tickets.read().await;
        let mut result: Vec<Ticket> = tickets
            .values()
            .filter(|t| t.project_id == project_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(result)
    }
}

/// Ticket source reading the ticket service's JSON files.
///
/// ```text
/// {storage_path}/
/// ├── tickets.json                  # { "<ticketId>": Ticket }
/// └── ticket_data/
///     └── {ticketId}/
///         └── tasks.json            # { "<taskId>": TicketTask }
/// {projects_index}                  # { "<projectId>": {...} }
/// ```
///
/// Missing files read as empty.
pub struct FileTicketSource {
    storage_path: PathBuf,
    projects_index: PathBuf,
}

/// Ticket entry in `tickets.json`; tasks live in a separate file.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredTicket {
    #[serde(deserialize_with = "id_string")]
    project_id: String,
    title: String,
    #[serde(default)]
    priority: TicketPriority,
    #[serde(default = "default_ticket_status")]
    status: String,
}

impl FileTicketSource {
    pub fn new(storage_path: impl Into<PathBuf>, projects_index: impl Into<PathBuf>) -> Self {
        Self {
            storage_path: storage_path.into(),
            projects_index: projects_index.into(),
        }
    }

    async fn read_map<T>(path: &Path) -> Result<HashMap<String, T>, QueueError>
    where
        T: for<'de> Deserialize<'de>,
    {
        let content = match tokio::fs::read_to_string(path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("{} does not exist, treating as empty", path.display());
                return Ok(HashMap::new());
            }
            Err(e) => {
                return Err(QueueError::storage(format!(
                    "Failed to read {}: {}",
                    path.display(),
                    e
                )));
            }
        };

        serde_json::from_str(&content).map_err(|e| {
            warn!("Malformed ticket data in {}: {}", path.display(), e);
            QueueError::storage(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    async fn read_tickets(&self) -> Result<HashMap<String, StoredTicket>, QueueError> {
        Self::read_map(&self.storage_path.join("tickets.json")).await
    }

    async fn read_tasks(&self, ticket_id: &str) -> Result<Vec<TicketTask>, QueueError> {
        let path = self
            .storage_path
            .join("ticket_data")
            .join(ticket_id)
            .join("tasks.json");
        let tasks: HashMap<String, TicketTask> = Self::read_map(&path).await?;
        let mut tasks: Vec<TicketTask> = tasks.into_values().collect();
        sort_tasks(&mut tasks);
        Ok(tasks)
    }

    async fn load(&self, ticket_id: String, stored: StoredTicket) -> Result<Ticket, QueueError> {
        let tasks = self.read_tasks(&ticket_id).await?;
        Ok(Ticket {
            id: ticket_id,
            project_id: stored.project_id,
            title: stored.title,
            priority: stored.priority,
            status: stored.status,
            tasks,
        })
    }
}

#[async_trait]
impl TicketSource for FileTicketSource {
    async fn project_exists(&self, project_id: &str) -> Result<bool, QueueError> {
        let projects: HashMap<String, serde_json::Value> = Self::read_map(&self.projects_index).await?;
        Ok(projects.contains_key(project_id))
    }

    async fn get_ticket(&self, ticket_id: &str) -> Result<Option<Ticket>, QueueError> {
        let mut tickets = self.read_tickets().await?;
        match tickets.remove(ticket_id) {
            Some(stored) => Ok(Some(self.load(ticket_id.to_string(), stored).await?)),
            None => Ok(None),
        }
    }

    async fn list_tickets(&self, project_id: &str) -> Result<Vec<Ticket>, QueueError> {
        let tickets = self.read_tickets().await?;
        let mut ids: Vec<String> = tickets
            .iter()
            .filter(|(_, t)| t.project_id == project_id)
            .map(|(id, _)| id.clone())
            .collect();
        ids.sort();

        let mut tickets = tickets;
        let mut result = Vec::with_capacity(ids.len());
        for id in ids {
            if let Some(stored) = tickets.remove(&id) {
                result.push(self.load(id, stored).await?);
            }
        }
        Ok(result)
    }
}

#[cfg(test)]
#[path = "ticket_tests.rs"]
mod tests;
