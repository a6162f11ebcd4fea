//! Queue, enqueue and dispatch handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use dispatchq_queue::{
    NewItem, Queue, QueueItem, QueuePatch, QueueStats, QueueStatus, QueueWithStats, TimelineEvent,
    UnqueuedTask,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;
use crate::state::AppState;

/// Request to create a queue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateQueueRequest {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// `?status=` filter for queue listings.
#[derive(Debug, Default, Deserialize)]
pub struct QueueFilter {
    pub status: Option<QueueStatus>,
}

/// `?limit=` for timelines.
#[derive(Debug, Default, Deserialize)]
pub struct TimelineQuery {
    pub limit: Option<u32>,
}

/// Request to enqueue a ticket's tasks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnqueueTicketRequest {
    pub ticket_id: String,
    #[serde(default)]
    pub priority: Option<i64>,
}

/// Request to enqueue several items.
#[derive(Debug, Deserialize)]
pub struct BatchEnqueueRequest {
    pub items: Vec<NewItem>,
}

/// Request for the next task.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NextTaskRequest {
    pub agent_id: String,
}

/// Request to reorder a queue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReorderRequest {
    pub item_ids: Vec<Uuid>,
}

/// Number of items removed.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemovedResponse {
    pub removed_items: u64,
}

/// GET /projects/{project_id}/queues
pub async fn list_project_queues(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Query(filter): Query<QueueFilter>,
) -> Result<Json<Vec<QueueWithStats>>, ApiError> {
    let mut queues = state.engine.get_queues_with_stats(&project_id).await?;
    if let Some(status) = filter.status {
        queues.retain(|q| q.queue.status == status);
    }
    Ok(Json(queues))
}

/// POST /projects/{project_id}/queues
pub async fn create_queue(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
    Json(req): Json<CreateQueueRequest>,
) -> Result<(StatusCode, Json<Queue>), ApiError> {
    let queue = state
        .engine
        .create_queue(&project_id, &req.name, req.description)
        .await?;
    Ok((StatusCode::CREATED, Json(queue)))
}

/// GET /projects/{project_id}/unqueued
pub async fn list_unqueued(
    State(state): State<Arc<AppState>>,
    Path(project_id): Path<String>,
) -> Result<Json<Vec<UnqueuedTask>>, ApiError> {
    Ok(Json(state.engine.get_unqueued_items(&project_id).await?))
}

/// GET /queues/{queue_id}
pub async fn get_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Queue>, ApiError> {
    Ok(Json(state.engine.get_queue(queue_id).await?))
}

/// PATCH /queues/{queue_id}
pub async fn update_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Json(patch): Json<QueuePatch>,
) -> Result<Json<Queue>, ApiError> {
    Ok(Json(state.engine.update_queue(queue_id, patch).await?))
}

/// DELETE /queues/{queue_id}
pub async fn delete_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed_items = state.engine.delete_queue(queue_id).await?;
    Ok(Json(RemovedResponse { removed_items }))
}

/// POST /queues/{queue_id}/pause
pub async fn pause_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Queue>, ApiError> {
    Ok(Json(state.engine.pause_queue(queue_id).await?))
}

/// POST /queues/{queue_id}/resume
pub async fn resume_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<Queue>, ApiError> {
    Ok(Json(state.engine.resume_queue(queue_id).await?))
}

/// GET /queues/{queue_id}/stats
pub async fn queue_stats(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<QueueStats>, ApiError> {
    Ok(Json(state.engine.get_queue_stats(queue_id).await?))
}

/// GET /queues/{queue_id}/timeline
pub async fn queue_timeline(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Query(query): Query<TimelineQuery>,
) -> Result<Json<Vec<TimelineEvent>>, ApiError> {
    Ok(Json(state.engine.get_queue_timeline(queue_id, query.limit).await?))
}

/// POST /queues/{queue_id}/items
pub async fn enqueue_item(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Json(item): Json<NewItem>,
) -> Result<(StatusCode, Json<QueueItem>), ApiError> {
    let item = state.engine.enqueue_item(queue_id, item).await?;
    Ok((StatusCode::CREATED, Json(item)))
}

/// POST /queues/{queue_id}/items/batch
pub async fn batch_enqueue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Json(req): Json<BatchEnqueueRequest>,
) -> Result<(StatusCode, Json<Vec<QueueItem>>), ApiError> {
    let items = state.engine.batch_enqueue(queue_id, req.items).await?;
    Ok((StatusCode::CREATED, Json(items)))
}

/// DELETE /queues/{queue_id}/items
pub async fn clear_queue(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
) -> Result<Json<RemovedResponse>, ApiError> {
    let removed_items = state.engine.clear_queue(queue_id).await?;
    Ok(Json(RemovedResponse { removed_items }))
}

/// POST /queues/{queue_id}/tickets
pub async fn enqueue_ticket(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Json(req): Json<EnqueueTicketRequest>,
) -> Result<(StatusCode, Json<Vec<QueueItem>>), ApiError> {
    let items = state
        .engine
        .enqueue_ticket(queue_id, &req.ticket_id, req.priority)
        .await?;
    Ok((StatusCode::CREATED, Json(items)))
}

/// POST /queues/{queue_id}/next
///
/// 200 with the claimed item, or 204 when there is nothing to hand out.
pub async fn next_task(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Json(req): Json<NextTaskRequest>,
) -> Result<Response, ApiError> {
    match state.engine.get_next_task(queue_id, &req.agent_id).await? {
        Some(item) => Ok(Json(item).into_response()),
        None => Ok(StatusCode::NO_CONTENT.into_response()),
    }
}

/// POST /queues/{queue_id}/reorder
pub async fn reorder_items(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Json(req): Json<ReorderRequest>,
) -> Result<StatusCode, ApiError> {
    state.engine.reorder_queue_items(queue_id, req.item_ids).await?;
    Ok(StatusCode::NO_CONTENT)
}
