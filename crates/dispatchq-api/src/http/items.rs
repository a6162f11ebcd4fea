//! Item handlers.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use dispatchq_queue::{ItemPatch, ItemStatus, ItemUpdate, QueueItem};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{ApiError, ErrorResponse};
use crate::state::AppState;

/// `?status=` filter for item listings.
#[derive(Debug, Default, Deserialize)]
pub struct ItemFilter {
    pub status: Option<ItemStatus>,
}

/// `?force=true` on delete.
#[derive(Debug, Default, Deserialize)]
pub struct DeleteQuery {
    #[serde(default)]
    pub force: bool,
}

/// Request to apply several item updates.
#[derive(Debug, Deserialize)]
pub struct BatchUpdateRequest {
    pub updates: Vec<ItemUpdate>,
}

/// Outcome of one update in a batch.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchUpdateResult {
    pub item_id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item: Option<QueueItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorResponse>,
}

/// Request to move items to another queue.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MoveItemsRequest {
    pub item_ids: Vec<Uuid>,
    pub target_queue_id: Uuid,
    #[serde(default)]
    pub positions: Option<Vec<i64>>,
}

/// GET /queues/{queue_id}/items
pub async fn list_items(
    State(state): State<Arc<AppState>>,
    Path(queue_id): Path<Uuid>,
    Query(filter): Query<ItemFilter>,
) -> Result<Json<Vec<QueueItem>>, ApiError> {
    Ok(Json(state.engine.list_items(queue_id, filter.status).await?))
}

/// GET /items/{item_id}
pub async fn get_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
) -> Result<Json<QueueItem>, ApiError> {
    Ok(Json(state.engine.get_item(item_id).await?))
}

/// PATCH /items/{item_id}
pub async fn update_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Json(patch): Json<ItemPatch>,
) -> Result<Json<QueueItem>, ApiError> {
    Ok(Json(state.engine.update_queue_item(item_id, patch).await?))
}

/// DELETE /items/{item_id}
pub async fn delete_item(
    State(state): State<Arc<AppState>>,
    Path(item_id): Path<Uuid>,
    Query(query): Query<DeleteQuery>,
) -> Result<Json<QueueItem>, ApiError> {
    Ok(Json(state.engine.delete_queue_item(item_id, query.force).await?))
}

/// POST /items/batch-update
///
/// Always 200; each entry carries its own item or error.
pub async fn batch_update(
    State(state): State<Arc<AppState>>,
    Json(req): Json<BatchUpdateRequest>,
) -> Json<Vec<BatchUpdateResult>> {
    let ids: Vec<Uuid> = req.updates.iter().map(|u| u.item_id).collect();
    let results = state.engine.batch_update_items(req.updates).await;

    let body = ids
        .into_iter()
        .zip(results)
        .map(|(item_id, result)| match result {
            Ok(item) => BatchUpdateResult {
                item_id,
                item: Some(item),
                error: None,
            },
            Err(e) => {
                let err = ApiError::from(e);
                let (_, code) = err.status();
                BatchUpdateResult {
                    item_id,
                    item: None,
                    error: Some(ErrorResponse::new(err.to_string(), code)),
                }
            }
        })
        .collect();
    Json(body)
}

/// POST /items/move
pub async fn move_items(
    State(state): State<Arc<AppState>>,
    Json(req): Json<MoveItemsRequest>,
) -> Result<StatusCode, ApiError> {
    state
        .engine
        .bulk_move_items(req.item_ids, req.target_queue_id, req.positions)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
