//! HTTP route definitions.

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::http::{items, monitoring, queues};
use crate::state::AppState;

/// Create the router.
///
/// ## Route Structure
///
/// ```text
/// /projects/{project_id}
///   GET    /queues            - Queues with stats (?status=)
///   POST   /queues            - Create queue
///   GET    /unqueued          - Ticket tasks without queue items
///
/// /queues/{queue_id}
///   GET|PATCH|DELETE          - Read, rename, delete
///   POST   /pause, /resume
///   GET    /stats
///   GET    /timeline          - (?limit=)
///   GET    /items             - (?status=)
///   POST   /items             - Enqueue one item
///   POST   /items/batch       - Enqueue several items
///   DELETE /items             - Clear the queue
///   POST   /tickets           - Enqueue a ticket's pending tasks
///   POST   /next              - Claim the next item (204 if none)
///   POST   /reorder
///
/// /items
///   GET|PATCH|DELETE /{item_id}  - (?force=true on delete)
///   POST   /batch-update
///   POST   /move
///
/// /health, /livez
/// ```
pub fn create_router(state: Arc<AppState>) -> Router {
    let project_routes = Router::new()
        .route(
            "/{project_id}/queues",
            get(queues::list_project_queues).post(queues::create_queue),
        )
        .route("/{project_id}/unqueued", get(queues::list_unqueued));

    let queue_routes = Router::new()
        .route(
            "/{queue_id}",
            get(queues::get_queue)
                .patch(queues::update_queue)
                .delete(queues::delete_queue),
        )
        .route("/{queue_id}/pause", post(queues::pause_queue))
        .route("/{queue_id}/resume", post(queues::resume_queue))
        .route("/{queue_id}/stats", get(queues::queue_stats))
        .route("/{queue_id}/timeline", get(queues::queue_timeline))
        .route(
            "/{queue_id}/items",
            get(items::list_items)
                .post(queues::enqueue_item)
                .delete(queues::clear_queue),
        )
        .route("/{queue_id}/items/batch", post(queues::batch_enqueue))
        .route("/{queue_id}/tickets", post(queues::enqueue_ticket))
        .route("/{queue_id}/next", post(queues::next_task))
        .route("/{queue_id}/reorder", post(queues::reorder_items));

    let item_routes = Router::new()
        .route("/batch-update", post(items::batch_update))
        .route("/move", post(items::move_items))
        .route(
            "/{item_id}",
            get(items::get_item)
                .patch(items::update_item)
                .delete(items::delete_item),
        );

    Router::new()
        .nest("/projects", project_routes)
        .nest("/queues", queue_routes)
        .nest("/items", item_routes)
        .route("/health", get(monitoring::health_check))
        .route("/livez", get(monitoring::liveness_probe))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[cfg(test)]
#[path = "routes_tests.rs"]
mod tests;
