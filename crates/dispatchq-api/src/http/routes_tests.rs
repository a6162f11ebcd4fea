use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use dispatchq_queue::{
    EngineConfig, MemoryTicketSource, QueueEngine, RetryPolicy, SqliteQueueStore, Ticket, TicketTask,
};
use serde_json::{json, Value};
use tower::ServiceExt;

async fn create_test_router() -> Router {
    let store = Arc::new(SqliteQueueStore::in_memory().await.unwrap());
    let tickets = Arc::new(MemoryTicketSource::new());
    tickets.add_project("proj-1").await;
    tickets
        .put_ticket(Ticket::new("42", "proj-1", "Add login flow").with_tasks(vec![
            TicketTask::new("t1", "add route", 0),
            TicketTask::new("t2", "write handler", 1),
            TicketTask::new("t3", "add tests", 2),
            TicketTask::new("t4", "spike", 3).done(),
        ]))
        .await;
    let config = EngineConfig {
        stats_cache_ttl: std::time::Duration::ZERO,
        retry: RetryPolicy::none(),
        ..EngineConfig::default()
    };
    let engine = QueueEngine::new(store, tickets, config);
    create_router(Arc::new(AppState::new(Arc::new(engine))))
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn create_queue(app: &Router, name: &str) -> String {
    let (status, body) = send(app, "POST", "/projects/proj-1/queues", Some(json!({"name": name}))).await;
    assert_eq!(status, StatusCode::CREATED);
    body["id"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_router().await;
    let (status, body) = send(&app, "GET", "/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["components"][0]["name"], "storage");

    let (status, _) = send(&app, "GET", "/livez", None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_dispatch_flow() {
    let app = create_test_router().await;
    let queue = create_queue(&app, "build-queue").await;

    let (status, items) = send(
        &app,
        "POST",
        &format!("/queues/{queue}/tickets"),
        Some(json!({"ticketId": "42"})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(items.as_array().unwrap().len(), 3);
    assert_eq!(items[0]["sourceType"], "ticket-task");

    let (status, first) = send(&app, "POST", &format!("/queues/{queue}/next"), Some(json!({"agentId": "a1"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(first["sourceRefId"], "t1");
    assert_eq!(first["status"], "in_progress");
    assert_eq!(first["agentId"], "a1");

    let (_, second) = send(&app, "POST", &format!("/queues/{queue}/next"), Some(json!({"agentId": "a2"}))).await;
    assert_eq!(second["sourceRefId"], "t2");

    let item_id = first["id"].as_str().unwrap();
    let (status, done) = send(
        &app,
        "PATCH",
        &format!("/items/{item_id}"),
        Some(json!({"status": "completed", "agentId": "a1"})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(done["status"], "completed");

    let (_, stats) = send(&app, "GET", &format!("/queues/{queue}/stats"), None).await;
    assert_eq!(stats["completed"], 1);
    assert_eq!(stats["inProgress"], 1);
    assert_eq!(stats["queued"], 1);

    let (_, overview) = send(&app, "GET", "/projects/proj-1/queues", None).await;
    assert_eq!(overview[0]["name"], "build-queue");
    assert_eq!(overview[0]["stats"]["total"], 3);

    let (_, timeline) = send(&app, "GET", &format!("/queues/{queue}/timeline?limit=1"), None).await;
    assert_eq!(timeline[0]["kind"], "completed");
}

#[tokio::test]
async fn test_next_on_empty_queue_is_no_content() {
    let app = create_test_router().await;
    let queue = create_queue(&app, "empty").await;

    let (status, body) = send(&app, "POST", &format!("/queues/{queue}/next"), Some(json!({"agentId": "a1"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(body, Value::Null);
}

#[tokio::test]
async fn test_error_status_codes() {
    let app = create_test_router().await;
    let queue = create_queue(&app, "main").await;

    let (status, body) = send(&app, "GET", &format!("/queues/{}", uuid::Uuid::new_v4()), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "not_found");

    let (status, body) = send(&app, "POST", "/projects/proj-1/queues", Some(json!({"name": "main"}))).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "conflict");

    let (status, body) = send(&app, "POST", &format!("/queues/{queue}/items"), Some(json!({"title": "  "}))).await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(body["code"], "validation");

    let (_, item) = send(&app, "POST", &format!("/queues/{queue}/items"), Some(json!({"title": "work"}))).await;
    let (status, _) = send(
        &app,
        "PATCH",
        &format!("/items/{}", item["id"].as_str().unwrap()),
        Some(json!({"status": "completed"})),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn test_paused_queue_and_status_filter() {
    let app = create_test_router().await;
    let active = create_queue(&app, "active").await;
    let paused = create_queue(&app, "paused").await;
    send(&app, "POST", &format!("/queues/{paused}/items"), Some(json!({"title": "work"}))).await;

    let (status, body) = send(&app, "POST", &format!("/queues/{paused}/pause"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "paused");

    let (status, _) = send(&app, "POST", &format!("/queues/{paused}/next"), Some(json!({"agentId": "a1"}))).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, listed) = send(&app, "GET", "/projects/proj-1/queues?status=active", None).await;
    let ids: Vec<_> = listed.as_array().unwrap().iter().map(|q| q["id"].clone()).collect();
    assert_eq!(ids, vec![json!(active)]);
}

#[tokio::test]
async fn test_items_reorder_move_and_delete() {
    let app = create_test_router().await;
    let source = create_queue(&app, "source").await;
    let target = create_queue(&app, "target").await;

    let (status, items) = send(
        &app,
        "POST",
        &format!("/queues/{source}/items/batch"),
        Some(json!({"items": [{"title": "a"}, {"title": "b"}, {"title": "c"}]})),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let ids: Vec<String> = items
        .as_array()
        .unwrap()
        .iter()
        .map(|i| i["id"].as_str().unwrap().to_string())
        .collect();

    let (status, _) = send(
        &app,
        "POST",
        &format!("/queues/{source}/reorder"),
        Some(json!({"itemIds": [ids[2], ids[1]]})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, listed) = send(&app, "GET", &format!("/queues/{source}/items?status=queued"), None).await;
    let titles: Vec<_> = listed.as_array().unwrap().iter().map(|i| i["title"].clone()).collect();
    assert_eq!(titles, vec![json!("c"), json!("b"), json!("a")]);

    let (status, _) = send(
        &app,
        "POST",
        "/items/move",
        Some(json!({"itemIds": [ids[0]], "targetQueueId": target})),
    )
    .await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    let (_, moved) = send(&app, "GET", &format!("/items/{}", ids[0]), None).await;
    assert_eq!(moved["queueId"], json!(target));

    let (status, deleted) = send(&app, "DELETE", &format!("/items/{}", ids[0]), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["title"], "a");

    let (status, cleared) = send(&app, "DELETE", &format!("/queues/{source}/items"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(cleared["removedItems"], 2);
}

#[tokio::test]
async fn test_force_delete_claimed_item() {
    let app = create_test_router().await;
    let queue = create_queue(&app, "main").await;
    send(&app, "POST", &format!("/queues/{queue}/items"), Some(json!({"title": "work"}))).await;
    let (_, item) = send(&app, "POST", &format!("/queues/{queue}/next"), Some(json!({"agentId": "a1"}))).await;
    let item_id = item["id"].as_str().unwrap();

    let (status, _) = send(&app, "DELETE", &format!("/items/{item_id}"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    let (status, _) = send(&app, "DELETE", &format!("/items/{item_id}?force=true"), None).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_batch_update_reports_per_item() {
    let app = create_test_router().await;
    let queue = create_queue(&app, "main").await;
    let (_, item) = send(&app, "POST", &format!("/queues/{queue}/items"), Some(json!({"title": "work"}))).await;
    let missing = uuid::Uuid::new_v4();

    let (status, results) = send(
        &app,
        "POST",
        "/items/batch-update",
        Some(json!({"updates": [
            {"itemId": item["id"], "status": "cancelled"},
            {"itemId": missing, "status": "cancelled"},
        ]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(results[0]["item"]["status"], "cancelled");
    assert_eq!(results[1]["error"]["code"], "not_found");
    assert_eq!(results[1]["itemId"], json!(missing));
}

#[tokio::test]
async fn test_unqueued_and_queue_crud() {
    let app = create_test_router().await;
    let (_, unqueued) = send(&app, "GET", "/projects/proj-1/unqueued", None).await;
    assert_eq!(unqueued.as_array().unwrap().len(), 3);
    assert_eq!(unqueued[0]["taskId"], "t1");

    let queue = create_queue(&app, "old").await;
    let (status, renamed) = send(&app, "PATCH", &format!("/queues/{queue}"), Some(json!({"name": "new"}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(renamed["name"], "new");

    send(&app, "POST", &format!("/queues/{queue}/items"), Some(json!({"title": "work"}))).await;
    let (status, body) = send(&app, "DELETE", &format!("/queues/{queue}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["removedItems"], 1);

    let (status, _) = send(&app, "GET", "/projects/proj-404/unqueued", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}
