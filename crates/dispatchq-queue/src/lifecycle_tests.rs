use super::*;
use crate::item::NewItem;
use crate::test_support::{test_config, GatedEngine, TestEngine};

async fn claimed(t: &TestEngine, agent: &str) -> QueueItem {
    let queue = t.queue("main").await;
    t.engine.enqueue_item(queue.id, NewItem::adhoc("work")).await.unwrap();
    t.engine.get_next_task(queue.id, agent).await.unwrap().unwrap()
}

#[tokio::test]
async fn test_complete_claimed_item() {
    let t = TestEngine::new().await;
    let item = claimed(&t, "a1").await;

    let done = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Completed).by_agent("a1"))
        .await
        .unwrap();
    assert_eq!(done.status, ItemStatus::Completed);
    assert!(done.completed_at.is_some());
    assert_eq!(done.agent_id.as_deref(), Some("a1"));
    assert_eq!(t.engine.get_item(item.id).await.unwrap(), done);

    // Terminal.
    let again = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Queued))
        .await;
    assert!(matches!(again, Err(QueueError::Conflict(_))));
}

#[tokio::test]
async fn test_queued_item_cannot_complete() {
    let t = TestEngine::new().await;
    let queue = t.queue("main").await;
    let item = t.engine.enqueue_item(queue.id, NewItem::adhoc("work")).await.unwrap();

    let result = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Completed))
        .await;
    assert!(matches!(result, Err(QueueError::Conflict(_))));

    let claim = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::InProgress))
        .await;
    assert!(matches!(claim, Err(QueueError::Conflict(_))));
    assert_eq!(t.engine.get_item(item.id).await.unwrap().status, ItemStatus::Queued);
}

#[tokio::test]
async fn test_fail_then_requeue() {
    let t = TestEngine::new().await;
    let item = claimed(&t, "a1").await;

    let failed = t
        .engine
        .update_queue_item(
            item.id,
            ItemPatch::status(ItemStatus::Failed).by_agent("a1").with_error("tests red"),
        )
        .await
        .unwrap();
    assert_eq!(failed.error_message.as_deref(), Some("tests red"));

    let requeued = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Queued))
        .await
        .unwrap();
    assert_eq!(requeued.status, ItemStatus::Queued);
    assert_eq!(requeued.retry_count, 1);
    assert!(requeued.agent_id.is_none());
    assert!(requeued.claimed_at.is_none());
    assert!(requeued.completed_at.is_none());
    assert!(requeued.error_message.is_none());

    let next = t.engine.get_next_task(item.queue_id, "a2").await.unwrap().unwrap();
    assert_eq!(next.id, item.id);
    assert!(next.is_claimed_by("a2"));
}

#[tokio::test]
async fn test_wrong_agent_is_rejected() {
    let t = TestEngine::new().await;
    let item = claimed(&t, "a1").await;

    let result = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Completed).by_agent("a2"))
        .await;
    assert!(matches!(result, Err(QueueError::Conflict(_))));
    assert_eq!(t.engine.get_item(item.id).await.unwrap().status, ItemStatus::InProgress);
}

#[tokio::test]
async fn test_patch_validation() {
    let t = TestEngine::new().await;
    let queue = t.queue("main").await;
    let item = t.engine.enqueue_item(queue.id, NewItem::adhoc("work")).await.unwrap();

    let empty = t.engine.update_queue_item(item.id, ItemPatch::default()).await;
    assert!(matches!(empty, Err(QueueError::Validation(_))));

    let stray_error = ItemPatch {
        error_message: Some("nope".into()),
        ..ItemPatch::default()
    };
    let result = t.engine.update_queue_item(item.id, stray_error).await;
    assert!(matches!(result, Err(QueueError::Validation(_))));

    let missing = t
        .engine
        .update_queue_item(Uuid::new_v4(), ItemPatch::status(ItemStatus::Cancelled))
        .await;
    assert!(matches!(missing, Err(QueueError::ItemNotFound(_))));
}

#[tokio::test]
async fn test_priority_updates() {
    let t = TestEngine::new().await;
    let queue = t.queue("main").await;
    let item = t.engine.enqueue_item(queue.id, NewItem::adhoc("work")).await.unwrap();

    let bump = ItemPatch {
        priority: Some(9),
        ..ItemPatch::default()
    };
    let updated = t.engine.update_queue_item(item.id, bump.clone()).await.unwrap();
    assert_eq!(updated.priority, 9);

    let out_of_range = ItemPatch {
        priority: Some(11),
        ..ItemPatch::default()
    };
    let result = t.engine.update_queue_item(item.id, out_of_range).await;
    assert!(matches!(result, Err(QueueError::Validation(_))));

    t.engine.get_next_task(queue.id, "a1").await.unwrap().unwrap();
    let result = t.engine.update_queue_item(item.id, bump).await;
    assert!(matches!(result, Err(QueueError::Conflict(_))));
}

#[tokio::test]
async fn test_batch_update_reports_each_result() {
    let t = TestEngine::new().await;
    let queue = t.queue("main").await;
    let items = t
        .engine
        .batch_enqueue(queue.id, vec![NewItem::adhoc("a"), NewItem::adhoc("b")])
        .await
        .unwrap();

    let results = t
        .engine
        .batch_update_items(vec![
            ItemUpdate {
                item_id: items[0].id,
                patch: ItemPatch::status(ItemStatus::Cancelled),
            },
            ItemUpdate {
                item_id: items[1].id,
                patch: ItemPatch::status(ItemStatus::Completed),
            },
            ItemUpdate {
                item_id: Uuid::new_v4(),
                patch: ItemPatch::status(ItemStatus::Cancelled),
            },
        ])
        .await;

    assert_eq!(results.len(), 3);
    assert_eq!(results[0].as_ref().unwrap().status, ItemStatus::Cancelled);
    assert!(matches!(results[1], Err(QueueError::Conflict(_))));
    assert!(matches!(results[2], Err(QueueError::ItemNotFound(_))));
}

#[tokio::test]
async fn test_delete_needs_force_for_claimed_items() {
    let t = TestEngine::new().await;
    let item = claimed(&t, "a1").await;

    let result = t.engine.delete_queue_item(item.id, false).await;
    assert!(matches!(result, Err(QueueError::Conflict(_))));

    let deleted = t.engine.delete_queue_item(item.id, true).await.unwrap();
    assert_eq!(deleted.id, item.id);
    assert!(matches!(
        t.engine.get_item(item.id).await,
        Err(QueueError::ItemNotFound(_))
    ));

    // A late report from the agent finds nothing.
    let late = t
        .engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Completed).by_agent("a1"))
        .await;
    assert!(matches!(late, Err(QueueError::ItemNotFound(_))));
}

#[tokio::test]
async fn test_clear_queue() {
    let t = TestEngine::new().await;
    let item = claimed(&t, "a1").await;
    t.engine
        .batch_enqueue(item.queue_id, vec![NewItem::adhoc("b"), NewItem::adhoc("c")])
        .await
        .unwrap();

    assert_eq!(t.engine.clear_queue(item.queue_id).await.unwrap(), 3);
    let stats = t.engine.get_queue_stats(item.queue_id).await.unwrap();
    assert_eq!(stats.total, 0);

    let missing = t.engine.clear_queue(Uuid::new_v4()).await;
    assert!(matches!(missing, Err(QueueError::QueueNotFound(_))));
}

#[tokio::test]
async fn test_plan_update_rejects_lost_race() {
    let t = TestEngine::new().await;
    let item = claimed(&t, "a1").await;
    let manager = ItemLifecycleManager::new(t.store.clone(), test_config());

    // Plan against a stale snapshot, then let the item move on.
    let (updated, event) = plan_update(
        &item,
        &ItemPatch::status(ItemStatus::Completed),
        &test_config(),
        now(),
    )
    .unwrap();
    t.engine
        .update_queue_item(item.id, ItemPatch::status(ItemStatus::Cancelled))
        .await
        .unwrap();

    let applied = manager.store.update_item_if(&item, &updated, event).await.unwrap();
    assert!(applied.is_none());
    assert_eq!(manager.get_item(item.id).await.unwrap().status, ItemStatus::Cancelled);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_update_reports_the_queue_the_item_moved_to() {
    let g = GatedEngine::new().await;
    let source = g.queue("source").await;
    let target = g.queue("target").await;
    let item = g
        .engine
        .enqueue_item(source.id, NewItem::adhoc("build"))
        .await
        .unwrap();

    // The cancel has read the item when it is moved away.
    g.store.get_item.arm();
    let update = tokio::spawn({
        let engine = g.engine.clone();
        async move {
            engine
                .update_queue_item(item.id, ItemPatch::status(ItemStatus::Cancelled))
                .await
        }
    });
    g.store.get_item.reached().await;
    g.engine.bulk_move_items(vec![item.id], target.id, None).await.unwrap();
    assert_eq!(g.engine.get_queue_stats(target.id).await.unwrap().queued, 1);
    g.store.get_item.release();

    let cancelled = update.await.unwrap().unwrap();
    assert_eq!(cancelled.queue_id, target.id);
    assert_eq!(cancelled.status, ItemStatus::Cancelled);

    let stats = g.engine.get_queue_stats(target.id).await.unwrap();
    assert_eq!(stats.queued, 0);
    assert_eq!(stats.cancelled, 1);
    assert_eq!(g.engine.get_queue_stats(source.id).await.unwrap().total, 0);
}
