//! Queue flush ordering and replay-failure policy tests.

mod common;

use std::sync::Arc;

use chrono::{Duration, Utc};
use tempfile::TempDir;

use common::{MemoryBackend, StaticOracle};
use reflecta::config::StageTimeouts;
use reflecta::domain::{EntryDraft, PendingAction};
use reflecta::error::ErrorKind;
use reflecta::pipeline::PersistenceGateway;
use reflecta::sync::PendingActionQueue;

fn draft(text: &str) -> EntryDraft {
    EntryDraft {
        user_id: "user-1".to_string(),
        transcription: text.to_string(),
        category: "Gratitude".to_string(),
        ai_response: Some("Keep going.".to_string()),
        image_url: None,
        audio_uri: None,
        is_private: false,
        created_at: Utc::now(),
    }
}

struct Harness {
    queue: Arc<PendingActionQueue>,
    backend: Arc<MemoryBackend>,
    gateway: PersistenceGateway,
    _temp: TempDir,
}

/// Gateway over a queue pre-loaded with actions A, B, C in insertion order
async fn harness_with_abc() -> Harness {
    let temp = TempDir::new().unwrap();
    let queue = Arc::new(PendingActionQueue::new(temp.path().join("queue.jsonl")));
    let backend = Arc::new(MemoryBackend::new());
    let oracle = Arc::new(StaticOracle::online());

    let base = Utc::now() - Duration::seconds(30);
    for (i, (id, text)) in [("temp_a", "first"), ("temp_b", "second"), ("temp_c", "third")]
        .iter()
        .enumerate()
    {
        let mut action = PendingAction::create_entry(*id, draft(text));
        action.created_at = base + Duration::seconds(i as i64);
        queue.enqueue(action).await.unwrap();
    }

    let gateway = PersistenceGateway::new(
        backend.clone(),
        oracle,
        queue.clone(),
        StageTimeouts::default(),
    );

    Harness {
        queue,
        backend,
        gateway,
        _temp: temp,
    }
}

#[tokio::test]
async fn test_flush_stops_at_first_failure() {
    let h = harness_with_abc().await;
    h.backend.fail_inserts_with(Some(ErrorKind::Network));

    let report = h.gateway.flush().await.unwrap();

    // Only A was attempted; B and C never jumped the queue
    assert_eq!(h.backend.insert_count(), 1);
    assert_eq!(report.synced, 0);
    assert_eq!(report.remaining, 3);
    assert!(report.stopped_on.is_some());

    let pending = h.queue.pending().await.unwrap();
    assert_eq!(pending.len(), 3);
    assert_eq!(pending[0].attempts, 1);
    assert_eq!(pending[1].attempts, 0);
    assert_eq!(pending[2].attempts, 0);
}

#[tokio::test]
async fn test_attempts_accumulate_across_passes() {
    let h = harness_with_abc().await;
    h.backend.fail_inserts_with(Some(ErrorKind::Network));

    h.gateway.flush().await.unwrap();
    h.gateway.flush().await.unwrap();

    let head = h.queue.get("temp_a").await.unwrap().unwrap();
    assert_eq!(head.attempts, 2);
    assert!(head.last_error.is_some());
}

#[tokio::test]
async fn test_successful_flush_drains_in_order() {
    let h = harness_with_abc().await;

    let report = h.gateway.flush().await.unwrap();

    assert_eq!(report.synced, 3);
    assert_eq!(report.remaining, 0);
    assert_eq!(h.queue.status().await.unwrap().pending, 0);

    let stored = h.backend.stored();
    let texts: Vec<&str> = stored.iter().map(|e| e.transcription.as_str()).collect();
    assert_eq!(texts, vec!["first", "second", "third"]);
}

#[tokio::test]
async fn test_permanently_invalid_action_is_dropped() {
    let h = harness_with_abc().await;
    h.backend.fail_inserts_with(Some(ErrorKind::Validation));

    let report = h.gateway.flush().await.unwrap();

    // A was proven invalid and dropped; the pass still stopped so B and C
    // kept their place
    assert_eq!(report.dropped, 1);
    assert_eq!(report.synced, 0);
    assert!(h.queue.get("temp_a").await.unwrap().is_none());
    assert_eq!(h.queue.status().await.unwrap().pending, 2);
    assert_eq!(h.backend.insert_count(), 1);

    // The failure cleared; the next pass drains the remainder in order
    h.backend.fail_inserts_with(None);
    let report = h.gateway.flush().await.unwrap();

    assert_eq!(report.synced, 2);
    assert_eq!(h.queue.status().await.unwrap().pending, 0);

    let stored = h.backend.stored();
    let texts: Vec<&str> = stored.iter().map(|e| e.transcription.as_str()).collect();
    assert_eq!(texts, vec!["second", "third"]);
}

#[tokio::test]
async fn test_concurrent_flush_triggers_serialize() {
    let temp = TempDir::new().unwrap();
    let queue = Arc::new(PendingActionQueue::new(temp.path().join("queue.jsonl")));
    let backend = Arc::new(MemoryBackend::new());
    let oracle = Arc::new(StaticOracle::online());

    queue
        .enqueue(PendingAction::create_entry("temp_1", draft("solo")))
        .await
        .unwrap();

    let gateway = Arc::new(PersistenceGateway::new(
        backend.clone(),
        oracle,
        queue.clone(),
        StageTimeouts::default(),
    ));

    // App-foreground and connectivity-change firing near-simultaneously
    let g1 = gateway.clone();
    let g2 = gateway.clone();
    let (r1, r2) = tokio::join!(
        async move { g1.flush().await.unwrap() },
        async move { g2.flush().await.unwrap() },
    );

    // One pass synced the action; the other found an empty queue
    assert_eq!(r1.synced + r2.synced, 1);
    assert_eq!(backend.insert_count(), 1);
    assert_eq!(queue.status().await.unwrap().pending, 0);
}
