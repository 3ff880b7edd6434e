//! JSONL-backed pending-action queue.
//!
//! Append-only log with state derived from replay: enqueues, failed replay
//! attempts, and removals are each appended as a JSON line, so the queue
//! survives process restarts and enqueueing stays idempotent per local id.

use std::collections::HashMap;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::fs::{self, File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use crate::domain::PendingAction;

/// Errors that can occur with the pending-action queue
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// An event in the queue log (append-only)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEvent {
    /// When this event occurred
    pub timestamp: DateTime<Utc>,

    /// The placeholder id the event applies to
    pub local_id: String,

    /// Type of queue event
    pub event_type: QueueEventType,

    /// Additional data (depends on event type)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// Types of queue events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueEventType {
    /// Action added to the queue
    Enqueued,

    /// A replay attempt failed
    AttemptFailed,

    /// Action removed (synced, dropped, or discarded by the user)
    Removed,
}

/// Durable, ordered store of not-yet-synced creation requests
pub struct PendingActionQueue {
    /// Path to the queue JSONL file
    queue_path: PathBuf,
}

impl PendingActionQueue {
    /// Create a queue backed by the given JSONL file
    pub fn new(queue_path: PathBuf) -> Self {
        Self { queue_path }
    }

    /// Open the queue at the configured default location, creating parent
    /// directories as needed
    pub async fn open_default() -> anyhow::Result<Self> {
        let path = crate::config::queue_path()?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        Ok(Self::new(path))
    }

    /// Append an event to the queue log
    async fn append_event(&self, event: &QueueEvent) -> Result<(), QueueError> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.queue_path)
            .await?;

        let json = serde_json::to_string(event)?;
        file.write_all(format!("{}\n", json).as_bytes()).await?;
        file.flush().await?;

        Ok(())
    }

    /// Replay all events to build the live actions, keyed by local id
    pub async fn replay(&self) -> Result<HashMap<String, PendingAction>, QueueError> {
        let mut actions: HashMap<String, PendingAction> = HashMap::new();

        if !self.queue_path.exists() {
            return Ok(actions);
        }

        let file = File::open(&self.queue_path).await?;
        let reader = BufReader::new(file);
        let mut lines = reader.lines();

        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }

            let event: QueueEvent = serde_json::from_str(&line)?;
            Self::apply_event(&mut actions, event);
        }

        Ok(actions)
    }

    /// Apply a single event to the state
    fn apply_event(actions: &mut HashMap<String, PendingAction>, event: QueueEvent) {
        match event.event_type {
            QueueEventType::Enqueued => {
                if let Some(data) = event.data {
                    if let Ok(action) = serde_json::from_value::<PendingAction>(data) {
                        actions.insert(event.local_id, action);
                    }
                }
            }
            QueueEventType::AttemptFailed => {
                if let Some(action) = actions.get_mut(&event.local_id) {
                    action.attempts += 1;
                    action.last_error = event
                        .data
                        .as_ref()
                        .and_then(|d| d.get("error"))
                        .and_then(|e| e.as_str())
                        .map(|e| e.to_string());
                }
            }
            QueueEventType::Removed => {
                actions.remove(&event.local_id);
            }
        }
    }

    /// Enqueue an action (idempotent - no-op if a live action already exists
    /// for the same local id)
    pub async fn enqueue(&self, action: PendingAction) -> Result<EnqueueResult, QueueError> {
        let actions = self.replay().await?;
        if actions.contains_key(&action.local_id) {
            return Ok(EnqueueResult::AlreadyQueued(action.local_id));
        }

        let local_id = action.local_id.clone();
        let event = QueueEvent {
            timestamp: Utc::now(),
            local_id: local_id.clone(),
            event_type: QueueEventType::Enqueued,
            data: Some(serde_json::to_value(&action)?),
        };
        self.append_event(&event).await?;

        Ok(EnqueueResult::Queued(local_id))
    }

    /// Get all live actions, FIFO by creation time
    pub async fn pending(&self) -> Result<Vec<PendingAction>, QueueError> {
        let actions = self.replay().await?;
        let mut pending: Vec<PendingAction> = actions.into_values().collect();
        pending.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(pending)
    }

    /// Remove an action (synced, permanently invalid, or discarded)
    pub async fn remove(&self, local_id: &str) -> Result<(), QueueError> {
        let event = QueueEvent {
            timestamp: Utc::now(),
            local_id: local_id.to_string(),
            event_type: QueueEventType::Removed,
            data: None,
        };
        self.append_event(&event).await
    }

    /// Record a failed replay attempt
    pub async fn record_attempt(&self, local_id: &str, error: &str) -> Result<(), QueueError> {
        let event = QueueEvent {
            timestamp: Utc::now(),
            local_id: local_id.to_string(),
            event_type: QueueEventType::AttemptFailed,
            data: Some(serde_json::json!({ "error": error })),
        };
        self.append_event(&event).await
    }

    /// Queue status summary
    pub async fn status(&self) -> Result<QueueStatus, QueueError> {
        let mut pending = self.pending().await?;

        let retried = pending.iter().filter(|a| a.attempts > 0).count();
        let total = pending.len();

        // Most recent first for display
        pending.reverse();
        pending.truncate(5);

        Ok(QueueStatus {
            pending: total,
            retried,
            recent: pending,
        })
    }

    /// Get a specific action by local id
    pub async fn get(&self, local_id: &str) -> Result<Option<PendingAction>, QueueError> {
        let actions = self.replay().await?;
        Ok(actions.get(local_id).cloned())
    }
}

/// Result of enqueueing an action
#[derive(Debug, Clone)]
pub enum EnqueueResult {
    /// Newly queued
    Queued(String),

    /// A live action for this local id already exists
    AlreadyQueued(String),
}

impl EnqueueResult {
    /// Get the local id regardless of result type
    pub fn local_id(&self) -> &str {
        match self {
            Self::Queued(id) | Self::AlreadyQueued(id) => id,
        }
    }

    /// Check if this was a new enqueue
    pub fn is_new(&self) -> bool {
        matches!(self, Self::Queued(_))
    }
}

/// Queue status summary
#[derive(Debug, Clone, Default)]
pub struct QueueStatus {
    pub pending: usize,
    pub retried: usize,
    pub recent: Vec<PendingAction>,
}
