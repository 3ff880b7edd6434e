//! Durable intents replayed against the backend once connectivity allows.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::entry::EntryDraft;

/// Prefix shared by every locally generated placeholder id
pub const LOCAL_ID_PREFIX: &str = "temp_";

/// Generate a placeholder id for an entry created while offline.
///
/// A short random suffix keeps two captures in the same millisecond from
/// colliding in the queue.
pub fn generate_local_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "{}{}_{}",
        LOCAL_ID_PREFIX,
        Utc::now().timestamp_millis(),
        &suffix[..8]
    )
}

/// What a pending action will do when replayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    /// Insert a new entry
    CreateEntry,
}

/// A durable, replayable intent to create an entry.
///
/// Invariant: at most one live action exists per `local_id`; enqueueing is
/// idempotent on that key.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingAction {
    pub kind: ActionKind,

    /// Correlates to the optimistic entry's placeholder id
    pub local_id: String,

    /// Draft fields needed to replay the write
    pub payload: EntryDraft,

    /// Failed replay attempts so far
    pub attempts: u32,

    /// Most recent replay error, if any
    pub last_error: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl PendingAction {
    /// Build a create-entry action for a freshly queued draft
    pub fn create_entry(local_id: impl Into<String>, payload: EntryDraft) -> Self {
        Self {
            kind: ActionKind::CreateEntry,
            local_id: local_id.into(),
            payload,
            attempts: 0,
            last_error: None,
            created_at: Utc::now(),
        }
    }
}
