//! The durable reflection record and its sync lifecycle.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::action::LOCAL_ID_PREFIX;

/// Persistence status of an [`Entry`] relative to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    /// Exists only in memory on this device
    Local,

    /// Written to the pending-action queue, awaiting connectivity
    Queued,

    /// Persisted by the backend under a server-assigned id
    Synced,
}

/// A persisted reflection record, possibly still local-only.
///
/// Invariant: an entry whose `id` starts with `temp_` is `Local` or `Queued`;
/// a `Synced` entry always carries a server id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entry {
    /// Server-assigned id, or a `temp_<millis>_<suffix>` placeholder
    pub id: String,

    pub user_id: String,

    /// Reflection category (e.g. "Gratitude")
    pub category: String,

    /// The text body: a transcript or a photo caption
    pub transcription: String,

    /// Generated coaching text; None until generation completes
    pub ai_response: Option<String>,

    pub image_url: Option<String>,

    pub audio_url: Option<String>,

    pub is_private: bool,

    pub favorite: bool,

    /// Assigned client-side at draft creation and never overwritten on sync,
    /// so local ordering survives a later flush
    pub created_at: DateTime<Utc>,

    pub sync_state: SyncState,
}

impl Entry {
    /// Build an entry from draft fields plus an id and sync state.
    pub fn from_draft(id: impl Into<String>, sync_state: SyncState, draft: &EntryDraft) -> Self {
        Self {
            id: id.into(),
            user_id: draft.user_id.clone(),
            category: draft.category.clone(),
            transcription: draft.transcription.clone(),
            ai_response: draft.ai_response.clone(),
            image_url: draft.image_url.clone(),
            audio_url: draft.audio_uri.clone(),
            is_private: draft.is_private,
            favorite: false,
            created_at: draft.created_at,
            sync_state,
        }
    }

    /// True if this entry still carries a locally generated placeholder id
    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }
}

/// The fields the persistence gateway needs to build or replay a write.
///
/// Drafts are what the pending-action queue stores, so they must round-trip
/// through serde unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntryDraft {
    pub user_id: String,

    pub transcription: String,

    pub category: String,

    pub ai_response: Option<String>,

    pub image_url: Option<String>,

    /// Audio reference: a local file path before upload, a remote URL after
    pub audio_uri: Option<String>,

    pub is_private: bool,

    /// Capture time; copied verbatim onto the resulting entry
    pub created_at: DateTime<Utc>,
}
