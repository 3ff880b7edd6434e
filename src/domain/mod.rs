//! Domain types for the entry pipeline.
//!
//! This module contains the core data structures:
//! - Entry: the durable reflection record and its sync state
//! - EntryDraft: not-yet-persisted assembly of entry fields
//! - PendingAction: a durable, replayable intent to create an entry

pub mod action;
pub mod entry;

// Re-export commonly used types
pub use action::{generate_local_id, ActionKind, PendingAction, LOCAL_ID_PREFIX};
pub use entry::{Entry, EntryDraft, SyncState};
