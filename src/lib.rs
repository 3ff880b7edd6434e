//! reflecta - offline-tolerant entry pipeline for a reflective journaling client
//!
//! The pipeline turns a freshly captured reflection (voice recording or
//! photo plus caption) into a persisted, AI-annotated record while tolerating
//! connectivity loss, partial model failures, and malformed upstream
//! responses.
//!
//! # Architecture
//!
//! Three guarantees shape the design:
//! - A capture is never silently lost: offline or failed writes become
//!   durable pending actions replayed on reconnect
//! - The caller always gets a usable entry immediately (optimistic local
//!   record with a `temp_` id when the backend is unreachable)
//! - AI feedback degrades instead of blocking: primary model → fallback
//!   model → canned template, never an error
//!
//! # Modules
//!
//! - `clients`: Collaborator interfaces and HTTP adapters (speech, vision,
//!   coaching, backend, connectivity)
//! - `pipeline`: Orchestration logic (EntryOrchestrator, PersistenceGateway)
//! - `sync`: Durable pending-action queue
//! - `domain`: Data structures (Entry, EntryDraft, PendingAction)
//! - `error`: The ErrorKind taxonomy driving retry/queue/degrade decisions
//! - `cli`: Command-line interface
//!
//! # Usage
//!
//! ```bash
//! # Create an entry from a voice memo
//! reflecta record memo.m4a --category Gratitude
//!
//! # Inspect what is waiting to sync
//! reflecta queue status
//!
//! # Replay the queue after reconnecting
//! reflecta queue flush
//! ```

pub mod cli;
pub mod clients;
pub mod config;
pub mod domain;
pub mod error;
pub mod pipeline;
pub mod sync;

// Re-export main types at crate root for convenience
pub use clients::{
    BackendWriteClient, CoachingGenerationClient, ConnectivityOracle, ModelTier,
    SpeechTranscriptionClient, VisionAnalysisClient,
};
pub use domain::{Entry, EntryDraft, PendingAction, SyncState};
pub use error::{ErrorKind, PipelineError};
pub use pipeline::{EntryOrchestrator, FlushReport, PersistenceGateway, Reconciliation};
pub use sync::PendingActionQueue;
