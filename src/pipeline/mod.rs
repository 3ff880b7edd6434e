//! Orchestration: the analysis chain and the persistence gateway.

pub mod gateway;
pub mod orchestrator;

pub use gateway::{build_local_entry, FlushReport, PersistenceGateway, Reconciliation};
pub use orchestrator::{canned_response, EntryOrchestrator, Stage, DEGRADED_TRANSCRIPT};
