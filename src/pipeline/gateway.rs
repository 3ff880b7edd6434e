//! Connectivity-aware persistence gateway.
//!
//! Turns an analysis result into an [`Entry`], choosing online-write vs.
//! offline-queue, and owns every `sync_state` transition. Online failure and
//! offline detection converge on the same optimistic local path.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::time::timeout;
use tracing::{info, instrument, warn};

use crate::clients::{BackendWriteClient, ConnectivityOracle};
use crate::config::StageTimeouts;
use crate::domain::{generate_local_id, Entry, EntryDraft, PendingAction, SyncState};
use crate::error::{ErrorKind, PipelineError};
use crate::sync::PendingActionQueue;

/// Fired when a queued entry's placeholder id is reconciled to a server id
#[derive(Debug, Clone)]
pub struct Reconciliation {
    pub local_id: String,
    pub entry: Entry,
}

/// Outcome of one flush pass over the queue
#[derive(Debug, Default)]
pub struct FlushReport {
    /// Actions successfully replayed and removed
    pub synced: usize,

    /// Actions dropped because replay proved them permanently invalid
    pub dropped: usize,

    /// Actions left in the queue after this pass
    pub remaining: usize,

    /// The error that stopped the pass, if it did not drain the queue
    pub stopped_on: Option<PipelineError>,
}

/// Decides, per creation request, whether to write directly to the backend
/// or enqueue, and produces the entry returned to the UI.
pub struct PersistenceGateway {
    backend: Arc<dyn BackendWriteClient>,
    connectivity: Arc<dyn ConnectivityOracle>,
    queue: Arc<PendingActionQueue>,
    timeouts: StageTimeouts,
    reconcile_tx: Option<mpsc::UnboundedSender<Reconciliation>>,
    // One flush in flight at a time; concurrent triggers wait their turn
    flush_lock: Mutex<()>,
}

impl PersistenceGateway {
    pub fn new(
        backend: Arc<dyn BackendWriteClient>,
        connectivity: Arc<dyn ConnectivityOracle>,
        queue: Arc<PendingActionQueue>,
        timeouts: StageTimeouts,
    ) -> Self {
        Self {
            backend,
            connectivity,
            queue,
            timeouts,
            reconcile_tx: None,
            flush_lock: Mutex::new(()),
        }
    }

    /// Register a channel for id-reconciliation events emitted during flush
    pub fn with_reconciliation(mut self, tx: mpsc::UnboundedSender<Reconciliation>) -> Self {
        self.reconcile_tx = Some(tx);
        self
    }

    /// Persist a draft, returning a usable entry either way.
    ///
    /// Offline or transient failure yields an optimistic `Queued` entry with
    /// a `temp_` id and a matching pending action. `Validation` and `Auth`
    /// failures propagate without queueing.
    #[instrument(skip(self, draft), fields(category = %draft.category))]
    pub async fn save(&self, draft: EntryDraft) -> Result<Entry, PipelineError> {
        if !self.connectivity.is_online().await {
            info!("Offline; queueing entry for later sync");
            return self.save_local(draft).await;
        }

        match self.write_online(&draft).await {
            Ok(entry) => Ok(entry),
            Err(e) if e.kind().queues_offline() => {
                warn!(error = %e, "Online write failed; queueing entry");
                self.save_local(draft).await
            }
            Err(e) => Err(e),
        }
    }

    /// Synthesize the optimistic local entry and enqueue its pending action.
    ///
    /// Single path shared by the offline branch and the online-failure
    /// branch, so the two can never drift.
    async fn save_local(&self, draft: EntryDraft) -> Result<Entry, PipelineError> {
        let local_id = generate_local_id();
        let entry = build_local_entry(&local_id, &draft);

        let action = PendingAction::create_entry(&local_id, draft);
        self.queue
            .enqueue(action)
            .await
            .map_err(|e| PipelineError::unknown(format!("queue write failed: {}", e)))?;

        Ok(entry)
    }

    /// The online write path: upload any local binary, then insert.
    ///
    /// Also the replay path used by [`flush`](Self::flush).
    async fn write_online(&self, draft: &EntryDraft) -> Result<Entry, PipelineError> {
        let mut draft = draft.clone();

        if let Some(audio) = draft.audio_uri.clone() {
            if !is_remote(&audio) {
                let url = self
                    .with_persistence_timeout(self.backend.upload_binary(&audio))
                    .await?;
                draft.audio_uri = Some(url);
            }
        }

        if let Some(image) = draft.image_url.clone() {
            if !is_remote(&image) {
                let url = self
                    .with_persistence_timeout(self.backend.upload_binary(&image))
                    .await?;
                draft.image_url = Some(url);
            }
        }

        self.with_persistence_timeout(self.backend.insert_entry(&draft))
            .await
    }

    async fn with_persistence_timeout<T>(
        &self,
        fut: impl std::future::Future<Output = Result<T, PipelineError>>,
    ) -> Result<T, PipelineError> {
        match timeout(self.timeouts.persistence(), fut).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::network(format!(
                "backend call timed out after {:?}",
                self.timeouts.persistence()
            ))),
        }
    }

    /// Replay queued actions in FIFO order through the online write path.
    ///
    /// Stops at the first failure to preserve ordering; an action that fails
    /// with `Validation` is dropped first, since replaying it can never
    /// succeed and keeping it would wedge the queue.
    #[instrument(skip(self))]
    pub async fn flush(&self) -> Result<FlushReport, PipelineError> {
        let _guard = self.flush_lock.lock().await;

        let pending = self
            .queue
            .pending()
            .await
            .map_err(|e| PipelineError::unknown(format!("queue read failed: {}", e)))?;

        let mut report = FlushReport {
            remaining: pending.len(),
            ..FlushReport::default()
        };

        for action in pending {
            match self.write_online(&action.payload).await {
                Ok(entry) => {
                    self.queue
                        .remove(&action.local_id)
                        .await
                        .map_err(|e| PipelineError::unknown(e.to_string()))?;
                    report.synced += 1;
                    report.remaining -= 1;

                    info!(
                        local_id = %action.local_id,
                        server_id = %entry.id,
                        "Queued entry synced"
                    );

                    if let Some(tx) = &self.reconcile_tx {
                        let _ = tx.send(Reconciliation {
                            local_id: action.local_id.clone(),
                            entry,
                        });
                    }
                }
                Err(e) => {
                    if e.kind() == ErrorKind::Validation {
                        warn!(
                            local_id = %action.local_id,
                            error = %e,
                            "Queued entry permanently invalid; dropping"
                        );
                        self.queue
                            .remove(&action.local_id)
                            .await
                            .map_err(|qe| PipelineError::unknown(qe.to_string()))?;
                        report.dropped += 1;
                        report.remaining -= 1;
                    } else {
                        warn!(
                            local_id = %action.local_id,
                            error = %e,
                            "Replay failed; stopping flush pass"
                        );
                        self.queue
                            .record_attempt(&action.local_id, &e.to_string())
                            .await
                            .map_err(|qe| PipelineError::unknown(qe.to_string()))?;
                    }

                    // Later actions must not jump the queue
                    report.stopped_on = Some(e);
                    break;
                }
            }
        }

        Ok(report)
    }
}

/// Build the optimistic entry for a draft that could not be written online
pub fn build_local_entry(local_id: &str, draft: &EntryDraft) -> Entry {
    Entry::from_draft(local_id, SyncState::Queued, draft)
}

/// True if a reference is already a remote URL rather than a local path
fn is_remote(reference: &str) -> bool {
    reference.starts_with("http://") || reference.starts_with("https://")
}
