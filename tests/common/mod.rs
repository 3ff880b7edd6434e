//! Scripted fakes for the pipeline's external collaborators.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use reflecta::clients::{
    BackendWriteClient, CoachingGenerationClient, ConnectivityOracle, ModelTier,
    SpeechTranscriptionClient, VisionAnalysisClient,
};
use reflecta::domain::{Entry, EntryDraft, SyncState};
use reflecta::error::{ErrorKind, PipelineError};

/// Speech client returning a fixed transcript, or failing when `response`
/// is None
pub struct ScriptedSpeech {
    pub response: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedSpeech {
    pub fn ok(text: &str) -> Self {
        Self {
            response: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SpeechTranscriptionClient for ScriptedSpeech {
    async fn transcribe(&self, _audio_ref: &str) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| PipelineError::network("speech service unavailable"))
    }
}

/// Vision client returning a fixed description; `Some("")` exercises the
/// empty-success case, None the failure case
pub struct ScriptedVision {
    pub response: Option<String>,
    pub calls: AtomicUsize,
}

impl ScriptedVision {
    pub fn ok(text: &str) -> Self {
        Self {
            response: Some(text.to_string()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        Self {
            response: None,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl VisionAnalysisClient for ScriptedVision {
    async fn describe(
        &self,
        _image_ref: &str,
        _prompt_context: &str,
    ) -> Result<String, PipelineError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.response
            .clone()
            .ok_or_else(|| PipelineError::network("vision service unavailable"))
    }
}

/// Coaching client with per-tier scripted responses; records every call
pub struct ScriptedCoaching {
    pub methodology: Option<String>,
    pub primary: Option<String>,
    pub fallback: Option<String>,
    /// (tier, prompt) per generate call, in order
    pub calls: Mutex<Vec<(ModelTier, String)>>,
}

impl ScriptedCoaching {
    pub fn new(
        methodology: Option<&str>,
        primary: Option<&str>,
        fallback: Option<&str>,
    ) -> Self {
        Self {
            methodology: methodology.map(String::from),
            primary: primary.map(String::from),
            fallback: fallback.map(String::from),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn all_failing() -> Self {
        Self::new(None, None, None)
    }

    pub fn tiers_called(&self) -> Vec<ModelTier> {
        self.calls.lock().unwrap().iter().map(|(t, _)| *t).collect()
    }
}

#[async_trait]
impl CoachingGenerationClient for ScriptedCoaching {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String, PipelineError> {
        self.calls.lock().unwrap().push((tier, prompt.to_string()));

        let response = match tier {
            ModelTier::Methodology => &self.methodology,
            ModelTier::Primary => &self.primary,
            ModelTier::Fallback => &self.fallback,
        };

        response
            .clone()
            .ok_or_else(|| PipelineError::network("coaching model unavailable"))
    }

    fn has_methodology_model(&self) -> bool {
        self.methodology.is_some()
    }
}

/// Oracle with a switchable online flag
pub struct StaticOracle {
    pub online: AtomicBool,
}

impl StaticOracle {
    pub fn online() -> Self {
        Self {
            online: AtomicBool::new(true),
        }
    }

    pub fn offline() -> Self {
        Self {
            online: AtomicBool::new(false),
        }
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }
}

#[async_trait]
impl ConnectivityOracle for StaticOracle {
    async fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }
}

/// In-memory backend with a switchable scripted failure
pub struct MemoryBackend {
    pub entries: Mutex<Vec<Entry>>,
    pub fail_with: Mutex<Option<ErrorKind>>,
    pub inserts: AtomicUsize,
    pub uploads: AtomicUsize,
    next_id: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            fail_with: Mutex::new(None),
            inserts: AtomicUsize::new(0),
            uploads: AtomicUsize::new(0),
            next_id: AtomicUsize::new(0),
        }
    }

    pub fn fail_inserts_with(&self, kind: Option<ErrorKind>) {
        *self.fail_with.lock().unwrap() = kind;
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn stored(&self) -> Vec<Entry> {
        self.entries.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendWriteClient for MemoryBackend {
    async fn insert_entry(&self, draft: &EntryDraft) -> Result<Entry, PipelineError> {
        self.inserts.fetch_add(1, Ordering::SeqCst);

        if let Some(kind) = *self.fail_with.lock().unwrap() {
            return Err(PipelineError::new(kind, "scripted insert failure"));
        }

        let id = format!("srv_{}", self.next_id.fetch_add(1, Ordering::SeqCst) + 1);
        let entry = Entry::from_draft(id, SyncState::Synced, draft);
        self.entries.lock().unwrap().push(entry.clone());
        Ok(entry)
    }

    async fn upload_binary(&self, local_ref: &str) -> Result<String, PipelineError> {
        self.uploads.fetch_add(1, Ordering::SeqCst);

        if let Some(kind) = *self.fail_with.lock().unwrap() {
            return Err(PipelineError::new(kind, "scripted upload failure"));
        }

        let name = std::path::Path::new(local_ref)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "blob".to_string());
        Ok(format!("https://cdn.test/{}", name))
    }
}
