//! Collaborator interfaces for external services.
//!
//! Each client classifies its own failures into an [`ErrorKind`] at the
//! boundary (carried by [`PipelineError`]), so the pipeline never inspects
//! message text to decide how to react.
//!
//! [`ErrorKind`]: crate::error::ErrorKind

pub mod backend;
pub mod openai;

use async_trait::async_trait;

use crate::domain::{Entry, EntryDraft};
use crate::error::PipelineError;

pub use backend::{ProbeConnectivityOracle, RestBackendClient};
pub use openai::{ChatCoachingClient, VisionChatClient, WhisperClient};

/// Which model a coaching generation call should use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelTier {
    /// Fine-tuned methodology model, when one is configured
    Methodology,

    /// General-purpose model with the full prompt shape
    Primary,

    /// General-purpose model with a simplified prompt; the one retry tier
    Fallback,
}

/// Speech-to-text over a captured audio reference
#[async_trait]
pub trait SpeechTranscriptionClient: Send + Sync {
    async fn transcribe(&self, audio_ref: &str) -> Result<String, PipelineError>;
}

/// Vision-capable model turning an image URL plus context into a description
#[async_trait]
pub trait VisionAnalysisClient: Send + Sync {
    /// `image_ref` must be a resolvable URL; implementations validate this
    /// before making any network call.
    async fn describe(&self, image_ref: &str, prompt_context: &str)
        -> Result<String, PipelineError>;
}

/// Text-generation model producing the supportive coaching message
#[async_trait]
pub trait CoachingGenerationClient: Send + Sync {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String, PipelineError>;

    /// Whether a fine-tuned methodology model is configured
    fn has_methodology_model(&self) -> bool {
        false
    }
}

/// Reports current online/offline state
#[async_trait]
pub trait ConnectivityOracle: Send + Sync {
    async fn is_online(&self) -> bool;
}

/// Backend persistence: entry inserts and binary uploads
#[async_trait]
pub trait BackendWriteClient: Send + Sync {
    /// Insert a draft; returns the synced entry under its server id
    async fn insert_entry(&self, draft: &EntryDraft) -> Result<Entry, PipelineError>;

    /// Upload a local binary; returns its remote URL
    async fn upload_binary(&self, local_ref: &str) -> Result<String, PipelineError>;
}
