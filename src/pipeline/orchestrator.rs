//! Entry orchestrator and the tiered coaching chain.
//!
//! Produces one [`Entry`] from one user capture. Analysis stages run strictly
//! in sequence (transcription → vision → coaching → persistence) because each
//! stage's output feeds the next prompt. Any failure inside the analysis
//! chain is absorbed; the worst case is a canned, still-positive message.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{debug, instrument, warn};

use crate::clients::{
    CoachingGenerationClient, ModelTier, SpeechTranscriptionClient, VisionAnalysisClient,
};
use crate::config::StageTimeouts;
use crate::domain::{Entry, EntryDraft};
use crate::error::PipelineError;

use super::gateway::PersistenceGateway;

/// Substituted when transcription fails; entry creation must not abort
pub const DEGRADED_TRANSCRIPT: &str =
    "(Transcription unavailable - your recording was saved and can be replayed.)";

/// Analysis stages recorded per draft for diagnosis. Transcription is not
/// listed: it resolves before the draft exists, and its degraded outcome is
/// visible in the transcript itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Vision,
    CoachingPrimary,
    CoachingFallback,
    CannedFallback,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Vision => "vision",
            Self::CoachingPrimary => "coaching_primary",
            Self::CoachingFallback => "coaching_fallback",
            Self::CannedFallback => "canned_fallback",
        };
        f.write_str(s)
    }
}

/// Transient per-capture assembly of analysis results; never persisted
struct AnalysisDraft {
    transcript: String,
    vision_description: Option<String>,
    category: String,
    attempted_stages: BTreeSet<Stage>,
}

impl AnalysisDraft {
    fn new(transcript: &str, category: &str) -> Self {
        Self {
            transcript: transcript.to_string(),
            vision_description: None,
            category: category.to_string(),
            attempted_stages: BTreeSet::new(),
        }
    }

    /// Full prompt for the primary coaching tier
    fn coaching_prompt(&self) -> String {
        match &self.vision_description {
            Some(description) => format!(
                "The user shared a photo for their \"{}\" reflection.\n\
                 What the photo shows: {}\n\
                 What the user wrote: {}\n\
                 Offer a short, warm coaching response grounded in what they shared.",
                self.category, description, self.transcript
            ),
            None => format!(
                "The user recorded a \"{}\" reflection:\n{}\n\
                 Offer a short, warm coaching response grounded in what they shared.",
                self.category, self.transcript
            ),
        }
    }

    /// Reduced prompt for the one fallback call
    fn simplified_prompt(&self) -> String {
        format!(
            "Write one short, encouraging response to this \"{}\" reflection: {}",
            self.category, self.transcript
        )
    }
}

/// Top-level coordinator for entry creation
pub struct EntryOrchestrator {
    speech: Arc<dyn SpeechTranscriptionClient>,
    vision: Arc<dyn VisionAnalysisClient>,
    coaching: Arc<dyn CoachingGenerationClient>,
    gateway: PersistenceGateway,
    timeouts: StageTimeouts,
    user_id: String,
}

impl EntryOrchestrator {
    pub fn new(
        speech: Arc<dyn SpeechTranscriptionClient>,
        vision: Arc<dyn VisionAnalysisClient>,
        coaching: Arc<dyn CoachingGenerationClient>,
        gateway: PersistenceGateway,
        timeouts: StageTimeouts,
        user_id: impl Into<String>,
    ) -> Self {
        Self {
            speech,
            vision,
            coaching,
            gateway,
            timeouts,
            user_id: user_id.into(),
        }
    }

    /// Access the gateway, e.g. to trigger a flush on reconnect
    pub fn gateway(&self) -> &PersistenceGateway {
        &self.gateway
    }

    /// Create an entry from a voice recording.
    ///
    /// Transcription failure never blocks creation; a fixed degraded
    /// transcript is substituted and the pipeline continues.
    #[instrument(skip(self, audio_ref))]
    pub async fn create_from_recording(
        &self,
        audio_ref: &str,
        category: &str,
        is_private: bool,
    ) -> Result<Entry, PipelineError> {
        let transcript = match timeout(
            self.timeouts.transcription(),
            self.speech.transcribe(audio_ref),
        )
        .await
        {
            Ok(Ok(text)) if !text.trim().is_empty() => text,
            Ok(Ok(_)) => {
                warn!("Transcription returned empty text; substituting placeholder");
                DEGRADED_TRANSCRIPT.to_string()
            }
            Ok(Err(e)) => {
                warn!(error = %e, "Transcription failed; substituting placeholder");
                DEGRADED_TRANSCRIPT.to_string()
            }
            Err(_) => {
                warn!(
                    timeout = ?self.timeouts.transcription(),
                    "Transcription timed out; substituting placeholder"
                );
                DEGRADED_TRANSCRIPT.to_string()
            }
        };

        let ai_response = self.generate_coaching(&transcript, None, category).await;

        let draft = EntryDraft {
            user_id: self.user_id.clone(),
            transcription: transcript,
            category: category.to_string(),
            ai_response: Some(ai_response),
            image_url: None,
            audio_uri: Some(audio_ref.to_string()),
            is_private,
            created_at: Utc::now(),
        };

        self.gateway.save(draft).await
    }

    /// Create an entry from a photo plus caption.
    ///
    /// Fails fast with a `Validation` error before any client call when the
    /// image reference is not a non-empty http(s) URL.
    #[instrument(skip(self, image_ref, caption))]
    pub async fn create_from_image(
        &self,
        image_ref: &str,
        caption: &str,
        category: &str,
        is_private: bool,
    ) -> Result<Entry, PipelineError> {
        validate_image_ref(image_ref)?;

        let ai_response = self
            .generate_coaching(caption, Some(image_ref), category)
            .await;

        let draft = EntryDraft {
            user_id: self.user_id.clone(),
            transcription: caption.to_string(),
            category: category.to_string(),
            ai_response: Some(ai_response),
            image_url: Some(image_ref.to_string()),
            audio_uri: None,
            is_private,
            created_at: Utc::now(),
        };

        self.gateway.save(draft).await
    }

    /// The tiered coaching chain. Never fails; always returns non-empty text.
    ///
    /// Tiers, in order:
    /// 1. Vision analysis when an image is present. Failure or an empty
    ///    description fails closed: control jumps straight to the canned
    ///    template rather than synthesizing coaching from a missing
    ///    description.
    /// 2. Primary coaching call (methodology model when configured).
    /// 3. Exactly one fallback call with a simplified prompt.
    /// 4. Fixed category-interpolated template.
    pub async fn generate_coaching(
        &self,
        text: &str,
        image_ref: Option<&str>,
        category: &str,
    ) -> String {
        let mut draft = AnalysisDraft::new(text, category);

        if let Some(image) = image_ref {
            draft.attempted_stages.insert(Stage::Vision);
            let context = format!(
                "Describe this photo in one or two observational, encouraging \
                 sentences, as context for a \"{}\" reflection.",
                category
            );

            let description = match timeout(
                self.timeouts.vision(),
                self.vision.describe(image, &context),
            )
            .await
            {
                Ok(Ok(text)) if !text.trim().is_empty() => Some(text),
                Ok(Ok(_)) => {
                    warn!("Vision returned empty description");
                    None
                }
                Ok(Err(e)) => {
                    warn!(error = %e, "Vision analysis failed");
                    None
                }
                Err(_) => {
                    warn!(timeout = ?self.timeouts.vision(), "Vision analysis timed out");
                    None
                }
            };

            match description {
                Some(text) => draft.vision_description = Some(text),
                // Fail closed: no coaching from an absent description
                None => {
                    draft.attempted_stages.insert(Stage::CannedFallback);
                    debug!(stages = %format_stages(&draft.attempted_stages), "Degraded to canned response");
                    return canned_response(category);
                }
            }
        }

        let tier = if self.coaching.has_methodology_model() {
            ModelTier::Methodology
        } else {
            ModelTier::Primary
        };

        draft.attempted_stages.insert(Stage::CoachingPrimary);
        match self.coaching_call(&draft.coaching_prompt(), tier).await {
            Ok(text) => return text,
            Err(e) => warn!(error = %e, ?tier, "Primary coaching call failed"),
        }

        draft.attempted_stages.insert(Stage::CoachingFallback);
        match self
            .coaching_call(&draft.simplified_prompt(), ModelTier::Fallback)
            .await
        {
            Ok(text) => return text,
            Err(e) => warn!(error = %e, "Fallback coaching call failed"),
        }

        draft.attempted_stages.insert(Stage::CannedFallback);
        debug!(stages = %format_stages(&draft.attempted_stages), "Degraded to canned response");
        canned_response(category)
    }

    /// One coaching call with the stage timeout; empty output is a failure
    async fn coaching_call(&self, prompt: &str, tier: ModelTier) -> Result<String, PipelineError> {
        match timeout(self.timeouts.coaching(), self.coaching.generate(prompt, tier)).await {
            Ok(Ok(text)) if !text.trim().is_empty() => Ok(text),
            Ok(Ok(_)) => Err(PipelineError::unknown("coaching model returned empty text")),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(PipelineError::network(format!(
                "coaching call timed out after {:?}",
                self.timeouts.coaching()
            ))),
        }
    }
}

/// Terminal fallback; guaranteed non-empty for any category string
pub fn canned_response(category: &str) -> String {
    format!(
        "Thank you for taking a moment to reflect on {}. Showing up for this \
         practice is itself something to be proud of - keep going.",
        if category.trim().is_empty() {
            "your day"
        } else {
            category
        }
    )
}

/// Image references must be non-empty http(s) URLs
fn validate_image_ref(image_ref: &str) -> Result<(), PipelineError> {
    if image_ref.trim().is_empty() {
        return Err(PipelineError::validation("missing image reference"));
    }

    let url = reqwest::Url::parse(image_ref)
        .map_err(|_| PipelineError::validation(format!("not a URL: {}", image_ref)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(PipelineError::validation(format!(
            "unsupported image URL scheme: {}",
            url.scheme()
        )));
    }

    Ok(())
}

fn format_stages(stages: &BTreeSet<Stage>) -> String {
    stages
        .iter()
        .map(|s| s.to_string())
        .collect::<Vec<_>>()
        .join(",")
}
