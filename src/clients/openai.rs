//! OpenAI-compatible clients for transcription, vision, and coaching.
//!
//! All three speak the standard `/audio/transcriptions` and
//! `/chat/completions` shapes, so any OpenAI-compatible gateway works.

use async_trait::async_trait;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::error::{classify_status, PipelineError};

use super::{CoachingGenerationClient, ModelTier, SpeechTranscriptionClient, VisionAnalysisClient};

/// Connection settings shared by the OpenAI-compatible clients
#[derive(Debug, Clone)]
pub struct ApiSettings {
    /// Base URL, e.g. `https://api.openai.com/v1`
    pub base_url: String,
    pub api_key: String,
}

impl ApiSettings {
    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// Chat-completions response (only the fields we read)
#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    #[serde(default)]
    content: String,
}

/// Turn a non-success response into a classified error, keeping a body
/// snippet for diagnosis.
async fn error_from_response(
    context: &str,
    response: reqwest::Response,
) -> PipelineError {
    let status = response.status();
    let kind = classify_status(status);
    let body = response.text().await.unwrap_or_default();
    let snippet: String = body.chars().take(200).collect();
    PipelineError::new(kind, format!("{} returned {}: {}", context, status, snippet))
}

async fn post_chat(
    client: &reqwest::Client,
    settings: &ApiSettings,
    context: &str,
    body: serde_json::Value,
) -> Result<String, PipelineError> {
    let response = client
        .post(settings.url("chat/completions"))
        .bearer_auth(&settings.api_key)
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        let err = error_from_response(context, response).await;
        if err.kind() == crate::error::ErrorKind::UpstreamBadRequest {
            // Keep the request shape around for diagnosis; the caller will
            // degrade rather than block persistence.
            warn!(
                context,
                model = body.get("model").and_then(|m| m.as_str()).unwrap_or("?"),
                error = %err,
                "Upstream rejected request"
            );
        }
        return Err(err);
    }

    let parsed: ChatResponse = response
        .json()
        .await
        .map_err(|e| PipelineError::unknown(format!("{}: malformed response: {}", context, e)))?;

    let content = parsed
        .choices
        .into_iter()
        .next()
        .map(|c| c.message.content)
        .unwrap_or_default();

    Ok(content.trim().to_string())
}

/// Speech-to-text via the `/audio/transcriptions` endpoint
pub struct WhisperClient {
    settings: ApiSettings,
    model: String,
    client: reqwest::Client,
}

impl WhisperClient {
    pub fn new(settings: ApiSettings, model: impl Into<String>) -> Self {
        Self {
            settings,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl SpeechTranscriptionClient for WhisperClient {
    async fn transcribe(&self, audio_ref: &str) -> Result<String, PipelineError> {
        if audio_ref.trim().is_empty() {
            return Err(PipelineError::validation("empty audio reference"));
        }

        let file_name = std::path::Path::new(audio_ref)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "audio.m4a".to_string());

        let bytes = tokio::fs::read(audio_ref).await.map_err(|e| {
            PipelineError::validation(format!("unreadable audio file {}: {}", audio_ref, e))
        })?;

        let part = Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("audio/mp4")
            .map_err(|e| PipelineError::validation(e.to_string()))?;

        let form = Form::new()
            .text("model", self.model.clone())
            .part("file", part);

        let response = self
            .client
            .post(self.settings.url("audio/transcriptions"))
            .bearer_auth(&self.settings.api_key)
            .multipart(form)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response("transcription", response).await);
        }

        #[derive(Deserialize)]
        struct TranscriptionResponse {
            text: String,
        }

        let parsed: TranscriptionResponse = response.json().await.map_err(|e| {
            PipelineError::unknown(format!("transcription: malformed response: {}", e))
        })?;

        Ok(parsed.text.trim().to_string())
    }
}

/// Vision analysis via a chat completion with an `image_url` content part
pub struct VisionChatClient {
    settings: ApiSettings,
    model: String,
    client: reqwest::Client,
}

impl VisionChatClient {
    pub fn new(settings: ApiSettings, model: impl Into<String>) -> Self {
        Self {
            settings,
            model: model.into(),
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl VisionAnalysisClient for VisionChatClient {
    async fn describe(
        &self,
        image_ref: &str,
        prompt_context: &str,
    ) -> Result<String, PipelineError> {
        let url = reqwest::Url::parse(image_ref)
            .map_err(|_| PipelineError::validation(format!("not a URL: {}", image_ref)))?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(PipelineError::validation(format!(
                "unsupported image URL scheme: {}",
                url.scheme()
            )));
        }

        let body = json!({
            "model": self.model,
            "messages": [{
                "role": "user",
                "content": [
                    { "type": "text", "text": prompt_context },
                    { "type": "image_url", "image_url": { "url": image_ref } }
                ]
            }],
            "max_tokens": 300,
        });

        post_chat(&self.client, &self.settings, "vision", body).await
    }
}

/// Coaching generation with an optional fine-tuned methodology model.
///
/// The tier picks the model: `Methodology` requires the fine-tuned model id,
/// `Primary` and `Fallback` use the general-purpose ids.
pub struct ChatCoachingClient {
    settings: ApiSettings,
    primary_model: String,
    fallback_model: String,
    methodology_model: Option<String>,
    client: reqwest::Client,
}

impl ChatCoachingClient {
    pub fn new(
        settings: ApiSettings,
        primary_model: impl Into<String>,
        fallback_model: impl Into<String>,
        methodology_model: Option<String>,
    ) -> Self {
        Self {
            settings,
            primary_model: primary_model.into(),
            fallback_model: fallback_model.into(),
            methodology_model,
            client: reqwest::Client::new(),
        }
    }

    fn model_for(&self, tier: ModelTier) -> Result<&str, PipelineError> {
        match tier {
            ModelTier::Methodology => self
                .methodology_model
                .as_deref()
                .ok_or_else(|| PipelineError::validation("no methodology model configured")),
            ModelTier::Primary => Ok(&self.primary_model),
            ModelTier::Fallback => Ok(&self.fallback_model),
        }
    }
}

#[async_trait]
impl CoachingGenerationClient for ChatCoachingClient {
    async fn generate(&self, prompt: &str, tier: ModelTier) -> Result<String, PipelineError> {
        let model = self.model_for(tier)?;

        let body = json!({
            "model": model,
            "messages": [
                {
                    "role": "system",
                    "content": "You are a warm, encouraging reflection coach. \
                        Respond with a short, supportive message. Never give \
                        medical advice."
                },
                { "role": "user", "content": prompt }
            ],
            "max_tokens": 220,
            "temperature": 0.7,
        });

        post_chat(&self.client, &self.settings, "coaching", body).await
    }

    fn has_methodology_model(&self) -> bool {
        self.methodology_model.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings() -> ApiSettings {
        ApiSettings {
            base_url: "https://api.example.com/v1/".to_string(),
            api_key: "KEY".to_string(),
        }
    }

    #[test]
    fn test_url_joins_without_double_slash() {
        assert_eq!(
            settings().url("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_model_tier_selection() {
        let client = ChatCoachingClient::new(
            settings(),
            "gpt-4o",
            "gpt-4o-mini",
            Some("ft:methodology".to_string()),
        );

        assert!(client.has_methodology_model());
        assert_eq!(client.model_for(ModelTier::Methodology).unwrap(), "ft:methodology");
        assert_eq!(client.model_for(ModelTier::Primary).unwrap(), "gpt-4o");
        assert_eq!(client.model_for(ModelTier::Fallback).unwrap(), "gpt-4o-mini");
    }

    #[test]
    fn test_methodology_tier_requires_configuration() {
        let client = ChatCoachingClient::new(settings(), "gpt-4o", "gpt-4o-mini", None);
        assert!(!client.has_methodology_model());
        assert!(client.model_for(ModelTier::Methodology).is_err());
    }

    #[tokio::test]
    async fn test_vision_rejects_non_url() {
        let client = VisionChatClient::new(settings(), "gpt-4o");
        let err = client.describe("not-a-url", "context").await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }
}
