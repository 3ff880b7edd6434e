//! REST backend client and connectivity probe.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::debug;

use crate::domain::{Entry, EntryDraft, SyncState};
use crate::error::{classify_status, PipelineError};

use super::{BackendWriteClient, ConnectivityOracle};

/// REST client for the journaling backend.
///
/// Inserts go to `POST {base}/entries`; binary uploads to
/// `POST {base}/storage/upload`.
pub struct RestBackendClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

/// Insert response (only the fields the pipeline touches)
#[derive(Debug, Deserialize)]
struct InsertResponse {
    id: String,
    #[serde(default)]
    audio_url: Option<String>,
    #[serde(default)]
    image_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    url: String,
}

impl RestBackendClient {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            client: reqwest::Client::new(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

#[async_trait]
impl BackendWriteClient for RestBackendClient {
    async fn insert_entry(&self, draft: &EntryDraft) -> Result<Entry, PipelineError> {
        let response = self
            .client
            .post(self.url("entries"))
            .bearer_auth(&self.api_key)
            .json(draft)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(200).collect();
            return Err(PipelineError::new(
                classify_status(status),
                format!("insert returned {}: {}", status, snippet),
            ));
        }

        let row: InsertResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::unknown(format!("insert: malformed response: {}", e)))?;

        // Client-side created_at is authoritative; only ids and storage URLs
        // come back from the server.
        let mut entry = Entry::from_draft(row.id, SyncState::Synced, draft);
        if row.audio_url.is_some() {
            entry.audio_url = row.audio_url;
        }
        if row.image_url.is_some() {
            entry.image_url = row.image_url;
        }
        Ok(entry)
    }

    async fn upload_binary(&self, local_ref: &str) -> Result<String, PipelineError> {
        let file_name = std::path::Path::new(local_ref)
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "capture.bin".to_string());

        let bytes = tokio::fs::read(local_ref).await.map_err(|e| {
            PipelineError::validation(format!("unreadable file {}: {}", local_ref, e))
        })?;

        let form = Form::new().part("file", Part::bytes(bytes).file_name(file_name));

        let response = self
            .client
            .post(self.url("storage/upload"))
            .bearer_auth(&self.api_key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(PipelineError::new(
                classify_status(status),
                format!("upload returned {}", status),
            ));
        }

        let parsed: UploadResponse = response
            .json()
            .await
            .map_err(|e| PipelineError::unknown(format!("upload: malformed response: {}", e)))?;

        Ok(parsed.url)
    }
}

/// Connectivity oracle backed by a short HEAD probe, with a brief cache so
/// back-to-back saves don't each pay a probe round-trip.
pub struct ProbeConnectivityOracle {
    probe_url: String,
    cache_ttl: Duration,
    client: reqwest::Client,
    cached: Mutex<Option<(Instant, bool)>>,
}

impl ProbeConnectivityOracle {
    pub fn new(probe_url: impl Into<String>) -> Self {
        Self {
            probe_url: probe_url.into(),
            cache_ttl: Duration::from_secs(5),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(2))
                .build()
                .unwrap_or_default(),
            cached: Mutex::new(None),
        }
    }

    async fn probe(&self) -> bool {
        match self.client.head(&self.probe_url).send().await {
            Ok(response) => !response.status().is_server_error(),
            Err(e) => {
                debug!(error = %e, "Connectivity probe failed");
                false
            }
        }
    }
}

#[async_trait]
impl ConnectivityOracle for ProbeConnectivityOracle {
    async fn is_online(&self) -> bool {
        let mut cached = self.cached.lock().await;
        if let Some((at, online)) = *cached {
            if at.elapsed() < self.cache_ttl {
                return online;
            }
        }

        let online = self.probe().await;
        *cached = Some((Instant::now(), online));
        online
    }
}
