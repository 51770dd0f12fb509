//! Archival sink: upload finalized metrics to a content-addressed storage
//! gateway and return the content identifier.
//!
//! The upload is strictly post-run and optional. A missing API key disables
//! the sink; an upload failure is reported to the caller, who logs it and
//! moves on. Nothing here can affect scores.

use anyhow::{Context, Result};
use gridprobe_common::{ArchiveSettings, FinalizedMetrics, NodeId};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info};

/// Response body of the gateway's add endpoint.
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
    #[serde(rename = "Size")]
    size: Option<String>,
}

pub struct ArchiveSink {
    endpoint: String,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl ArchiveSink {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            api_key,
            client: reqwest::Client::new(),
        }
    }

    /// Build the sink from configuration, reading the API key from the
    /// environment variable the settings name.
    pub fn from_settings(settings: &ArchiveSettings) -> Self {
        let api_key = std::env::var(&settings.api_key_env).ok();
        if api_key.is_none() {
            debug!(
                "No archive API key in {}; archival disabled",
                settings.api_key_env
            );
        }
        Self::new(settings.endpoint.clone(), api_key)
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Serialize the metrics map and upload it as a timestamped JSON file.
    /// Returns the content identifier the gateway assigned.
    pub async fn upload(
        &self,
        metrics: &BTreeMap<NodeId, FinalizedMetrics>,
    ) -> Result<String> {
        let api_key = self
            .api_key
            .as_ref()
            .context("Archive API key not configured")?;

        let body = serde_json::to_vec_pretty(metrics).context("Failed to serialize metrics")?;
        let filename = format!(
            "gridprobe_results_{}.json",
            chrono::Utc::now().format("%Y%m%dT%H%M%SZ")
        );

        let part = reqwest::multipart::Part::bytes(body)
            .file_name(filename.clone())
            .mime_str("application/json")
            .context("Invalid multipart content type")?;
        let form = reqwest::multipart::Form::new().part("file", part);

        info!("Uploading {} to {}", filename, self.endpoint);
        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(api_key)
            .multipart(form)
            .send()
            .await
            .context("Archive upload request failed")?
            .error_for_status()
            .context("Archive gateway rejected the upload")?;

        let parsed: AddResponse = response
            .json()
            .await
            .context("Failed to parse archive gateway response")?;

        info!(
            "Archived metrics as {} ({} bytes)",
            parsed.hash,
            parsed.size.as_deref().unwrap_or("?")
        );
        Ok(parsed.hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sink_disabled_without_key() {
        let sink = ArchiveSink::new("https://gateway.example.com/api/v0/add", None);
        assert!(!sink.is_enabled());
    }

    #[test]
    fn test_sink_enabled_with_key() {
        let sink = ArchiveSink::new(
            "https://gateway.example.com/api/v0/add",
            Some("key".to_string()),
        );
        assert!(sink.is_enabled());
    }

    #[tokio::test]
    async fn test_upload_without_key_errors() {
        let sink = ArchiveSink::new("https://gateway.example.com/api/v0/add", None);
        let metrics = BTreeMap::new();
        assert!(sink.upload(&metrics).await.is_err());
    }

    #[test]
    fn test_add_response_parsing() {
        let json = r#"{"Name":"gridprobe_results_x.json","Hash":"bafybeigdyrzt5","Size":"1024"}"#;
        let parsed: AddResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.hash, "bafybeigdyrzt5");
        assert_eq!(parsed.size.as_deref(), Some("1024"));
    }
}
