//! Remote embedding backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::model_dimensions;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

/// A service that embeds one text at a time.
///
/// `embed_batch` issues one call per item, sequentially, and reports each
/// item's outcome separately so one failure never aborts the batch.
#[async_trait]
pub trait RemoteEmbedder: Send + Sync {
    async fn embed_one(&self, text: &str, model_id: &str) -> Result<Vec<f32>>;

    async fn embed_batch(&self, texts: &[String], model_id: &str) -> Vec<Result<Vec<f32>>> {
        let mut out = Vec::with_capacity(texts.len());
        for text in texts {
            out.push(self.embed_one(text, model_id).await);
        }
        out
    }

    /// Known dimensionality of `model_id`, used to size zero-vector substitutes.
    fn dimensions(&self, model_id: &str) -> Option<usize> {
        model_dimensions(model_id)
    }
}

/// Embedding client for JSON endpoints that accept `{"model", "input"}` and
/// answer either OpenAI-style (`data[0].embedding`) or with a bare `embedding`.
#[derive(Clone)]
pub struct HttpEmbeddingBackend {
    client: Client,
    endpoint: String,
}

impl HttpEmbeddingBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let auth = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| RagError::invalid("embedding API key is not a valid header value"))?;
            headers.insert(AUTHORIZATION, auth);
        }
        let client = Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Build from config. `Ok(None)` when no endpoint is configured.
    pub fn from_config(config: &EmbeddingConfig) -> Result<Option<Self>> {
        let Some(endpoint) = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
        else {
            return Ok(None);
        };
        let api_key = config
            .api_key_env
            .as_deref()
            .and_then(|var| std::env::var(var).ok());
        let backend = Self::new(
            endpoint,
            api_key.as_deref(),
            Duration::from_secs(config.timeout_secs),
        )?;
        tracing::info!(endpoint = %endpoint, "remote embedding backend configured");
        Ok(Some(backend))
    }
}

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum EmbeddingResponse {
    Data { data: Vec<EmbeddingEntry> },
    Bare { embedding: Vec<f32> },
}

#[derive(Deserialize)]
struct EmbeddingEntry {
    embedding: Vec<f32>,
}

#[async_trait]
impl RemoteEmbedder for HttpEmbeddingBackend {
    async fn embed_one(&self, text: &str, model_id: &str) -> Result<Vec<f32>> {
        let request = EmbeddingRequest {
            model: model_id,
            input: text,
        };
        let resp = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::Backend(format!(
                "embedding request failed ({status}): {body}"
            )));
        }

        let body = resp.text().await?;
        let parsed: EmbeddingResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Backend(format!("unreadable embedding response: {e}")))?;
        match parsed {
            EmbeddingResponse::Data { data } => data
                .into_iter()
                .next()
                .map(|entry| entry.embedding)
                .ok_or_else(|| RagError::Backend("embedding response had no data".into())),
            EmbeddingResponse::Bare { embedding } => Ok(embedding),
        }
    }
}
