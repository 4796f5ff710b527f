//! Text generation backend.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Client;
use serde::{Deserialize, Serialize};

use super::{PromptTemplate, TokenUsage};
use crate::config::GenerationConfig;
use crate::error::{ErrorKind, RagError, Result};
use crate::guardrails::GuardrailFinding;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GenerationParams {
    pub model_id: String,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
}

impl GenerationParams {
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            model_id: config.model.clone(),
            max_tokens: config.max_tokens,
            temperature: config.temperature,
            top_p: config.top_p,
        }
    }
}

/// A remote model that completes a prompt.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String>;
}

/// Result of one generation attempt. Failure is a value, not an error, so
/// guardrail findings and token estimates can still be reported.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum GenerationOutcome {
    Generated { text: String },
    Failed { kind: ErrorKind, message: String },
}

impl GenerationOutcome {
    /// Generated text, or empty on failure.
    pub fn text(&self) -> &str {
        match self {
            Self::Generated { text } => text,
            Self::Failed { .. } => "",
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Generated { .. })
    }

    pub(crate) fn failed(err: &RagError) -> Self {
        Self::Failed {
            kind: err.kind(),
            message: format!("Error generating response: {err}"),
        }
    }
}

/// Everything produced by one prompt-and-generate call.
#[derive(Debug, Clone, Serialize)]
pub struct GenerationReport {
    pub prompt: String,
    pub template: PromptTemplate,
    pub model_id: String,
    pub context_chunks: usize,
    pub outcome: GenerationOutcome,
    pub guardrails: Vec<GuardrailFinding>,
    pub token_usage: TokenUsage,
}

/// Client for OpenAI-compatible chat completion endpoints.
#[derive(Clone)]
pub struct HttpGenerationBackend {
    client: Client,
    endpoint: String,
}

impl HttpGenerationBackend {
    pub fn new(endpoint: impl Into<String>, api_key: Option<&str>, timeout: Duration) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        if let Some(key) = api_key.map(str::trim).filter(|k| !k.is_empty()) {
            let auth = HeaderValue::from_str(&format!("Bearer {key}"))
                .map_err(|_| RagError::invalid("generation API key is not a valid header value"))?;
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
    pub fn from_config(config: &GenerationConfig) -> Result<Option<Self>> {
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
        tracing::info!(endpoint = %endpoint, "remote generation backend configured");
        Ok(Some(backend))
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: Option<String>,
}

#[async_trait]
impl TextGenerator for HttpGenerationBackend {
    async fn generate(&self, prompt: &str, params: &GenerationParams) -> Result<String> {
        let request = ChatRequest {
            model: &params.model_id,
            messages: [ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: params.max_tokens,
            temperature: params.temperature,
            top_p: params.top_p,
        };
        let resp = self.client.post(&self.endpoint).json(&request).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp
                .text()
                .await
                .unwrap_or_else(|_| "<body unavailable>".to_string());
            return Err(RagError::Backend(format!(
                "generation request failed ({status}): {body}"
            )));
        }

        let body = resp.text().await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| RagError::Backend(format!("unreadable generation response: {e}")))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RagError::Backend("generation response had no content".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_follow_config_defaults() {
        let params = GenerationParams::from_config(&GenerationConfig::default());
        assert_eq!(params.max_tokens, 4000);
        assert!((params.temperature - 0.1).abs() < 1e-6);
        assert!((params.top_p - 0.9).abs() < 1e-6);
    }

    #[test]
    fn failed_outcome_keeps_kind() {
        let outcome = GenerationOutcome::failed(&RagError::Timeout("60s".into()));
        assert!(!outcome.is_success());
        assert_eq!(outcome.text(), "");
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "timeout");
    }

    #[test]
    fn unconfigured_endpoint_yields_none() {
        assert!(HttpGenerationBackend::from_config(&GenerationConfig::default())
            .unwrap()
            .is_none());
    }
}
