use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::chunking::{ChunkParams, ChunkStrategy};
use crate::embedding::EmbeddingMethod;
use crate::prompt::PromptTemplate;
use crate::rerank::RerankMethod;
use crate::retrieval::SimilarityMetric;

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct RagConfig {
    pub server: ServerConfig,
    pub chunking: ChunkingConfig,
    pub embedding: EmbeddingConfig,
    pub retrieval: RetrievalConfig,
    pub generation: GenerationConfig,
    pub guardrails: GuardrailConfig,
    pub visualization: VisualizationConfig,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub log_level: String,
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct ChunkingConfig {
    pub strategy: ChunkStrategy,
    #[serde(flatten)]
    pub params: ChunkParams,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct EmbeddingConfig {
    pub method: EmbeddingMethod,
    pub model: String,
    /// Remote embedding endpoint. Remote embedding is unavailable while unset.
    pub endpoint: Option<String>,
    /// Name of the environment variable holding the bearer token.
    pub api_key_env: Option<String>,
    pub batch_size: usize,
    pub timeout_secs: u64,
    /// Overrides the model catalog's dimensionality for zero-vector fallbacks.
    pub dimensions: Option<usize>,
    /// Vocabulary cap for the lexical vectorizer.
    pub max_features: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub top_k: usize,
    pub metric: SimilarityMetric,
    pub rerank: RerankMethod,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GenerationConfig {
    pub endpoint: Option<String>,
    pub model: String,
    pub api_key_env: Option<String>,
    pub max_tokens: u32,
    pub temperature: f32,
    pub top_p: f32,
    pub timeout_secs: u64,
    pub template: PromptTemplate,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct GuardrailConfig {
    /// Minimum relevant-chunk fraction for a pass.
    pub relevance_pass: f64,
    /// Minimum relevant-chunk fraction for a warning.
    pub relevance_warn: f64,
    /// Maximum estimated tokens for a pass.
    pub token_pass: usize,
    /// Maximum estimated tokens for a warning.
    pub token_warn: usize,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct VisualizationConfig {
    /// Projection target when a caller asks for one without a size.
    pub dimensions: usize,
}

impl VisualizationConfig {
    pub fn dimensions_or(&self, requested: Option<usize>) -> usize {
        requested.unwrap_or(self.dimensions)
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            log_level: "info".into(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            method: EmbeddingMethod::Lexical,
            model: "amazon.titan-embed-text-v1".into(),
            endpoint: None,
            api_key_env: None,
            batch_size: 25,
            timeout_secs: 30,
            dimensions: None,
            max_features: 1000,
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 5,
            metric: SimilarityMetric::Cosine,
            rerank: RerankMethod::None,
        }
    }
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: "anthropic.claude-3-sonnet-20240229-v1:0".into(),
            api_key_env: None,
            max_tokens: 4000,
            temperature: 0.1,
            top_p: 0.9,
            timeout_secs: 60,
            template: PromptTemplate::BasicQa,
        }
    }
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            relevance_pass: 0.7,
            relevance_warn: 0.4,
            token_pass: 2000,
            token_warn: 4000,
        }
    }
}

impl Default for VisualizationConfig {
    fn default() -> Self {
        Self { dimensions: 2 }
    }
}

/// Returns `~/.ragpipe/`, or `./.ragpipe/` when no home directory is known.
pub fn default_ragpipe_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".ragpipe")
}

/// Returns the default config file path: `~/.ragpipe/config.toml`
pub fn default_config_path() -> PathBuf {
    default_ragpipe_dir().join("config.toml")
}

impl RagConfig {
    /// Load config from TOML file (if it exists) then apply env var overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(default_config_path())
    }

    /// Load from a specific path, then apply env var overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut config = if path.exists() {
            let contents =
                std::fs::read_to_string(path).context("failed to read config file")?;
            toml::from_str(&contents).context("failed to parse config TOML")?
        } else {
            info!("no config file at {}, using defaults", path.display());
            RagConfig::default()
        };

        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides (`RAGPIPE_*`).
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("RAGPIPE_LOG_LEVEL") {
            self.server.log_level = val;
        }
        if let Ok(val) = std::env::var("RAGPIPE_EMBEDDING_ENDPOINT") {
            self.embedding.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("RAGPIPE_EMBEDDING_MODEL") {
            self.embedding.model = val;
        }
        if let Ok(val) = std::env::var("RAGPIPE_GENERATION_ENDPOINT") {
            self.generation.endpoint = Some(val);
        }
        if let Ok(val) = std::env::var("RAGPIPE_GENERATION_MODEL") {
            self.generation.model = val;
        }
    }

    pub fn embedding_configured(&self) -> bool {
        is_set(&self.embedding.endpoint)
    }

    pub fn generation_configured(&self) -> bool {
        is_set(&self.generation.endpoint)
    }
}

fn is_set(endpoint: &Option<String>) -> bool {
    endpoint.as_deref().is_some_and(|e| !e.trim().is_empty())
}

pub fn expand_tilde(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => PathBuf::from(path),
    }
}
