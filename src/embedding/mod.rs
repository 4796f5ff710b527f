//! Text-to-vector embedding.
//!
//! [`EmbeddingProvider`] turns chunk text into an [`EmbeddingSet`] using one of
//! two explicitly selected backends:
//!
//! - [`EmbeddingMethod::Remote`]: an HTTP embedding service behind
//!   [`RemoteEmbedder`]. Per-item failures are replaced with zero vectors and
//!   counted in [`EmbeddingSet::fallbacks`].
//! - [`EmbeddingMethod::Lexical`]: a TF-IDF vectorizer fitted on the chunk set.
//!   Its vectors only compare with vectors from the same fit.

pub mod lexical;
pub mod remote;

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::chunking::Chunk;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};
use crate::retrieval::cosine_similarity;

pub use lexical::{LexicalSentenceEncoder, TfidfVectorizer};
pub use remote::{HttpEmbeddingBackend, RemoteEmbedder};

/// Which backend produced an embedding set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EmbeddingMethod {
    Remote,
    #[default]
    Lexical,
}

impl EmbeddingMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Remote => "remote",
            Self::Lexical => "lexical",
        }
    }
}

impl std::fmt::Display for EmbeddingMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for EmbeddingMethod {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "remote" | "bedrock" => Ok(Self::Remote),
            "lexical" | "tfidf" | "tf-idf" => Ok(Self::Lexical),
            other => Err(RagError::invalid(format!(
                "unknown embedding method: {other}. Use one of: remote, lexical"
            ))),
        }
    }
}

// ── Model catalog ─────────────────────────────────────────────────────────────

/// A known remote embedding model.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct ModelInfo {
    pub id: &'static str,
    pub name: &'static str,
    pub dimensions: usize,
}

pub const MODEL_CATALOG: &[ModelInfo] = &[
    ModelInfo {
        id: "amazon.titan-embed-text-v1",
        name: "Amazon Titan Text Embeddings",
        dimensions: 1536,
    },
    ModelInfo {
        id: "amazon.titan-embed-text-v2:0",
        name: "Amazon Titan Text Embeddings V2",
        dimensions: 1024,
    },
    ModelInfo {
        id: "cohere.embed-english-v3",
        name: "Cohere Embed English",
        dimensions: 1024,
    },
    ModelInfo {
        id: "cohere.embed-multilingual-v3",
        name: "Cohere Embed Multilingual",
        dimensions: 1024,
    },
    ModelInfo {
        id: "text-embedding-3-small",
        name: "OpenAI text-embedding-3-small",
        dimensions: 1536,
    },
];

/// Dimensionality of a catalogued model.
pub fn model_dimensions(model_id: &str) -> Option<usize> {
    MODEL_CATALOG
        .iter()
        .find(|m| m.id == model_id)
        .map(|m| m.dimensions)
}

// ── Embedding set ─────────────────────────────────────────────────────────────

/// One vector per chunk, positionally aligned with `chunk_ids`.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingSet {
    pub vectors: Vec<Vec<f32>>,
    pub chunk_ids: Vec<String>,
    pub method: EmbeddingMethod,
    pub model_id: String,
    pub dimensions: usize,
    /// Positions whose vector is a zero-vector substitute for a failed item.
    pub fallbacks: Vec<usize>,
    /// The vectorizer fitted for this set (lexical only). Queries against this
    /// set must be transformed with it.
    #[serde(skip)]
    pub vectorizer: Option<Arc<TfidfVectorizer>>,
}

impl EmbeddingSet {
    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// True when any vector is a fallback substitute.
    pub fn is_degraded(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    pub fn fallback_count(&self) -> usize {
        self.fallbacks.len()
    }
}

// ── Provider ──────────────────────────────────────────────────────────────────

pub struct EmbeddingProvider {
    remote: Option<Arc<dyn RemoteEmbedder>>,
    batch_size: usize,
    dimensions_override: Option<usize>,
    max_features: usize,
}

impl EmbeddingProvider {
    /// `remote` is `None` when no remote backend is configured.
    pub fn new(config: &EmbeddingConfig, remote: Option<Arc<dyn RemoteEmbedder>>) -> Self {
        Self {
            remote,
            batch_size: config.batch_size.max(1),
            dimensions_override: config.dimensions,
            max_features: config.max_features,
        }
    }

    /// A provider with only the lexical backend.
    pub fn lexical(max_features: usize) -> Self {
        Self {
            remote: None,
            batch_size: 25,
            dimensions_override: None,
            max_features,
        }
    }

    pub fn remote_configured(&self) -> bool {
        self.remote.is_some()
    }

    pub fn max_features(&self) -> usize {
        self.max_features
    }

    pub(crate) fn remote_backend(&self) -> Result<&Arc<dyn RemoteEmbedder>> {
        self.remote.as_ref().ok_or_else(|| {
            RagError::BackendUnavailable("remote embedding backend is not configured".into())
        })
    }

    /// Embed every chunk with the selected method.
    pub async fn embed(
        &self,
        chunks: &[Chunk],
        method: EmbeddingMethod,
        model_id: &str,
    ) -> Result<EmbeddingSet> {
        if chunks.is_empty() {
            return Err(RagError::invalid("no chunks to embed"));
        }
        let texts: Vec<String> = chunks.iter().map(|c| c.content.clone()).collect();
        let chunk_ids = chunks.iter().map(|c| c.id.clone()).collect();

        let set = match method {
            EmbeddingMethod::Lexical => {
                let refs: Vec<&str> = texts.iter().map(String::as_str).collect();
                let (vectorizer, vectors) =
                    TfidfVectorizer::fit_transform(&refs, self.max_features)?;
                EmbeddingSet {
                    dimensions: vectorizer.dimensions(),
                    vectors,
                    chunk_ids,
                    method,
                    model_id: "tfidf".into(),
                    fallbacks: Vec::new(),
                    vectorizer: Some(Arc::new(vectorizer)),
                }
            }
            EmbeddingMethod::Remote => {
                let (vectors, dimensions, fallbacks) = self.embed_remote(&texts, model_id).await?;
                EmbeddingSet {
                    vectors,
                    chunk_ids,
                    method,
                    model_id: model_id.to_string(),
                    dimensions,
                    fallbacks,
                    vectorizer: None,
                }
            }
        };

        tracing::info!(
            method = %set.method,
            model = %set.model_id,
            vectors = set.len(),
            dimensions = set.dimensions,
            fallbacks = set.fallback_count(),
            "chunks embedded"
        );
        Ok(set)
    }

    /// Embed texts remotely in batches, substituting zero vectors for failed or
    /// malformed items. Returns the vectors, their dimensionality and the
    /// substituted positions.
    pub async fn embed_remote(
        &self,
        texts: &[String],
        model_id: &str,
    ) -> Result<(Vec<Vec<f32>>, usize, Vec<usize>)> {
        let backend = self.remote_backend()?;

        let mut results = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            results.extend(backend.embed_batch(batch, model_id).await);
        }

        let known = self
            .dimensions_override
            .or_else(|| backend.dimensions(model_id));
        let dimensions = known
            .or_else(|| results.iter().find_map(|r| r.as_ref().ok().map(Vec::len)))
            .ok_or_else(|| {
                RagError::Backend(format!(
                    "every embedding request failed and model {model_id} has no known dimensionality"
                ))
            })?;

        let mut fallbacks = Vec::new();
        let vectors = results
            .into_iter()
            .enumerate()
            .map(|(idx, result)| match result {
                Ok(v) if v.len() == dimensions => v,
                Ok(v) => {
                    tracing::warn!(
                        index = idx,
                        expected = dimensions,
                        got = v.len(),
                        "embedding has wrong dimensionality, using zero vector"
                    );
                    fallbacks.push(idx);
                    vec![0.0; dimensions]
                }
                Err(e) => {
                    tracing::warn!(index = idx, error = %e, "embedding failed, using zero vector");
                    fallbacks.push(idx);
                    vec![0.0; dimensions]
                }
            })
            .collect();

        Ok((vectors, dimensions, fallbacks))
    }

    /// Embed a query so it is comparable with `set`.
    pub async fn embed_query(&self, query: &str, set: &EmbeddingSet) -> Result<Vec<f32>> {
        let vector = match set.method {
            EmbeddingMethod::Lexical => {
                let vectorizer = set.vectorizer.as_ref().ok_or_else(|| {
                    RagError::invalid("lexical embedding set has no fitted vectorizer")
                })?;
                vectorizer.transform(query)
            }
            EmbeddingMethod::Remote => {
                self.remote_backend()?
                    .embed_one(query, &set.model_id)
                    .await?
            }
        };
        if vector.len() != set.dimensions {
            return Err(RagError::Backend(format!(
                "query embedding has {} dimensions, expected {}",
                vector.len(),
                set.dimensions
            )));
        }
        Ok(vector)
    }
}

// ── Analysis ──────────────────────────────────────────────────────────────────

/// Summary statistics for an embedding set.
#[derive(Debug, Clone, Serialize)]
pub struct EmbeddingStats {
    pub method: EmbeddingMethod,
    pub model_id: String,
    pub dimensions: usize,
    pub vectors: usize,
    /// Fraction of exactly-zero entries.
    pub sparsity: f64,
    pub mean_magnitude: f64,
    pub fallbacks: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feature_count: Option<usize>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub sample_terms: Vec<String>,
}

impl EmbeddingStats {
    pub fn of(set: &EmbeddingSet) -> Self {
        let total = set.vectors.iter().map(Vec::len).sum::<usize>();
        let zeros = set
            .vectors
            .iter()
            .flatten()
            .filter(|x| **x == 0.0)
            .count();
        let magnitude_sum: f64 = set
            .vectors
            .iter()
            .map(|v| v.iter().map(|x| (*x as f64).powi(2)).sum::<f64>().sqrt())
            .sum();

        Self {
            method: set.method,
            model_id: set.model_id.clone(),
            dimensions: set.dimensions,
            vectors: set.len(),
            sparsity: if total == 0 { 0.0 } else { zeros as f64 / total as f64 },
            mean_magnitude: if set.is_empty() {
                0.0
            } else {
                magnitude_sum / set.len() as f64
            },
            fallbacks: set.fallback_count(),
            feature_count: set.vectorizer.as_ref().map(|v| v.dimensions()),
            sample_terms: set
                .vectorizer
                .as_ref()
                .map(|v| v.terms().iter().take(10).cloned().collect())
                .unwrap_or_default(),
        }
    }
}

/// Cosine similarity of one chunk pair.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PairSimilarity {
    pub first: String,
    pub second: String,
    pub similarity: f32,
}

/// Every chunk pair whose cosine similarity is at least `threshold`, most
/// similar first.
pub fn pairwise_similarities(set: &EmbeddingSet, threshold: f32) -> Vec<PairSimilarity> {
    let mut pairs = Vec::new();
    for i in 0..set.len() {
        for j in (i + 1)..set.len() {
            let similarity = cosine_similarity(&set.vectors[i], &set.vectors[j]);
            if similarity >= threshold {
                pairs.push(PairSimilarity {
                    first: set.chunk_ids[i].clone(),
                    second: set.chunk_ids[j].clone(),
                    similarity,
                });
            }
        }
    }
    pairs.sort_by(|a, b| {
        b.similarity
            .partial_cmp(&a.similarity)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    pairs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(vectors: Vec<Vec<f32>>) -> EmbeddingSet {
        let dimensions = vectors.first().map(Vec::len).unwrap_or(0);
        EmbeddingSet {
            chunk_ids: (1..=vectors.len()).map(|i| format!("chunk-{i}")).collect(),
            vectors,
            method: EmbeddingMethod::Remote,
            model_id: "test".into(),
            dimensions,
            fallbacks: vec![],
            vectorizer: None,
        }
    }

    #[test]
    fn method_parses_aliases() {
        assert_eq!("tfidf".parse::<EmbeddingMethod>().unwrap(), EmbeddingMethod::Lexical);
        assert_eq!("Remote".parse::<EmbeddingMethod>().unwrap(), EmbeddingMethod::Remote);
        assert!("bert".parse::<EmbeddingMethod>().is_err());
    }

    #[test]
    fn catalog_knows_titan() {
        assert_eq!(model_dimensions("amazon.titan-embed-text-v1"), Some(1536));
        assert_eq!(model_dimensions("cohere.embed-english-v3"), Some(1024));
        assert_eq!(model_dimensions("unknown"), None);
    }

    #[test]
    fn pairwise_filters_and_sorts() {
        let s = set(vec![vec![1.0, 0.0], vec![0.9, 0.1], vec![0.0, 1.0]]);
        let pairs = pairwise_similarities(&s, 0.7);
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].first, "chunk-1");
        assert_eq!(pairs[0].second, "chunk-2");
    }

    #[test]
    fn stats_report_sparsity_and_magnitude() {
        let s = set(vec![vec![3.0, 4.0], vec![0.0, 0.0]]);
        let stats = EmbeddingStats::of(&s);
        assert_eq!(stats.vectors, 2);
        assert!((stats.sparsity - 0.5).abs() < 1e-9);
        assert!((stats.mean_magnitude - 2.5).abs() < 1e-9);
        assert!(stats.feature_count.is_none());
    }

    #[tokio::test]
    async fn remote_without_backend_is_unavailable() {
        let provider = EmbeddingProvider::lexical(1000);
        let chunks = vec![Chunk::new("chunk-1", "hello world", crate::chunking::ChunkStrategy::FixedSize)];
        let err = provider
            .embed(&chunks, EmbeddingMethod::Remote, "amazon.titan-embed-text-v1")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::BackendUnavailable);
    }

    #[tokio::test]
    async fn lexical_set_carries_vectorizer() {
        let provider = EmbeddingProvider::lexical(1000);
        let chunks = vec![
            Chunk::new("chunk-1", "rust ownership rules", crate::chunking::ChunkStrategy::FixedSize),
            Chunk::new("chunk-2", "python garbage collection", crate::chunking::ChunkStrategy::FixedSize),
        ];
        let set = provider
            .embed(&chunks, EmbeddingMethod::Lexical, "ignored")
            .await
            .unwrap();
        assert_eq!(set.len(), 2);
        assert!(set.vectorizer.is_some());
        assert!(!set.is_degraded());

        let query = provider.embed_query("rust rules", &set).await.unwrap();
        assert_eq!(query.len(), set.dimensions);
    }
}
