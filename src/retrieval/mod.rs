//! Similarity search over a processed document.
//!
//! A [`SessionContext`] owns one document's chunks, embeddings and
//! [`SimilarityIndex`]. Searches produce [`RankedResult`]s that the reranker
//! may reorder.

pub mod index;
pub mod session;

use serde::Serialize;

use crate::chunking::Chunk;
use crate::rerank::RerankMethod;

pub use index::{
    candidate_count, cosine_similarity, dot, euclidean_distance, l2_norm, SearchHit,
    SimilarityIndex, SimilarityMetric,
};
pub use session::{DocumentStats, SessionContext};

/// A retrieved chunk with its scores and ranks (both 1-based).
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RankedResult {
    pub chunk: Chunk,
    pub similarity_score: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerank_score: Option<f32>,
    pub initial_rank: usize,
    pub final_rank: usize,
}

impl RankedResult {
    pub fn new(chunk: Chunk, similarity_score: f32, rank: usize) -> Self {
        Self {
            chunk,
            similarity_score,
            rerank_score: None,
            initial_rank: rank,
            final_rank: rank,
        }
    }

    /// The score the result is ordered by.
    pub fn effective_score(&self) -> f32 {
        self.rerank_score.unwrap_or(self.similarity_score)
    }
}

/// Summary of one search.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct QueryMetrics {
    pub total_chunks: usize,
    pub candidates: usize,
    pub retrieved: usize,
    pub avg_similarity: f32,
    pub metric: SimilarityMetric,
    pub rerank_method: RerankMethod,
    /// Zero-vector substitutes in the searched embedding set.
    pub fallback_vectors: usize,
}

impl QueryMetrics {
    pub fn avg_similarity(results: &[RankedResult]) -> f32 {
        if results.is_empty() {
            return 0.0;
        }
        results.iter().map(|r| r.similarity_score).sum::<f32>() / results.len() as f32
    }
}

/// Search results plus their metrics.
#[derive(Debug, Clone, Serialize)]
pub struct SearchOutcome {
    pub results: Vec<RankedResult>,
    pub metrics: QueryMetrics,
}
