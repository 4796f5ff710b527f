//! Dense vector index with brute-force top-k search.

use std::cmp::Ordering;

use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};

/// Similarity function. Scores from different metrics are not comparable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum SimilarityMetric {
    /// Dot product of L2-normalised vectors. Zero vectors score 0.
    #[default]
    Cosine,
    /// `1 / (1 + d)` for Euclidean distance `d`.
    Euclidean,
    /// Raw dot product.
    DotProduct,
}

impl SimilarityMetric {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
            Self::DotProduct => "dot-product",
        }
    }
}

impl std::fmt::Display for SimilarityMetric {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SimilarityMetric {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "cosine" => Ok(Self::Cosine),
            "euclidean" => Ok(Self::Euclidean),
            "dot-product" | "dot_product" | "dot" => Ok(Self::DotProduct),
            other => Err(RagError::invalid(format!(
                "unknown similarity metric: {other}. Use one of: cosine, euclidean, dot-product"
            ))),
        }
    }
}

pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

pub fn l2_norm(v: &[f32]) -> f32 {
    v.iter().map(|x| x * x).sum::<f32>().sqrt()
}

/// Cosine similarity; 0.0 when either side has zero norm.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let denom = l2_norm(a) * l2_norm(b);
    if denom > 0.0 {
        dot(a, b) / denom
    } else {
        0.0
    }
}

pub fn euclidean_distance(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y).powi(2))
        .sum::<f32>()
        .sqrt()
}

/// Number of candidates to retrieve for a final list of `k`: `min(3k, n)` when
/// a reranker will reorder them, else `min(k, n)`.
pub fn candidate_count(k: usize, corpus_size: usize, reranking: bool) -> usize {
    let wanted = if reranking { k.saturating_mul(3) } else { k };
    wanted.min(corpus_size)
}

/// Row position and score of one search result.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SearchHit {
    pub index: usize,
    pub score: f32,
}

/// Embedding matrix for one chunk set, one row per chunk.
#[derive(Debug, Clone)]
pub struct SimilarityIndex {
    matrix: Array2<f32>,
    norms: Array1<f32>,
}

impl SimilarityIndex {
    /// Build from equal-length row vectors.
    pub fn new(vectors: &[Vec<f32>]) -> Result<Self> {
        let dims = vectors.first().map(Vec::len).unwrap_or(0);
        if let Some(bad) = vectors.iter().position(|v| v.len() != dims) {
            return Err(RagError::invalid(format!(
                "vector {bad} has {} dimensions, expected {dims}",
                vectors[bad].len()
            )));
        }
        let flat: Vec<f32> = vectors.iter().flatten().copied().collect();
        let matrix = Array2::from_shape_vec((vectors.len(), dims), flat)
            .map_err(|e| RagError::invalid(format!("bad embedding matrix shape: {e}")))?;
        let norms = matrix
            .rows()
            .into_iter()
            .map(|row| row.dot(&row).sqrt())
            .collect();
        Ok(Self { matrix, norms })
    }

    pub fn len(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.matrix.nrows() == 0
    }

    pub fn dimensions(&self) -> usize {
        self.matrix.ncols()
    }

    /// Score every row against `query`, in row order.
    pub fn scores(&self, query: &[f32], metric: SimilarityMetric) -> Result<Vec<f32>> {
        if query.len() != self.dimensions() {
            return Err(RagError::invalid(format!(
                "query has {} dimensions, index has {}",
                query.len(),
                self.dimensions()
            )));
        }
        let q = ArrayView1::from(query);

        let scores = match metric {
            SimilarityMetric::DotProduct => self.matrix.dot(&q).to_vec(),
            SimilarityMetric::Cosine => {
                let q_norm = q.dot(&q).sqrt();
                self.matrix
                    .dot(&q)
                    .iter()
                    .zip(self.norms.iter())
                    .map(|(d, n)| {
                        let denom = n * q_norm;
                        if denom > 0.0 {
                            d / denom
                        } else {
                            0.0
                        }
                    })
                    .collect()
            }
            SimilarityMetric::Euclidean => self
                .matrix
                .rows()
                .into_iter()
                .map(|row| {
                    let d = row
                        .iter()
                        .zip(query)
                        .map(|(x, y)| (x - y).powi(2))
                        .sum::<f32>()
                        .sqrt();
                    1.0 / (1.0 + d)
                })
                .collect(),
        };
        Ok(scores)
    }

    /// The `k` best rows by descending score. Ties keep row order.
    pub fn search(&self, query: &[f32], k: usize, metric: SimilarityMetric) -> Result<Vec<SearchHit>> {
        let scores = self.scores(query, metric)?;
        let mut hits: Vec<SearchHit> = scores
            .into_iter()
            .enumerate()
            .map(|(index, score)| SearchHit { index, score })
            .collect();
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn index() -> SimilarityIndex {
        SimilarityIndex::new(&[vec![1.0, 0.0], vec![0.0, 2.0], vec![3.0, 3.0]]).unwrap()
    }

    #[test]
    fn cosine_ranks_by_angle() {
        let hits = index().search(&[1.0, 0.1], 3, SimilarityMetric::Cosine).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 2, 1]);
        assert!(hits.windows(2).all(|w| w[0].score >= w[1].score));
    }

    #[test]
    fn dot_product_is_unnormalised() {
        let hits = index().search(&[1.0, 0.1], 1, SimilarityMetric::DotProduct).unwrap();
        assert_eq!(hits[0].index, 2);
        assert!((hits[0].score - 3.3).abs() < 1e-5);
    }

    #[test]
    fn euclidean_maps_distance_to_similarity() {
        let scores = index().scores(&[1.0, 0.0], SimilarityMetric::Euclidean).unwrap();
        assert!((scores[0] - 1.0).abs() < 1e-6);
        assert!(scores[1] < scores[0]);
    }

    #[test]
    fn zero_query_scores_zero_under_cosine() {
        let scores = index().scores(&[0.0, 0.0], SimilarityMetric::Cosine).unwrap();
        assert!(scores.iter().all(|s| *s == 0.0));
    }

    #[test]
    fn ties_keep_row_order() {
        let idx = SimilarityIndex::new(&[vec![1.0], vec![1.0], vec![1.0]]).unwrap();
        let hits = idx.search(&[1.0], 3, SimilarityMetric::Cosine).unwrap();
        let order: Vec<usize> = hits.iter().map(|h| h.index).collect();
        assert_eq!(order, vec![0, 1, 2]);
    }

    #[test]
    fn ragged_vectors_are_rejected() {
        assert!(SimilarityIndex::new(&[vec![1.0, 2.0], vec![1.0]]).is_err());
    }

    #[test]
    fn dimension_mismatch_is_rejected() {
        assert!(index().scores(&[1.0], SimilarityMetric::Cosine).is_err());
    }

    #[test]
    fn overfetch_is_three_k_capped_by_corpus() {
        assert_eq!(candidate_count(5, 100, true), 15);
        assert_eq!(candidate_count(5, 7, true), 7);
        assert_eq!(candidate_count(5, 100, false), 5);
    }

    #[test]
    fn metric_parses() {
        assert_eq!("dot_product".parse::<SimilarityMetric>().unwrap(), SimilarityMetric::DotProduct);
        assert!("manhattan".parse::<SimilarityMetric>().is_err());
    }
}
