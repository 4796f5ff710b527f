//! Heuristic reranking of retrieval candidates.
//!
//! Every method computes a secondary score in `[0, 1]` per candidate and blends
//! it with the candidate's similarity score; similarity always carries the
//! larger weight. Candidates are then ordered by the blended score and given
//! `final_rank = position + 1`. Diversity is the exception: it selects greedily,
//! so its order is the selection order.
//!
//! Reranking never fails a request. Non-finite scores make the method fall back
//! to the incoming order.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::embedding::lexical::is_stop_word;
use crate::retrieval::RankedResult;

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;
const OPTIMAL_WORDS: f32 = 150.0;
const EARLY_WINDOW: usize = 50;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RerankMethod {
    #[default]
    None,
    /// Fraction of query terms present in the chunk.
    KeywordOverlap,
    /// BM25 with document frequencies taken from the candidate set.
    #[serde(alias = "bm25")]
    LexicalFrequency,
    /// Term overlap plus a bonus for query terms near the start of the chunk.
    CrossEncoder,
    /// Greedy maximal-marginal-relevance selection.
    Diversity,
    /// Prefers chunks near 150 words.
    LengthPenalty,
    /// Keyword hit count plus a first-sentence bonus.
    KeywordBoost,
}

impl RerankMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::KeywordOverlap => "keyword-overlap",
            Self::LexicalFrequency => "lexical-frequency",
            Self::CrossEncoder => "cross-encoder",
            Self::Diversity => "diversity",
            Self::LengthPenalty => "length-penalty",
            Self::KeywordBoost => "keyword-boost",
        }
    }

    pub fn all() -> [Self; 7] {
        [
            Self::None,
            Self::KeywordOverlap,
            Self::LexicalFrequency,
            Self::CrossEncoder,
            Self::Diversity,
            Self::LengthPenalty,
            Self::KeywordBoost,
        ]
    }

    /// Parse a method name. Unknown names mean no reranking.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().replace('_', "-").as_str() {
            "none" | "" => Self::None,
            "keyword-overlap" | "keyword" => Self::KeywordOverlap,
            "lexical-frequency" | "bm25" => Self::LexicalFrequency,
            "cross-encoder" => Self::CrossEncoder,
            "diversity" | "mmr" => Self::Diversity,
            "length-penalty" | "length" => Self::LengthPenalty,
            "keyword-boost" => Self::KeywordBoost,
            other => {
                tracing::warn!(method = other, "unknown rerank method, keeping retrieval order");
                Self::None
            }
        }
    }

    /// `(similarity, secondary)` blend weights.
    fn weights(&self) -> (f32, f32) {
        match self {
            Self::None => (1.0, 0.0),
            Self::KeywordOverlap | Self::LexicalFrequency | Self::Diversity => (0.7, 0.3),
            Self::CrossEncoder => (0.6, 0.4),
            Self::LengthPenalty => (0.8, 0.2),
            Self::KeywordBoost => (0.75, 0.25),
        }
    }
}

impl std::fmt::Display for RerankMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reorder `candidates` for `query`.
///
/// `RerankMethod::None` and an empty list return the input unchanged.
pub fn rerank(query: &str, candidates: Vec<RankedResult>, method: RerankMethod) -> Vec<RankedResult> {
    if method == RerankMethod::None || candidates.is_empty() {
        return candidates;
    }

    let query_terms = query_terms(query);
    let docs: Vec<Vec<String>> = candidates
        .iter()
        .map(|c| tokenize(&c.chunk.content))
        .collect();

    let weights = method.weights();
    let reranked = match method {
        RerankMethod::None => return candidates,
        RerankMethod::Diversity => diversity(&candidates, &docs),
        RerankMethod::KeywordOverlap => {
            let secondary: Vec<f32> = docs.iter().map(|d| keyword_overlap(&query_terms, d)).collect();
            blend(&candidates, &secondary, weights)
        }
        RerankMethod::LexicalFrequency => {
            blend(&candidates, &bm25_normalized(&query_terms, &docs), weights)
        }
        RerankMethod::CrossEncoder => {
            let secondary: Vec<f32> = docs.iter().map(|d| cross_encoder(&query_terms, d)).collect();
            blend(&candidates, &secondary, weights)
        }
        RerankMethod::LengthPenalty => {
            let secondary: Vec<f32> = candidates
                .iter()
                .map(|c| length_score(c.chunk.word_count))
                .collect();
            blend(&candidates, &secondary, weights)
        }
        RerankMethod::KeywordBoost => {
            let secondary: Vec<f32> = candidates
                .iter()
                .zip(&docs)
                .map(|(c, d)| keyword_boost(&query_terms, &c.chunk.content, d))
                .collect();
            blend(&candidates, &secondary, weights)
        }
    };

    match reranked {
        Some(results) => {
            tracing::debug!(method = %method, candidates = results.len(), "candidates reranked");
            results
        }
        None => {
            tracing::warn!(method = %method, "rerank produced non-finite scores, keeping retrieval order");
            candidates
        }
    }
}

/// Blend scores and sort. `None` when any blended score is not finite.
fn blend(
    candidates: &[RankedResult],
    secondary: &[f32],
    (w_sim, w_sec): (f32, f32),
) -> Option<Vec<RankedResult>> {
    let mut scored: Vec<RankedResult> = Vec::with_capacity(candidates.len());
    for (candidate, sec) in candidates.iter().zip(secondary) {
        let combined = w_sim * candidate.similarity_score + w_sec * sec;
        if !combined.is_finite() {
            return None;
        }
        let mut result = candidate.clone();
        result.rerank_score = Some(combined);
        scored.push(result);
    }

    scored.sort_by(|a, b| {
        b.rerank_score
            .partial_cmp(&a.rerank_score)
            .unwrap_or(Ordering::Equal)
    });
    for (idx, result) in scored.iter_mut().enumerate() {
        result.final_rank = idx + 1;
    }
    Some(scored)
}

// ── Scoring heuristics ────────────────────────────────────────────────────────

/// Lowercase alphanumeric tokens.
fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Distinct query terms, minus stop words unless that would leave none.
fn query_terms(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    let all: Vec<String> = tokenize(query)
        .into_iter()
        .filter(|t| seen.insert(t.clone()))
        .collect();
    let content: Vec<String> = all.iter().filter(|t| !is_stop_word(t)).cloned().collect();
    if content.is_empty() {
        all
    } else {
        content
    }
}

fn keyword_overlap(query_terms: &[String], doc: &[String]) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let doc: HashSet<&str> = doc.iter().map(String::as_str).collect();
    let hits = query_terms.iter().filter(|t| doc.contains(t.as_str())).count();
    hits as f32 / query_terms.len() as f32
}

/// BM25 per candidate, divided by the best candidate's score.
fn bm25_normalized(query_terms: &[String], docs: &[Vec<String>]) -> Vec<f32> {
    let n = docs.len() as f32;
    let avg_len = docs.iter().map(Vec::len).sum::<usize>() as f32 / n;

    let mut doc_frequency: HashMap<&str, usize> = HashMap::new();
    for doc in docs {
        let unique: HashSet<&str> = doc.iter().map(String::as_str).collect();
        for term in unique {
            *doc_frequency.entry(term).or_insert(0) += 1;
        }
    }

    let raw: Vec<f32> = docs
        .iter()
        .map(|doc| {
            let mut tf: HashMap<&str, usize> = HashMap::new();
            for token in doc {
                *tf.entry(token.as_str()).or_insert(0) += 1;
            }
            let doc_len = doc.len() as f32;
            query_terms
                .iter()
                .map(|term| {
                    let tf = tf.get(term.as_str()).copied().unwrap_or(0) as f32;
                    let df = doc_frequency.get(term.as_str()).copied().unwrap_or(0) as f32;
                    if tf == 0.0 || df == 0.0 {
                        return 0.0;
                    }
                    let idf = ((n - df + 0.5) / (df + 0.5) + 1.0).ln();
                    let norm = if avg_len > 0.0 { doc_len / avg_len } else { 1.0 };
                    idf * tf * (BM25_K1 + 1.0) / (tf + BM25_K1 * (1.0 - BM25_B + BM25_B * norm))
                })
                .sum()
        })
        .collect();

    let max = raw.iter().copied().fold(0.0f32, f32::max);
    if max > 0.0 {
        raw.into_iter().map(|s| s / max).collect()
    } else {
        vec![0.0; docs.len()]
    }
}

/// `0.7 * overlap + 0.3 * early-position bonus`, capped at 1.
fn cross_encoder(query_terms: &[String], doc: &[String]) -> f32 {
    if query_terms.is_empty() {
        return 0.0;
    }
    let overlap = keyword_overlap(query_terms, doc);
    let bonus: f32 = query_terms
        .iter()
        .filter_map(|term| {
            doc.iter()
                .take(EARLY_WINDOW)
                .position(|t| t == term)
                .map(|pos| 1.0 - pos as f32 / EARLY_WINDOW as f32)
        })
        .sum::<f32>()
        / query_terms.len() as f32;
    (0.7 * overlap + 0.3 * bonus).min(1.0)
}

/// Peaks at 1.0 for the optimal word count and decays symmetrically.
fn length_score(word_count: usize) -> f32 {
    1.0 / (1.0 + (word_count as f32 - OPTIMAL_WORDS).abs() / OPTIMAL_WORDS)
}

/// `0.2` per keyword occurrence plus `0.3` for a keyword in the first
/// sentence, capped at 1.
fn keyword_boost(query_terms: &[String], content: &str, doc: &[String]) -> f32 {
    let terms: HashSet<&str> = query_terms.iter().map(String::as_str).collect();
    let hits = doc.iter().filter(|t| terms.contains(t.as_str())).count();

    let first_sentence = content
        .split_inclusive(['.', '!', '?'])
        .next()
        .unwrap_or(content);
    let early = tokenize(first_sentence)
        .iter()
        .any(|t| terms.contains(t.as_str()));

    (0.2 * hits as f32 + if early { 0.3 } else { 0.0 }).min(1.0)
}

fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 1.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Greedy selection maximising `0.7 * similarity + 0.3 * average dissimilarity`
/// to the results already selected.
fn diversity(candidates: &[RankedResult], docs: &[Vec<String>]) -> Option<Vec<RankedResult>> {
    let (w_sim, w_div) = RerankMethod::Diversity.weights();
    let sets: Vec<HashSet<&str>> = docs
        .iter()
        .map(|d| d.iter().map(String::as_str).collect())
        .collect();

    let mut remaining: Vec<usize> = (0..candidates.len()).collect();
    let mut selected: Vec<usize> = Vec::with_capacity(candidates.len());
    let mut out = Vec::with_capacity(candidates.len());

    while !remaining.is_empty() {
        let mut best: Option<(usize, f32)> = None;
        for (pos, &idx) in remaining.iter().enumerate() {
            let dissimilarity = if selected.is_empty() {
                1.0
            } else {
                selected
                    .iter()
                    .map(|&s| 1.0 - jaccard(&sets[idx], &sets[s]))
                    .sum::<f32>()
                    / selected.len() as f32
            };
            let score = w_sim * candidates[idx].similarity_score + w_div * dissimilarity;
            if !score.is_finite() {
                return None;
            }
            if best.is_none_or(|(_, b)| score > b) {
                best = Some((pos, score));
            }
        }

        let (pos, score) = best?;
        let idx = remaining.remove(pos);
        selected.push(idx);

        let mut result = candidates[idx].clone();
        result.rerank_score = Some(score);
        result.final_rank = out.len() + 1;
        out.push(result);
    }

    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunking::{Chunk, ChunkStrategy};

    fn candidate(id: &str, content: &str, score: f32, rank: usize) -> RankedResult {
        RankedResult::new(Chunk::new(id, content, ChunkStrategy::Sentence), score, rank)
    }

    fn ids(results: &[RankedResult]) -> Vec<&str> {
        results.iter().map(|r| r.chunk.id.as_str()).collect()
    }

    fn sample() -> Vec<RankedResult> {
        vec![
            candidate("a", "Weather reports mention rain tomorrow.", 0.80, 1),
            candidate("b", "Rust ownership prevents data races.", 0.78, 2),
            candidate("c", "Garbage collection pauses happen.", 0.60, 3),
        ]
    }

    #[test]
    fn none_keeps_order() {
        let out = rerank("rust ownership", sample(), RerankMethod::None);
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
        assert!(out.iter().all(|r| r.rerank_score.is_none()));
    }

    #[test]
    fn empty_candidates_are_returned_as_is() {
        assert!(rerank("query", Vec::new(), RerankMethod::CrossEncoder).is_empty());
    }

    #[test]
    fn unknown_name_means_no_rerank() {
        assert_eq!(RerankMethod::from_name("llm-rerank"), RerankMethod::None);
        assert_eq!(RerankMethod::from_name("bm25"), RerankMethod::LexicalFrequency);
        assert_eq!(RerankMethod::from_name("keyword_boost"), RerankMethod::KeywordBoost);
    }

    #[test]
    fn keyword_methods_promote_matching_chunk() {
        for method in [
            RerankMethod::KeywordOverlap,
            RerankMethod::LexicalFrequency,
            RerankMethod::CrossEncoder,
            RerankMethod::KeywordBoost,
        ] {
            let out = rerank("rust ownership", sample(), method);
            assert_eq!(out[0].chunk.id, "b", "{method}");
            assert_eq!(out[0].initial_rank, 2);
            assert_eq!(out[0].final_rank, 1);
        }
    }

    #[test]
    fn final_ranks_are_a_permutation() {
        for method in RerankMethod::all() {
            let out = rerank("rust ownership", sample(), method);
            let mut ranks: Vec<usize> = out.iter().map(|r| r.final_rank).collect();
            ranks.sort_unstable();
            assert_eq!(ranks, vec![1, 2, 3], "{method}");
        }
    }

    #[test]
    fn length_penalty_prefers_optimal_length() {
        assert!((length_score(150) - 1.0).abs() < 1e-6);
        assert!((length_score(75) - length_score(225)).abs() < 1e-6);
        assert!(length_score(10) < length_score(100));

        let long = "word ".repeat(150);
        let candidates = vec![candidate("short", "tiny", 0.5, 1), candidate("long", &long, 0.5, 2)];
        let out = rerank("anything", candidates, RerankMethod::LengthPenalty);
        assert_eq!(out[0].chunk.id, "long");
    }

    #[test]
    fn diversity_demotes_near_duplicates() {
        let candidates = vec![
            candidate("a", "rust ownership borrow checker", 0.90, 1),
            candidate("b", "rust ownership borrow checker rules", 0.89, 2),
            candidate("c", "python garbage collector pauses", 0.85, 3),
        ];
        let out = rerank("rust", candidates, RerankMethod::Diversity);
        assert_eq!(ids(&out), vec!["a", "c", "b"]);
        assert_eq!(out[1].final_rank, 2);
    }

    #[test]
    fn keyword_boost_caps_at_one() {
        let terms = vec!["rust".to_string()];
        let content = "Rust rust rust rust rust rust. More rust.";
        assert_eq!(keyword_boost(&terms, content, &tokenize(content)), 1.0);
    }

    #[test]
    fn bm25_normalises_to_best_candidate() {
        let docs = vec![tokenize("rust rust safety"), tokenize("python"), tokenize("rust")];
        let scores = bm25_normalized(&["rust".to_string()], &docs);
        assert_eq!(scores.iter().copied().fold(0.0f32, f32::max), 1.0);
        assert_eq!(scores[1], 0.0);
    }

    #[test]
    fn non_finite_similarity_falls_back_to_incoming_order() {
        let mut candidates = sample();
        candidates[1].similarity_score = f32::NAN;
        let out = rerank("rust ownership", candidates, RerankMethod::KeywordOverlap);
        assert_eq!(ids(&out), vec!["a", "b", "c"]);
        assert!(out.iter().all(|r| r.rerank_score.is_none()));
    }
}
