//! Per-document retrieval state.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use super::SimilarityIndex;
use crate::chunking::{Chunk, ChunkStrategy};
use crate::embedding::EmbeddingSet;
use crate::error::{RagError, Result};

/// Chunks, embeddings and index for one processed document.
///
/// Created by [`crate::Pipeline::process_document`] and passed by reference to
/// every search. Nothing about a session is shared with other sessions.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub created_at: DateTime<Utc>,
    strategy: ChunkStrategy,
    chunks: Vec<Chunk>,
    embeddings: EmbeddingSet,
    index: SimilarityIndex,
}

impl SessionContext {
    pub fn new(strategy: ChunkStrategy, chunks: Vec<Chunk>, embeddings: EmbeddingSet) -> Result<Self> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::invalid(format!(
                "{} chunks but {} embeddings",
                chunks.len(),
                embeddings.len()
            )));
        }
        let index = SimilarityIndex::new(&embeddings.vectors)?;
        Ok(Self {
            id: Uuid::now_v7(),
            created_at: Utc::now(),
            strategy,
            chunks,
            embeddings,
            index,
        })
    }

    pub fn strategy(&self) -> ChunkStrategy {
        self.strategy
    }

    pub fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }

    pub fn embeddings(&self) -> &EmbeddingSet {
        &self.embeddings
    }

    pub fn index(&self) -> &SimilarityIndex {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn stats(&self) -> DocumentStats {
        DocumentStats::of(&self.chunks, self.strategy)
    }
}

/// Aggregate figures for a chunked document.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentStats {
    pub strategy: ChunkStrategy,
    pub total_chunks: usize,
    pub total_characters: usize,
    pub total_words: usize,
    pub avg_chunk_chars: f64,
    pub avg_word_count: f64,
}

impl DocumentStats {
    pub fn of(chunks: &[Chunk], strategy: ChunkStrategy) -> Self {
        let total_characters: usize = chunks.iter().map(|c| c.char_count).sum();
        let total_words: usize = chunks.iter().map(|c| c.word_count).sum();
        let n = chunks.len().max(1) as f64;
        Self {
            strategy,
            total_chunks: chunks.len(),
            total_characters,
            total_words,
            avg_chunk_chars: total_characters as f64 / n,
            avg_word_count: total_words as f64 / n,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedding::EmbeddingMethod;

    fn embeddings(n: usize) -> EmbeddingSet {
        EmbeddingSet {
            vectors: vec![vec![1.0, 0.0]; n],
            chunk_ids: (1..=n).map(|i| format!("chunk-{i}")).collect(),
            method: EmbeddingMethod::Remote,
            model_id: "test".into(),
            dimensions: 2,
            fallbacks: vec![],
            vectorizer: None,
        }
    }

    #[test]
    fn misaligned_embeddings_are_rejected() {
        let chunks = vec![Chunk::new("chunk-1", "one two", ChunkStrategy::FixedSize)];
        assert!(SessionContext::new(ChunkStrategy::FixedSize, chunks, embeddings(2)).is_err());
    }

    #[test]
    fn sessions_have_distinct_ids() {
        let chunks = vec![Chunk::new("chunk-1", "one two", ChunkStrategy::FixedSize)];
        let a = SessionContext::new(ChunkStrategy::FixedSize, chunks.clone(), embeddings(1)).unwrap();
        let b = SessionContext::new(ChunkStrategy::FixedSize, chunks, embeddings(1)).unwrap();
        assert_ne!(a.id, b.id);
        assert_eq!(a.index().len(), 1);
    }

    #[test]
    fn stats_average_over_chunks() {
        let chunks = vec![
            Chunk::new("chunk-1", "one two", ChunkStrategy::Sentence),
            Chunk::new("chunk-2", "three four five six", ChunkStrategy::Sentence),
        ];
        let stats = DocumentStats::of(&chunks, ChunkStrategy::Sentence);
        assert_eq!(stats.total_chunks, 2);
        assert_eq!(stats.total_words, 6);
        assert!((stats.avg_word_count - 3.0).abs() < 1e-9);
        assert_eq!(stats.total_characters, 7 + 19);
    }
}
