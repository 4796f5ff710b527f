//! Document chunking.
//!
//! [`chunk`] splits a document into an ordered sequence of [`Chunk`]s under one
//! of five [`ChunkStrategy`] variants. Every produced chunk has non-empty trimmed
//! content, and its `word_count` is the number of whitespace-delimited tokens.
//!
//! Offsets are measured in characters (Unicode scalar values), not bytes.

pub mod fixed;
pub mod hierarchical;
pub mod paragraph;
pub mod semantic;
pub mod sentence;

use serde::{Deserialize, Serialize};
use unicode_segmentation::UnicodeSegmentation;

use crate::error::{RagError, Result};

pub use semantic::{PrecomputedEncoder, SentenceEncoder};

/// Splitting strategy. Parsing an unknown name is an invalid-argument error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ChunkStrategy {
    /// Fixed character windows with overlap.
    #[default]
    FixedSize,
    /// Greedy sentence packing up to a size limit.
    Sentence,
    /// Blank-line separated paragraphs, oversized ones re-split.
    Paragraph,
    /// Two-level parent/child split.
    Hierarchical,
    /// Sentences grouped by embedding similarity.
    Semantic,
}

impl ChunkStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FixedSize => "fixed-size",
            Self::Sentence => "sentence",
            Self::Paragraph => "paragraph",
            Self::Hierarchical => "hierarchical",
            Self::Semantic => "semantic",
        }
    }

    pub fn all() -> [Self; 5] {
        [
            Self::FixedSize,
            Self::Sentence,
            Self::Paragraph,
            Self::Hierarchical,
            Self::Semantic,
        ]
    }

    /// Whether this strategy needs sentence embeddings to run.
    pub fn requires_embeddings(&self) -> bool {
        matches!(self, Self::Semantic)
    }

    /// Human-oriented description of the strategy and its tunables.
    pub fn describe(&self) -> StrategyInfo {
        match self {
            Self::FixedSize => StrategyInfo {
                strategy: *self,
                name: "Fixed-Size Chunking",
                description: "Creates chunks of consistent character length with overlapping windows",
                parameters: vec![
                    ParameterInfo::new("chunk_size", "200", "1..", "window length in characters"),
                    ParameterInfo::new("overlap", "50", "0..chunk_size", "characters shared by consecutive windows"),
                ],
                pros: vec!["Consistent chunk sizes", "Predictable memory usage", "Simple implementation"],
                cons: vec!["May break sentences", "Ignores semantic boundaries"],
            },
            Self::Sentence => StrategyInfo {
                strategy: *self,
                name: "Sentence-Based Chunking",
                description: "Packs whole sentences into chunks up to a size limit",
                parameters: vec![
                    ParameterInfo::new("chunk_size", "200", "1..", "maximum chunk length in characters"),
                    ParameterInfo::new("overlap", "50", "0..", "trailing characters carried into the next chunk"),
                ],
                pros: vec!["Preserves sentence boundaries", "Good for readability", "Natural language flow"],
                cons: vec!["Variable chunk sizes", "May break semantic units"],
            },
            Self::Paragraph => StrategyInfo {
                strategy: *self,
                name: "Paragraph-Based Chunking",
                description: "Uses blank-line paragraph breaks as chunk boundaries",
                parameters: vec![ParameterInfo::new(
                    "chunk_size",
                    "200",
                    "1..",
                    "paragraphs longer than this are re-split",
                )],
                pros: vec!["Preserves document structure", "Semantic coherence", "Natural boundaries"],
                cons: vec!["Variable chunk sizes", "Depends on document formatting"],
            },
            Self::Hierarchical => StrategyInfo {
                strategy: *self,
                name: "Hierarchical Chunking",
                description: "Large parent chunks each re-split into linked child chunks",
                parameters: vec![
                    ParameterInfo::new("parent_chunk_size", "800", "1..", "parent length in characters"),
                    ParameterInfo::new("child_chunk_size", "200", "1..", "child length in characters"),
                    ParameterInfo::new("overlap", "50", "0..", "parent overlap; children use half"),
                ],
                pros: vec!["Precise child retrieval", "Parent context available", "Respects structure"],
                cons: vec!["Duplicated content across levels", "More chunks to embed"],
            },
            Self::Semantic => StrategyInfo {
                strategy: *self,
                name: "Semantic-Based Chunking",
                description: "Groups consecutive sentences whose embeddings stay similar",
                parameters: vec![
                    ParameterInfo::new("similarity_threshold", "0.5", "0.1..0.9", "minimum similarity to keep growing a chunk"),
                    ParameterInfo::new("max_sentences_per_chunk", "5", "1..", "cap on sentences per chunk"),
                ],
                pros: vec!["Semantic coherence", "Context preservation", "Intelligent boundaries"],
                cons: vec!["Computationally expensive", "Variable chunk sizes", "Needs an embedding backend"],
            },
        }
    }
}

impl std::fmt::Display for ChunkStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for ChunkStrategy {
    type Err = RagError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "fixed-size" | "fixed_size" | "fixed" => Ok(Self::FixedSize),
            "sentence" | "sentence-based" | "sentence_based" => Ok(Self::Sentence),
            "paragraph" | "paragraph-based" | "paragraph_based" => Ok(Self::Paragraph),
            "hierarchical" | "parent-child" => Ok(Self::Hierarchical),
            "semantic" | "semantic-based" | "semantic_based" => Ok(Self::Semantic),
            other => Err(RagError::invalid(format!(
                "unknown chunking strategy: {other}. Use one of: fixed-size, sentence, paragraph, hierarchical, semantic"
            ))),
        }
    }
}

/// Catalog entry returned by [`ChunkStrategy::describe`].
#[derive(Debug, Clone, Serialize)]
pub struct StrategyInfo {
    pub strategy: ChunkStrategy,
    pub name: &'static str,
    pub description: &'static str,
    pub parameters: Vec<ParameterInfo>,
    pub pros: Vec<&'static str>,
    pub cons: Vec<&'static str>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ParameterInfo {
    pub name: &'static str,
    pub default: &'static str,
    pub range: &'static str,
    pub description: &'static str,
}

impl ParameterInfo {
    fn new(
        name: &'static str,
        default: &'static str,
        range: &'static str,
        description: &'static str,
    ) -> Self {
        Self {
            name,
            default,
            range,
            description,
        }
    }
}

/// Tunables for every strategy. Each strategy reads only the fields it needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkParams {
    /// Window size (fixed-size) or maximum chunk size (sentence, paragraph).
    pub chunk_size: usize,
    pub overlap: usize,
    pub parent_chunk_size: usize,
    pub child_chunk_size: usize,
    pub similarity_threshold: f32,
    pub max_sentences_per_chunk: usize,
}

impl Default for ChunkParams {
    fn default() -> Self {
        Self {
            chunk_size: 200,
            overlap: 50,
            parent_chunk_size: 800,
            child_chunk_size: 200,
            similarity_threshold: 0.5,
            max_sentences_per_chunk: 5,
        }
    }
}

impl ChunkParams {
    pub fn validate(&self, strategy: ChunkStrategy) -> Result<()> {
        match strategy {
            ChunkStrategy::FixedSize | ChunkStrategy::Sentence | ChunkStrategy::Paragraph => {
                if self.chunk_size == 0 {
                    return Err(RagError::invalid("chunk_size must be greater than 0"));
                }
            }
            ChunkStrategy::Hierarchical => {
                if self.parent_chunk_size == 0 || self.child_chunk_size == 0 {
                    return Err(RagError::invalid(
                        "parent_chunk_size and child_chunk_size must be greater than 0",
                    ));
                }
            }
            ChunkStrategy::Semantic => {
                if self.max_sentences_per_chunk == 0 {
                    return Err(RagError::invalid(
                        "max_sentences_per_chunk must be greater than 0",
                    ));
                }
                if !(-1.0..=1.0).contains(&self.similarity_threshold) {
                    return Err(RagError::invalid(
                        "similarity_threshold must be between -1.0 and 1.0",
                    ));
                }
            }
        }
        Ok(())
    }
}

/// An addressable unit of source text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
    /// Unique within one chunking call (`chunk-3`, `parent-2`, `parent-2-child-1`).
    pub id: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub start_offset: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub end_offset: Option<usize>,
    /// Index of the first source sentence (sentence and semantic strategies).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sentence_index: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub paragraph_index: Option<usize>,
    pub word_count: usize,
    pub char_count: usize,
    pub strategy: ChunkStrategy,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    /// Present on hierarchical parents only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub children_ids: Option<Vec<String>>,
}

impl Chunk {
    pub fn new(id: impl Into<String>, content: impl Into<String>, strategy: ChunkStrategy) -> Self {
        let content = content.into();
        Self {
            id: id.into(),
            word_count: word_count(&content),
            char_count: char_len(&content),
            content,
            start_offset: None,
            end_offset: None,
            sentence_index: None,
            paragraph_index: None,
            strategy,
            parent_id: None,
            children_ids: None,
        }
    }

    pub fn with_span(mut self, start: usize, end: usize) -> Self {
        self.start_offset = Some(start);
        self.end_offset = Some(end);
        self
    }

    pub fn with_sentence_index(mut self, index: usize) -> Self {
        self.sentence_index = Some(index);
        self
    }

    pub fn with_paragraph_index(mut self, index: usize) -> Self {
        self.paragraph_index = Some(index);
        self
    }

    pub fn with_parent(mut self, parent_id: impl Into<String>) -> Self {
        self.parent_id = Some(parent_id.into());
        self
    }

    pub fn is_parent(&self) -> bool {
        self.children_ids.is_some()
    }

    pub fn is_child(&self) -> bool {
        self.parent_id.is_some()
    }
}

/// Split `text` into chunks.
///
/// Empty (or whitespace-only) text yields an empty sequence, not an error.
/// `encoder` is consulted only by [`ChunkStrategy::Semantic`]; without one that
/// strategy fails closed and returns no chunks.
pub fn chunk(
    text: &str,
    strategy: ChunkStrategy,
    params: &ChunkParams,
    encoder: Option<&dyn SentenceEncoder>,
) -> Result<Vec<Chunk>> {
    params.validate(strategy)?;
    if text.trim().is_empty() {
        return Ok(Vec::new());
    }

    let chunks = match strategy {
        ChunkStrategy::FixedSize => fixed::chunk_fixed(text, params.chunk_size, params.overlap),
        ChunkStrategy::Sentence => {
            sentence::chunk_sentences(text, params.chunk_size, params.overlap)
        }
        ChunkStrategy::Paragraph => paragraph::chunk_paragraphs(text, params.chunk_size),
        ChunkStrategy::Hierarchical => hierarchical::chunk_hierarchical(
            text,
            params.parent_chunk_size,
            params.child_chunk_size,
            params.overlap,
        ),
        ChunkStrategy::Semantic => semantic::chunk_semantic(
            text,
            params.similarity_threshold,
            params.max_sentences_per_chunk,
            encoder,
        ),
    };

    tracing::debug!(strategy = %strategy, chunks = chunks.len(), "text chunked");
    Ok(chunks)
}

// ── Shared text helpers ───────────────────────────────────────────────────────

/// Number of whitespace-delimited tokens.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

pub(crate) fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Character offset of the byte position `byte_pos` within `text`.
pub(crate) fn char_offset(text: &str, byte_pos: usize) -> usize {
    char_len(&text[..byte_pos])
}

/// A sentence located in its source text.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Sentence<'a> {
    /// Byte offset of the trimmed sentence in the source.
    pub start: usize,
    pub text: &'a str,
}

impl Sentence<'_> {
    pub fn end(&self) -> usize {
        self.start + self.text.len()
    }
}

/// Split text into trimmed, non-empty sentences using Unicode sentence boundaries.
pub(crate) fn split_sentences(text: &str) -> Vec<Sentence<'_>> {
    text.split_sentence_bound_indices()
        .filter_map(|(start, raw)| {
            let leading = raw.len() - raw.trim_start().len();
            let trimmed = raw.trim();
            (!trimmed.is_empty()).then_some(Sentence {
                start: start + leading,
                text: trimmed,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_from_str_accepts_aliases() {
        assert_eq!("fixed-size".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::FixedSize);
        assert_eq!("sentence_based".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Sentence);
        assert_eq!("Paragraph".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Paragraph);
        assert_eq!("semantic".parse::<ChunkStrategy>().unwrap(), ChunkStrategy::Semantic);
    }

    #[test]
    fn unknown_strategy_is_invalid_argument() {
        let err = "token-based".parse::<ChunkStrategy>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::InvalidArgument);
    }

    #[test]
    fn strategy_display_roundtrips() {
        for strategy in ChunkStrategy::all() {
            assert_eq!(strategy.to_string().parse::<ChunkStrategy>().unwrap(), strategy);
        }
    }

    #[test]
    fn empty_text_yields_no_chunks() {
        for strategy in ChunkStrategy::all() {
            let chunks = chunk("   \n\t ", strategy, &ChunkParams::default(), None).unwrap();
            assert!(chunks.is_empty(), "{strategy} should produce no chunks");
        }
    }

    #[test]
    fn zero_chunk_size_is_rejected() {
        let params = ChunkParams {
            chunk_size: 0,
            ..Default::default()
        };
        assert!(chunk("some text", ChunkStrategy::FixedSize, &params, None).is_err());
    }

    #[test]
    fn split_sentences_tracks_positions() {
        let text = "A cat sat.  A dog ran. The sky is blue.";
        let sentences = split_sentences(text);
        assert_eq!(sentences.len(), 3);
        assert_eq!(sentences[0].text, "A cat sat.");
        assert_eq!(sentences[1].text, "A dog ran.");
        assert_eq!(&text[sentences[1].start..sentences[1].end()], "A dog ran.");
        assert_eq!(sentences[2].text, "The sky is blue.");
    }

    #[test]
    fn char_offset_counts_characters() {
        let text = "héllo wörld";
        let byte_pos = text.find("wörld").unwrap();
        assert_eq!(char_offset(text, byte_pos), 6);
    }

    #[test]
    fn catalog_covers_every_strategy() {
        for strategy in ChunkStrategy::all() {
            let info = strategy.describe();
            assert_eq!(info.strategy, strategy);
            assert!(!info.pros.is_empty());
        }
    }
}
