//! Retrieval-augmented generation pipeline: chunk a document, embed the
//! chunks, retrieve and rerank them for a query, then assemble a prompt and
//! check it before generation.
//!
//! Every stage is usable on its own; [`Pipeline`] wires them to configured
//! backends.
//!
//! | Stage | Entry point | Backend |
//! |-------|-------------|---------|
//! | Chunking | [`chunking::chunk`] | none (semantic needs sentence vectors) |
//! | Embedding | [`embedding::EmbeddingProvider`] | remote HTTP or local TF-IDF |
//! | Reduction | [`reduce::reduce`] | none |
//! | Retrieval | [`retrieval::SimilarityIndex`] | none |
//! | Reranking | [`rerank::rerank`] | none |
//! | Guardrails | [`guardrails::GuardrailEvaluator`] | none |
//! | Prompting | [`prompt::assemble`] | remote HTTP for generation |
//!
//! # Modules
//!
//! - [`config`]: Configuration loading from TOML files and environment variables
//! - [`chunking`]: Five chunking strategies with offsets and parent/child links
//! - [`embedding`]: Remote and lexical embedding with per-item fallback
//! - [`retrieval`]: Similarity index, sessions, ranked results
//! - [`rerank`]: Second-pass reordering of retrieval candidates
//! - [`reduce`]: PCA and t-SNE projection for visualization
//! - [`guardrails`]: Advisory relevance and token-length checks
//! - [`prompt`]: Templates, prompt assembly and the generation backend

pub mod chunking;
pub mod config;
pub mod embedding;
pub mod error;
pub mod guardrails;
pub mod pipeline;
pub mod prompt;
pub mod reduce;
pub mod rerank;
pub mod retrieval;

pub use chunking::{Chunk, ChunkParams, ChunkStrategy};
pub use config::RagConfig;
pub use embedding::{EmbeddingMethod, EmbeddingProvider, EmbeddingSet};
pub use error::{ErrorKind, RagError, Result};
pub use guardrails::{GuardrailEvaluator, GuardrailFinding};
pub use pipeline::{Pipeline, ProcessedDocument};
pub use prompt::{GenerationParams, GenerationReport, PromptTemplate};
pub use rerank::RerankMethod;
pub use retrieval::{RankedResult, SearchOutcome, SessionContext, SimilarityMetric};
