//! The operations a service layer calls, wired to configured backends.

use std::sync::Arc;

use crate::chunking::{self, Chunk, ChunkParams, ChunkStrategy, PrecomputedEncoder, SentenceEncoder};
use crate::chunking::semantic::sentences_of;
use crate::config::RagConfig;
use crate::embedding::{
    EmbeddingMethod, EmbeddingProvider, EmbeddingSet, HttpEmbeddingBackend, LexicalSentenceEncoder,
    RemoteEmbedder,
};
use crate::error::{RagError, Result};
use crate::guardrails::{GuardrailEvaluator, GuardrailFinding};
use crate::prompt::{
    self, GenerationOutcome, GenerationParams, GenerationReport, HttpGenerationBackend,
    PromptTemplate, TextGenerator, TokenUsage,
};
use crate::reduce;
use crate::rerank::{self, RerankMethod};
use crate::retrieval::{
    candidate_count, DocumentStats, QueryMetrics, RankedResult, SearchOutcome, SessionContext,
    SimilarityMetric,
};

/// Output of [`Pipeline::process_document`].
#[derive(Debug, Clone)]
pub struct ProcessedDocument {
    pub session: SessionContext,
    pub stats: DocumentStats,
}

pub struct Pipeline {
    config: RagConfig,
    embeddings: EmbeddingProvider,
    generator: Option<Arc<dyn TextGenerator>>,
    guardrails: GuardrailEvaluator,
}

impl Pipeline {
    /// Assemble a pipeline from explicit backends. `None` means unconfigured.
    pub fn new(
        config: RagConfig,
        embedder: Option<Arc<dyn RemoteEmbedder>>,
        generator: Option<Arc<dyn TextGenerator>>,
    ) -> Self {
        Self {
            embeddings: EmbeddingProvider::new(&config.embedding, embedder),
            guardrails: GuardrailEvaluator::new(&config.guardrails),
            generator,
            config,
        }
    }

    /// Build HTTP backends for every configured endpoint.
    pub fn from_config(config: RagConfig) -> Result<Self> {
        let embedder = HttpEmbeddingBackend::from_config(&config.embedding)?
            .map(|b| Arc::new(b) as Arc<dyn RemoteEmbedder>);
        let generator = HttpGenerationBackend::from_config(&config.generation)?
            .map(|b| Arc::new(b) as Arc<dyn TextGenerator>);
        Ok(Self::new(config, embedder, generator))
    }

    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    pub fn generation_configured(&self) -> bool {
        self.generator.is_some()
    }

    /// Chunk `text`. Semantic chunking embeds sentences with the configured
    /// embedding method.
    pub async fn chunk(
        &self,
        text: &str,
        strategy: ChunkStrategy,
        params: &ChunkParams,
    ) -> Result<Vec<Chunk>> {
        self.chunk_with(text, strategy, params, self.config.embedding.method, &self.config.embedding.model)
            .await
    }

    async fn chunk_with(
        &self,
        text: &str,
        strategy: ChunkStrategy,
        params: &ChunkParams,
        method: EmbeddingMethod,
        model_id: &str,
    ) -> Result<Vec<Chunk>> {
        if !strategy.requires_embeddings() {
            return chunking::chunk(text, strategy, params, None);
        }

        match method {
            EmbeddingMethod::Lexical => {
                let encoder = LexicalSentenceEncoder {
                    max_features: self.embeddings.max_features(),
                };
                chunking::chunk(text, strategy, params, Some(&encoder as &dyn SentenceEncoder))
            }
            EmbeddingMethod::Remote => {
                let sentences = sentences_of(text);
                if sentences.is_empty() {
                    return Ok(Vec::new());
                }
                let (vectors, _, fallbacks) =
                    self.embeddings.embed_remote(&sentences, model_id).await?;
                if !fallbacks.is_empty() {
                    return Err(RagError::Backend(format!(
                        "{} of {} sentence embeddings failed; semantic chunking needs all of them",
                        fallbacks.len(),
                        sentences.len()
                    )));
                }
                let encoder = PrecomputedEncoder::new(vectors);
                chunking::chunk(text, strategy, params, Some(&encoder as &dyn SentenceEncoder))
            }
        }
    }

    pub async fn embed(
        &self,
        chunks: &[Chunk],
        method: EmbeddingMethod,
        model_id: &str,
    ) -> Result<EmbeddingSet> {
        self.embeddings.embed(chunks, method, model_id).await
    }

    pub fn reduce_dimensions(&self, set: &EmbeddingSet, target_dims: usize) -> Result<Vec<Vec<f32>>> {
        reduce::reduce(&set.vectors, target_dims)
    }

    /// Chunk and embed a document into a fresh session.
    pub async fn process_document(
        &self,
        text: &str,
        strategy: ChunkStrategy,
        params: &ChunkParams,
        method: EmbeddingMethod,
        model_id: &str,
    ) -> Result<ProcessedDocument> {
        if text.trim().is_empty() {
            return Err(RagError::invalid("document text must not be empty"));
        }
        let chunks = self.chunk_with(text, strategy, params, method, model_id).await?;
        if chunks.is_empty() {
            return Err(RagError::invalid(format!(
                "{strategy} chunking produced no chunks"
            )));
        }

        let embeddings = self.embed(&chunks, method, model_id).await?;
        let session = SessionContext::new(strategy, chunks, embeddings)?;
        let stats = session.stats();

        tracing::info!(
            session = %session.id,
            strategy = %strategy,
            chunks = stats.total_chunks,
            method = %method,
            "document processed"
        );
        Ok(ProcessedDocument { session, stats })
    }

    /// Retrieve the `top_k` best chunks of `session` for `query`.
    ///
    /// With a rerank method, `min(3 * top_k, chunks)` candidates are fetched,
    /// reordered, then cut to `top_k`.
    pub async fn search(
        &self,
        query: &str,
        session: &SessionContext,
        top_k: usize,
        metric: SimilarityMetric,
        rerank_method: RerankMethod,
    ) -> Result<SearchOutcome> {
        if query.trim().is_empty() {
            return Err(RagError::invalid("query must not be empty"));
        }
        if top_k == 0 {
            return Err(RagError::invalid("top_k must be at least 1"));
        }

        let query_vector = self.embeddings.embed_query(query, session.embeddings()).await?;
        let wanted = candidate_count(top_k, session.len(), rerank_method != RerankMethod::None);
        let hits = session.index().search(&query_vector, wanted, metric)?;

        let candidates: Vec<RankedResult> = hits
            .iter()
            .enumerate()
            .map(|(pos, hit)| {
                RankedResult::new(session.chunks()[hit.index].clone(), hit.score, pos + 1)
            })
            .collect();
        let candidate_total = candidates.len();

        let mut results = rerank::rerank(query, candidates, rerank_method);
        results.truncate(top_k);

        let metrics = QueryMetrics {
            total_chunks: session.len(),
            candidates: candidate_total,
            retrieved: results.len(),
            avg_similarity: QueryMetrics::avg_similarity(&results),
            metric,
            rerank_method,
            fallback_vectors: session.embeddings().fallback_count(),
        };

        tracing::info!(
            session = %session.id,
            metric = %metric,
            rerank = %rerank_method,
            retrieved = metrics.retrieved,
            "search complete"
        );
        Ok(SearchOutcome { results, metrics })
    }

    pub fn run_guardrails(&self, query: &str, chunks: &[Chunk], prompt: &str) -> Vec<GuardrailFinding> {
        self.guardrails.evaluate(query, chunks, prompt)
    }

    pub fn assemble_prompt(&self, query: &str, chunks: &[Chunk], template: PromptTemplate) -> String {
        prompt::assemble(query, chunks, template)
    }

    /// Assemble a prompt, check it, and ask the generation backend.
    ///
    /// Backend trouble is reported in the outcome, not as an error.
    pub async fn generate(
        &self,
        query: &str,
        chunks: &[Chunk],
        template: PromptTemplate,
        params: &GenerationParams,
    ) -> Result<GenerationReport> {
        if query.trim().is_empty() {
            return Err(RagError::invalid("query must not be empty"));
        }

        let prompt = self.assemble_prompt(query, chunks, template);
        let guardrails = self.run_guardrails(query, chunks, &prompt);

        let outcome = match &self.generator {
            None => GenerationOutcome::failed(&RagError::BackendUnavailable(
                "generation backend is not configured".into(),
            )),
            Some(generator) => match generator.generate(&prompt, params).await {
                Ok(text) => GenerationOutcome::Generated { text },
                Err(e) => {
                    tracing::warn!(error = %e, model = %params.model_id, "generation failed");
                    GenerationOutcome::failed(&e)
                }
            },
        };
        let token_usage = TokenUsage::estimate(&prompt, outcome.text());

        Ok(GenerationReport {
            prompt,
            template,
            model_id: params.model_id.clone(),
            context_chunks: chunks.len(),
            outcome,
            guardrails,
            token_usage,
        })
    }
}
