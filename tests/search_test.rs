mod helpers;

use std::sync::Arc;

use helpers::{
    offline_pipeline, remote_pipeline, topic_document, FlakyEmbedder, TopicEmbedder, CAT_TEXT,
    TEST_MODEL,
};
use ragpipe::{
    ChunkParams, ChunkStrategy, EmbeddingMethod, ErrorKind, Pipeline, ProcessedDocument,
    RerankMethod, SimilarityMetric,
};

fn sentence_params() -> ChunkParams {
    ChunkParams {
        chunk_size: 15,
        overlap: 0,
        ..Default::default()
    }
}

async fn process_cat(pipeline: &Pipeline, method: EmbeddingMethod) -> ProcessedDocument {
    pipeline
        .process_document(CAT_TEXT, ChunkStrategy::Sentence, &sentence_params(), method, TEST_MODEL)
        .await
        .unwrap()
}

#[tokio::test]
async fn cat_query_ranks_first_sentence_highest_with_remote_embeddings() {
    let embedder = Arc::new(TopicEmbedder::default());
    let pipeline = remote_pipeline(embedder.clone(), None);
    let doc = process_cat(&pipeline, EmbeddingMethod::Remote).await;

    assert_eq!(doc.stats.total_chunks, 3);
    let counts: Vec<usize> = doc.session.chunks().iter().map(|c| c.word_count).collect();
    assert_eq!(counts, vec![3, 3, 4]);

    let outcome = pipeline
        .search("Where did the cat sit?", &doc.session, 3, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 3);
    assert_eq!(outcome.results[0].chunk.content, "A cat sat.");
    assert_eq!(outcome.results[0].final_rank, 1);
    // three chunks plus one query
    assert_eq!(embedder.calls(), 4);
}

#[tokio::test]
async fn cat_query_ranks_first_sentence_highest_with_lexical_embeddings() {
    let pipeline = offline_pipeline();
    let doc = process_cat(&pipeline, EmbeddingMethod::Lexical).await;

    let outcome = pipeline
        .search("Where did the cat sit?", &doc.session, 3, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap();
    assert_eq!(outcome.results[0].chunk.id, doc.session.chunks()[0].id);
    assert_eq!(doc.session.embeddings().model_id, "tfidf");
}

#[tokio::test]
async fn cosine_results_are_sorted_by_similarity() {
    let pipeline = remote_pipeline(Arc::new(TopicEmbedder::default()), None);
    let doc = pipeline
        .process_document(
            &topic_document(),
            ChunkStrategy::FixedSize,
            &ChunkParams {
                chunk_size: 80,
                overlap: 20,
                ..Default::default()
            },
            EmbeddingMethod::Remote,
            TEST_MODEL,
        )
        .await
        .unwrap();

    let outcome = pipeline
        .search("vector search with embeddings", &doc.session, 5, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap();

    let scores: Vec<f32> = outcome.results.iter().map(|r| r.similarity_score).collect();
    assert!(scores.windows(2).all(|w| w[0] >= w[1]), "{scores:?}");
    let ranks: Vec<usize> = outcome.results.iter().map(|r| r.final_rank).collect();
    assert_eq!(ranks, (1..=outcome.results.len()).collect::<Vec<_>>());
}

#[tokio::test]
async fn rerank_over_fetches_then_truncates() {
    let pipeline = offline_pipeline();
    let doc = pipeline
        .process_document(
            &topic_document().repeat(4),
            ChunkStrategy::FixedSize,
            &ChunkParams {
                chunk_size: 60,
                overlap: 10,
                ..Default::default()
            },
            EmbeddingMethod::Lexical,
            "unused",
        )
        .await
        .unwrap();
    let total = doc.session.len();
    assert!(total > 6);

    let outcome = pipeline
        .search("prompt guardrails", &doc.session, 2, SimilarityMetric::Cosine, RerankMethod::KeywordOverlap)
        .await
        .unwrap();

    assert_eq!(outcome.results.len(), 2);
    assert_eq!(outcome.metrics.candidates, 6.min(total));
    assert_eq!(outcome.metrics.rerank_method, RerankMethod::KeywordOverlap);
    assert!(outcome.results.iter().all(|r| r.rerank_score.is_some()));

    let plain = pipeline
        .search("prompt guardrails", &doc.session, 2, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap();
    assert_eq!(plain.metrics.candidates, 2);
    assert!(plain.results.iter().all(|r| r.rerank_score.is_none()));
}

#[tokio::test]
async fn every_rerank_method_keeps_the_candidate_set() {
    let pipeline = offline_pipeline();
    let doc = pipeline
        .process_document(
            &topic_document(),
            ChunkStrategy::Sentence,
            &ChunkParams::default(),
            EmbeddingMethod::Lexical,
            "unused",
        )
        .await
        .unwrap();
    let k = doc.session.len();

    for method in RerankMethod::all() {
        let outcome = pipeline
            .search("memory safe rust", &doc.session, k, SimilarityMetric::Cosine, method)
            .await
            .unwrap();
        let mut ids: Vec<&str> = outcome.results.iter().map(|r| r.chunk.id.as_str()).collect();
        ids.sort_unstable();
        let mut expected: Vec<&str> = doc.session.chunks().iter().map(|c| c.id.as_str()).collect();
        expected.sort_unstable();
        assert_eq!(ids, expected, "{method}");
    }
}

#[tokio::test]
async fn euclidean_scores_are_bounded() {
    let pipeline = remote_pipeline(Arc::new(TopicEmbedder::default()), None);
    let doc = process_cat(&pipeline, EmbeddingMethod::Remote).await;

    let outcome = pipeline
        .search("the blue sky", &doc.session, 3, SimilarityMetric::Euclidean, RerankMethod::None)
        .await
        .unwrap();
    assert!(outcome.results.iter().all(|r| r.similarity_score > 0.0 && r.similarity_score <= 1.0));
    assert_eq!(outcome.results[0].chunk.content, "The sky is blue.");
    assert_eq!(outcome.metrics.metric, SimilarityMetric::Euclidean);
}

#[tokio::test]
async fn sessions_are_independent() {
    let pipeline = offline_pipeline();
    let cats = process_cat(&pipeline, EmbeddingMethod::Lexical).await;
    let topics = pipeline
        .process_document(
            &topic_document(),
            ChunkStrategy::Paragraph,
            &ChunkParams::default(),
            EmbeddingMethod::Lexical,
            "unused",
        )
        .await
        .unwrap();
    assert_ne!(cats.session.id, topics.session.id);

    let outcome = pipeline
        .search("cat", &cats.session, 10, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap();
    assert_eq!(outcome.metrics.total_chunks, 3);
    assert!(outcome.results.iter().all(|r| r.chunk.strategy == ChunkStrategy::Sentence));
}

#[tokio::test]
async fn degraded_embeddings_are_reported_in_metrics() {
    let pipeline = remote_pipeline(Arc::new(FlakyEmbedder { poison: "dog" }), None);
    let doc = process_cat(&pipeline, EmbeddingMethod::Remote).await;

    assert!(doc.session.embeddings().is_degraded());
    assert_eq!(doc.session.embeddings().fallbacks, vec![1]);

    let outcome = pipeline
        .search("cat", &doc.session, 3, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap();
    assert_eq!(outcome.metrics.fallback_vectors, 1);
}

#[tokio::test]
async fn invalid_requests_are_rejected() {
    let pipeline = offline_pipeline();
    let doc = process_cat(&pipeline, EmbeddingMethod::Lexical).await;

    let err = pipeline
        .search("   ", &doc.session, 3, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = pipeline
        .search("cat", &doc.session, 0, SimilarityMetric::Cosine, RerankMethod::None)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);

    let err = pipeline
        .process_document("", ChunkStrategy::Sentence, &ChunkParams::default(), EmbeddingMethod::Lexical, "x")
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidArgument);
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn remote_search_without_backend_is_unavailable() {
    let pipeline = offline_pipeline();
    let err = pipeline
        .process_document(CAT_TEXT, ChunkStrategy::Sentence, &sentence_params(), EmbeddingMethod::Remote, TEST_MODEL)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::BackendUnavailable);
}
