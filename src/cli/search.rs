use anyhow::Result;

use ragpipe::config::RagConfig;
use ragpipe::{Pipeline, SearchOutcome};

use super::{preview, print_json, process, DocumentArgs, QueryArgs};

/// Run a search from the terminal.
pub async fn run(config: &RagConfig, doc: &DocumentArgs, query: &QueryArgs, json: bool) -> Result<()> {
    let config = doc.apply(config);
    let pipeline = Pipeline::from_config(config)?;
    let processed = process(&pipeline, doc).await?;

    let cfg = pipeline.config();
    let outcome = pipeline
        .search(
            &query.query,
            &processed.session,
            query.top_k(cfg),
            query.metric(cfg),
            query.rerank(cfg),
        )
        .await?;

    if json {
        return print_json(&outcome);
    }
    print_results(&outcome);
    Ok(())
}

pub(crate) fn print_results(outcome: &SearchOutcome) {
    let metrics = &outcome.metrics;
    if outcome.results.is_empty() {
        println!("No results found.");
        return;
    }

    println!(
        "Retrieved {} of {} chunk(s) ({}, rerank: {}, avg similarity: {:.4})\n",
        metrics.retrieved,
        metrics.total_chunks,
        metrics.metric,
        metrics.rerank_method,
        metrics.avg_similarity
    );
    if metrics.fallback_vectors > 0 {
        println!(
            "  warning: {} chunk vector(s) are zero-filled fallbacks\n",
            metrics.fallback_vectors
        );
    }

    for result in &outcome.results {
        let rerank = result
            .rerank_score
            .map(|s| format!(", rerank: {s:.4}"))
            .unwrap_or_default();
        println!(
            "  {}. {} (similarity: {:.4}{}, initial rank: {})",
            result.final_rank, result.chunk.id, result.similarity_score, rerank, result.initial_rank,
        );
        println!("     {}", preview(&result.chunk.content, 120));
        println!();
    }
}
