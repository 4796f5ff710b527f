use anyhow::Result;
use serde::Serialize;

use ragpipe::config::RagConfig;
use ragpipe::guardrails::FindingStatus;
use ragpipe::prompt::GenerationOutcome;
use ragpipe::{Chunk, GenerationParams, GenerationReport, Pipeline, PromptTemplate, SearchOutcome};

use super::{print_json, process, search::print_results, DocumentArgs, QueryArgs};

#[derive(Serialize)]
struct AskReport {
    search: SearchOutcome,
    generation: GenerationReport,
}

/// Retrieve context, then prompt the generation backend.
pub async fn run(
    config: &RagConfig,
    doc: &DocumentArgs,
    query: &QueryArgs,
    template: Option<&str>,
    json: bool,
) -> Result<()> {
    let config = doc.apply(config);
    let pipeline = Pipeline::from_config(config)?;
    let processed = process(&pipeline, doc).await?;

    let cfg = pipeline.config();
    let search = pipeline
        .search(
            &query.query,
            &processed.session,
            query.top_k(cfg),
            query.metric(cfg),
            query.rerank(cfg),
        )
        .await?;

    let template = template
        .map(PromptTemplate::from_id)
        .unwrap_or(cfg.generation.template);
    let context: Vec<Chunk> = search.results.iter().map(|r| r.chunk.clone()).collect();
    let params = GenerationParams::from_config(&cfg.generation);
    let generation = pipeline
        .generate(&query.query, &context, template, &params)
        .await?;

    let report = AskReport { search, generation };
    if json {
        return print_json(&report);
    }

    print_results(&report.search);

    let generation = &report.generation;
    println!("Guardrails:");
    for finding in &generation.guardrails {
        let marker = match finding.status {
            FindingStatus::Pass => "ok",
            FindingStatus::Warning => "warn",
            FindingStatus::Fail => "FAIL",
        };
        println!("  [{marker:<4}] {:<20} {}", finding.name, finding.message);
    }
    println!();

    match &generation.outcome {
        GenerationOutcome::Generated { text } => {
            println!("Answer ({}, {}):", generation.model_id, generation.template);
            println!("{text}");
        }
        GenerationOutcome::Failed { kind, message } => {
            println!("No answer ({kind}): {message}");
            if !pipeline.generation_configured() {
                println!("Set [generation] endpoint or RAGPIPE_GENERATION_ENDPOINT to enable answers.");
            }
        }
    }
    println!();

    let usage = &generation.token_usage;
    println!(
        "Tokens (estimated): prompt {:.0}, completion {:.0}, total {:.0}",
        usage.prompt_tokens, usage.completion_tokens, usage.total_tokens
    );

    Ok(())
}
