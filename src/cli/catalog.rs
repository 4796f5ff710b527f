use anyhow::Result;
use serde::Serialize;

use ragpipe::chunking::StrategyInfo;
use ragpipe::config::RagConfig;
use ragpipe::embedding::{ModelInfo, MODEL_CATALOG};
use ragpipe::{ChunkStrategy, PromptTemplate, RerankMethod};

use super::print_json;

#[derive(Serialize)]
struct Catalog {
    strategies: Vec<StrategyInfo>,
    rerank_methods: Vec<&'static str>,
    templates: Vec<&'static str>,
    models: &'static [ModelInfo],
    backends: Backends,
}

#[derive(Serialize)]
struct Backends {
    embedding_method: String,
    remote_embedding: bool,
    generation: bool,
}

/// Print every selectable strategy, rerank method, template and model, and
/// which remote backends the config enables.
pub fn run(config: &RagConfig, json: bool) -> Result<()> {
    let catalog = Catalog {
        strategies: ChunkStrategy::all().iter().map(ChunkStrategy::describe).collect(),
        rerank_methods: RerankMethod::all().iter().map(RerankMethod::as_str).collect(),
        templates: PromptTemplate::all().iter().map(PromptTemplate::as_str).collect(),
        models: MODEL_CATALOG,
        backends: Backends {
            embedding_method: config.embedding.method.to_string(),
            remote_embedding: config.embedding_configured(),
            generation: config.generation_configured(),
        },
    };

    if json {
        return print_json(&catalog);
    }

    println!("Chunking strategies:");
    for info in &catalog.strategies {
        println!("  {:<14} {}", info.strategy.as_str(), info.name);
        println!("  {:<14} {}", "", info.description);
        for param in &info.parameters {
            println!(
                "  {:<14}   {} = {} ({}): {}",
                "", param.name, param.default, param.range, param.description
            );
        }
    }
    println!();

    println!("Rerank methods:  {}", catalog.rerank_methods.join(", "));
    println!("Templates:       {}", catalog.templates.join(", "));
    println!();

    println!("Embedding models:");
    for model in catalog.models {
        println!("  {:<32} {:<36} {}", model.id, model.name, model.dimensions);
    }
    println!();

    let backends = &catalog.backends;
    println!("Backends:");
    println!("  Embedding method:    {}", backends.embedding_method);
    println!("  Remote embedding:    {}", configured(backends.remote_embedding));
    println!("  Generation:          {}", configured(backends.generation));

    Ok(())
}

fn configured(set: bool) -> &'static str {
    if set {
        "configured"
    } else {
        "not configured"
    }
}
