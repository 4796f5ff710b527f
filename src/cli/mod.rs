pub mod ask;
pub mod catalog;
pub mod chunk;
pub mod embed;
pub mod search;

use std::io::Read;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use serde::Serialize;

use ragpipe::config::{expand_tilde, RagConfig};
use ragpipe::{ChunkStrategy, EmbeddingMethod, Pipeline, ProcessedDocument, RerankMethod, SimilarityMetric};

/// Where the document comes from and how it is chunked and embedded.
#[derive(Args, Debug)]
pub struct DocumentArgs {
    /// Document to read, or `-` for stdin
    pub file: String,

    /// fixed-size, sentence, paragraph, hierarchical or semantic
    #[arg(long)]
    pub strategy: Option<ChunkStrategy>,

    #[arg(long)]
    pub chunk_size: Option<usize>,

    #[arg(long)]
    pub overlap: Option<usize>,

    /// remote or lexical
    #[arg(long)]
    pub method: Option<EmbeddingMethod>,

    /// Embedding model id for the remote method
    #[arg(long)]
    pub model: Option<String>,
}

impl DocumentArgs {
    pub fn read(&self) -> Result<String> {
        if self.file == "-" {
            let mut text = String::new();
            std::io::stdin()
                .read_to_string(&mut text)
                .context("failed to read document from stdin")?;
            return Ok(text);
        }
        let path = expand_tilde(&self.file);
        std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read document: {}", path.display()))
    }

    /// Fold command-line overrides into `config`.
    pub fn apply(&self, config: &RagConfig) -> RagConfig {
        let mut config = config.clone();
        if let Some(strategy) = self.strategy {
            config.chunking.strategy = strategy;
        }
        if let Some(size) = self.chunk_size {
            config.chunking.params.chunk_size = size;
        }
        if let Some(overlap) = self.overlap {
            config.chunking.params.overlap = overlap;
        }
        if let Some(method) = self.method {
            config.embedding.method = method;
        }
        if let Some(model) = &self.model {
            config.embedding.model = model.clone();
        }
        config
    }
}

/// Query-time options shared by `search` and `ask`.
#[derive(Args, Debug)]
pub struct QueryArgs {
    pub query: String,

    #[arg(long)]
    pub top_k: Option<usize>,

    /// cosine, euclidean or dot-product
    #[arg(long)]
    pub metric: Option<SimilarityMetric>,

    /// Rerank method name; unknown names keep retrieval order
    #[arg(long)]
    pub rerank: Option<String>,
}

impl QueryArgs {
    pub fn top_k(&self, config: &RagConfig) -> usize {
        self.top_k.unwrap_or(config.retrieval.top_k)
    }

    pub fn metric(&self, config: &RagConfig) -> SimilarityMetric {
        self.metric.unwrap_or(config.retrieval.metric)
    }

    pub fn rerank(&self, config: &RagConfig) -> RerankMethod {
        self.rerank
            .as_deref()
            .map(RerankMethod::from_name)
            .unwrap_or(config.retrieval.rerank)
    }
}

/// Read, chunk and embed the document behind a spinner.
pub async fn process(pipeline: &Pipeline, doc: &DocumentArgs) -> Result<ProcessedDocument> {
    let text = doc.read()?;
    let config = pipeline.config();

    let pb = spinner(&format!(
        "Embedding with {} ({})...",
        config.embedding.method, config.chunking.strategy
    ));
    let processed = pipeline
        .process_document(
            &text,
            config.chunking.strategy,
            &config.chunking.params,
            config.embedding.method,
            &config.embedding.model,
        )
        .await;
    pb.finish_and_clear();

    Ok(processed?)
}

pub fn spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("  {spinner:.cyan} {msg}")
            .expect("valid template"),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// First `max` characters of `text`, on one line.
pub fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() > max {
        format!("{}...", flat.chars().take(max).collect::<String>())
    } else {
        flat
    }
}
