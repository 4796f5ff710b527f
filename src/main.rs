mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use ragpipe::config::{expand_tilde, RagConfig};

#[derive(Parser)]
#[command(name = "ragpipe", version, about = "Chunk, embed, retrieve and prompt over a document")]
struct Cli {
    /// Config file (default: ~/.ragpipe/config.toml)
    #[arg(long, global = true)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Split a document into chunks
    Chunk {
        #[command(flatten)]
        doc: cli::DocumentArgs,
        #[arg(long)]
        json: bool,
    },
    /// Chunk and embed a document, then summarise the vectors
    Embed {
        #[command(flatten)]
        doc: cli::DocumentArgs,
        /// List chunk pairs at or above this cosine similarity
        #[arg(long)]
        similar_above: Option<f32>,
        /// Project the vectors for plotting; without a value, uses [visualization] dimensions
        #[arg(long, num_args = 0..=1, value_name = "DIMS")]
        project: Option<Option<usize>>,
        #[arg(long)]
        json: bool,
    },
    /// Retrieve the best chunks of a document for a query
    Search {
        #[command(flatten)]
        doc: cli::DocumentArgs,
        #[command(flatten)]
        query: cli::QueryArgs,
        #[arg(long)]
        json: bool,
    },
    /// Retrieve, assemble a prompt, run guardrails and generate an answer
    Ask {
        #[command(flatten)]
        doc: cli::DocumentArgs,
        #[command(flatten)]
        query: cli::QueryArgs,
        /// Prompt template: basic-qa, conversational, analytical
        #[arg(long)]
        template: Option<String>,
        #[arg(long)]
        json: bool,
    },
    /// List chunking strategies, rerank methods, templates and models
    Catalog {
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => RagConfig::load_from(expand_tilde(path))?,
        None => RagConfig::load()?,
    };

    // Log to stderr so stdout stays clean for --json output.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Chunk { doc, json } => cli::chunk::run(&config, &doc, json).await?,
        Command::Embed {
            doc,
            similar_above,
            project,
            json,
        } => cli::embed::run(&config, &doc, similar_above, project, json).await?,
        Command::Search { doc, query, json } => {
            cli::search::run(&config, &doc, &query, json).await?
        }
        Command::Ask {
            doc,
            query,
            template,
            json,
        } => cli::ask::run(&config, &doc, &query, template.as_deref(), json).await?,
        Command::Catalog { json } => cli::catalog::run(&config, json)?,
    }

    Ok(())
}
