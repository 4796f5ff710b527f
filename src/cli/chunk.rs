use anyhow::Result;
use serde::Serialize;

use ragpipe::config::RagConfig;
use ragpipe::retrieval::DocumentStats;
use ragpipe::{Chunk, Pipeline};

use super::{preview, print_json, DocumentArgs};

#[derive(Serialize)]
struct ChunkReport<'a> {
    stats: DocumentStats,
    chunks: &'a [Chunk],
}

/// Chunk a document and print the chunks.
pub async fn run(config: &RagConfig, doc: &DocumentArgs, json: bool) -> Result<()> {
    let config = doc.apply(config);
    let pipeline = Pipeline::from_config(config)?;
    let text = doc.read()?;

    let chunking = &pipeline.config().chunking;
    let chunks = pipeline
        .chunk(&text, chunking.strategy, &chunking.params)
        .await?;
    let stats = DocumentStats::of(&chunks, chunking.strategy);

    if json {
        return print_json(&ChunkReport {
            stats,
            chunks: &chunks,
        });
    }

    if chunks.is_empty() {
        println!("No chunks produced.");
        return Ok(());
    }

    println!("{} chunks ({})", stats.total_chunks, stats.strategy);
    println!("{}", "=".repeat(40));
    println!("  Characters:          {}", stats.total_characters);
    println!("  Words:               {}", stats.total_words);
    println!("  Avg chars/chunk:     {:.1}", stats.avg_chunk_chars);
    println!("  Avg words/chunk:     {:.1}", stats.avg_word_count);
    println!();

    for chunk in &chunks {
        let span = match (chunk.start_offset, chunk.end_offset) {
            (Some(start), Some(end)) => format!(" [{start}..{end}]"),
            _ => String::new(),
        };
        let parent = chunk
            .parent_id
            .as_deref()
            .map(|p| format!(" (child of {p})"))
            .unwrap_or_default();
        println!("  {}{}{} {} words", chunk.id, span, parent, chunk.word_count);
        println!("     {}", preview(&chunk.content, 100));
    }

    Ok(())
}
