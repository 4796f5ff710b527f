//! Paragraph chunking on blank-line breaks.

use std::sync::LazyLock;

use regex::Regex;

use super::{char_len, fixed, Chunk, ChunkStrategy};

static PARAGRAPH_BREAK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n\s*\n").expect("paragraph break pattern is valid"));

/// One chunk per paragraph; paragraphs over `max_size` characters are re-split
/// into fixed windows without overlap.
///
/// Offsets accumulate trimmed paragraph lengths plus a two-character separator,
/// so they approximate source positions when paragraphs are separated by a
/// single blank line.
pub fn chunk_paragraphs(text: &str, max_size: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut offset = 0;

    for (paragraph_index, paragraph) in PARAGRAPH_BREAK
        .split(text)
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .enumerate()
    {
        let len = char_len(paragraph);

        if len <= max_size {
            let id = format!("chunk-{}", chunks.len() + 1);
            chunks.push(
                Chunk::new(id, paragraph, ChunkStrategy::Paragraph)
                    .with_span(offset, offset + len)
                    .with_paragraph_index(paragraph_index),
            );
        } else {
            for piece in fixed::chunk_fixed(paragraph, max_size, 0) {
                let start = offset + piece.start_offset.unwrap_or(0);
                let end = offset + piece.end_offset.unwrap_or(0);
                let id = format!("chunk-{}", chunks.len() + 1);
                chunks.push(
                    Chunk::new(id, piece.content, ChunkStrategy::Paragraph)
                        .with_span(start, end)
                        .with_paragraph_index(paragraph_index),
                );
            }
        }

        offset += len + 2;
    }

    chunks
}
