//! Fixed-size character windows.

use super::{Chunk, ChunkStrategy};

/// Slide a window of `chunk_size` characters over `text` with stride
/// `max(1, chunk_size - overlap)`.
///
/// Windows whose trimmed content is empty are dropped. The final window may be
/// shorter than `chunk_size`; iteration stops once a window reaches the end of
/// the text. Content is kept untrimmed so consecutive full windows share exactly
/// `overlap` characters.
pub fn chunk_fixed(text: &str, chunk_size: usize, overlap: usize) -> Vec<Chunk> {
    let chars: Vec<char> = text.chars().collect();
    let step = chunk_size.saturating_sub(overlap).max(1);
    let mut chunks = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = (start + chunk_size).min(chars.len());
        let content: String = chars[start..end].iter().collect();

        if !content.trim().is_empty() {
            let id = format!("chunk-{}", chunks.len() + 1);
            chunks.push(Chunk::new(id, content, ChunkStrategy::FixedSize).with_span(start, end));
        }

        if end >= chars.len() {
            break;
        }
        start += step;
    }

    chunks
}
