//! Greedy sentence packing.

use super::{char_len, char_offset, split_sentences, Chunk, ChunkStrategy};

/// Pack whole sentences into chunks of at most `max_size` characters.
///
/// A sentence that would push the current chunk past `max_size` closes it. The
/// next chunk then starts with the last `overlap` characters of the closed chunk
/// followed by the sentence. A single sentence longer than `max_size` becomes
/// its own oversized chunk. Start offsets follow the source position of each
/// sentence, so they never decrease.
pub fn chunk_sentences(text: &str, max_size: usize, overlap: usize) -> Vec<Chunk> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut current_start = 0;
    let mut first_sentence = 0;

    for (index, sentence) in split_sentences(text).iter().enumerate() {
        let sentence_start = char_offset(text, sentence.start);

        if current.is_empty() {
            current.push_str(sentence.text);
            current_start = sentence_start;
            first_sentence = index;
            continue;
        }

        if char_len(&current) + char_len(sentence.text) > max_size {
            push_chunk(&mut chunks, &current, current_start, first_sentence);
            first_sentence = index;

            let tail = tail_chars(&current, overlap);
            if tail.trim().is_empty() {
                current = sentence.text.to_string();
                current_start = sentence_start;
            } else {
                let tail_len = char_len(tail) + 1;
                current = format!("{tail} {}", sentence.text);
                current_start = sentence_start.saturating_sub(tail_len).max(current_start);
            }
        } else {
            current.push(' ');
            current.push_str(sentence.text);
        }
    }

    if !current.trim().is_empty() {
        push_chunk(&mut chunks, &current, current_start, first_sentence);
    }

    chunks
}

fn push_chunk(chunks: &mut Vec<Chunk>, current: &str, start: usize, first_sentence: usize) {
    let leading = char_len(current) - char_len(current.trim_start());
    let content = current.trim();
    let start = start + leading;
    let id = format!("chunk-{}", chunks.len() + 1);
    chunks.push(
        Chunk::new(id, content, ChunkStrategy::Sentence)
            .with_span(start, start + char_len(content))
            .with_sentence_index(first_sentence),
    );
}

/// The last `n` characters of `s` (all of `s` when it is shorter).
fn tail_chars(s: &str, n: usize) -> &str {
    if n == 0 {
        return "";
    }
    let total = char_len(s);
    if total <= n {
        return s;
    }
    let skip = total - n;
    let byte_pos = s.char_indices().nth(skip).map(|(pos, _)| pos).unwrap_or(0);
    &s[byte_pos..]
}
