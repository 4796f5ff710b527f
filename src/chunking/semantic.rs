//! Similarity-driven sentence grouping.

use super::{char_len, char_offset, split_sentences, Chunk, ChunkStrategy};
use crate::error::{RagError, Result};
use crate::retrieval::cosine_similarity;

/// Produces one vector per sentence, in order.
pub trait SentenceEncoder {
    fn encode(&self, sentences: &[&str]) -> Result<Vec<Vec<f32>>>;
}

/// Encoder backed by vectors computed ahead of time, typically by an async
/// remote backend. Fails if asked for a different number of sentences.
#[derive(Debug, Clone)]
pub struct PrecomputedEncoder {
    vectors: Vec<Vec<f32>>,
}

impl PrecomputedEncoder {
    pub fn new(vectors: Vec<Vec<f32>>) -> Self {
        Self { vectors }
    }
}

impl SentenceEncoder for PrecomputedEncoder {
    fn encode(&self, sentences: &[&str]) -> Result<Vec<Vec<f32>>> {
        if sentences.len() != self.vectors.len() {
            return Err(RagError::invalid(format!(
                "expected {} sentences, got {}",
                self.vectors.len(),
                sentences.len()
            )));
        }
        Ok(self.vectors.clone())
    }
}

/// Sentence texts in the order [`chunk_semantic`] encodes them.
pub fn sentences_of(text: &str) -> Vec<String> {
    split_sentences(text)
        .into_iter()
        .map(|s| s.text.to_string())
        .collect()
}

/// Grow a chunk while each next sentence's similarity to the mean vector of the
/// chunk's sentences exceeds `threshold` and the chunk holds fewer than
/// `max_sentences` sentences.
///
/// Without a usable encoder this returns no chunks rather than guessing.
pub fn chunk_semantic(
    text: &str,
    threshold: f32,
    max_sentences: usize,
    encoder: Option<&dyn SentenceEncoder>,
) -> Vec<Chunk> {
    let sentences = split_sentences(text);
    if sentences.is_empty() {
        return Vec::new();
    }

    let Some(encoder) = encoder else {
        tracing::warn!("semantic chunking requested without an embedding backend");
        return Vec::new();
    };

    let texts: Vec<&str> = sentences.iter().map(|s| s.text).collect();
    let vectors = match encoder.encode(&texts) {
        Ok(v) if v.len() == texts.len() => v,
        Ok(v) => {
            tracing::warn!(
                expected = texts.len(),
                got = v.len(),
                "sentence encoder returned wrong number of vectors"
            );
            return Vec::new();
        }
        Err(e) => {
            tracing::warn!(error = %e, "sentence encoding failed, no semantic chunks produced");
            return Vec::new();
        }
    };

    let mut groups: Vec<Vec<usize>> = Vec::new();
    let mut current: Vec<usize> = vec![0];

    for idx in 1..sentences.len() {
        let centroid = mean_vector(current.iter().map(|&i| vectors[i].as_slice()));
        let similarity = cosine_similarity(&centroid, &vectors[idx]);
        if similarity > threshold && current.len() < max_sentences {
            current.push(idx);
        } else {
            groups.push(std::mem::take(&mut current));
            current.push(idx);
        }
    }
    groups.push(current);

    groups
        .into_iter()
        .enumerate()
        .map(|(n, group)| {
            let first = sentences[group[0]];
            let last = sentences[group[group.len() - 1]];
            let content = group
                .iter()
                .map(|&i| sentences[i].text)
                .collect::<Vec<_>>()
                .join(" ");
            let start = char_offset(text, first.start);
            let end = start + char_len(&text[first.start..last.end()]);
            Chunk::new(format!("chunk-{}", n + 1), content, ChunkStrategy::Semantic)
                .with_span(start, end)
                .with_sentence_index(group[0])
        })
        .collect()
}

fn mean_vector<'a>(vectors: impl Iterator<Item = &'a [f32]>) -> Vec<f32> {
    let mut sum: Vec<f32> = Vec::new();
    let mut count = 0usize;
    for v in vectors {
        if sum.is_empty() {
            sum = vec![0.0; v.len()];
        }
        for (acc, x) in sum.iter_mut().zip(v) {
            *acc += x;
        }
        count += 1;
    }
    if count > 1 {
        let n = count as f32;
        sum.iter_mut().for_each(|x| *x /= n);
    }
    sum
}
