//! Two-level parent/child chunking.
//!
//! Parents are produced by a recursive splitter that prefers paragraph breaks,
//! then line breaks, sentence ends, spaces and finally single characters. Each
//! parent is re-split with a sentence-level separator list into children that
//! use half of the parent overlap.
//!
//! The output is ordered by start offset. A parent is followed by its own
//! children, except that children lying inside the overlap with the next parent
//! sort after that parent.

use std::collections::VecDeque;

use super::{char_len, char_offset, Chunk, ChunkStrategy};

const PARENT_SEPARATORS: &[&str] = &["\n\n", "\n", ". ", " ", ""];
const CHILD_SEPARATORS: &[&str] = &[". ", " ", ""];

pub fn chunk_hierarchical(
    text: &str,
    parent_size: usize,
    child_size: usize,
    overlap: usize,
) -> Vec<Chunk> {
    let parents = RecursiveSplitter::new(parent_size, overlap, PARENT_SEPARATORS);
    let children = RecursiveSplitter::new(child_size, overlap / 2, CHILD_SEPARATORS);

    let mut chunks = Vec::new();
    let mut parent_span = Span::default();

    for (parent_idx, parent_text) in parents.split_text(text).into_iter().enumerate() {
        let parent_id = format!("parent-{}", parent_idx + 1);
        let parent_pos = parent_span.locate(text, &parent_text, parents.overlap);
        let parent_start = char_offset(text, parent_pos);

        let mut child_chunks = Vec::new();
        let mut child_span = Span::default();
        for (child_idx, child_text) in children.split_text(&parent_text).into_iter().enumerate() {
            let child_pos = child_span.locate(&parent_text, &child_text, children.overlap);
            let child_start = parent_start + char_offset(&parent_text, child_pos);
            child_chunks.push(
                Chunk::new(
                    format!("{parent_id}-child-{}", child_idx + 1),
                    child_text.as_str(),
                    ChunkStrategy::Hierarchical,
                )
                .with_span(child_start, child_start + char_len(&child_text))
                .with_parent(parent_id.as_str()),
            );
        }

        let mut parent = Chunk::new(parent_id.as_str(), parent_text.as_str(), ChunkStrategy::Hierarchical)
            .with_span(parent_start, parent_start + char_len(&parent_text));
        parent.children_ids = Some(child_chunks.iter().map(|c| c.id.clone()).collect());

        chunks.push(parent);
        chunks.extend(child_chunks);
    }

    // Stable, so each parent stays ahead of a child sharing its start.
    chunks.sort_by_key(|c| c.start_offset);
    chunks
}

/// Search state for placing consecutive split pieces back in their source.
#[derive(Default)]
struct Span {
    /// Byte position of the previous piece, if any.
    previous: Option<usize>,
    /// Earliest byte position the next piece can start at.
    cursor: usize,
}

impl Span {
    /// Locate `piece` in `haystack` and advance past it, keeping at most
    /// `overlap` trailing characters searchable. The result is never before the
    /// previous piece.
    fn locate(&mut self, haystack: &str, piece: &str, overlap: usize) -> usize {
        let floor = self
            .previous
            .map_or(0, |prev| next_boundary(haystack, prev));
        let found = find_from(haystack, piece, self.cursor)
            .or_else(|| find_from(haystack, piece, floor));
        let pos = found.unwrap_or(self.cursor.max(floor));

        let mut next = next_boundary(haystack, pos);
        if found.is_some() {
            let kept = char_len(piece).saturating_sub(overlap);
            let tail = piece
                .char_indices()
                .nth(kept)
                .map_or(piece.len(), |(idx, _)| idx);
            next = next.max(pos + tail);
        }
        self.previous = Some(pos);
        self.cursor = next;
        pos
    }
}

fn find_from(haystack: &str, needle: &str, from: usize) -> Option<usize> {
    haystack.get(from..)?.find(needle).map(|pos| from + pos)
}

/// Byte position just past the character starting at `pos`.
fn next_boundary(text: &str, pos: usize) -> usize {
    text[pos..].chars().next().map_or(pos, |ch| pos + ch.len_utf8())
}

// ── Recursive splitter ────────────────────────────────────────────────────────

/// Splits text into pieces of at most `chunk_size` characters, trying each
/// separator in turn and merging small pieces back together with `overlap`
/// characters of carry-over.
struct RecursiveSplitter {
    chunk_size: usize,
    overlap: usize,
    separators: &'static [&'static str],
}

impl RecursiveSplitter {
    fn new(chunk_size: usize, overlap: usize, separators: &'static [&'static str]) -> Self {
        Self {
            chunk_size,
            overlap: overlap.min(chunk_size.saturating_sub(1)),
            separators,
        }
    }

    fn split_text(&self, text: &str) -> Vec<String> {
        self.split(text, self.separators)
    }

    fn split(&self, text: &str, separators: &[&str]) -> Vec<String> {
        let idx = separators
            .iter()
            .position(|sep| sep.is_empty() || text.contains(sep))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(idx).copied().unwrap_or("");
        let rest = separators.get(idx + 1..).unwrap_or(&[]);

        // Separators stay attached to the piece they end.
        let pieces: Vec<&str> = if separator.is_empty() {
            text.char_indices()
                .map(|(pos, ch)| &text[pos..pos + ch.len_utf8()])
                .collect()
        } else {
            text.split_inclusive(separator).collect()
        };

        let mut out = Vec::new();
        let mut pending: Vec<&str> = Vec::new();
        for piece in pieces {
            if char_len(piece) < self.chunk_size {
                pending.push(piece);
                continue;
            }
            if !pending.is_empty() {
                out.extend(self.merge(&pending));
                pending.clear();
            }
            if rest.is_empty() {
                let trimmed = piece.trim();
                if !trimmed.is_empty() {
                    out.push(trimmed.to_string());
                }
            } else {
                out.extend(self.split(piece, rest));
            }
        }
        if !pending.is_empty() {
            out.extend(self.merge(&pending));
        }
        out
    }

    fn merge(&self, pieces: &[&str]) -> Vec<String> {
        let mut docs = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for &piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_joined(&window, &mut docs);
                while total > self.overlap || (total + len > self.chunk_size && total > 0) {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        push_joined(&window, &mut docs);
        docs
    }
}

fn push_joined(window: &VecDeque<&str>, docs: &mut Vec<String>) {
    let joined: String = window.iter().copied().collect();
    let trimmed = joined.trim();
    if !trimmed.is_empty() {
        docs.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> String {
        let para = "Rust gives memory safety without a garbage collector. \
                    Ownership rules are checked at compile time. \
                    Borrowing lets code share data safely.";
        format!("{para}\n\n{para}\n\n{para}")
    }

    #[test]
    fn splitter_respects_size() {
        let splitter = RecursiveSplitter::new(60, 10, PARENT_SEPARATORS);
        for piece in splitter.split_text(&sample()) {
            assert!(char_len(&piece) <= 60, "piece too long: {piece:?}");
        }
    }

    #[test]
    fn splitter_keeps_small_text_whole() {
        let splitter = RecursiveSplitter::new(100, 10, PARENT_SEPARATORS);
        assert_eq!(splitter.split_text("short text"), vec!["short text".to_string()]);
    }

    #[test]
    fn parents_link_children() {
        let chunks = chunk_hierarchical(&sample(), 150, 50, 20);
        let parents: Vec<&Chunk> = chunks.iter().filter(|c| c.is_parent()).collect();
        assert!(parents.len() >= 3);

        for parent in parents {
            let linked = parent.children_ids.clone().unwrap_or_default();
            let actual: Vec<String> = chunks
                .iter()
                .filter(|c| c.parent_id.as_deref() == Some(parent.id.as_str()))
                .map(|c| c.id.clone())
                .collect();
            assert_eq!(linked, actual);
            assert!(!actual.is_empty());
        }
    }

    #[test]
    fn child_ids_are_namespaced() {
        let chunks = chunk_hierarchical(&sample(), 150, 50, 20);
        let child = chunks.iter().find(|c| c.is_child()).unwrap();
        assert!(child.id.starts_with("parent-1-child-"));
    }

    fn source_slice(text: &str, chunk: &Chunk) -> String {
        let start = chunk.start_offset.unwrap();
        let end = chunk.end_offset.unwrap();
        text.chars().skip(start).take(end - start).collect()
    }

    #[test]
    fn repeated_paragraphs_get_distinct_offsets() {
        let chunks = chunk_hierarchical(&sample(), 150, 50, 20);
        let starts: Vec<usize> = chunks
            .iter()
            .filter(|c| c.is_parent())
            .filter_map(|c| c.start_offset)
            .collect();
        assert!(starts.windows(2).all(|w| w[0] < w[1]), "{starts:?}");
    }

    #[test]
    fn identical_paragraphs_keep_offsets_in_order() {
        let para = "Memory safety comes from ownership and borrowing rules. ".repeat(5);
        let para = para.trim();
        let text = format!("{para}\n\n{para}\n\n{para}");
        let chunks = chunk_hierarchical(&text, 800, 200, 200);
        assert!(chunks.iter().filter(|c| c.is_parent()).count() >= 2);

        let starts: Vec<usize> = chunks.iter().filter_map(|c| c.start_offset).collect();
        assert_eq!(starts.len(), chunks.len());
        assert!(starts.windows(2).all(|w| w[0] <= w[1]), "{starts:?}");

        let total = text.chars().count();
        let last_parent = chunks.iter().filter(|c| c.is_parent()).last().unwrap();
        assert_eq!(last_parent.end_offset, Some(total));
        for chunk in &chunks {
            assert!(chunk.end_offset.unwrap() <= total, "{}", chunk.id);
            assert_eq!(source_slice(&text, chunk), chunk.content, "{}", chunk.id);
        }
    }

    #[test]
    fn child_offsets_fall_inside_parent() {
        let text = sample();
        let chunks = chunk_hierarchical(&text, 150, 50, 20);
        for child in chunks.iter().filter(|c| c.is_child()) {
            let parent = chunks
                .iter()
                .find(|c| Some(c.id.as_str()) == child.parent_id.as_deref())
                .unwrap();
            assert!(child.start_offset >= parent.start_offset);
            assert!(child.end_offset <= parent.end_offset);
        }
    }
}
