//! Splitting page units into overlapping, bounded chunks.
//!
//! [`RecursiveChunker`] cuts each [`DocumentUnit`] into windows of at most
//! `chunk_size` characters. A window ends at the cleanest break point it
//! contains: a paragraph break, then a line break, then a sentence end, then
//! a space, and only as a last resort a hard cut. The next window starts
//! exactly `chunk_overlap` characters before the previous one ended.

use tracing::debug;

use crate::document::{Chunk, DocumentUnit};
use crate::error::{RagError, Result};

/// Break-point separators, from the coarsest to the finest.
const SEPARATOR_LEVELS: &[&[&str]] = &[&["\n\n"], &["\n"], &[". ", "! ", "? "], &[" "]];

/// A strategy for splitting page units into chunks.
pub trait Chunker: Send + Sync {
    /// Split a single unit into chunks, left to right.
    ///
    /// Returns an empty `Vec` if the unit's text is blank.
    fn chunk(&self, unit: &DocumentUnit) -> Vec<Chunk>;

    /// Split every unit independently, preserving unit order.
    fn split(&self, units: &[DocumentUnit]) -> Vec<Chunk> {
        units.iter().flat_map(|unit| self.chunk(unit)).collect()
    }
}

/// Splits text hierarchically: paragraphs → lines → sentences → words → characters.
///
/// Every chunk is a contiguous span of its unit's text and carries its char
/// offset and the length of the overlap it shares with its predecessor, so
/// that dropping each chunk's leading `overlap` chars and concatenating
/// rebuilds the unit text exactly.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{Chunker, RecursiveChunker};
///
/// let chunker = RecursiveChunker::new(1000, 150)?;
/// let chunks = chunker.split(&units);
/// ```
#[derive(Debug, Clone)]
pub struct RecursiveChunker {
    chunk_size: usize,
    chunk_overlap: usize,
}

impl RecursiveChunker {
    /// Create a new `RecursiveChunker`.
    ///
    /// # Arguments
    ///
    /// * `chunk_size` - maximum number of characters per chunk
    /// * `chunk_overlap` - number of characters repeated between consecutive chunks
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if `chunk_size` is zero or
    /// `chunk_overlap >= chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self> {
        if chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if chunk_overlap >= chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({chunk_overlap}) must be less than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self { chunk_size, chunk_overlap })
    }

    /// Maximum chunk length in characters.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Overlap between consecutive chunks in characters.
    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }
}

/// A char-indexed window `[start, end)` and the overlap it carries over.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Window {
    start: usize,
    end: usize,
    overlap: usize,
}

/// Compute the chunk windows for a text of `chars`.
fn windows(chars: &[char], chunk_size: usize, chunk_overlap: usize) -> Vec<Window> {
    let len = chars.len();
    let mut windows = Vec::new();
    if len == 0 {
        return windows;
    }

    let mut start = 0;
    let mut overlap = 0;
    loop {
        let limit = start + chunk_size;
        if limit >= len {
            windows.push(Window { start, end: len, overlap });
            break;
        }
        // The next window starts `chunk_overlap` before this one ends, so the
        // end must lie past `start + chunk_overlap` for the split to advance.
        let min_end = start + chunk_overlap + 1;
        let end = find_break(chars, min_end, limit).unwrap_or(limit);
        windows.push(Window { start, end, overlap });
        start = end - chunk_overlap;
        overlap = chunk_overlap;
    }
    windows
}

/// Find the last position in `[min_end, limit]` directly after a separator,
/// trying separator levels from the coarsest to the finest.
fn find_break(chars: &[char], min_end: usize, limit: usize) -> Option<usize> {
    SEPARATOR_LEVELS.iter().find_map(|level| {
        level
            .iter()
            .filter_map(|separator| last_break_after(chars, separator, min_end, limit))
            .max()
    })
}

fn last_break_after(
    chars: &[char],
    separator: &str,
    min_end: usize,
    limit: usize,
) -> Option<usize> {
    let separator: Vec<char> = separator.chars().collect();
    let n = separator.len();
    let lowest = min_end.max(n);
    if lowest > limit {
        return None;
    }
    (lowest..=limit).rev().find(|&end| chars[end - n..end] == separator[..])
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, unit: &DocumentUnit) -> Vec<Chunk> {
        if unit.text.trim().is_empty() {
            return Vec::new();
        }

        let chars: Vec<char> = unit.text.chars().collect();
        let chunks: Vec<Chunk> = windows(&chars, self.chunk_size, self.chunk_overlap)
            .into_iter()
            .enumerate()
            .map(|(chunk_index, window)| Chunk {
                id: format!("{}_{}_{chunk_index}", unit.document_name, unit.page_index),
                text: chars[window.start..window.end].iter().collect(),
                document_name: unit.document_name.clone(),
                page_index: unit.page_index,
                chunk_index,
                start: window.start,
                overlap: window.overlap,
            })
            .collect();

        debug!(
            document.name = %unit.document_name,
            page = unit.page_index,
            chunk_count = chunks.len(),
            "chunked unit"
        );
        chunks
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chars(s: &str) -> Vec<char> {
        s.chars().collect()
    }

    #[test]
    fn short_text_is_a_single_window() {
        let w = windows(&chars("hello world"), 100, 10);
        assert_eq!(w, vec![Window { start: 0, end: 11, overlap: 0 }]);
    }

    #[test]
    fn prefers_paragraph_over_sentence_break() {
        let text = "One. Two.\n\nThree four five six";
        let w = windows(&chars(text), 20, 2);
        // "One. Two.\n\n" is 11 chars; the paragraph break wins over ". ".
        assert_eq!(w[0].end, 11);
    }

    #[test]
    fn falls_back_to_word_then_hard_cut() {
        let w = windows(&chars("aaaa bbbb cccc"), 8, 0);
        assert_eq!(w[0], Window { start: 0, end: 5, overlap: 0 });

        let w = windows(&chars("abcdefghijkl"), 5, 1);
        assert_eq!(w[0], Window { start: 0, end: 5, overlap: 0 });
        assert_eq!(w[1], Window { start: 4, end: 9, overlap: 1 });
    }

    #[test]
    fn break_too_close_to_start_is_ignored() {
        // The only space lies inside the overlap region, so it cannot be used.
        let w = windows(&chars("a bcdefghij"), 6, 3);
        assert_eq!(w[0].end, 6);
    }
}
