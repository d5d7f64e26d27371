//! Page text chunking.
//!
//! This module provides the [`Chunker`] trait and [`SentenceChunker`], which
//! splits each page into segments of at most `chunk_size` characters,
//! cutting at sentence ends, then at whitespace, and only as a last resort
//! inside a word. Chunks never overlap and never span pages.

use crate::document::{Chunk, Document};

/// A strategy for splitting documents into chunks.
///
/// Implementations number a document's chunks from 0 in page order and
/// return an empty `Vec` when no page has any text.
pub trait Chunker: Send + Sync {
    /// Split a document into chunks.
    fn chunk(&self, document: &Document) -> Vec<Chunk>;
}

/// Splits page text at sentence and word boundaries under a character budget.
///
/// # Example
///
/// ```rust,ignore
/// use pdfqa_rag::{Chunker, Document, SentenceChunker};
///
/// let chunker = SentenceChunker::new(500);
/// let chunks = chunker.chunk(&Document::from_page_texts("guide.pdf", pages));
/// ```
#[derive(Debug, Clone)]
pub struct SentenceChunker {
    chunk_size: usize,
}

impl SentenceChunker {
    /// Create a new `SentenceChunker` with a budget of `chunk_size`
    /// characters per chunk (at least 1).
    pub fn new(chunk_size: usize) -> Self {
        Self { chunk_size: chunk_size.max(1) }
    }

    /// The character budget per chunk.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }
}

impl Default for SentenceChunker {
    fn default() -> Self {
        Self::new(500)
    }
}

impl Chunker for SentenceChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        let total_pages = document.pages.len() as u32;
        let mut chunks = Vec::new();

        for page in &document.pages {
            for piece in split_text(&page.text, self.chunk_size) {
                chunks.push(Chunk {
                    text: piece.to_string(),
                    document_id: document.id.clone(),
                    page_number: page.page_number,
                    chunk_index: chunks.len(),
                    total_pages,
                });
            }
        }

        chunks
    }
}

/// Split `text` into trimmed, non-empty pieces of at most `budget` characters.
pub fn split_text(text: &str, budget: usize) -> Vec<&str> {
    let budget = budget.max(1);
    let mut pieces = Vec::new();
    let mut rest = text.trim();

    while !rest.is_empty() {
        // Byte offset just past the first `budget` characters.
        let Some((window_end, _)) = rest.char_indices().nth(budget) else {
            pieces.push(rest);
            break;
        };

        let cut = sentence_cut(rest, window_end)
            .or_else(|| whitespace_cut(rest, window_end))
            .unwrap_or(window_end);

        let (head, tail) = rest.split_at(cut);
        let head = head.trim_end();
        if !head.is_empty() {
            pieces.push(head);
        }
        rest = tail.trim_start();
    }

    pieces
}

/// The last sentence end inside `rest[..window_end]` that lies in the
/// second half of the window. A sentence end is `.`, `!` or `?` followed by
/// whitespace.
fn sentence_cut(rest: &str, window_end: usize) -> Option<usize> {
    let window = &rest[..window_end];
    let min_cut = window_end / 2;

    window
        .char_indices()
        .filter(|(_, c)| matches!(c, '.' | '!' | '?'))
        .map(|(i, c)| i + c.len_utf8())
        .filter(|&end| end > min_cut)
        .filter(|&end| rest[end..].chars().next().is_some_and(char::is_whitespace))
        .last()
}

/// The last whitespace position at or before `window_end`, if it leaves a
/// non-empty head.
fn whitespace_cut(rest: &str, window_end: usize) -> Option<usize> {
    if rest[window_end..].chars().next().is_some_and(char::is_whitespace) {
        return Some(window_end);
    }
    rest[..window_end]
        .char_indices()
        .filter(|(_, c)| c.is_whitespace())
        .map(|(i, _)| i)
        .filter(|&i| i > 0)
        .last()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Page;

    #[test]
    fn short_text_is_a_single_chunk() {
        assert_eq!(split_text("  Hello world.  ", 500), vec!["Hello world."]);
    }

    #[test]
    fn blank_text_yields_nothing() {
        assert!(split_text(" \n\t ", 500).is_empty());
    }

    #[test]
    fn prefers_sentence_boundaries() {
        let text = "The first sentence is here. The second one follows it closely.";
        let pieces = split_text(text, 40);
        assert_eq!(pieces, vec!["The first sentence is here.", "The second one follows it closely."]);
    }

    #[test]
    fn falls_back_to_whitespace() {
        let pieces = split_text("alpha beta gamma delta", 12);
        assert_eq!(pieces, vec!["alpha beta", "gamma delta"]);
        assert!(pieces.iter().all(|p| p.chars().count() <= 12));
    }

    #[test]
    fn hard_cuts_unbroken_text() {
        let pieces = split_text("abcdefghij", 4);
        assert_eq!(pieces, vec!["abcd", "efgh", "ij"]);
    }

    #[test]
    fn budget_counts_characters_not_bytes() {
        let pieces = split_text("ééééé ééééé", 5);
        assert_eq!(pieces, vec!["ééééé", "ééééé"]);
    }

    #[test]
    fn chunks_are_numbered_across_pages() {
        let doc = Document::new(
            "manual.pdf",
            vec![
                Page::new(1, "One two three four."),
                Page::new(2, ""),
                Page::new(3, "Five six."),
            ],
        );
        let chunks = SentenceChunker::new(12).chunk(&doc);
        let positions: Vec<(u32, usize)> =
            chunks.iter().map(|c| (c.page_number, c.chunk_index)).collect();
        assert_eq!(positions, vec![(1, 0), (1, 1), (3, 2)]);
        assert!(chunks.iter().all(|c| c.total_pages == 3 && c.document_id == "manual.pdf"));
    }
}
