//! Data types for source documents, page units, chunks, and search results.

use serde::{Deserialize, Serialize};

/// A document as returned by text extraction: a name and its page texts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SourceDocument {
    /// The document's identity, usually the uploaded file name.
    pub name: String,
    /// Page texts in document order.
    pub pages: Vec<String>,
}

impl SourceDocument {
    /// Create a document from a name and its ordered page texts.
    pub fn new(name: impl Into<String>, pages: Vec<String>) -> Self {
        Self { name: name.into(), pages }
    }

    /// Split the document into page-level [`DocumentUnit`]s, in page order.
    pub fn units(&self) -> Vec<DocumentUnit> {
        self.pages
            .iter()
            .enumerate()
            .map(|(page_index, text)| DocumentUnit {
                document_name: self.name.clone(),
                page_index,
                text: text.clone(),
            })
            .collect()
    }

    /// Whether every page is empty or whitespace.
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.trim().is_empty())
    }
}

/// A single page of a [`SourceDocument`]. Chunks never span two units.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DocumentUnit {
    /// Name of the originating [`SourceDocument`].
    pub document_name: String,
    /// Zero-based page index within the document.
    pub page_index: usize,
    /// The page text.
    pub text: String,
}

/// A bounded window of a [`DocumentUnit`]'s text; the unit of embedding and retrieval.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Chunk {
    /// Identifier of the form `{document_name}_{page_index}_{chunk_index}`.
    pub id: String,
    /// The chunk text, a contiguous span of the parent unit's text.
    pub text: String,
    /// Name of the originating document.
    pub document_name: String,
    /// Page the chunk was cut from.
    pub page_index: usize,
    /// Position of the chunk within its unit.
    pub chunk_index: usize,
    /// Char offset of the chunk's first character within the unit text.
    pub start: usize,
    /// Number of leading chars repeated from the previous chunk of the same unit.
    pub overlap: usize,
}

impl Chunk {
    /// The part of the text that is not shared with the previous chunk.
    pub fn fresh_text(&self) -> &str {
        match self.text.char_indices().nth(self.overlap) {
            Some((byte, _)) => &self.text[byte..],
            None if self.overlap == 0 => &self.text,
            None => "",
        }
    }
}

/// A [`Chunk`] together with its embedding, as held by a vector store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexedVector {
    /// The embedded chunk.
    pub chunk: Chunk,
    /// The chunk's embedding.
    pub embedding: Vec<f32>,
}

/// A retrieved [`Chunk`] paired with a relevance score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResult {
    /// The retrieved chunk.
    pub chunk: Chunk,
    /// The similarity score (higher is more relevant).
    pub score: f32,
}

/// A generated answer and the retrieval result it was grounded on.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Answer {
    /// The raw completion text, or the not-found sentinel.
    pub text: String,
    /// Chunks supplied as context, in the order they were placed in the prompt.
    pub sources: Vec<SearchResult>,
    /// `false` when the answer was produced without calling the generation provider.
    pub generated: bool,
}
