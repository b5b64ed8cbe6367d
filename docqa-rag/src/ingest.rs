//! Document ingestion: raw bytes → page texts → page units.
//!
//! Extraction is delegated to a [`TextExtractor`]. A document that fails to
//! extract is recorded in [`IngestReport::skipped`] and the rest of the batch
//! is still ingested. The default [`DocumentExtractor`] reads PDFs (with the
//! `pdf` feature) and UTF-8 text.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::document::{DocumentUnit, SourceDocument};
use crate::error::{RagError, Result};

/// Page separator understood by [`PlainTextExtractor`].
pub const FORM_FEED: char = '\x0c';

/// Turns the bytes of one uploaded document into ordered page texts.
pub trait TextExtractor: Send + Sync {
    /// Extract page texts from `bytes`.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionError`] if the document cannot be read.
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Vec<String>>;
}

/// Extracts UTF-8 text, treating form feeds as page breaks.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Vec<String>> {
        if bytes.starts_with(b"%PDF-") {
            return Err(RagError::ExtractionError {
                document: name.to_string(),
                message: "PDF documents need a PDF text extractor".to_string(),
            });
        }
        let text = std::str::from_utf8(bytes).map_err(|e| RagError::ExtractionError {
            document: name.to_string(),
            message: format!("not valid UTF-8 text: {e}"),
        })?;
        Ok(text.split(FORM_FEED).map(str::to_string).collect())
    }
}

/// Extracts one text per PDF page with `pdf-extract`.
///
/// This type is only available when the `pdf` feature is enabled. Scanned
/// PDFs without a text layer come back as blank pages and are skipped by the
/// [`Ingestor`].
#[cfg(feature = "pdf")]
#[derive(Debug, Clone, Copy, Default)]
pub struct PdfTextExtractor;

#[cfg(feature = "pdf")]
impl TextExtractor for PdfTextExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Vec<String>> {
        let failed = |message: String| RagError::ExtractionError {
            document: name.to_string(),
            message,
        };
        // pdf-extract panics on some malformed files; keep that to one document.
        let pages = std::panic::catch_unwind(|| pdf_extract::extract_text_from_mem_by_pages(bytes))
            .map_err(|_| failed("PDF parser panicked".to_string()))?
            .map_err(|e| failed(format!("failed to extract PDF text: {e}")))?;
        debug!(document.name = name, page_count = pages.len(), "extracted PDF");
        Ok(pages)
    }
}

/// Picks an extractor by content: PDFs go to the PDF extractor, everything
/// else is read as plain text.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentExtractor;

impl TextExtractor for DocumentExtractor {
    fn extract(&self, name: &str, bytes: &[u8]) -> Result<Vec<String>> {
        if !bytes.starts_with(b"%PDF-") {
            return PlainTextExtractor.extract(name, bytes);
        }
        #[cfg(feature = "pdf")]
        {
            PdfTextExtractor.extract(name, bytes)
        }
        #[cfg(not(feature = "pdf"))]
        {
            Err(RagError::ExtractionError {
                document: name.to_string(),
                message: "PDF support not enabled; build with the `pdf` feature".to_string(),
            })
        }
    }
}

/// An uploaded document before extraction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawDocument {
    /// The document's identity, usually its file name.
    pub name: String,
    /// The raw document bytes.
    pub bytes: Vec<u8>,
}

impl RawDocument {
    /// Create a raw document from a name and its bytes.
    pub fn new(name: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self { name: name.into(), bytes: bytes.into() }
    }

    /// Read a document from disk, naming it after the file name.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ExtractionError`] if the file cannot be read.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let name = Self::name_for(path);
        let bytes = std::fs::read(path).map_err(|e| RagError::ExtractionError {
            document: name.clone(),
            message: format!("failed to read '{}': {e}", path.display()),
        })?;
        Ok(Self { name, bytes })
    }

    /// The name a document read from `path` is known by: its file name.
    pub fn name_for(path: &Path) -> String {
        path.file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string())
    }
}

/// A document left out of the index, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SkippedDocument {
    /// Name of the skipped document.
    pub name: String,
    /// Why it was skipped.
    pub reason: String,
}

/// The outcome of ingesting a batch of raw documents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct IngestReport {
    /// Successfully extracted documents, in input order.
    pub documents: Vec<SourceDocument>,
    /// Documents that could not be extracted or held no text.
    pub skipped: Vec<SkippedDocument>,
}

/// Extracts a batch of raw documents, tolerating per-document failures.
#[derive(Clone)]
pub struct Ingestor {
    extractor: Arc<dyn TextExtractor>,
}

impl Default for Ingestor {
    fn default() -> Self {
        Self::new(Arc::new(DocumentExtractor))
    }
}

impl Ingestor {
    /// Create an ingestor backed by `extractor`.
    pub fn new(extractor: Arc<dyn TextExtractor>) -> Self {
        Self { extractor }
    }

    /// Extract every document, skipping and recording the ones that fail.
    pub fn ingest(&self, raw: Vec<RawDocument>) -> IngestReport {
        let mut report = IngestReport::default();
        for document in raw {
            match self.extractor.extract(&document.name, &document.bytes) {
                Ok(pages) => {
                    let source = SourceDocument::new(document.name, pages);
                    if source.is_blank() {
                        warn!(document.name = %source.name, "skipping document without text");
                        report.skipped.push(SkippedDocument {
                            name: source.name,
                            reason: "no extractable text".to_string(),
                        });
                    } else {
                        report.documents.push(source);
                    }
                }
                Err(e) => {
                    warn!(document.name = %document.name, error = %e, "skipping document");
                    report
                        .skipped
                        .push(SkippedDocument { name: document.name, reason: e.to_string() });
                }
            }
        }
        info!(
            document_count = report.documents.len(),
            skipped_count = report.skipped.len(),
            "ingested documents"
        );
        report
    }
}

/// Flatten documents into page units, in document then page order.
pub fn ingest_documents(documents: &[SourceDocument]) -> Vec<DocumentUnit> {
    documents.iter().flat_map(SourceDocument::units).collect()
}
