//! # docqa-rag
//!
//! Retrieval-augmented question answering over a batch of uploaded documents.
//!
//! ## Overview
//!
//! Documents are extracted into page units, split into overlapping chunks,
//! embedded and stored in an in-memory vector index. Questions are answered
//! by retrieving the most similar chunks and asking a language model to
//! answer from them alone.
//!
//! - [`Ingestor`] / [`TextExtractor`] - raw bytes → [`SourceDocument`]s, skipping failures
//! - [`RecursiveChunker`] - page units → bounded, overlapping [`Chunk`]s
//! - [`EmbeddingProvider`] / [`GenerationProvider`] - model backends behind traits
//! - [`InMemoryVectorStore`] / [`IndexBuilder`] - exact cosine k-NN index
//! - [`Retriever`] - question → top-k [`SearchResult`]s
//! - [`PromptTemplate`] - typed `{context}` / `{question}` template
//! - [`RagPipeline`] / [`Session`] - index a document set, then answer questions
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use docqa_rag::{HashingEmbeddingProvider, RagConfig, RagPipeline, SourceDocument};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(HashingEmbeddingProvider::new(256)?))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! let session = pipeline
//!     .index(vec![SourceDocument::new("alice.pdf", vec!["Alice: 5 years Java".into()])])
//!     .await?;
//! let answer = session.answer("Find a Java developer").await?;
//! ```
//!
//! ## Features
//!
//! - `ollama` - [`ollama::OllamaEmbeddingProvider`] and [`ollama::OllamaGenerationProvider`]
//! - `openai` - [`openai::OpenAIEmbeddingProvider`] and [`openai::OpenAIGenerationProvider`]
//! - `pdf` - [`ingest::PdfTextExtractor`], used by [`DocumentExtractor`] for PDF uploads

pub mod chunking;
pub mod config;
pub mod document;
pub mod embedding;
pub mod error;
pub mod generation;
pub mod index;
pub mod ingest;
pub mod inmemory;
#[cfg(feature = "ollama")]
pub mod ollama;
#[cfg(feature = "openai")]
pub mod openai;
pub mod pipeline;
pub mod prompt;
pub mod retriever;
pub mod retry;
pub mod session;
pub mod vectorstore;

pub use chunking::{Chunker, RecursiveChunker};
pub use config::{RagConfig, RagConfigBuilder};
pub use document::{Answer, Chunk, DocumentUnit, IndexedVector, SearchResult, SourceDocument};
pub use embedding::{EmbeddingProvider, HashingEmbeddingProvider};
pub use error::{RagError, Result};
pub use generation::{ExtractiveGenerationProvider, GenerationProvider};
pub use index::{BuiltIndex, DroppedChunk, IndexBuilder};
#[cfg(feature = "pdf")]
pub use ingest::PdfTextExtractor;
pub use ingest::{
    DocumentExtractor, IngestReport, Ingestor, PlainTextExtractor, RawDocument, SkippedDocument,
    TextExtractor,
};
pub use inmemory::InMemoryVectorStore;
#[cfg(feature = "ollama")]
pub use ollama::{OllamaEmbeddingProvider, OllamaGenerationProvider};
#[cfg(feature = "openai")]
pub use openai::{OpenAIEmbeddingProvider, OpenAIGenerationProvider};
pub use pipeline::{RagPipeline, RagPipelineBuilder};
pub use prompt::{PromptInputs, PromptTemplate, Slot, assemble_context};
pub use retriever::Retriever;
pub use retry::RetryConfig;
pub use session::{BuildReport, Session};
pub use vectorstore::VectorStore;
