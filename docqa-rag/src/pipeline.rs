//! RAG pipeline orchestrator.
//!
//! The [`RagPipeline`] holds the configuration and providers shared by every
//! session. Indexing a document set produces a [`Session`] that owns its own
//! vector store; the pipeline itself keeps no per-session state.
//!
//! # Example
//!
//! ```rust,ignore
//! use docqa_rag::{RagPipeline, RagConfig, SourceDocument};
//!
//! let pipeline = RagPipeline::builder()
//!     .config(RagConfig::default())
//!     .embedding_provider(Arc::new(my_embedder))
//!     .generation_provider(Arc::new(my_llm))
//!     .build()?;
//!
//! let session = pipeline.index(documents).await?;
//! let answer = session.answer("Find a Java developer").await?;
//! ```

use std::sync::Arc;

use tracing::{Instrument, info, info_span};

use crate::chunking::{Chunker, RecursiveChunker};
use crate::config::RagConfig;
use crate::document::SourceDocument;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::index::IndexBuilder;
use crate::ingest::{Ingestor, RawDocument, ingest_documents};
use crate::prompt::PromptTemplate;
use crate::retriever::Retriever;
use crate::session::{BuildReport, Session};
use crate::vectorstore::VectorStore;

/// The RAG pipeline orchestrator.
///
/// Coordinates indexing (units → chunk → embed → store) and hands out
/// [`Session`]s that answer questions (embed → search → prompt → generate).
/// Construct one via [`RagPipeline::builder()`].
pub struct RagPipeline {
    config: RagConfig,
    embedding_provider: Arc<dyn EmbeddingProvider>,
    generation_provider: Arc<dyn GenerationProvider>,
    chunker: Arc<dyn Chunker>,
    prompt: PromptTemplate,
}

impl std::fmt::Debug for RagPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RagPipeline")
            .field("config", &self.config)
            .field("embedding_model", &self.embedding_provider.model_id())
            .field("generation_model", &self.generation_provider.model_id())
            .field("prompt", &self.prompt)
            .finish()
    }
}

impl RagPipeline {
    /// Create a new [`RagPipelineBuilder`].
    pub fn builder() -> RagPipelineBuilder {
        RagPipelineBuilder::default()
    }

    /// Return a reference to the pipeline configuration.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Return a reference to the embedding provider.
    pub fn embedding_provider(&self) -> &Arc<dyn EmbeddingProvider> {
        &self.embedding_provider
    }

    /// Return a reference to the prompt template.
    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Build a fresh index over `documents` and return a session for it.
    ///
    /// Every page is chunked independently, chunks are embedded and stored in
    /// input order. Chunks that fail to embed are reported in
    /// [`BuildReport::dropped`] instead of failing the build. An empty document
    /// set yields a session with an empty index.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] when the documents produced chunks
    /// but not one of them could be embedded, or any error from assembling
    /// the index.
    pub async fn index(&self, documents: Vec<SourceDocument>) -> Result<Session> {
        let span = info_span!("rag.index", document_count = documents.len());
        self.index_inner(documents).instrument(span).await
    }

    async fn index_inner(&self, documents: Vec<SourceDocument>) -> Result<Session> {
        let units = ingest_documents(&documents);
        let chunks = self.chunker.split(&units);
        info!(unit_count = units.len(), chunk_count = chunks.len(), "chunked documents");

        let built = IndexBuilder::new(Arc::clone(&self.embedding_provider), &self.config)
            .build(chunks)
            .await?;

        let retriever = Retriever::new(
            built.store.clone(),
            Arc::clone(&self.embedding_provider),
            self.config.top_k,
        )?
        .with_similarity_threshold(self.config.similarity_threshold)
        .with_retry_policy(self.config.retry.clone());

        let report = BuildReport {
            documents_indexed: documents.len(),
            chunks_indexed: built.store.len().await,
            skipped: Vec::new(),
            dropped: built.dropped,
        };

        Ok(Session::new(
            self.config.clone(),
            built.store,
            retriever,
            Arc::clone(&self.generation_provider),
            self.prompt.clone(),
            report,
        ))
    }

    /// Extract `raw` documents with `ingestor`, then [`index`](Self::index) them.
    ///
    /// Documents that fail extraction are skipped and listed in the session's
    /// [`BuildReport::skipped`]; the remaining documents are still indexed.
    pub async fn index_raw(&self, raw: Vec<RawDocument>, ingestor: &Ingestor) -> Result<Session> {
        let ingested = ingestor.ingest(raw);
        let mut session = self.index(ingested.documents).await?;
        session.report.skipped = ingested.skipped;
        Ok(session)
    }
}

/// Builder for constructing a [`RagPipeline`].
///
/// `config`, `embedding_provider` and `generation_provider` are required.
/// The chunker defaults to a [`RecursiveChunker`] sized from the config and
/// the prompt to [`PromptTemplate::grounded`] with the config's sentinel.
///
/// # Example
///
/// ```rust,ignore
/// let pipeline = RagPipeline::builder()
///     .config(RagConfig::default())
///     .embedding_provider(Arc::new(embedder))
///     .generation_provider(Arc::new(llm))
///     .prompt_template(PromptTemplate::new("{context}\n\nQ: {question}")?)  // optional
///     .build()?;
/// ```
#[derive(Default)]
pub struct RagPipelineBuilder {
    config: Option<RagConfig>,
    embedding_provider: Option<Arc<dyn EmbeddingProvider>>,
    generation_provider: Option<Arc<dyn GenerationProvider>>,
    chunker: Option<Arc<dyn Chunker>>,
    prompt: Option<PromptTemplate>,
}

impl RagPipelineBuilder {
    /// Set the pipeline configuration.
    pub fn config(mut self, config: RagConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Set the embedding provider.
    pub fn embedding_provider(mut self, provider: Arc<dyn EmbeddingProvider>) -> Self {
        self.embedding_provider = Some(provider);
        self
    }

    /// Set the generation provider.
    pub fn generation_provider(mut self, provider: Arc<dyn GenerationProvider>) -> Self {
        self.generation_provider = Some(provider);
        self
    }

    /// Replace the default chunker.
    pub fn chunker(mut self, chunker: Arc<dyn Chunker>) -> Self {
        self.chunker = Some(chunker);
        self
    }

    /// Replace the default grounding prompt.
    pub fn prompt_template(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = Some(prompt);
        self
    }

    /// Build the [`RagPipeline`], validating the configuration and that all
    /// required fields are set.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the configuration is invalid or
    /// any required field is missing.
    pub fn build(self) -> Result<RagPipeline> {
        let config =
            self.config.ok_or_else(|| RagError::ConfigError("config is required".to_string()))?;
        config.validate()?;
        let embedding_provider = self
            .embedding_provider
            .ok_or_else(|| RagError::ConfigError("embedding_provider is required".to_string()))?;
        let generation_provider = self
            .generation_provider
            .ok_or_else(|| RagError::ConfigError("generation_provider is required".to_string()))?;

        let chunker: Arc<dyn Chunker> = match self.chunker {
            Some(chunker) => chunker,
            None => Arc::new(RecursiveChunker::new(config.chunk_size, config.chunk_overlap)?),
        };
        let prompt =
            self.prompt.unwrap_or_else(|| PromptTemplate::grounded(&config.not_found_sentinel));

        Ok(RagPipeline { config, embedding_provider, generation_provider, chunker, prompt })
    }
}
