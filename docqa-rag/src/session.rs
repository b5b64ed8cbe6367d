//! An indexed document set ready to answer questions.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{Instrument, error, info, info_span};

use crate::config::RagConfig;
use crate::document::{Answer, IndexedVector, SearchResult};
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;
use crate::index::DroppedChunk;
use crate::ingest::SkippedDocument;
use crate::inmemory::InMemoryVectorStore;
use crate::prompt::{PromptInputs, PromptTemplate, assemble_context};
use crate::retriever::Retriever;
use crate::retry::with_retry;

/// Diagnostics from building a session's index.
///
/// A build with skipped documents or dropped chunks still succeeds; this
/// report is how the caller learns the index is incomplete.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct BuildReport {
    /// Number of documents handed to the chunker.
    pub documents_indexed: usize,
    /// Number of chunks stored in the index.
    pub chunks_indexed: usize,
    /// Documents that never reached the index.
    pub skipped: Vec<SkippedDocument>,
    /// Chunks that could not be embedded.
    pub dropped: Vec<DroppedChunk>,
}

impl BuildReport {
    /// Whether every document and chunk made it into the index.
    pub fn is_complete(&self) -> bool {
        self.skipped.is_empty() && self.dropped.is_empty()
    }
}

/// One upload-and-query session: an index, its configuration and providers.
///
/// The index is read-only once the session exists, so a session can be
/// shared (`Arc<Session>`) and queried concurrently. Sessions never share
/// an index with each other.
pub struct Session {
    config: RagConfig,
    store: Arc<InMemoryVectorStore>,
    retriever: Retriever,
    generator: Arc<dyn GenerationProvider>,
    template: PromptTemplate,
    pub(crate) report: BuildReport,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.config)
            .field("retriever", &self.retriever)
            .field("generation_model", &self.generator.model_id())
            .field("report", &self.report)
            .finish()
    }
}

impl Session {
    pub(crate) fn new(
        config: RagConfig,
        store: Arc<InMemoryVectorStore>,
        retriever: Retriever,
        generator: Arc<dyn GenerationProvider>,
        template: PromptTemplate,
        report: BuildReport,
    ) -> Self {
        Self { config, store, retriever, generator, template, report }
    }

    /// Diagnostics from building this session's index.
    pub fn report(&self) -> &BuildReport {
        &self.report
    }

    /// The configuration the session was built with.
    pub fn config(&self) -> &RagConfig {
        &self.config
    }

    /// Every indexed vector, in insertion order.
    pub async fn indexed_vectors(&self) -> Vec<IndexedVector> {
        self.store.snapshot().await
    }

    /// Retrieve the top-k chunks for `query` without generating an answer.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retriever.retrieve(query).instrument(info_span!("rag.retrieve")).await
    }

    /// Answer `query` from the indexed documents.
    ///
    /// Retrieves the top-k chunks, joins them into a context block, fills the
    /// prompt template and asks the generation provider for a completion at
    /// the configured temperature. When nothing is retrieved and
    /// `short_circuit_empty_context` is set, the not-found sentinel is
    /// returned without calling the provider.
    ///
    /// The template asks the model to answer only from the context. Nothing
    /// here verifies that the completion actually does so.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::PipelineError`] for a blank question, and the
    /// retrieval or generation error if either step fails after retries.
    pub async fn answer(&self, query: &str) -> Result<Answer> {
        let span = info_span!("rag.answer", query_len = query.len());
        self.answer_inner(query).instrument(span).await
    }

    async fn answer_inner(&self, query: &str) -> Result<Answer> {
        if query.trim().is_empty() {
            return Err(RagError::PipelineError("question must not be empty".to_string()));
        }

        let sources = self.retrieve(query).await?;
        if sources.is_empty() && self.config.short_circuit_empty_context {
            info!("no context retrieved, answering with the not-found sentinel");
            return Ok(Answer {
                text: self.config.not_found_sentinel.clone(),
                sources,
                generated: false,
            });
        }

        let context = assemble_context(&sources);
        let prompt = self.template.fill(&PromptInputs { context: &context, question: query });

        let generator = &self.generator;
        let prompt = prompt.as_str();
        let temperature = self.config.temperature;
        let text = with_retry(&self.config.retry, "generate", || async move {
            generator.generate(prompt, temperature).await
        })
        .await
        .map_err(|e| {
            error!(generation.model = %generator.model_id(), error = %e, "generation failed");
            e
        })?;

        info!(
            source_count = sources.len(),
            answer_len = text.len(),
            not_found = text.trim() == self.config.not_found_sentinel,
            "answered question"
        );
        Ok(Answer { text, sources, generated: true })
    }
}
