//! Query-time top-k retrieval over a built vector store.

use std::sync::Arc;

use tracing::{debug, error, info};

use crate::document::SearchResult;
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::retry::{RetryConfig, with_retry};
use crate::vectorstore::VectorStore;

/// Embeds a question with the index's embedding model and searches the store.
///
/// A retriever refuses to pair a store with a provider for a different model,
/// since vectors from two models cannot be compared meaningfully.
#[derive(Clone)]
pub struct Retriever {
    store: Arc<dyn VectorStore>,
    provider: Arc<dyn EmbeddingProvider>,
    top_k: usize,
    similarity_threshold: Option<f32>,
    retry: RetryConfig,
}

impl std::fmt::Debug for Retriever {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Retriever")
            .field("embedding_model", &self.store.embedding_model())
            .field("top_k", &self.top_k)
            .field("similarity_threshold", &self.similarity_threshold)
            .finish()
    }
}

impl Retriever {
    /// Create a retriever returning at most `top_k` results per query.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingModelMismatch`] if `provider` is not the
    /// model the store was built with, and [`RagError::ConfigError`] if
    /// `top_k` is zero.
    pub fn new(
        store: Arc<dyn VectorStore>,
        provider: Arc<dyn EmbeddingProvider>,
        top_k: usize,
    ) -> Result<Self> {
        if store.embedding_model() != provider.model_id() {
            return Err(RagError::EmbeddingModelMismatch {
                index: store.embedding_model().to_string(),
                provider: provider.model_id().to_string(),
            });
        }
        if top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        Ok(Self { store, provider, top_k, similarity_threshold: None, retry: RetryConfig::none() })
    }

    /// Drop results scoring below `threshold`.
    pub fn with_similarity_threshold(mut self, threshold: Option<f32>) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    /// Retry query embedding according to `retry`.
    pub fn with_retry_policy(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// The configured number of results per query.
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Retrieve the configured top-k chunks for `query`.
    pub async fn retrieve(&self, query: &str) -> Result<Vec<SearchResult>> {
        self.retrieve_k(query, self.top_k).await
    }

    /// Retrieve at most `k` chunks for `query`, ordered by descending similarity.
    ///
    /// An empty store yields an empty result without embedding the query.
    ///
    /// # Errors
    ///
    /// Returns the embedding error if the query cannot be embedded, and
    /// [`RagError::DimensionMismatch`] if the query vector does not fit the index.
    pub async fn retrieve_k(&self, query: &str, k: usize) -> Result<Vec<SearchResult>> {
        if self.store.is_empty().await {
            debug!("index is empty, nothing to retrieve");
            return Ok(Vec::new());
        }

        let provider = &self.provider;
        let query_embedding = with_retry(&self.retry, "embed_query", || async move {
            provider.embed(query).await
        })
        .await
        .map_err(|e| {
            error!(error = %e, "embedding failed during query");
            e
        })?;

        let results = self.store.search(&query_embedding, k).await.map_err(|e| {
            error!(error = %e, "vector store search failed");
            e
        })?;

        let results: Vec<SearchResult> = match self.similarity_threshold {
            Some(threshold) => results.into_iter().filter(|r| r.score >= threshold).collect(),
            None => results,
        };

        info!(result_count = results.len(), k, "retrieval completed");
        Ok(results)
    }
}
