//! Building an index: chunk embeddings → vector store.
//!
//! [`IndexBuilder`] embeds chunks in batches with bounded concurrency and
//! bounded retries. A chunk that still cannot be embedded is left out and
//! reported as a [`DroppedChunk`]; the build only fails when no chunk at all
//! could be embedded.

use std::sync::Arc;

use futures::{StreamExt, stream};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::config::RagConfig;
use crate::document::{Chunk, IndexedVector};
use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::inmemory::InMemoryVectorStore;
use crate::retry::{RetryConfig, with_retry};
use crate::vectorstore::VectorStore;

/// A chunk left out of the index, and why.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct DroppedChunk {
    /// Identifier of the dropped chunk.
    pub chunk_id: String,
    /// Document the chunk belongs to.
    pub document_name: String,
    /// Page the chunk belongs to.
    pub page_index: usize,
    /// Why the chunk was dropped.
    pub reason: String,
}

impl DroppedChunk {
    fn new(chunk: &Chunk, reason: impl Into<String>) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            document_name: chunk.document_name.clone(),
            page_index: chunk.page_index,
            reason: reason.into(),
        }
    }
}

/// A freshly built store and the chunks that could not be indexed.
#[derive(Debug)]
pub struct BuiltIndex {
    /// The populated store. It is not written to again.
    pub store: Arc<InMemoryVectorStore>,
    /// Chunks left out of the store, in chunk order.
    pub dropped: Vec<DroppedChunk>,
}

#[derive(Default)]
struct BatchOutcome {
    embedded: Vec<IndexedVector>,
    dropped: Vec<DroppedChunk>,
}

/// Embeds chunks and loads them into a new [`InMemoryVectorStore`].
#[derive(Clone)]
pub struct IndexBuilder {
    provider: Arc<dyn EmbeddingProvider>,
    batch_size: usize,
    concurrency: usize,
    retry: RetryConfig,
}

impl IndexBuilder {
    /// Create a builder using the batching, concurrency and retry settings of `config`.
    pub fn new(provider: Arc<dyn EmbeddingProvider>, config: &RagConfig) -> Self {
        Self {
            provider,
            batch_size: config.embed_batch_size.max(1),
            concurrency: config.embed_concurrency.max(1),
            retry: config.retry.clone(),
        }
    }

    /// Embed every chunk and store the results in chunk order.
    ///
    /// Every vector must have the provider's declared
    /// [`dimensions`](EmbeddingProvider::dimensions); vectors of another size
    /// are dropped, wherever they occur. An empty chunk list yields a valid
    /// empty store.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::EmbeddingError`] if there were chunks but none of
    /// them could be embedded, since an empty index would answer every
    /// question with the not-found reply. Also fails if the store rejects the
    /// vectors.
    pub async fn build(&self, chunks: Vec<Chunk>) -> Result<BuiltIndex> {
        let store = Arc::new(InMemoryVectorStore::new(self.provider.model_id()));
        let chunk_count = chunks.len();
        let expected = self.provider.dimensions();

        let batches: Vec<Vec<Chunk>> =
            chunks.chunks(self.batch_size).map(<[Chunk]>::to_vec).collect();
        let outcomes: Vec<BatchOutcome> = stream::iter(batches)
            .map(|batch| self.embed_batch(batch))
            .buffered(self.concurrency)
            .collect()
            .await;

        let mut vectors = Vec::with_capacity(chunk_count);
        let mut dropped = Vec::new();
        for outcome in outcomes {
            dropped.extend(outcome.dropped);
            for vector in outcome.embedded {
                let actual = vector.embedding.len();
                if actual == expected {
                    vectors.push(vector);
                } else {
                    let reason = RagError::DimensionMismatch { expected, actual }.to_string();
                    warn!(chunk.id = %vector.chunk.id, %reason, "dropping chunk");
                    dropped.push(DroppedChunk::new(&vector.chunk, reason));
                }
            }
        }

        if chunk_count > 0 && vectors.is_empty() {
            let first = dropped.first().map(|d| d.reason.as_str()).unwrap_or_default();
            return Err(RagError::EmbeddingError {
                provider: self.provider.model_id().to_string(),
                message: format!("none of the {chunk_count} chunks could be embedded: {first}"),
            });
        }

        store.insert(vectors).await?;
        info!(
            embedding.model = %self.provider.model_id(),
            chunk_count,
            indexed_count = store.len().await,
            dropped_count = dropped.len(),
            "built index"
        );
        Ok(BuiltIndex { store, dropped })
    }

    /// Embed one batch, falling back to one request per chunk if the batch fails.
    async fn embed_batch(&self, batch: Vec<Chunk>) -> BatchOutcome {
        let provider = &self.provider;
        let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
        let texts = &texts;

        let result = with_retry(&self.retry, "embed_batch", || async move {
            let embeddings = provider.embed_batch(texts).await?;
            if embeddings.len() != texts.len() {
                return Err(RagError::EmbeddingError {
                    provider: provider.model_id().to_string(),
                    message: format!(
                        "returned {} embeddings for {} inputs",
                        embeddings.len(),
                        texts.len()
                    ),
                });
            }
            Ok(embeddings)
        })
        .await;

        let mut outcome = BatchOutcome::default();
        match result {
            Ok(embeddings) => {
                outcome.embedded = batch
                    .into_iter()
                    .zip(embeddings)
                    .map(|(chunk, embedding)| IndexedVector { chunk, embedding })
                    .collect();
            }
            Err(e) if batch.len() == 1 => {
                warn!(
                    chunk.id = %batch[0].id,
                    error = %e,
                    "dropping chunk after failed embedding"
                );
                outcome.dropped.push(DroppedChunk::new(&batch[0], e.to_string()));
            }
            Err(e) => {
                warn!(
                    batch_size = batch.len(),
                    error = %e,
                    "batch embedding failed, embedding chunks one by one"
                );
                for chunk in batch {
                    let text = chunk.text.as_str();
                    let single = with_retry(&self.retry, "embed", || async move {
                        provider.embed(text).await
                    })
                    .await;
                    match single {
                        Ok(embedding) => outcome.embedded.push(IndexedVector { chunk, embedding }),
                        Err(e) => {
                            warn!(
                                chunk.id = %chunk.id,
                                error = %e,
                                "dropping chunk after failed embedding"
                            );
                            outcome.dropped.push(DroppedChunk::new(&chunk, e.to_string()));
                        }
                    }
                }
            }
        }
        outcome
    }
}
