//! Vector store trait for storing and searching chunk embeddings.

use async_trait::async_trait;

use crate::document::{IndexedVector, SearchResult};
use crate::error::Result;

/// A storage backend for chunk embeddings with k-nearest-neighbor search.
///
/// A store holds vectors from a single embedding model, recorded by
/// [`embedding_model`](VectorStore::embedding_model), and of a single
/// dimensionality, fixed by the first insert.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new("nomic-embed-text:latest");
/// store.insert(vectors).await?;
/// let results = store.search(&query_embedding, 5).await?;
/// ```
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// Append vectors to the store, after any already present.
    async fn insert(&self, vectors: Vec<IndexedVector>) -> Result<()>;

    /// Search for the `top_k` most similar chunks to the given embedding.
    ///
    /// Returns results ordered by descending similarity score; ties keep
    /// insertion order. An empty store yields an empty result.
    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>>;

    /// Number of stored vectors.
    async fn len(&self) -> usize;

    /// Whether the store holds no vectors.
    async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Dimensionality of the stored vectors, or `None` while the store is empty.
    async fn dimensions(&self) -> Option<usize>;

    /// Identifier of the embedding model the stored vectors came from.
    fn embedding_model(&self) -> &str;
}
