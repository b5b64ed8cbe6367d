//! In-memory vector store using cosine similarity.
//!
//! This module provides [`InMemoryVectorStore`], a zero-dependency vector store
//! backed by a `Vec` protected by a `tokio::sync::RwLock`. Search is exact:
//! every stored vector is scored against the query.

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::document::{IndexedVector, SearchResult};
use crate::error::{RagError, Result};
use crate::vectorstore::VectorStore;

#[derive(Debug, Default)]
struct Entries {
    dimensions: Option<usize>,
    vectors: Vec<IndexedVector>,
}

/// An in-memory vector store using cosine similarity for search.
///
/// Vectors are kept in insertion order, which is also the tie-break order
/// for equal scores. Concurrent searches share a read lock.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::{InMemoryVectorStore, VectorStore};
///
/// let store = InMemoryVectorStore::new("nomic-embed-text:latest");
/// store.insert(vectors).await?;
/// ```
#[derive(Debug)]
pub struct InMemoryVectorStore {
    embedding_model: String,
    entries: RwLock<Entries>,
}

impl InMemoryVectorStore {
    /// Create a new empty store for vectors produced by `embedding_model`.
    pub fn new(embedding_model: impl Into<String>) -> Self {
        Self { embedding_model: embedding_model.into(), entries: RwLock::new(Entries::default()) }
    }

    /// Clone out every stored vector, in insertion order.
    pub async fn snapshot(&self) -> Vec<IndexedVector> {
        self.entries.read().await.vectors.clone()
    }
}

/// Compute cosine similarity between two vectors.
///
/// Returns 0.0 if either vector has zero magnitude.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[async_trait]
impl VectorStore for InMemoryVectorStore {
    async fn insert(&self, vectors: Vec<IndexedVector>) -> Result<()> {
        let mut entries = self.entries.write().await;
        let expected = entries.dimensions.or_else(|| vectors.first().map(|v| v.embedding.len()));
        if let Some(expected) = expected {
            if expected == 0 {
                return Err(RagError::VectorStoreError {
                    backend: "InMemory".to_string(),
                    message: "cannot store zero-dimensional embeddings".to_string(),
                });
            }
            if let Some(bad) = vectors.iter().find(|v| v.embedding.len() != expected) {
                return Err(RagError::DimensionMismatch { expected, actual: bad.embedding.len() });
            }
            entries.dimensions = Some(expected);
        }
        entries.vectors.extend(vectors);
        Ok(())
    }

    async fn search(&self, embedding: &[f32], top_k: usize) -> Result<Vec<SearchResult>> {
        let entries = self.entries.read().await;
        let Some(dimensions) = entries.dimensions else {
            return Ok(Vec::new());
        };
        if embedding.len() != dimensions {
            return Err(RagError::DimensionMismatch {
                expected: dimensions,
                actual: embedding.len(),
            });
        }

        let mut scored: Vec<SearchResult> = entries
            .vectors
            .iter()
            .map(|v| SearchResult {
                chunk: v.chunk.clone(),
                score: cosine_similarity(&v.embedding, embedding),
            })
            .collect();

        // `sort_by` is stable, so equal scores keep insertion order.
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(top_k);
        Ok(scored)
    }

    async fn len(&self) -> usize {
        self.entries.read().await.vectors.len()
    }

    async fn dimensions(&self) -> Option<usize> {
        self.entries.read().await.dimensions
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }
}
