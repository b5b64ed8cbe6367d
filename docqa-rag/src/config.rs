//! Configuration for the RAG pipeline.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{RagError, Result};
use crate::retry::RetryConfig;

/// Default reply the model is instructed to give when the context has no answer.
pub const DEFAULT_NOT_FOUND_SENTINEL: &str = "Candidate not found in uploaded resumes.";

/// Default embedding model identifier.
pub const DEFAULT_EMBEDDING_MODEL: &str = "nomic-embed-text:latest";

/// Default generation model identifier.
pub const DEFAULT_GENERATION_MODEL: &str = "llama3.2:latest";

/// Configuration parameters for indexing and answering.
///
/// Deserialization fills missing fields from [`RagConfig::default`], so a
/// partial JSON document is a valid configuration source.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RagConfig {
    /// Maximum chunk length in characters.
    pub chunk_size: usize,
    /// Number of characters repeated between consecutive chunks of a page.
    pub chunk_overlap: usize,
    /// Number of chunks retrieved per question.
    pub top_k: usize,
    /// Sampling temperature passed to the generation provider.
    pub temperature: f32,
    /// Exact reply the prompt asks for when the context does not answer the question.
    pub not_found_sentinel: String,
    /// Identifier of the embedding model; an index is tied to one model.
    pub embedding_model: String,
    /// Identifier of the generation model.
    pub generation_model: String,
    /// Vector size of the embedding model, when it differs from the provider's default.
    /// Vectors of any other size are left out of the index.
    pub embedding_dimensions: Option<usize>,
    /// Drop retrieved chunks scoring below this cosine similarity.
    pub similarity_threshold: Option<f32>,
    /// Number of chunk texts sent per embedding request.
    pub embed_batch_size: usize,
    /// Maximum number of embedding requests in flight during indexing.
    pub embed_concurrency: usize,
    /// Return the sentinel without calling the model when retrieval finds nothing.
    pub short_circuit_empty_context: bool,
    /// Backoff policy for provider calls.
    pub retry: RetryConfig,
}

impl Default for RagConfig {
    fn default() -> Self {
        Self {
            chunk_size: 1000,
            chunk_overlap: 150,
            top_k: 5,
            temperature: 0.0,
            not_found_sentinel: DEFAULT_NOT_FOUND_SENTINEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            generation_model: DEFAULT_GENERATION_MODEL.to_string(),
            embedding_dimensions: None,
            similarity_threshold: None,
            embed_batch_size: 16,
            embed_concurrency: 4,
            short_circuit_empty_context: true,
            retry: RetryConfig::default(),
        }
    }
}

impl RagConfig {
    /// Create a new builder for constructing a [`RagConfig`].
    pub fn builder() -> RagConfigBuilder {
        RagConfigBuilder::default()
    }

    /// Parse a configuration from JSON and validate it.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if the JSON is malformed or the
    /// resulting configuration is invalid.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: RagConfig = serde_json::from_str(json)
            .map_err(|e| RagError::ConfigError(format!("invalid configuration JSON: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and validate a JSON configuration file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| {
            RagError::ConfigError(format!("failed to read config '{}': {e}", path.display()))
        })?;
        Self::from_json_str(&json)
    }

    /// Check that all parameters are consistent.
    ///
    /// # Errors
    ///
    /// Returns [`RagError::ConfigError`] if:
    /// - `chunk_size == 0` or `chunk_overlap >= chunk_size`
    /// - `top_k == 0`
    /// - `temperature` is not within `0.0..=2.0`
    /// - the sentinel or a model identifier is empty
    /// - `embedding_dimensions` is `Some(0)`
    /// - `embed_batch_size`, `embed_concurrency` or `retry.max_attempts` is zero
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(RagError::ConfigError("chunk_size must be greater than zero".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(RagError::ConfigError(format!(
                "chunk_overlap ({}) must be less than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        if self.top_k == 0 {
            return Err(RagError::ConfigError("top_k must be greater than zero".to_string()));
        }
        if !self.temperature.is_finite() || !(0.0..=2.0).contains(&self.temperature) {
            return Err(RagError::ConfigError(format!(
                "temperature ({}) must be within 0.0..=2.0",
                self.temperature
            )));
        }
        if self.not_found_sentinel.trim().is_empty() {
            return Err(RagError::ConfigError("not_found_sentinel must not be empty".to_string()));
        }
        if self.embedding_model.trim().is_empty() || self.generation_model.trim().is_empty() {
            return Err(RagError::ConfigError("model identifiers must not be empty".to_string()));
        }
        if self.embedding_dimensions == Some(0) {
            return Err(RagError::ConfigError(
                "embedding_dimensions must be greater than zero".to_string(),
            ));
        }
        if self.similarity_threshold.is_some_and(|t| !t.is_finite()) {
            return Err(RagError::ConfigError("similarity_threshold must be finite".to_string()));
        }
        if self.embed_batch_size == 0 || self.embed_concurrency == 0 {
            return Err(RagError::ConfigError(
                "embed_batch_size and embed_concurrency must be greater than zero".to_string(),
            ));
        }
        if self.retry.max_attempts == 0 {
            return Err(RagError::ConfigError(
                "retry.max_attempts must be at least one".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for constructing a validated [`RagConfig`].
#[derive(Debug, Clone, Default)]
pub struct RagConfigBuilder {
    config: RagConfig,
}

impl RagConfigBuilder {
    /// Start from an existing configuration instead of the defaults.
    pub fn from_config(config: RagConfig) -> Self {
        Self { config }
    }

    /// Set the maximum chunk size in characters.
    pub fn chunk_size(mut self, size: usize) -> Self {
        self.config.chunk_size = size;
        self
    }

    /// Set the overlap between consecutive chunks in characters.
    pub fn chunk_overlap(mut self, overlap: usize) -> Self {
        self.config.chunk_overlap = overlap;
        self
    }

    /// Set the number of chunks retrieved per question.
    pub fn top_k(mut self, k: usize) -> Self {
        self.config.top_k = k;
        self
    }

    /// Set the generation temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.config.temperature = temperature;
        self
    }

    /// Set the not-found sentinel.
    pub fn not_found_sentinel(mut self, sentinel: impl Into<String>) -> Self {
        self.config.not_found_sentinel = sentinel.into();
        self
    }

    /// Set the embedding model identifier.
    pub fn embedding_model(mut self, model: impl Into<String>) -> Self {
        self.config.embedding_model = model.into();
        self
    }

    /// Set the generation model identifier.
    pub fn generation_model(mut self, model: impl Into<String>) -> Self {
        self.config.generation_model = model.into();
        self
    }

    /// Declare the embedding model's vector size.
    pub fn embedding_dimensions(mut self, dimensions: usize) -> Self {
        self.config.embedding_dimensions = Some(dimensions);
        self
    }

    /// Set the minimum similarity for a retrieved chunk to be used as context.
    pub fn similarity_threshold(mut self, threshold: f32) -> Self {
        self.config.similarity_threshold = Some(threshold);
        self
    }

    /// Set how many chunk texts go into one embedding request.
    pub fn embed_batch_size(mut self, size: usize) -> Self {
        self.config.embed_batch_size = size;
        self
    }

    /// Set how many embedding requests may run at once during indexing.
    pub fn embed_concurrency(mut self, concurrency: usize) -> Self {
        self.config.embed_concurrency = concurrency;
        self
    }

    /// Enable or disable answering with the sentinel when nothing is retrieved.
    pub fn short_circuit_empty_context(mut self, enabled: bool) -> Self {
        self.config.short_circuit_empty_context = enabled;
        self
    }

    /// Set the retry policy for provider calls.
    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    /// Build the [`RagConfig`], validating that parameters are consistent.
    ///
    /// # Errors
    ///
    /// See [`RagConfig::validate`].
    pub fn build(self) -> Result<RagConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
