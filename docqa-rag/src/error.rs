//! Error types for the `docqa-rag` crate.

use thiserror::Error;

/// Errors that can occur while indexing documents or answering questions.
#[derive(Debug, Error)]
pub enum RagError {
    /// A configuration validation error. Raised before any I/O happens.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Text extraction failed for a single source document.
    #[error("Extraction error ({document}): {message}")]
    ExtractionError {
        /// The name of the document that could not be extracted.
        document: String,
        /// A description of the failure.
        message: String,
    },

    /// An error occurred during embedding generation.
    #[error("Embedding error ({provider}): {message}")]
    EmbeddingError {
        /// The embedding provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A vector does not have the dimensionality of the index it is used with.
    #[error("Embedding dimension mismatch: index has {expected} dimensions, got {actual}")]
    DimensionMismatch {
        /// The dimensionality fixed by the index.
        expected: usize,
        /// The dimensionality of the offending vector.
        actual: usize,
    },

    /// The query-time embedding model differs from the one the index was built with.
    #[error("Embedding model mismatch: index built with '{index}', provider is '{provider}'")]
    EmbeddingModelMismatch {
        /// Model identifier recorded by the index.
        index: String,
        /// Model identifier of the provider used at query time.
        provider: String,
    },

    /// An error occurred during answer generation.
    #[error("Generation error ({provider}): {message}")]
    GenerationError {
        /// The generation provider that produced the error.
        provider: String,
        /// A description of the failure.
        message: String,
    },

    /// A provider refused the request itself (bad key, unknown model, malformed
    /// input). Sending it again cannot succeed.
    #[error("Provider rejected request ({provider}, HTTP {status}): {message}")]
    ProviderRejected {
        /// The provider that refused the request.
        provider: String,
        /// The HTTP status it answered with.
        status: u16,
        /// A description of the failure.
        message: String,
    },

    /// A prompt template is malformed or could not be filled.
    #[error("Prompt error: {0}")]
    PromptError(String),

    /// An error occurred in the vector store backend.
    #[error("Vector store error ({backend}): {message}")]
    VectorStoreError {
        /// The vector store backend that produced the error.
        backend: String,
        /// A description of the failure.
        message: String,
    },

    /// An error in the RAG pipeline orchestration.
    #[error("Pipeline error: {0}")]
    PipelineError(String),
}

impl RagError {
    /// Whether retrying the failed operation could plausibly succeed.
    ///
    /// Provider failures are treated as transient; [`RagError::ProviderRejected`]
    /// and everything else is a caller or data error that a retry cannot fix.
    pub fn is_transient(&self) -> bool {
        matches!(self, RagError::EmbeddingError { .. } | RagError::GenerationError { .. })
    }

    /// Classify a provider call that failed with HTTP `status`.
    ///
    /// Client errors other than 408 (request timeout) and 429 (rate limited)
    /// become [`RagError::ProviderRejected`]. Anything else is handed to
    /// `transient`, which builds the provider's retryable error.
    pub fn from_http_status(
        provider: &str,
        status: u16,
        message: String,
        transient: impl FnOnce(String) -> RagError,
    ) -> RagError {
        let refused = (400..500).contains(&status) && status != 408 && status != 429;
        if refused {
            RagError::ProviderRejected { provider: provider.to_string(), status, message }
        } else {
            transient(message)
        }
    }
}

/// A convenience result type for RAG operations.
pub type Result<T> = std::result::Result<T, RagError>;
