//! Ollama embedding and generation providers using the Ollama HTTP API.
//!
//! This module is only available when the `ollama` feature is enabled.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

use crate::embedding::EmbeddingProvider;
use crate::error::{RagError, Result};
use crate::generation::GenerationProvider;

/// The default Ollama server address.
pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";

/// The default dimensionality for `nomic-embed-text`.
const DEFAULT_EMBEDDING_DIMENSIONS: usize = 768;

fn request_error(provider: &str, e: reqwest::Error) -> String {
    error!(provider, error = %e, "request failed");
    format!("request failed: {e}")
}

/// Turn a non-success response into an error, preferring Ollama's `error` field.
///
/// `transient` builds the retryable error for the caller's role; refused
/// requests (unknown model, bad input) become [`RagError::ProviderRejected`].
async fn api_error(
    response: reqwest::Response,
    transient: impl FnOnce(String) -> RagError,
) -> RagError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = serde_json::from_str::<ErrorResponse>(&body).map(|e| e.error).unwrap_or(body);
    error!(provider = "Ollama", %status, "API error");
    RagError::from_http_status("Ollama", status.as_u16(), detail, transient)
}

fn embedding_error(message: String) -> RagError {
    RagError::EmbeddingError { provider: "Ollama".into(), message }
}

fn generation_error(message: String) -> RagError {
    RagError::GenerationError { provider: "Ollama".into(), message }
}

// ── Ollama API request/response types ──────────────────────────────

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: Vec<&'a str>,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

/// An [`EmbeddingProvider`] backed by a local Ollama server's `/api/embed` endpoint.
///
/// # Example
///
/// ```rust,ignore
/// use docqa_rag::ollama::OllamaEmbeddingProvider;
///
/// let provider = OllamaEmbeddingProvider::new("nomic-embed-text:latest");
/// let embedding = provider.embed("hello world").await?;
/// ```
pub struct OllamaEmbeddingProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
    dimensions: usize,
}

impl OllamaEmbeddingProvider {
    /// Create a provider for `model` on the default server.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
            dimensions: DEFAULT_EMBEDDING_DIMENSIONS,
        }
    }

    /// Use a different server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Declare the model's output dimensionality.
    pub fn with_dimensions(mut self, dimensions: usize) -> Self {
        self.dimensions = dimensions;
        self
    }
}

#[async_trait]
impl EmbeddingProvider for OllamaEmbeddingProvider {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        debug!(provider = "Ollama", text_len = text.len(), "embedding single text");

        let results = self.embed_batch(&[text]).await?;
        results
            .into_iter()
            .next()
            .ok_or_else(|| embedding_error("API returned empty response".into()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        debug!(
            provider = "Ollama",
            batch_size = texts.len(),
            model = %self.model,
            "embedding batch"
        );

        let request_body = EmbedRequest { model: &self.model, input: texts.to_vec() };
        let response = self
            .client
            .post(format!("{}/api/embed", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| embedding_error(request_error("Ollama", e)))?;

        if !response.status().is_success() {
            return Err(api_error(response, embedding_error).await);
        }

        let embed_response: EmbedResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse response");
            embedding_error(format!("failed to parse response: {e}"))
        })?;

        Ok(embed_response.embeddings)
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}

/// A [`GenerationProvider`] backed by a local Ollama server's `/api/generate` endpoint.
///
/// Requests are sent with `stream: false`, so the whole completion arrives
/// in a single response.
pub struct OllamaGenerationProvider {
    client: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaGenerationProvider {
    /// Create a provider for `model` on the default server.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            model: model.into(),
        }
    }

    /// Use a different server address.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerationProvider {
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String> {
        debug!(
            provider = "Ollama",
            model = %self.model,
            prompt_len = prompt.len(),
            temperature,
            "generating"
        );

        let request_body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };
        let response = self
            .client
            .post(format!("{}/api/generate", self.base_url))
            .json(&request_body)
            .send()
            .await
            .map_err(|e| generation_error(request_error("Ollama", e)))?;

        if !response.status().is_success() {
            return Err(api_error(response, generation_error).await);
        }

        let generate_response: GenerateResponse = response.json().await.map_err(|e| {
            error!(provider = "Ollama", error = %e, "failed to parse response");
            generation_error(format!("failed to parse response: {e}"))
        })?;

        Ok(generate_response.response)
    }

    fn model_id(&self) -> &str {
        &self.model
    }
}
