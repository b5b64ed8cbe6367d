use std::sync::Arc;

use docqa_rag::{
    EmbeddingProvider, ExtractiveGenerationProvider, GenerationProvider,
    HashingEmbeddingProvider, OllamaEmbeddingProvider, OllamaGenerationProvider,
    OpenAIEmbeddingProvider, OpenAIGenerationProvider, RagConfig,
};

use crate::args::Backend;

/// Vector size of the offline hashing embedding.
pub const OFFLINE_DIMENSIONS: usize = 1024;

/// The embedding and generation providers for one run.
pub struct Providers {
    pub embedding: Arc<dyn EmbeddingProvider>,
    pub generation: Arc<dyn GenerationProvider>,
}

/// Create the providers for `backend`, using the model names in `config`.
pub fn build_providers(
    backend: Backend,
    config: &RagConfig,
    base_url: Option<&str>,
) -> anyhow::Result<Providers> {
    let providers = match backend {
        Backend::Ollama => {
            let mut embedding = OllamaEmbeddingProvider::new(&config.embedding_model);
            if let Some(dimensions) = config.embedding_dimensions {
                embedding = embedding.with_dimensions(dimensions);
            }
            let mut generation = OllamaGenerationProvider::new(&config.generation_model);
            if let Some(url) = base_url {
                embedding = embedding.with_base_url(url);
                generation = generation.with_base_url(url);
            }
            Providers { embedding: Arc::new(embedding), generation: Arc::new(generation) }
        }
        Backend::Openai => {
            let mut embedding =
                OpenAIEmbeddingProvider::from_env()?.with_model(&config.embedding_model);
            if let Some(dimensions) = config.embedding_dimensions {
                embedding = embedding.with_dimensions(dimensions);
            }
            let mut generation =
                OpenAIGenerationProvider::from_env()?.with_model(&config.generation_model);
            if let Some(url) = base_url {
                embedding = embedding.with_base_url(url);
                generation = generation.with_base_url(url);
            }
            Providers { embedding: Arc::new(embedding), generation: Arc::new(generation) }
        }
        Backend::Offline => Providers {
            embedding: Arc::new(HashingEmbeddingProvider::new(OFFLINE_DIMENSIONS)?),
            generation: Arc::new(ExtractiveGenerationProvider::new(&config.not_found_sentinel)),
        },
    };
    Ok(providers)
}
