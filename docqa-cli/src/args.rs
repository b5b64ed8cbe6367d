use std::path::PathBuf;

use clap::{Parser, ValueEnum};
use docqa_rag::{RagConfig, RagConfigBuilder};

/// Ask questions about a batch of documents.
///
/// Every run builds a fresh in-memory index from the given files; nothing is
/// persisted between runs.
#[derive(Parser, Debug, Clone)]
#[command(name = "docqa", version, about, long_about = None)]
pub struct Cli {
    /// Files or directories to index. Directories are read one level deep.
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Ask a single question and exit instead of starting a prompt.
    #[arg(short, long)]
    pub question: Option<String>,

    /// Model backend.
    #[arg(short, long, value_enum, default_value_t = Backend::Ollama, env = "DOCQA_BACKEND")]
    pub backend: Backend,

    /// JSON configuration file. Flags override its values.
    #[arg(short, long, env = "DOCQA_CONFIG")]
    pub config: Option<PathBuf>,

    /// Maximum chunk length in characters.
    #[arg(long, env = "DOCQA_CHUNK_SIZE")]
    pub chunk_size: Option<usize>,

    /// Characters shared by consecutive chunks.
    #[arg(long, env = "DOCQA_CHUNK_OVERLAP")]
    pub chunk_overlap: Option<usize>,

    /// Number of chunks retrieved per question.
    #[arg(short = 'k', long, env = "DOCQA_TOP_K")]
    pub top_k: Option<usize>,

    /// Sampling temperature passed to the generation model.
    #[arg(long, env = "DOCQA_TEMPERATURE")]
    pub temperature: Option<f32>,

    /// Minimum cosine similarity for a chunk to be used as context.
    #[arg(long, env = "DOCQA_SIMILARITY_THRESHOLD")]
    pub similarity_threshold: Option<f32>,

    /// Reply used when the documents do not contain the answer.
    #[arg(long, env = "DOCQA_NOT_FOUND")]
    pub not_found: Option<String>,

    /// Embedding model name.
    #[arg(long, env = "DOCQA_EMBEDDING_MODEL")]
    pub embedding_model: Option<String>,

    /// Vector size of the embedding model, if not the backend's default.
    #[arg(long, env = "DOCQA_EMBEDDING_DIMENSIONS")]
    pub embedding_dimensions: Option<usize>,

    /// Generation model name.
    #[arg(long, env = "DOCQA_GENERATION_MODEL")]
    pub generation_model: Option<String>,

    /// Base URL of the model server.
    #[arg(long, env = "DOCQA_BASE_URL")]
    pub base_url: Option<String>,

    /// Print the retrieved chunks under each answer.
    #[arg(long)]
    pub show_sources: bool,

    /// Print answers as JSON.
    #[arg(long)]
    pub json: bool,

    /// Log as newline-delimited JSON.
    #[arg(long, env = "DOCQA_JSON_LOGS")]
    pub json_logs: bool,
}

/// Where embeddings and completions come from.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// A local Ollama server.
    Ollama,
    /// The OpenAI API, or a compatible server via `--base-url`. Needs `OPENAI_API_KEY`.
    Openai,
    /// Hashing embeddings and extractive answers. No model server needed.
    Offline,
}

impl Cli {
    /// Resolve the pipeline configuration: defaults, then the config file, then flags.
    pub fn rag_config(&self) -> anyhow::Result<RagConfig> {
        let base = match &self.config {
            Some(path) => RagConfig::from_json_file(path)?,
            None => RagConfig::default(),
        };

        let mut builder = RagConfigBuilder::from_config(base);
        if let Some(size) = self.chunk_size {
            builder = builder.chunk_size(size);
        }
        if let Some(overlap) = self.chunk_overlap {
            builder = builder.chunk_overlap(overlap);
        }
        if let Some(k) = self.top_k {
            builder = builder.top_k(k);
        }
        if let Some(temperature) = self.temperature {
            builder = builder.temperature(temperature);
        }
        if let Some(threshold) = self.similarity_threshold {
            builder = builder.similarity_threshold(threshold);
        }
        if let Some(sentinel) = &self.not_found {
            builder = builder.not_found_sentinel(sentinel.clone());
        }
        if let Some(model) = &self.embedding_model {
            builder = builder.embedding_model(model.clone());
        }
        if let Some(dimensions) = self.embedding_dimensions {
            builder = builder.embedding_dimensions(dimensions);
        }
        if let Some(model) = &self.generation_model {
            builder = builder.generation_model(model.clone());
        }
        Ok(builder.build()?)
    }
}
