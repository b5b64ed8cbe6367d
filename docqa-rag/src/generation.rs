//! Generation provider trait for turning a prompt into a completion.

use async_trait::async_trait;

use crate::error::Result;

/// A provider that completes a prompt with a language model.
///
/// The pipeline sends one fully assembled prompt and expects the whole
/// completion back; no streaming contract is required.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Generate a completion for `prompt` at the given sampling temperature.
    ///
    /// A temperature of `0.0` asks the backend for its most likely completion.
    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String>;

    /// Return the identifier of the model behind this provider.
    fn model_id(&self) -> &str;
}

/// An offline provider that answers by quoting the best-matching context passage.
///
/// It reads the context block out of a prompt built by
/// [`PromptTemplate::grounded`](crate::PromptTemplate::grounded) and returns
/// its first passage, or the not-found sentinel when the block is empty. It
/// never calls a model and exists to exercise the pipeline end to end.
#[derive(Debug, Clone)]
pub struct ExtractiveGenerationProvider {
    not_found_sentinel: String,
}

impl ExtractiveGenerationProvider {
    /// Create a provider that answers `not_found_sentinel` for an empty context.
    pub fn new(not_found_sentinel: impl Into<String>) -> Self {
        Self { not_found_sentinel: not_found_sentinel.into() }
    }
}

#[async_trait]
impl GenerationProvider for ExtractiveGenerationProvider {
    async fn generate(&self, prompt: &str, _temperature: f32) -> Result<String> {
        let context = prompt
            .split_once(crate::prompt::CONTEXT_HEADER)
            .and_then(|(_, rest)| rest.split_once(crate::prompt::QUESTION_HEADER))
            .map(|(context, _)| context.trim())
            .unwrap_or_default();

        let answer = context
            .split("\n\n")
            .map(str::trim)
            .find(|passage| !passage.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| self.not_found_sentinel.clone());
        Ok(answer)
    }

    fn model_id(&self) -> &str {
        "extractive"
    }
}
