//! Generation client trait for producing answers

use async_trait::async_trait;
use crate::error::Result;

/// Sampling parameters for one generation call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationParams {
    pub max_tokens: u32,
    pub temperature: f32,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            max_tokens: 350,
            temperature: 0.0,
        }
    }
}

/// Trait for LLM-based answer generation
///
/// Implementations:
/// - `OllamaLlm`: Local Ollama chat endpoint
/// - `AzureOpenAiClient`: Azure OpenAI chat completions
#[async_trait]
pub trait GenerationClient: Send + Sync {
    /// Generate text from a system instruction and a user prompt
    async fn generate(
        &self,
        system_instruction: &str,
        user_prompt: &str,
        params: GenerationParams,
    ) -> Result<String>;

    /// Check if the provider is healthy and available
    async fn health_check(&self) -> Result<bool>;

    /// Get provider name for logging
    fn name(&self) -> &str;

    /// Get the model being used
    fn model(&self) -> &str;
}
