//! Generative model trait.
//!
//! Concrete chat-completion clients live in the `rag-harness` app crate.

use anyhow::Result;
use async_trait::async_trait;

/// Request envelope passed to a [`Generator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    /// Standing instructions for the model.
    pub system: String,
    /// Grounding context and the question.
    pub user: String,
}

/// A generative language model: prompt in, free text out.
///
/// Sampling parameters (temperature, output token budget) are fixed when the
/// generator is constructed.
#[async_trait]
pub trait Generator: Send + Sync {
    fn model_name(&self) -> &str;
    async fn generate(&self, prompt: &Prompt) -> Result<String>;
}
