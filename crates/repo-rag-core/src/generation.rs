//! Text-generation provider trait.
//!
//! The orchestrator calls [`GenerationProvider::complete`] exactly once per
//! question. Concrete backends (Ollama, OpenAI-compatible) live in the app
//! crate.

use async_trait::async_trait;

use crate::error::Result;

/// Produces a natural-language answer for a prompt.
#[async_trait]
pub trait GenerationProvider: Send + Sync {
    /// Returns the model identifier (e.g. `"phi3:mini"`).
    fn model_name(&self) -> &str;

    /// Complete `prompt`. Failures must be returned as
    /// [`RagError::Provider`](crate::error::RagError::Provider), never as
    /// empty text.
    async fn complete(&self, prompt: &str) -> Result<String>;
}
