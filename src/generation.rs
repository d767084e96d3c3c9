//! Text-generation provider implementations.
//!
//! - **[`OllamaGenerator`]**: `POST {url}/api/chat`, non-streaming.
//! - **[`OpenAIGenerator`]**: `POST {url}/v1/chat/completions`; requires `OPENAI_API_KEY`.
//! - **[`DisabledGenerator`]**: always fails; for index/query-only setups.
//!
//! The prompt is sent as a single user message.

use anyhow::{bail, Result};
use async_trait::async_trait;
use serde_json::Value;

use repo_rag_core::generation::GenerationProvider;
use repo_rag_core::RagError;

use crate::config::GenerationConfig;
use crate::http;

const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";
const DEFAULT_OPENAI_URL: &str = "https://api.openai.com";

/// Chat completion through a local Ollama instance.
pub struct OllamaGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    max_retries: u32,
}

impl OllamaGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string()),
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationProvider for OllamaGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> repo_rag_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
            "stream": false,
        });
        let json = http::post_json(
            &self.client,
            &http::endpoint(&self.url, "/api/chat"),
            None,
            &body,
            self.max_retries,
            "Ollama",
        )
        .await?;
        parse_ollama_chat(&json)
    }
}

fn parse_ollama_chat(json: &Value) -> repo_rag_core::Result<String> {
    json.pointer("/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| RagError::provider("Invalid Ollama response: missing message.content"))
}

/// Chat completion through the OpenAI API or a compatible server.
pub struct OpenAIGenerator {
    client: reqwest::Client,
    model: String,
    url: String,
    api_key: String,
    max_retries: u32,
}

impl OpenAIGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY")
            .map_err(|_| anyhow::anyhow!("OPENAI_API_KEY environment variable not set"))?;
        Ok(Self {
            client: http::client(config.timeout_secs)?,
            model: config.model.clone(),
            url: config
                .url
                .clone()
                .unwrap_or_else(|| DEFAULT_OPENAI_URL.to_string()),
            api_key,
            max_retries: config.max_retries,
        })
    }
}

#[async_trait]
impl GenerationProvider for OpenAIGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> repo_rag_core::Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "messages": [{ "role": "user", "content": prompt }],
        });
        let json = http::post_json(
            &self.client,
            &http::endpoint(&self.url, "/v1/chat/completions"),
            Some(&self.api_key),
            &body,
            self.max_retries,
            "OpenAI",
        )
        .await?;
        parse_openai_chat(&json)
    }
}

fn parse_openai_chat(json: &Value) -> repo_rag_core::Result<String> {
    json.pointer("/choices/0/message/content")
        .and_then(|c| c.as_str())
        .map(str::to_string)
        .ok_or_else(|| {
            RagError::provider("Invalid OpenAI response: missing choices[0].message.content")
        })
}

/// Generator used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl GenerationProvider for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }

    async fn complete(&self, _prompt: &str) -> repo_rag_core::Result<String> {
        Err(RagError::provider("Generation provider is disabled"))
    }
}

/// Create the [`GenerationProvider`] named by `config.provider`.
pub fn create_generator(config: &GenerationConfig) -> Result<Box<dyn GenerationProvider>> {
    match config.provider.as_str() {
        "ollama" => Ok(Box::new(OllamaGenerator::new(config)?)),
        "openai" => Ok(Box::new(OpenAIGenerator::new(config)?)),
        "disabled" => Ok(Box::new(DisabledGenerator)),
        other => bail!("Unknown generation provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_chat_responses() {
        let ollama = serde_json::json!({ "message": { "role": "assistant", "content": "hi" } });
        assert_eq!(parse_ollama_chat(&ollama).unwrap(), "hi");
        assert!(parse_ollama_chat(&serde_json::json!({ "done": true })).is_err());

        let openai = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "hello" } }]
        });
        assert_eq!(parse_openai_chat(&openai).unwrap(), "hello");
        assert!(parse_openai_chat(&serde_json::json!({ "choices": [] })).is_err());
    }

    #[tokio::test]
    async fn test_disabled_generator_fails() {
        let err = DisabledGenerator.complete("question").await.unwrap_err();
        assert!(matches!(err, RagError::Provider(_)));
    }

    #[test]
    fn test_create_generator() {
        let config = GenerationConfig {
            provider: "disabled".to_string(),
            ..Default::default()
        };
        assert_eq!(create_generator(&config).unwrap().model_name(), "disabled");

        let config = GenerationConfig {
            provider: "magic".to_string(),
            ..Default::default()
        };
        assert!(create_generator(&config).is_err());
    }
}
