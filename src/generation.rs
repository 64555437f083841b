//! Chat-completions generator.
//!
//! Groq, OpenAI and Ollama all expose the OpenAI `POST /chat/completions`
//! shape, so one client covers the three; only the base URL and the API
//! key variable differ.

use anyhow::{anyhow, bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub use rag_harness_core::generation::{Generator, Prompt};

use crate::config::GenerationConfig;
use crate::http;

const GROQ_BASE_URL: &str = "https://api.groq.com/openai/v1";
const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";

pub struct ChatCompletionsGenerator {
    service: &'static str,
    model: String,
    endpoint: String,
    api_key: Option<String>,
    temperature: f32,
    max_tokens: usize,
    max_retries: u32,
    client: reqwest::Client,
}

impl ChatCompletionsGenerator {
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let (service, default_base, default_key_env) = match config.provider.as_str() {
            "groq" => ("Groq", GROQ_BASE_URL, Some("GROQ_API_KEY")),
            "openai" => ("OpenAI", OPENAI_BASE_URL, Some("OPENAI_API_KEY")),
            "ollama" => ("Ollama", OLLAMA_BASE_URL, None),
            other => bail!("Unknown generation provider: {}", other),
        };

        let key_env = config.api_key_env.as_deref().or(default_key_env);
        let api_key = match key_env {
            Some(var) => Some(
                std::env::var(var)
                    .map_err(|_| anyhow!("{} environment variable not set", var))?,
            ),
            None => None,
        };

        let base = config.base_url.as_deref().unwrap_or(default_base);
        Ok(Self {
            service,
            model: config.model.clone(),
            endpoint: format!("{}/chat/completions", base.trim_end_matches('/')),
            api_key,
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            max_retries: config.max_retries,
            client: http::client(config.timeout_secs)?,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl Generator for ChatCompletionsGenerator {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &Prompt) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            temperature: self.temperature,
            max_tokens: self.max_tokens,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
        };
        let body = serde_json::to_value(&body)?;

        tracing::debug!(service = self.service, model = %self.model, "calling chat completions");
        let json = http::post_json_with_retry(
            &self.client,
            &self.endpoint,
            self.api_key.as_deref(),
            &body,
            self.max_retries,
            self.service,
        )
        .await?;

        let parsed: ChatResponse = serde_json::from_value(json)
            .with_context(|| format!("failed to parse {} response", self.service))?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| anyhow!("{} returned no completion", self.service))
    }
}

/// Stand-in used when `generation.provider = "disabled"`.
pub struct DisabledGenerator;

#[async_trait]
impl Generator for DisabledGenerator {
    fn model_name(&self) -> &str {
        "disabled"
    }
    async fn generate(&self, _prompt: &Prompt) -> Result<String> {
        bail!("Generation provider is disabled")
    }
}

pub fn create_generator(config: &GenerationConfig) -> Result<Arc<dyn Generator>> {
    match config.provider.as_str() {
        "disabled" => Ok(Arc::new(DisabledGenerator)),
        _ => Ok(Arc::new(ChatCompletionsGenerator::new(config)?)),
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    max_tokens: usize,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    #[serde(default)]
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ollama_config() -> GenerationConfig {
        GenerationConfig {
            provider: "ollama".to_string(),
            model: "llama3.2".to_string(),
            ..GenerationConfig::default()
        }
    }

    #[test]
    fn test_ollama_needs_no_key_and_uses_local_endpoint() {
        let generator = ChatCompletionsGenerator::new(&ollama_config()).unwrap();
        assert_eq!(
            generator.endpoint(),
            "http://localhost:11434/v1/chat/completions"
        );
        assert_eq!(generator.model_name(), "llama3.2");
    }

    #[test]
    fn test_base_url_override() {
        let config = GenerationConfig {
            base_url: Some("http://127.0.0.1:9999/v1/".to_string()),
            ..ollama_config()
        };
        let generator = ChatCompletionsGenerator::new(&config).unwrap();
        assert_eq!(generator.endpoint(), "http://127.0.0.1:9999/v1/chat/completions");
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        let config = GenerationConfig {
            api_key_env: Some("RAG_HARNESS_TEST_KEY_THAT_IS_NEVER_SET".to_string()),
            ..GenerationConfig::default()
        };
        let err = ChatCompletionsGenerator::new(&config).err().unwrap();
        assert!(err
            .to_string()
            .contains("RAG_HARNESS_TEST_KEY_THAT_IS_NEVER_SET"));
    }

    #[test]
    fn test_response_without_content_deserializes() {
        let parsed: ChatResponse =
            serde_json::from_value(serde_json::json!({"choices": [{"message": {"role": "assistant"}}]}))
                .unwrap();
        assert!(parsed.choices[0].message.content.is_none());
    }

    #[tokio::test]
    async fn test_disabled_generator_errors() {
        let config = GenerationConfig {
            provider: "disabled".to_string(),
            ..GenerationConfig::default()
        };
        let generator = create_generator(&config).unwrap();
        let prompt = Prompt {
            system: String::new(),
            user: "q".to_string(),
        };
        assert!(generator.generate(&prompt).await.is_err());
    }
}
