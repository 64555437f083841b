//! TOML configuration.
//!
//! Every section and field has a default, so an empty file (or no file at
//! all, via [`Config::default`]) is a complete working configuration:
//!
//! ```toml
//! [index]
//! dir = "resources/vectorstore"
//! collection = "real-estate"
//!
//! [chunking]
//! max_chars = 1000
//! overlap_chars = 0
//!
//! [retrieval]
//! top_k = 4
//!
//! [embedding]
//! provider = "local"
//! model = "bge-base-en-v1.5"
//!
//! [generation]
//! provider = "groq"
//! model = "llama-3.3-70b-versatile"
//! temperature = 0.9
//! max_tokens = 500
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct IndexConfig {
    /// Directory holding `index.sqlite`.
    #[serde(default = "default_index_dir")]
    pub dir: PathBuf,
    #[serde(default = "default_collection")]
    pub collection: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dir: default_index_dir(),
            collection: default_collection(),
        }
    }
}

impl IndexConfig {
    pub fn db_path(&self) -> PathBuf {
        self.dir.join("index.sqlite")
    }
}

fn default_index_dir() -> PathBuf {
    PathBuf::from("resources/vectorstore")
}
fn default_collection() -> String {
    "real-estate".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default)]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: 0,
        }
    }
}

fn default_max_chars() -> usize {
    1000
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL for the Ollama provider.
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: None,
            dims: None,
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_embedding_provider() -> String {
    "local".to_string()
}
fn default_batch_size() -> usize {
    64
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    #[serde(default = "default_generation_provider")]
    pub provider: String,
    #[serde(default = "default_generation_model")]
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: usize,
    /// Overrides the provider's chat-completions base URL.
    #[serde(default)]
    pub base_url: Option<String>,
    /// Overrides the environment variable holding the API key.
    #[serde(default)]
    pub api_key_env: Option<String>,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            provider: default_generation_provider(),
            model: default_generation_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            base_url: None,
            api_key_env: None,
            max_retries: 0,
            timeout_secs: None,
        }
    }
}

fn default_generation_provider() -> String {
    "groq".to_string()
}
fn default_generation_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}
fn default_temperature() -> f32 {
    0.9
}
fn default_max_tokens() -> usize {
    500
}

#[derive(Debug, Deserialize, Clone)]
pub struct FetchConfig {
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    /// Most URLs accepted by one ingestion from the CLI.
    #[serde(default = "default_max_urls")]
    pub max_urls: usize,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            max_urls: default_max_urls(),
            timeout_secs: None,
        }
    }
}

fn default_user_agent() -> String {
    "Mozilla/5.0".to_string()
}
fn default_max_urls() -> usize {
    3
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    if config.index.collection.trim().is_empty() {
        bail!("index.collection must not be empty");
    }

    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }
    match config.embedding.provider.as_str() {
        "openai" | "ollama" => {
            if config.embedding.model.is_none() {
                bail!(
                    "embedding.model must be specified when provider is '{}'",
                    config.embedding.provider
                );
            }
            if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
                bail!(
                    "embedding.dims must be > 0 when provider is '{}'",
                    config.embedding.provider
                );
            }
        }
        "local" | "disabled" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be local, openai, ollama, or disabled.",
            other
        ),
    }

    match config.generation.provider.as_str() {
        "groq" | "openai" | "ollama" | "disabled" => {}
        other => bail!(
            "Unknown generation provider: '{}'. Must be groq, openai, ollama, or disabled.",
            other
        ),
    }
    if !(0.0..=2.0).contains(&config.generation.temperature) {
        bail!("generation.temperature must be in [0.0, 2.0]");
    }
    if config.generation.max_tokens == 0 {
        bail!("generation.max_tokens must be > 0");
    }

    if config.fetch.max_urls == 0 {
        bail!("fetch.max_urls must be >= 1");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<Config> {
        let config: Config = toml::from_str(toml_src)?;
        validate(&config)?;
        Ok(config)
    }

    #[test]
    fn test_empty_file_uses_defaults() {
        let config = parse("").unwrap();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.index.collection, "real-estate");
        assert_eq!(
            config.index.db_path(),
            PathBuf::from("resources/vectorstore/index.sqlite")
        );
        assert_eq!(config.generation.model, "llama-3.3-70b-versatile");
        assert!((config.generation.temperature - 0.9).abs() < f32::EPSILON);
        assert_eq!(config.generation.max_tokens, 500);
        assert_eq!(config.fetch.user_agent, "Mozilla/5.0");
        assert_eq!(config.fetch.max_urls, 3);
    }

    #[test]
    fn test_default_matches_empty_file() {
        validate(&Config::default()).unwrap();
        assert_eq!(Config::default().embedding.provider, "local");
    }

    #[test]
    fn test_overrides() {
        let config = parse(
            r#"
            [index]
            dir = "/tmp/idx"
            collection = "mortgages"

            [chunking]
            max_chars = 200
            overlap_chars = 20

            [retrieval]
            top_k = 2

            [embedding]
            provider = "ollama"
            model = "nomic-embed-text"
            dims = 768

            [generation]
            provider = "openai"
            model = "gpt-4o-mini"
            temperature = 0.0
            "#,
        )
        .unwrap();
        assert_eq!(config.index.db_path(), PathBuf::from("/tmp/idx/index.sqlite"));
        assert_eq!(config.chunking.overlap_chars, 20);
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.embedding.dims, Some(768));
        assert_eq!(config.generation.provider, "openai");
    }

    #[test]
    fn test_rejects_overlap_not_smaller_than_chunk() {
        let err = parse("[chunking]\nmax_chars = 100\noverlap_chars = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn test_rejects_zero_top_k() {
        assert!(parse("[retrieval]\ntop_k = 0\n").is_err());
    }

    #[test]
    fn test_remote_embedding_requires_model_and_dims() {
        assert!(parse("[embedding]\nprovider = \"openai\"\n").is_err());
        assert!(parse("[embedding]\nprovider = \"openai\"\nmodel = \"text-embedding-3-small\"\n").is_err());
    }

    #[test]
    fn test_rejects_unknown_providers() {
        assert!(parse("[embedding]\nprovider = \"mystery\"\n").is_err());
        assert!(parse("[generation]\nprovider = \"mystery\"\n").is_err());
    }

    #[test]
    fn test_rejects_out_of_range_temperature() {
        assert!(parse("[generation]\ntemperature = 3.5\n").is_err());
    }
}
