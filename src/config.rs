/// Configuration module for tutorrag.
///
/// Handles loading, validating, and providing default configuration values.
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

// ── Default value functions ──────────────────────────────────────────

fn default_db_path() -> String {
    "./tutorrag.db".to_string()
}

fn default_chunk_size() -> usize {
    500
}

fn default_chunk_overlap() -> usize {
    50
}

fn default_search_top_k() -> usize {
    5
}

fn default_context_budget() -> usize {
    3000
}

fn default_embed_batch_size() -> usize {
    16
}

fn default_answer_language() -> String {
    "English".to_string()
}

fn default_dimensions() -> usize {
    384
}

fn default_composer_endpoint() -> String {
    "https://api.groq.com/openai/v1/chat/completions".to_string()
}

fn default_composer_model() -> String {
    "llama-3.3-70b-versatile".to_string()
}

fn default_api_key_env() -> String {
    "GROQ_API_KEY".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}

fn default_max_attempts() -> usize {
    3
}

fn default_base_delay_ms() -> u64 {
    200
}

// ── Config structs ───────────────────────────────────────────────────

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    #[serde(default = "default_db_path")]
    pub db_path: String,

    /// Maximum chunk length in chars.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Chars of overlap carried from the previous chunk.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_search_top_k")]
    pub search_top_k: usize,

    /// Maximum chars of retrieved context passed to the composer.
    #[serde(default = "default_context_budget")]
    pub context_budget: usize,

    /// Chunks embedded per provider call during ingestion.
    #[serde(default = "default_embed_batch_size")]
    pub embed_batch_size: usize,

    /// Language the composer is asked to answer in.
    #[serde(default = "default_answer_language")]
    pub answer_language: String,

    #[serde(default)]
    pub embedding: EmbeddingConfig,

    #[serde(default)]
    pub composer: ComposerConfig,

    #[serde(default)]
    pub retry: RetryConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    /// Remote embeddings endpoint (OpenAI-compatible). When unset, the
    /// server runs with the deterministic mock embedder.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ComposerConfig {
    #[serde(default = "default_composer_endpoint")]
    pub endpoint: String,

    #[serde(default = "default_composer_model")]
    pub model: String,

    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct RetryConfig {
    /// Total attempts for transient provider errors (1 = no retry).
    #[serde(default = "default_max_attempts")]
    pub max_attempts: usize,

    /// Base delay for exponential backoff between attempts.
    #[serde(default = "default_base_delay_ms")]
    pub base_delay_ms: u64,
}

// ── Default impls ────────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            search_top_k: default_search_top_k(),
            context_budget: default_context_budget(),
            embed_batch_size: default_embed_batch_size(),
            answer_language: default_answer_language(),
            embedding: EmbeddingConfig::default(),
            composer: ComposerConfig::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            model: None,
            api_key_env: default_api_key_env(),
            dimensions: default_dimensions(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for ComposerConfig {
    fn default() -> Self {
        Self {
            endpoint: default_composer_endpoint(),
            model: default_composer_model(),
            api_key_env: default_api_key_env(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            base_delay_ms: default_base_delay_ms(),
        }
    }
}

// ── Config implementation ────────────────────────────────────────────

impl Config {
    /// Load configuration from a JSON file.
    ///
    /// If `config_path` is empty, defaults to `"config.json"`.
    /// If the file does not exist, returns a default config and optionally
    /// generates a template file.
    pub fn load(config_path: &str) -> Result<Self> {
        let path = if config_path.is_empty() {
            "config.json"
        } else {
            config_path
        };

        if !Path::new(path).exists() {
            info!("{path} not found, using defaults");
            let cfg = Self::default();

            // Generate template only for the default path
            if path == "config.json" {
                match cfg.save(path) {
                    Ok(()) => info!("Generated config template: {path}"),
                    Err(e) => warn!("Failed to generate config template: {e}"),
                }
            }

            return Ok(cfg);
        }

        let data = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config: {path}"))?;

        let cfg: Config = match serde_json::from_str(&data) {
            Ok(c) => c,
            Err(e) => {
                warn!("Invalid JSON in {path}: {e}");
                warn!("Using default configuration");
                return Ok(Self::default());
            }
        };

        info!("Loaded configuration from {path}");
        Ok(cfg)
    }

    /// Save configuration to a JSON file.
    pub fn save(&self, path: &str) -> Result<()> {
        let data = serde_json::to_string_pretty(self).context("failed to marshal config")?;
        std::fs::write(path, data).with_context(|| format!("failed to write config: {path}"))?;
        Ok(())
    }

    /// Validate configuration values.
    pub fn validate(&self) -> Result<()> {
        anyhow::ensure!(self.chunk_size > 0, "chunk_size must be positive");
        anyhow::ensure!(
            self.chunk_overlap < self.chunk_size,
            "chunk_overlap must be less than chunk_size"
        );
        anyhow::ensure!(self.search_top_k > 0, "search_top_k must be positive");
        anyhow::ensure!(self.context_budget > 0, "context_budget must be positive");
        anyhow::ensure!(
            self.embed_batch_size > 0,
            "embed_batch_size must be positive"
        );
        anyhow::ensure!(
            self.embedding.dimensions > 0,
            "embedding.dimensions must be positive"
        );
        anyhow::ensure!(
            self.retry.max_attempts >= 1,
            "retry.max_attempts must be at least 1"
        );
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.chunk_overlap, 50);
        assert_eq!(config.search_top_k, 5);
        assert_eq!(config.context_budget, 3000);
        assert_eq!(config.embedding.dimensions, 384);
        assert!(config.embedding.endpoint.is_none());
        assert_eq!(config.composer.model, "llama-3.3-70b-versatile");
        assert_eq!(config.retry.max_attempts, 3);
    }

    #[test]
    fn test_load_from_json() {
        let json = r#"{"chunk_size": 1000, "db_path": "./test.db"}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.db_path, "./test.db");
        // Other fields should have defaults
        assert_eq!(config.search_top_k, 5);
        assert_eq!(config.embedding.dimensions, 384);
    }

    #[test]
    fn test_validate_ok() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_bad_chunk_size() {
        let mut config = Config::default();
        config.chunk_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_overlap_not_below_size() {
        let mut config = Config::default();
        config.chunk_overlap = config.chunk_size;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nested_sections_parse() {
        let json = r#"{
            "embedding": {"endpoint": "http://localhost:9000/embeddings", "dimensions": 512},
            "retry": {"max_attempts": 5}
        }"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(
            config.embedding.endpoint.as_deref(),
            Some("http://localhost:9000/embeddings")
        );
        assert_eq!(config.embedding.dimensions, 512);
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.base_delay_ms, 200);
    }

    #[test]
    fn test_serialization_roundtrip() {
        let config = Config::default();
        let json = serde_json::to_string_pretty(&config).unwrap();
        let parsed: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.chunk_size, config.chunk_size);
        assert_eq!(parsed.db_path, config.db_path);
        assert_eq!(parsed.composer.endpoint, config.composer.endpoint);
    }
}
