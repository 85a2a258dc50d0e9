/// Remote embedding provider over an OpenAI-compatible `/embeddings`
/// endpoint.
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Embedder;
use crate::config::EmbeddingConfig;
use crate::error::{RagError, Result};

#[derive(Serialize)]
struct EmbeddingRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
    input: &'a [&'a str],
}

#[derive(Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingData>,
}

#[derive(Deserialize)]
struct EmbeddingData {
    index: usize,
    embedding: Vec<f32>,
}

/// Embedding client for a remote provider.
///
/// The request timeout comes from the config; a timeout or connection
/// failure is reported as `EmbeddingUnavailable` so the pipeline can retry
/// with backoff.
pub struct HttpEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: Option<String>,
    api_key: Option<String>,
    dimensions: usize,
}

impl HttpEmbedder {
    /// Build a client from config. The API key is read from the
    /// environment variable named in `config.api_key_env`, if set.
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let endpoint = config
            .endpoint
            .clone()
            .ok_or_else(|| RagError::Config("embedding.endpoint is not set".to_string()))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("tutorrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RagError::Config(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            endpoint,
            model: config.model.clone(),
            api_key: std::env::var(&config.api_key_env).ok(),
            dimensions: config.dimensions,
        })
    }

    async fn request(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let body = EmbeddingRequest {
            model: self.model.as_deref(),
            input: texts,
        };

        let mut req = self.client.post(&self.endpoint).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::EmbeddingUnavailable(format!(
                "provider returned {status}: {text}"
            )));
        }

        let parsed: EmbeddingResponse = resp
            .json()
            .await
            .map_err(|e| RagError::EmbeddingUnavailable(format!("invalid response: {e}")))?;

        if parsed.data.len() != texts.len() {
            return Err(RagError::EmbeddingUnavailable(format!(
                "provider returned {} embeddings for {} inputs",
                parsed.data.len(),
                texts.len()
            )));
        }

        // Providers may reorder entries; restore input order by index
        let mut data = parsed.data;
        data.sort_by_key(|d| d.index);
        Ok(data.into_iter().map(|d| d.embedding).collect())
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.request(&[text]).await?;
        vectors
            .pop()
            .ok_or_else(|| RagError::EmbeddingUnavailable("empty response".to_string()))
    }

    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        self.request(texts).await
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_required() {
        let config = EmbeddingConfig::default();
        assert!(matches!(
            HttpEmbedder::new(&config),
            Err(RagError::Config(_))
        ));
    }

    #[test]
    fn test_new_with_endpoint() {
        let config = EmbeddingConfig {
            endpoint: Some("http://localhost:9000/embeddings".to_string()),
            dimensions: 512,
            ..EmbeddingConfig::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        assert_eq!(embedder.dimensions(), 512);
    }

    #[tokio::test]
    async fn test_unreachable_endpoint_is_transient() {
        let config = EmbeddingConfig {
            endpoint: Some("http://127.0.0.1:1/embeddings".to_string()),
            request_timeout_secs: 1,
            ..EmbeddingConfig::default()
        };
        let embedder = HttpEmbedder::new(&config).unwrap();
        let err = embedder.embed("hello").await.unwrap_err();
        assert!(err.is_transient(), "expected transient error, got {err}");
    }
}
