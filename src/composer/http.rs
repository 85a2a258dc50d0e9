/// Chat-completions composer client (Groq / OpenAI-compatible).
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::Composer;
use crate::config::ComposerConfig;
use crate::error::{RagError, Result};

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Deserialize)]
struct ChatResponseMessage {
    content: String,
}

pub struct HttpComposer {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    api_key: String,
}

impl HttpComposer {
    /// Build a client from config. Fails if the API key environment
    /// variable named in `config.api_key_env` is not set.
    pub fn new(config: &ComposerConfig) -> Result<Self> {
        let api_key = std::env::var(&config.api_key_env)
            .map_err(|_| RagError::Config(format!("{} is not set", config.api_key_env)))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(concat!("tutorrag/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| RagError::Config(format!("HTTP client build failed: {e}")))?;

        Ok(Self {
            client,
            endpoint: config.endpoint.clone(),
            model: config.model.clone(),
            api_key,
        })
    }
}

#[async_trait]
impl Composer for HttpComposer {
    async fn generate(&self, system_prompt: &str, question: &str) -> Result<String> {
        let body = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system_prompt,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
        };

        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RagError::ComposerFailure(e.to_string()))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let text = resp.text().await.unwrap_or_default();
            return Err(RagError::ComposerFailure(format!(
                "provider returned {status}: {text}"
            )));
        }

        let parsed: ChatResponse = resp
            .json()
            .await
            .map_err(|e| RagError::ComposerFailure(format!("invalid response: {e}")))?;

        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| RagError::ComposerFailure("no choices in response".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_api_key_is_config_error() {
        let config = ComposerConfig {
            api_key_env: "TUTORRAG_TEST_MISSING_KEY".to_string(),
            ..ComposerConfig::default()
        };
        assert!(matches!(
            HttpComposer::new(&config),
            Err(RagError::Config(_))
        ));
    }
}
