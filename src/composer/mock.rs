/// Mock composer for testing and keyless development runs.
use async_trait::async_trait;

use super::Composer;
use crate::error::Result;

/// Returns a canned answer that echoes the question. The system prompt
/// (and with it the retrieved context) is ignored.
#[derive(Debug, Default)]
pub struct MockComposer;

#[async_trait]
impl Composer for MockComposer {
    async fn generate(&self, _system_prompt: &str, question: &str) -> Result<String> {
        Ok(format!(
            "This is a mock answer to: {question}. Configure a composer API key for real answers."
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_echoes_question() {
        let composer = MockComposer;
        let answer = composer
            .generate("You are a tutor.", "What is DNA?")
            .await
            .unwrap();
        assert!(answer.contains("What is DNA?"));
    }
}
