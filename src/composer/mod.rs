/// Answer composer boundary (the LLM call).
///
/// The pipeline assembles the context window and prompt; the composer only
/// turns a prompt into text. Generation may be non-deterministic and the
/// pipeline never assumes otherwise. Failures surface as
/// [`RagError::ComposerFailure`](crate::error::RagError) for bounded retry.
pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::error::Result;

#[async_trait]
pub trait Composer: Send + Sync {
    /// Generate answer text from a system prompt and the user's question.
    async fn generate(&self, system_prompt: &str, question: &str) -> Result<String>;
}
