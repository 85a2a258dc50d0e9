/// Embedding provider boundary.
///
/// The provider maps text to fixed-length vectors; it is a remote
/// collaborator, so the trait is async and failures surface as
/// [`RagError::EmbeddingUnavailable`](crate::error::RagError) for the
/// pipeline's bounded retry.
pub mod http;
pub mod mock;

use async_trait::async_trait;

use crate::error::Result;

/// Trait for text embedding providers.
///
/// Implementations must be `Send + Sync` to allow concurrent use behind
/// `Arc`, and deterministic for identical input.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text string into a vector.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed multiple text strings into vectors.
    ///
    /// The default implementation embeds sequentially; providers with a
    /// native batch endpoint should override it.
    async fn embed_batch(&self, texts: &[&str]) -> Result<Vec<Vec<f32>>> {
        let mut results = Vec::with_capacity(texts.len());
        for text in texts {
            results.push(self.embed(text).await?);
        }
        Ok(results)
    }

    /// Return the dimensionality of the embedding vectors.
    fn dimensions(&self) -> usize;
}
