/// Crate-wide error type for the RAG pipeline.
///
/// Transient provider failures (`EmbeddingUnavailable`, `ComposerFailure`)
/// are retried locally with bounded backoff before surfacing; every other
/// kind surfaces to the caller immediately.
use thiserror::Error;

use crate::db::documents::DocumentState;

#[derive(Error, Debug)]
pub enum RagError {
    /// Malformed caller input: bad chunk parameters, k < 1, empty text,
    /// embedding dimension mismatch on upsert.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The embedding provider is unreachable or timed out.
    #[error("embedding provider unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// The answer generation call failed.
    #[error("composer failed: {0}")]
    ComposerFailure(String),

    /// No indexed content for the requested scope. User-actionable
    /// ("upload a document first"), not a system fault.
    #[error("no indexed content for scope '{scope}'")]
    EmptyCorpus { scope: String },

    /// The target document's ingestion has not completed. Retryable by the
    /// caller after a delay.
    #[error("document '{document_id}' is not ready (state: {state})")]
    DocumentNotReady {
        document_id: String,
        state: DocumentState,
    },

    /// Another ingestion for the same document id is already in flight.
    #[error("ingestion already in progress for document '{0}'")]
    IngestionInProgress(String),

    /// Underlying vector index / storage failure.
    #[error("index error: {0}")]
    Index(#[from] rusqlite::Error),

    /// Configuration validation error.
    #[error("config error: {0}")]
    Config(String),
}

impl RagError {
    /// Whether the pipeline may retry the failed call locally.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            RagError::EmbeddingUnavailable(_) | RagError::ComposerFailure(_)
        )
    }

    /// Stable machine-readable kind string for API responses.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            RagError::InvalidArgument(_) => "invalid_argument",
            RagError::EmbeddingUnavailable(_) => "embedding_unavailable",
            RagError::ComposerFailure(_) => "composer_failure",
            RagError::EmptyCorpus { .. } => "empty_corpus",
            RagError::DocumentNotReady { .. } => "document_not_ready",
            RagError::IngestionInProgress(_) => "ingestion_in_progress",
            RagError::Index(_) => "index_error",
            RagError::Config(_) => "config_error",
        }
    }

    /// Whether the caller should retry later (transient kinds plus
    /// `DocumentNotReady`, which resolves once ingestion finishes).
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        self.is_transient() || matches!(self, RagError::DocumentNotReady { .. })
    }
}

pub type Result<T> = std::result::Result<T, RagError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transient_classification() {
        assert!(RagError::EmbeddingUnavailable("timeout".into()).is_transient());
        assert!(RagError::ComposerFailure("500".into()).is_transient());
        assert!(!RagError::InvalidArgument("k must be >= 1".into()).is_transient());
        assert!(
            !RagError::EmptyCorpus {
                scope: "corpus".into()
            }
            .is_transient()
        );
        assert!(!RagError::IngestionInProgress("doc1".into()).is_transient());
    }

    #[test]
    fn test_document_not_ready_is_retryable_but_not_transient() {
        let err = RagError::DocumentNotReady {
            document_id: "doc1".into(),
            state: DocumentState::Embedding,
        };
        assert!(err.is_retryable());
        assert!(!err.is_transient());
        assert_eq!(err.kind(), "document_not_ready");
    }
}
