//! Pipeline orchestration: ingestion, retrieval, and question answering.
//!
//! The pipeline owns the index, the embedder, and the composer, and drives
//! each document through `Chunking → Embedding → Indexed → Ready`. A failed
//! ingestion rolls back every chunk already written, so a document is either
//! fully queryable or absent from search results. Per-document leases keep
//! concurrent ingestions of the same id from interleaving.
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info, warn};

use crate::chunker;
use crate::composer::Composer;
use crate::config::Config;
use crate::context;
use crate::db::Db;
use crate::db::documents::{DocumentRecord, DocumentState};
use crate::db::search::{RetrievedChunk, Scope};
use crate::embedder::Embedder;
use crate::error::{RagError, Result};

/// Where a composed answer's supporting text came from. Every source
/// refers to a chunk that was retrieved for the question.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRef {
    pub document_id: String,
    pub position: usize,
    pub similarity: f64,
}

/// A composed answer with the chunks that backed it.
#[derive(Debug, Serialize)]
pub struct Answer {
    #[serde(rename = "answer")]
    pub text: String,
    pub sources: Vec<SourceRef>,
}

/// Outcome of a completed ingestion.
#[derive(Debug, Serialize)]
pub struct IngestReport {
    pub document_id: String,
    pub chunk_count: usize,
}

pub struct Pipeline {
    db: Arc<Mutex<Db>>,
    embedder: Arc<dyn Embedder>,
    composer: Arc<dyn Composer>,
    config: Arc<Config>,
    in_flight: StdMutex<HashSet<String>>,
}

/// Releases the per-document ingestion lease on drop, including on the
/// error path out of `ingest_document`.
struct IngestLease<'a> {
    in_flight: &'a StdMutex<HashSet<String>>,
    document_id: String,
}

impl Drop for IngestLease<'_> {
    fn drop(&mut self) {
        if let Ok(mut set) = self.in_flight.lock() {
            set.remove(&self.document_id);
        }
    }
}

impl Pipeline {
    pub fn new(
        db: Arc<Mutex<Db>>,
        embedder: Arc<dyn Embedder>,
        composer: Arc<dyn Composer>,
        config: Arc<Config>,
    ) -> Self {
        Self {
            db,
            embedder,
            composer,
            config,
            in_flight: StdMutex::new(HashSet::new()),
        }
    }

    /// Ingest a document: chunk, embed, and index its text. Re-ingesting an
    /// existing id replaces its previous chunks entirely. Returns once the
    /// document is `Ready`; on failure the document is rolled back to
    /// `Failed` with no chunks left in the index.
    pub async fn ingest_document(&self, document_id: &str, text: &str) -> Result<IngestReport> {
        if document_id.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "document id must not be empty".to_string(),
            ));
        }
        if text.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "document text must not be empty".to_string(),
            ));
        }

        let _lease = self.acquire_lease(document_id)?;
        info!(document_id, chars = text.chars().count(), "ingesting document");

        match self.run_ingestion(document_id, text).await {
            Ok(chunk_count) => {
                info!(document_id, chunk_count, "document ready");
                Ok(IngestReport {
                    document_id: document_id.to_string(),
                    chunk_count,
                })
            }
            Err(err) => {
                warn!(document_id, error = %err, "ingestion failed, rolling back");
                if let Err(rollback_err) = self.db.lock().await.rollback_document(document_id) {
                    error!(document_id, error = %rollback_err, "rollback failed");
                }
                Err(err)
            }
        }
    }

    fn acquire_lease(&self, document_id: &str) -> Result<IngestLease<'_>> {
        let mut set = self
            .in_flight
            .lock()
            .map_err(|_| RagError::Config("ingestion lease lock poisoned".to_string()))?;
        if !set.insert(document_id.to_string()) {
            return Err(RagError::IngestionInProgress(document_id.to_string()));
        }
        Ok(IngestLease {
            in_flight: &self.in_flight,
            document_id: document_id.to_string(),
        })
    }

    async fn run_ingestion(&self, document_id: &str, text: &str) -> Result<usize> {
        self.db
            .lock()
            .await
            .begin_ingestion(document_id, Utc::now())?;

        let chunks = chunker::chunk(text, self.config.chunk_size, self.config.chunk_overlap)?;
        if chunks.is_empty() {
            return Err(RagError::InvalidArgument(
                "document produced no chunks".to_string(),
            ));
        }
        debug!(document_id, chunk_count = chunks.len(), "chunking complete");

        self.db
            .lock()
            .await
            .set_document_state(document_id, DocumentState::Embedding)?;

        let batch_size = self.config.embed_batch_size.max(1);
        for batch in chunks.chunks(batch_size) {
            let texts: Vec<&str> = batch.iter().map(|c| c.text.as_str()).collect();
            let embeddings = self
                .with_retry("embedding batch", || self.embedder.embed_batch(&texts))
                .await?;
            self.db
                .lock()
                .await
                .insert_chunks(document_id, batch, &embeddings)?;
        }

        let db = self.db.lock().await;
        db.set_document_state(document_id, DocumentState::Indexed)?;
        db.mark_document_ready(document_id)?;
        Ok(chunks.len())
    }

    /// Retrieve the `top_k` most similar chunks for a question within a
    /// scope. Document scope requires the document to be `Ready`; an empty
    /// scope is reported as [`RagError::EmptyCorpus`] rather than an empty
    /// result.
    pub async fn retrieve(
        &self,
        question: &str,
        top_k: usize,
        scope: &Scope,
    ) -> Result<Vec<RetrievedChunk>> {
        if question.trim().is_empty() {
            return Err(RagError::InvalidArgument(
                "question must not be empty".to_string(),
            ));
        }

        // Fail fast before paying for the query embedding
        Self::check_scope(&*self.db.lock().await, scope)?;

        let query_vector = self
            .with_retry("query embedding", || self.embedder.embed(question))
            .await?;

        // A re-ingest may have started during the embed await; re-check
        // under the same lock as the search so an in-flight ingestion
        // surfaces as DocumentNotReady instead of partial or empty results
        let db = self.db.lock().await;
        Self::check_scope(&db, scope)?;
        db.search(&query_vector, top_k, scope)
    }

    fn check_scope(db: &Db, scope: &Scope) -> Result<()> {
        if let Scope::Document(id) = scope {
            match db.get_document(id)? {
                // Unknown and rolled-back documents have nothing to
                // query; only an in-flight ingestion is worth waiting on
                None => {
                    return Err(RagError::EmptyCorpus {
                        scope: scope.describe(),
                    });
                }
                Some(doc) if doc.state == DocumentState::Failed => {
                    return Err(RagError::EmptyCorpus {
                        scope: scope.describe(),
                    });
                }
                Some(doc) if doc.state != DocumentState::Ready => {
                    return Err(RagError::DocumentNotReady {
                        document_id: id.clone(),
                        state: doc.state,
                    });
                }
                Some(_) => {}
            }
        }
        if db.chunk_count_in_scope(scope)? == 0 {
            return Err(RagError::EmptyCorpus {
                scope: scope.describe(),
            });
        }
        Ok(())
    }

    /// Answer a question from retrieved context. The composed answer's
    /// sources are exactly the retrieved chunks that fit the context budget.
    pub async fn ask_question(&self, question: &str, scope: &Scope) -> Result<Answer> {
        let retrieved = self
            .retrieve(question, self.config.search_top_k, scope)
            .await?;

        let window = context::assemble_window(&retrieved, self.config.context_budget);
        debug!(
            scope = %scope.describe(),
            retrieved = retrieved.len(),
            in_window = window.chunks.len(),
            "context assembled"
        );

        let system_prompt = context::build_system_prompt(&window.text, &self.config.answer_language);
        let text = self
            .with_retry("answer composition", || {
                self.composer.generate(&system_prompt, question)
            })
            .await?;

        let sources = window
            .chunks
            .iter()
            .map(|c| SourceRef {
                document_id: c.document_id.clone(),
                position: c.position,
                similarity: c.similarity,
            })
            .collect();

        Ok(Answer { text, sources })
    }

    /// Current pipeline state of a document, if it exists.
    pub async fn document_status(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        self.db.lock().await.get_document(document_id)
    }

    /// All known documents, most recently uploaded first.
    pub async fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        self.db.lock().await.list_documents()
    }

    /// Remove a document and its chunks. Returns false if the id was
    /// unknown.
    pub async fn delete_document(&self, document_id: &str) -> Result<bool> {
        let deleted = self.db.lock().await.delete_document(document_id)?;
        if deleted {
            info!(document_id, "document deleted");
        }
        Ok(deleted)
    }

    /// Run a provider call, retrying transient failures with exponential
    /// backoff up to `retry.max_attempts` total attempts.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.config.retry.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_transient() && attempt < max_attempts => {
                    // Cap the exponent so large max_attempts cannot overflow
                    let factor = 1u64 << (attempt - 1).min(16);
                    let delay = Duration::from_millis(
                        self.config.retry.base_delay_ms.saturating_mul(factor),
                    );
                    warn!(
                        what,
                        attempt,
                        max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
