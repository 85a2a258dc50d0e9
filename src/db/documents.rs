//! Document rows, pipeline state persistence, and chunk storage.
use super::{Db, serialize_vector};
use crate::chunker::ChunkCandidate;
use crate::error::{RagError, Result};
use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension, params};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Per-document pipeline state:
/// `Uploaded → Chunking → Embedding → Indexed → (Ready | Failed)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentState {
    Uploaded,
    Chunking,
    Embedding,
    Indexed,
    Ready,
    Failed,
}

impl DocumentState {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentState::Uploaded => "uploaded",
            DocumentState::Chunking => "chunking",
            DocumentState::Embedding => "embedding",
            DocumentState::Indexed => "indexed",
            DocumentState::Ready => "ready",
            DocumentState::Failed => "failed",
        }
    }

    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "uploaded" => Some(DocumentState::Uploaded),
            "chunking" => Some(DocumentState::Chunking),
            "embedding" => Some(DocumentState::Embedding),
            "indexed" => Some(DocumentState::Indexed),
            "ready" => Some(DocumentState::Ready),
            "failed" => Some(DocumentState::Failed),
            _ => None,
        }
    }
}

impl fmt::Display for DocumentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A row from the `documents` table.
#[derive(Debug, Clone, Serialize)]
pub struct DocumentRecord {
    pub id: String,
    pub state: DocumentState,
    pub uploaded_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub indexed_at: Option<DateTime<Utc>>,
}

fn state_from_sql(s: String) -> rusqlite::Result<DocumentState> {
    DocumentState::parse(&s).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            format!("unknown document state: {s}").into(),
        )
    })
}

fn map_document_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<DocumentRecord> {
    Ok(DocumentRecord {
        id: row.get(0)?,
        state: state_from_sql(row.get(1)?)?,
        uploaded_at: row.get(2)?,
        indexed_at: row.get(3)?,
    })
}

impl Db {
    /// Start (or restart) ingestion for a document.
    ///
    /// Upserts the document row in `Chunking` state and removes any chunks
    /// from a previous ingestion in the same transaction, so re-ingesting a
    /// `Ready` document fully replaces its index entries.
    pub fn begin_ingestion(&mut self, document_id: &str, uploaded_at: DateTime<Utc>) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            r#"
            INSERT INTO documents (id, state, uploaded_at, indexed_at)
            VALUES (?, 'chunking', ?, NULL)
            ON CONFLICT(id) DO UPDATE SET
                state = 'chunking',
                uploaded_at = excluded.uploaded_at,
                indexed_at = NULL
            "#,
            params![document_id, uploaded_at],
        )?;

        // Virtual table cascade deletion workaround
        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
            params![document_id],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?",
            params![document_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Set a document's pipeline state.
    pub fn set_document_state(&self, document_id: &str, state: DocumentState) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET state = ? WHERE id = ?",
            params![state.as_str(), document_id],
        )?;
        Ok(())
    }

    /// Mark a document `Ready` and stamp its indexing time.
    pub fn mark_document_ready(&self, document_id: &str) -> Result<()> {
        self.conn.execute(
            "UPDATE documents SET state = 'ready', indexed_at = CURRENT_TIMESTAMP WHERE id = ?",
            params![document_id],
        )?;
        Ok(())
    }

    /// Insert a batch of chunks with their embeddings.
    ///
    /// Every embedding must match the index dimensionality; a mismatch is
    /// rejected with [`RagError::InvalidArgument`] before anything is
    /// written.
    pub fn insert_chunks(
        &mut self,
        document_id: &str,
        chunks: &[ChunkCandidate],
        embeddings: &[Vec<f32>],
    ) -> Result<()> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::InvalidArgument(format!(
                "chunk/embedding count mismatch: {} vs {}",
                chunks.len(),
                embeddings.len()
            )));
        }
        let dimensions = self.dimensions();
        for embedding in embeddings {
            if embedding.len() != dimensions {
                return Err(RagError::InvalidArgument(format!(
                    "embedding dimension {} does not match index dimension {dimensions}",
                    embedding.len()
                )));
            }
        }

        let tx = self.conn.transaction()?;

        for (chunk, embedding) in chunks.iter().zip(embeddings) {
            tx.execute(
                "INSERT INTO chunks (document_id, position, content, start_offset) VALUES (?, ?, ?, ?)",
                params![
                    document_id,
                    chunk.position as i64,
                    chunk.text,
                    chunk.start_offset as i64
                ],
            )?;
            let chunk_id = tx.last_insert_rowid();

            let vector_blob = serialize_vector(embedding);
            tx.execute(
                "INSERT INTO vec_chunks (rowid, embedding) VALUES (?, ?)",
                params![chunk_id, vector_blob],
            )?;
        }

        tx.commit()?;
        Ok(())
    }

    /// Roll back a failed ingestion: remove every chunk already written for
    /// the document and mark it `Failed`. The document row stays so callers
    /// can observe the failure via status.
    pub fn rollback_document(&mut self, document_id: &str) -> Result<()> {
        let tx = self.conn.transaction()?;

        tx.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
            params![document_id],
        )?;
        tx.execute(
            "DELETE FROM chunks WHERE document_id = ?",
            params![document_id],
        )?;
        tx.execute(
            "UPDATE documents SET state = 'failed' WHERE id = ?",
            params![document_id],
        )?;

        tx.commit()?;
        Ok(())
    }

    /// Fetch a single document record.
    pub fn get_document(&self, document_id: &str) -> Result<Option<DocumentRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, state, uploaded_at, indexed_at FROM documents WHERE id = ?",
                params![document_id],
                map_document_row,
            )
            .optional()?;
        Ok(record)
    }

    /// List all documents, most recently uploaded first.
    pub fn list_documents(&self) -> Result<Vec<DocumentRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, state, uploaded_at, indexed_at FROM documents ORDER BY uploaded_at DESC",
        )?;
        let rows = stmt.query_map([], map_document_row)?;

        let mut docs = Vec::new();
        for row in rows {
            docs.push(row?);
        }
        Ok(docs)
    }

    /// Delete a document and its associated chunks from the index.
    pub fn delete_document(&self, document_id: &str) -> Result<bool> {
        let exists: Option<String> = self
            .conn
            .query_row(
                "SELECT id FROM documents WHERE id = ?",
                params![document_id],
                |row| row.get(0),
            )
            .optional()?;

        if exists.is_none() {
            return Ok(false);
        }

        // Virtual table cascade deletion workaround
        self.conn.execute(
            "DELETE FROM vec_chunks WHERE rowid IN (SELECT id FROM chunks WHERE document_id = ?)",
            params![document_id],
        )?;

        // Cascade deletes chunks
        let rows = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?", params![document_id])?;
        Ok(rows > 0)
    }
}
