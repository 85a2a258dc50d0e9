//! Similarity search over the vector index with document scoping.
use super::{Db, serialize_vector};
use crate::error::{RagError, Result};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

/// The subset of indexed documents a query is restricted to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scope {
    /// Every `Ready` document in the index.
    Corpus,
    /// A single document by id.
    Document(String),
}

impl Scope {
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Scope::Corpus => "corpus".to_string(),
            Scope::Document(id) => id.clone(),
        }
    }
}

/// A retrieved chunk with its similarity score, descending by score in
/// search results.
#[derive(Debug, Clone, Serialize)]
pub struct RetrievedChunk {
    pub document_id: String,
    pub chunk_id: i64,
    pub position: usize,
    pub start_offset: usize,
    pub content: String,
    pub similarity: f64,
}

fn map_search_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RetrievedChunk> {
    let distance: f64 = row.get(5)?;
    let similarity = 1.0 - (distance / 2.0);

    Ok(RetrievedChunk {
        document_id: row.get(0)?,
        chunk_id: row.get(1)?,
        position: row.get::<_, i64>(2)? as usize,
        start_offset: row.get::<_, i64>(3)? as usize,
        content: row.get(4)?,
        similarity,
    })
}

impl Db {
    /// Perform vector similarity search using cosine distance.
    ///
    /// Both scopes only see `Ready` documents, so chunks of an in-flight
    /// or rolled-back ingestion never appear in results; callers surface
    /// the not-ready case as an error before interpreting emptiness. An
    /// empty result is not an error.
    pub fn search(
        &self,
        query_vector: &[f32],
        top_k: usize,
        scope: &Scope,
    ) -> Result<Vec<RetrievedChunk>> {
        if top_k < 1 {
            return Err(RagError::InvalidArgument(
                "top_k must be at least 1".to_string(),
            ));
        }
        if query_vector.len() != self.dimensions() {
            return Err(RagError::InvalidArgument(format!(
                "query vector dimension {} does not match index dimension {}",
                query_vector.len(),
                self.dimensions()
            )));
        }

        let mut query = String::from(
            r#"
            SELECT
                c.document_id,
                c.id as chunk_id,
                c.position,
                c.start_offset,
                c.content,
                vec_distance_cosine(v.embedding, ?) as distance
            FROM vec_chunks v
            JOIN chunks c ON v.rowid = c.id
            JOIN documents d ON c.document_id = d.id
            "#,
        );

        let mut params: Vec<Value> = vec![Value::Blob(serialize_vector(query_vector))];

        match scope {
            Scope::Corpus => {
                query.push_str(" WHERE d.state = 'ready'");
            }
            Scope::Document(id) => {
                query.push_str(" WHERE c.document_id = ? AND d.state = 'ready'");
                params.push(Value::Text(id.clone()));
            }
        }

        query.push_str(" ORDER BY distance ASC LIMIT ?");
        params.push(Value::Integer(top_k as i64));

        let param_refs: Vec<&dyn rusqlite::ToSql> =
            params.iter().map(|p| p as &dyn rusqlite::ToSql).collect();

        let mut stmt = self.conn.prepare(&query)?;
        let rows = stmt.query_map(param_refs.as_slice(), map_search_row)?;

        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }

        Ok(results)
    }

    /// Number of indexed chunks visible to a scope.
    pub fn chunk_count_in_scope(&self, scope: &Scope) -> Result<usize> {
        let count: i64 = match scope {
            Scope::Corpus => self.conn.query_row(
                "SELECT COUNT(*) FROM chunks c JOIN documents d ON c.document_id = d.id WHERE d.state = 'ready'",
                [],
                |row| row.get(0),
            )?,
            Scope::Document(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE document_id = ?",
                rusqlite::params![id],
                |row| row.get(0),
            )?,
        };
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::ChunkCandidate;
    use chrono::Utc;

    fn ingest(db: &mut Db, id: &str, contents: &[&str], base: f32) {
        db.begin_ingestion(id, Utc::now()).unwrap();
        let chunks: Vec<ChunkCandidate> = contents
            .iter()
            .enumerate()
            .map(|(i, text)| ChunkCandidate {
                position: i,
                start_offset: i * 100,
                text: (*text).to_string(),
            })
            .collect();
        let embeddings: Vec<Vec<f32>> = (0..contents.len())
            .map(|i| {
                let mut v = vec![0.0f32; 4];
                v[0] = base;
                v[1] = 0.1 * (i as f32 + 1.0);
                v
            })
            .collect();
        db.insert_chunks(id, &chunks, &embeddings).unwrap();
        db.mark_document_ready(id).unwrap();
    }

    #[test]
    fn test_search_orders_by_similarity() {
        let mut db = Db::open_in_memory(4).unwrap();
        ingest(&mut db, "a", &["close match", "further match"], 1.0);

        let query = {
            let mut v = vec![0.0f32; 4];
            v[0] = 1.0;
            v[1] = 0.1;
            v
        };
        let results = db.search(&query, 5, &Scope::Corpus).unwrap();
        assert_eq!(results.len(), 2);
        assert_eq!(results[0].content, "close match");
        assert!(results[0].similarity >= results[1].similarity);
        assert!(results[0].similarity > 0.99);
    }

    #[test]
    fn test_search_scope_isolation() {
        let mut db = Db::open_in_memory(4).unwrap();
        ingest(&mut db, "doc-a", &["alpha text"], 1.0);
        ingest(&mut db, "doc-b", &["beta text"], -1.0);

        let query = vec![1.0f32, 0.0, 0.0, 0.0];
        let scoped = db
            .search(&query, 10, &Scope::Document("doc-a".to_string()))
            .unwrap();
        assert_eq!(scoped.len(), 1);
        assert!(scoped.iter().all(|r| r.document_id == "doc-a"));

        let all = db.search(&query, 10, &Scope::Corpus).unwrap();
        assert_eq!(all.len(), 2);
    }

    #[test]
    fn test_corpus_scope_skips_non_ready_documents() {
        let mut db = Db::open_in_memory(4).unwrap();
        ingest(&mut db, "ready-doc", &["visible"], 1.0);

        // A document mid-ingestion with chunks written but not yet ready
        db.begin_ingestion("pending-doc", Utc::now()).unwrap();
        db.insert_chunks(
            "pending-doc",
            &[ChunkCandidate {
                position: 0,
                start_offset: 0,
                text: "hidden".to_string(),
            }],
            &[vec![1.0, 0.0, 0.0, 0.0]],
        )
        .unwrap();

        let query = vec![1.0f32, 0.0, 0.0, 0.0];
        let results = db.search(&query, 10, &Scope::Corpus).unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, "ready-doc");

        // Document scope hides them too until ingestion completes
        let results = db
            .search(&query, 10, &Scope::Document("pending-doc".to_string()))
            .unwrap();
        assert!(results.is_empty());

        db.mark_document_ready("pending-doc").unwrap();
        let results = db
            .search(&query, 10, &Scope::Document("pending-doc".to_string()))
            .unwrap();
        assert_eq!(results.len(), 1);
    }

    #[test]
    fn test_empty_scope_returns_empty_not_error() {
        let db = Db::open_in_memory(4).unwrap();
        let query = vec![1.0f32, 0.0, 0.0, 0.0];
        let results = db
            .search(&query, 5, &Scope::Document("missing".to_string()))
            .unwrap();
        assert!(results.is_empty());
    }

    #[test]
    fn test_invalid_top_k() {
        let db = Db::open_in_memory(4).unwrap();
        let err = db
            .search(&[0.0; 4], 0, &Scope::Corpus)
            .unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[test]
    fn test_query_dimension_mismatch() {
        let db = Db::open_in_memory(4).unwrap();
        let err = db.search(&[0.0; 8], 5, &Scope::Corpus).unwrap_err();
        assert!(matches!(err, RagError::InvalidArgument(_)));
    }

    #[test]
    fn test_chunk_count_in_scope() {
        let mut db = Db::open_in_memory(4).unwrap();
        assert_eq!(db.chunk_count_in_scope(&Scope::Corpus).unwrap(), 0);

        ingest(&mut db, "doc", &["one", "two", "three"], 1.0);
        assert_eq!(db.chunk_count_in_scope(&Scope::Corpus).unwrap(), 3);
        assert_eq!(
            db.chunk_count_in_scope(&Scope::Document("doc".to_string()))
                .unwrap(),
            3
        );
        assert_eq!(
            db.chunk_count_in_scope(&Scope::Document("other".to_string()))
                .unwrap(),
            0
        );
    }
}
