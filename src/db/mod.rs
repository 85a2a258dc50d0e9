//! Vector index module using SQLite and sqlite-vec
use rusqlite::{Connection, Result};
use sqlite_vec::sqlite3_vec_init;
use std::path::Path;
use std::sync::Once;
use tracing::info;

pub mod documents;
pub mod search;

/// Schema with the embedding dimensionality fixed at open time. Every
/// vector in the index shares this dimension; mismatches are rejected on
/// insert.
fn schema_sql(dimensions: usize) -> String {
    format!(
        r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    state TEXT NOT NULL,
    uploaded_at DATETIME NOT NULL,
    indexed_at DATETIME
);

CREATE TABLE IF NOT EXISTS chunks (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    document_id TEXT NOT NULL,
    position INTEGER NOT NULL,
    content TEXT NOT NULL,
    start_offset INTEGER NOT NULL,
    FOREIGN KEY (document_id) REFERENCES documents(id) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_document_id ON chunks(document_id);

CREATE VIRTUAL TABLE IF NOT EXISTS vec_chunks USING vec0(
    embedding FLOAT[{dimensions}]
);
"#
    )
}

static INIT_VEC: Once = Once::new();

/// Initialize the sqlite-vec extension. Safe to call multiple times.
fn init_sqlite_vec() {
    INIT_VEC.call_once(|| unsafe {
        rusqlite::ffi::sqlite3_auto_extension(Some(std::mem::transmute(
            sqlite3_vec_init as *const (),
        )));
    });
}

/// A wrapper around a SQLite connection initialized with sqlite-vec and the
/// application schema.
pub struct Db {
    pub(crate) conn: Connection,
    dimensions: usize,
}

impl Db {
    /// Open a database connection at the given path and initialize the schema.
    pub fn open<P: AsRef<Path>>(path: P, dimensions: usize) -> Result<Self> {
        let path = path.as_ref();
        info!("Initializing database: {}", path.display());

        // Register sqlite-vec extension globally
        init_sqlite_vec();

        let conn = Connection::open(path)?;

        // Verify sqlite-vec is loaded
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);

        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql(dimensions))?;

        info!("Database initialized successfully");

        Ok(Self { conn, dimensions })
    }

    /// Open an in-memory database connection (useful for testing).
    pub fn open_in_memory(dimensions: usize) -> Result<Self> {
        init_sqlite_vec();
        let conn = Connection::open_in_memory()?;
        let vec_version: String = conn.query_row("SELECT vec_version()", [], |row| row.get(0))?;
        info!("sqlite-vec version: {}", vec_version);
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(&schema_sql(dimensions))?;
        Ok(Self { conn, dimensions })
    }

    /// The fixed embedding dimensionality of this index.
    #[must_use]
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }
}

/// Helper to serialize a float32 vector into bytes for vec0 virtual table
pub fn serialize_vector(vec: &[f32]) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(vec.len() * 4);
    for v in vec {
        bytes.extend_from_slice(&v.to_le_bytes());
    }
    bytes
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_db_init() {
        let db = Db::open_in_memory(384).expect("Failed to open in-memory DB");
        assert_eq!(db.dimensions(), 384);

        let tables: usize = db
            .conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name IN ('documents', 'chunks', 'vec_chunks');",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 3);
    }

    #[test]
    fn test_custom_dimensions() {
        let db = Db::open_in_memory(512).unwrap();
        assert_eq!(db.dimensions(), 512);
    }

    #[test]
    fn test_serialize_vector() {
        let vec = vec![1.0, 2.0, -3.5];
        let bytes = serialize_vector(&vec);
        assert_eq!(bytes.len(), 12);

        // 1.0f32 in hex: 0x3f800000 -> little endian: 00 00 80 3f
        assert_eq!(&bytes[0..4], &[0x00, 0x00, 0x80, 0x3f]);
        // 2.0f32 in hex: 0x40000000 -> little endian: 00 00 00 40
        assert_eq!(&bytes[4..8], &[0x00, 0x00, 0x00, 0x40]);
        // -3.5f32 in hex: 0xc0600000 -> little endian: 00 00 60 c0
        assert_eq!(&bytes[8..12], &[0x00, 0x00, 0x60, 0xc0]);
    }
}
