//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Docent database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Extracted documents, keyed by the hash of their normalized URL
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY,
    source_url TEXT NOT NULL UNIQUE,
    title TEXT,
    content_type TEXT NOT NULL,
    text TEXT NOT NULL,
    checksum TEXT NOT NULL,
    discovered_from TEXT,
    depth INTEGER NOT NULL DEFAULT 0,
    fetched_at TEXT NOT NULL
);

-- Chunks and their retrieval keys
CREATE TABLE IF NOT EXISTS chunks (
    id TEXT PRIMARY KEY,
    document_id TEXT NOT NULL REFERENCES documents(id) ON DELETE CASCADE,
    sequence_index INTEGER NOT NULL,
    start_offset INTEGER NOT NULL,
    end_offset INTEGER NOT NULL,
    text TEXT NOT NULL,
    key_kind TEXT NOT NULL,
    key_data TEXT NOT NULL,
    UNIQUE(document_id, sequence_index)
);

-- Small key/value settings such as the index fingerprint
CREATE TABLE IF NOT EXISTS meta (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL
);

-- Audit trail of ingest decisions
CREATE TABLE IF NOT EXISTS ingest_log (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    url TEXT NOT NULL,
    event TEXT NOT NULL,
    detail TEXT,
    logged_at TEXT NOT NULL
);

-- Indexes for performance
CREATE INDEX IF NOT EXISTS idx_chunks_document ON chunks(document_id);
CREATE INDEX IF NOT EXISTS idx_chunks_kind ON chunks(key_kind);
CREATE INDEX IF NOT EXISTS idx_ingest_log_event ON ingest_log(event);
"#;

/// Initializes the database schema
///
/// Creates all tables and indexes if they don't already exist.
///
/// # Arguments
///
/// * `conn` - The SQLite connection
///
/// # Returns
///
/// * `Ok(())` - Schema initialized successfully
/// * `Err(rusqlite::Error)` - Failed to initialize schema
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
