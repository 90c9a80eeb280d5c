//! Storage traits and error types
//!
//! This module defines the trait interfaces for storage backends and
//! associated error types.

use crate::chunker::Chunk;
use crate::index::RetrievalKey;
use crate::storage::{Document, IngestEvent, LogRecord, StoredEntry};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Document not found: {0}")]
    DocumentNotFound(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Storage lock poisoned")]
    Poisoned,
}

impl From<serde_json::Error> for StorageError {
    fn from(e: serde_json::Error) -> Self {
        StorageError::Serialization(e.to_string())
    }
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Persistence for extracted documents
///
/// Saving an existing id overwrites the whole record.
pub trait ContentStore {
    // ===== Documents =====

    /// Inserts or overwrites a document
    fn save(&mut self, document: &Document) -> StorageResult<()>;

    /// Gets a document by id
    fn load(&self, id: &str) -> StorageResult<Option<Document>>;

    /// Gets every document, ordered by id
    fn list_all(&self) -> StorageResult<Vec<Document>>;

    /// Deletes a document and its index entries
    ///
    /// # Returns
    ///
    /// `true` if a document was removed
    fn delete(&mut self, id: &str) -> StorageResult<bool>;

    /// Counts stored documents
    fn count_documents(&self) -> StorageResult<usize>;

    // ===== Ingest Log =====

    /// Appends an ingest event
    fn log_event(&mut self, url: &str, event: IngestEvent, detail: Option<&str>)
        -> StorageResult<()>;

    /// Gets the most recent events, newest first
    fn recent_events(&self, limit: usize) -> StorageResult<Vec<LogRecord>>;

    /// Counts logged events of one kind
    fn count_events(&self, event: IngestEvent) -> StorageResult<usize>;
}

/// Persistence for chunks and their retrieval keys
pub trait IndexStore {
    // ===== Entries =====

    /// Inserts or overwrites a single entry
    fn upsert_entry(&mut self, chunk: &Chunk, key: &RetrievalKey) -> StorageResult<()>;

    /// Replaces every entry of a document in one transaction
    ///
    /// # Returns
    ///
    /// The number of entries removed
    fn replace_entries(
        &mut self,
        document_id: &str,
        entries: &[(Chunk, RetrievalKey)],
    ) -> StorageResult<usize>;

    /// Removes every entry of a document
    fn remove_entries(&mut self, document_id: &str) -> StorageResult<usize>;

    /// Loads all entries of one key kind, ordered by chunk id
    fn load_entries(&self, key_kind: &str) -> StorageResult<Vec<StoredEntry>>;

    /// Counts entries, optionally for one document
    fn count_entries(&self, document_id: Option<&str>) -> StorageResult<usize>;

    /// Counts entries grouped by key kind
    fn count_entries_by_kind(&self) -> StorageResult<Vec<(String, usize)>>;

    // ===== Meta =====

    /// Gets a metadata value
    fn get_meta(&self, key: &str) -> StorageResult<Option<String>>;

    /// Sets a metadata value
    fn set_meta(&mut self, key: &str, value: &str) -> StorageResult<()>;
}
