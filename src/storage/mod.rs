//! Storage module for persisting documents and the index
//!
//! This module handles all database operations, including:
//! - SQLite database initialization and schema management
//! - Document persistence (the content store)
//! - Chunk and retrieval-key persistence (the index store)
//! - Index fingerprint and ingest event log

mod schema;
mod sqlite;
mod traits;

pub use sqlite::SqliteStorage;
pub use traits::{ContentStore, IndexStore, StorageError, StorageResult};

use crate::chunker::Chunk;
use crate::index::RetrievalKey;
use chrono::{DateTime, Utc};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use url::Url;

/// File name of the database inside the output directory
pub const DATABASE_FILE: &str = "docent.db";

/// Opens (creating if needed) the database under `output_dir`
///
/// # Arguments
///
/// * `output_dir` - Directory holding the database file
///
/// # Returns
///
/// * `Ok(SqliteStorage)` - Successfully initialized storage
/// * `Err(StorageError)` - Failed to create the directory or open the database
pub fn open_storage(output_dir: &Path) -> Result<SqliteStorage, StorageError> {
    std::fs::create_dir_all(output_dir)?;
    SqliteStorage::new(&database_path(output_dir))
}

/// Returns the database path for an output directory
pub fn database_path(output_dir: &Path) -> PathBuf {
    output_dir.join(DATABASE_FILE)
}

/// Derives the document id from a normalized URL
///
/// # Example
///
/// ```
/// use docent::storage::document_id_for;
/// use url::Url;
///
/// let id = document_id_for(&Url::parse("https://example.com/a.pdf").unwrap());
/// assert_eq!(id.len(), 64);
/// ```
pub fn document_id_for(url: &Url) -> String {
    hex::encode(Sha256::digest(url.as_str().as_bytes()))
}

/// Computes the checksum of extracted text
pub fn text_checksum(text: &str) -> String {
    hex::encode(Sha256::digest(text.as_bytes()))
}

/// Represents an extracted document in the database
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub source_url: String,
    pub title: Option<String>,
    pub text: String,
    pub content_type: String,
    pub checksum: String,
    pub discovered_from: Option<String>,
    pub depth: u32,
    pub fetched_at: DateTime<Utc>,
}

impl Document {
    /// Builds a document fetched now, deriving its id and checksum
    pub fn new(
        source_url: &Url,
        title: Option<String>,
        text: String,
        content_type: &str,
        discovered_from: Option<&Url>,
        depth: u32,
    ) -> Self {
        Self {
            id: document_id_for(source_url),
            source_url: source_url.to_string(),
            title,
            checksum: text_checksum(&text),
            text,
            content_type: content_type.to_string(),
            discovered_from: discovered_from.map(Url::to_string),
            depth,
            fetched_at: Utc::now(),
        }
    }

    /// Returns the title, or the last path segment of the URL
    pub fn display_title(&self) -> String {
        if let Some(title) = self.title.as_deref().filter(|t| !t.is_empty()) {
            return title.to_string();
        }
        Url::parse(&self.source_url)
            .ok()
            .and_then(|url| {
                url.path_segments()
                    .and_then(|mut segments| segments.next_back().map(str::to_string))
            })
            .filter(|segment| !segment.is_empty())
            .unwrap_or_else(|| self.source_url.clone())
    }
}

/// A stored chunk with its key and the owning document's attribution
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEntry {
    pub chunk: Chunk,
    pub key: RetrievalKey,
    pub source_url: String,
    pub title: Option<String>,
}

/// Kinds of ingest decisions recorded in the log
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestEvent {
    /// A document link was discovered by the crawler
    FoundDocument,
    /// The document's text did not change since the last ingest
    UnchangedSkip,
    /// The document is new or its text changed
    ChangedOrNew,
    /// The document's chunks were indexed
    Indexed,
    /// The document was skipped after an error
    Skipped,
}

impl IngestEvent {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::FoundDocument => "found_document",
            Self::UnchangedSkip => "unchanged_skip",
            Self::ChangedOrNew => "changed_or_new",
            Self::Indexed => "indexed",
            Self::Skipped => "skipped",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "found_document" => Some(Self::FoundDocument),
            "unchanged_skip" => Some(Self::UnchangedSkip),
            "changed_or_new" => Some(Self::ChangedOrNew),
            "indexed" => Some(Self::Indexed),
            "skipped" => Some(Self::Skipped),
            _ => None,
        }
    }
}

/// Represents one row of the ingest log
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub id: i64,
    pub url: String,
    pub event: IngestEvent,
    pub detail: Option<String>,
    pub logged_at: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingest_event_roundtrip() {
        for event in &[
            IngestEvent::FoundDocument,
            IngestEvent::UnchangedSkip,
            IngestEvent::ChangedOrNew,
            IngestEvent::Indexed,
            IngestEvent::Skipped,
        ] {
            let db_str = event.to_db_string();
            assert_eq!(Some(*event), IngestEvent::from_db_string(db_str));
        }
    }

    #[test]
    fn test_ingest_event_invalid() {
        assert_eq!(IngestEvent::from_db_string("invalid"), None);
    }

    #[test]
    fn test_document_id_is_stable_per_url() {
        let a = Url::parse("https://example.com/a.pdf").unwrap();
        let b = Url::parse("https://example.com/b.pdf").unwrap();
        assert_eq!(document_id_for(&a), document_id_for(&a.clone()));
        assert_ne!(document_id_for(&a), document_id_for(&b));
    }

    #[test]
    fn test_document_new_derives_fields() {
        let url = Url::parse("https://example.com/notes/genesis.pdf").unwrap();
        let page = Url::parse("https://example.com/notes").unwrap();
        let doc = Document::new(&url, None, "text".to_string(), "application/pdf", Some(&page), 1);

        assert_eq!(doc.id, document_id_for(&url));
        assert_eq!(doc.checksum, text_checksum("text"));
        assert_eq!(doc.discovered_from.as_deref(), Some("https://example.com/notes"));
        assert_eq!(doc.display_title(), "genesis.pdf");
    }

    #[test]
    fn test_open_storage_creates_directory() {
        let dir = tempfile::tempdir().unwrap();
        let output = dir.path().join("nested").join("data");
        let storage = open_storage(&output);
        assert!(storage.is_ok());
        assert!(database_path(&output).exists());
    }
}
