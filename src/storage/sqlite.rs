//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the `ContentStore`
//! and `IndexStore` traits.

use crate::chunker::Chunk;
use crate::index::RetrievalKey;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{ContentStore, IndexStore, StorageError, StorageResult};
use crate::storage::{Document, IngestEvent, LogRecord, StoredEntry};
use chrono::{DateTime, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use std::path::Path;

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Creates a new SqliteStorage instance
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    ///
    /// # Returns
    ///
    /// * `Ok(SqliteStorage)` - Successfully opened/created database
    /// * `Err(StorageError)` - Failed to open database
    pub fn new(path: &Path) -> Result<Self, StorageError> {
        let conn = Connection::open(path)?;

        // Configure SQLite for better performance
        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
            PRAGMA temp_store = MEMORY;
            PRAGMA mmap_size = 268435456;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database
    pub fn new_in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

const DOCUMENT_COLUMNS: &str =
    "id, source_url, title, content_type, text, checksum, discovered_from, depth, fetched_at";

fn row_to_document(row: &Row<'_>) -> rusqlite::Result<Document> {
    let fetched_at: String = row.get(8)?;
    let fetched_at = DateTime::parse_from_rfc3339(&fetched_at)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(8, Type::Text, Box::new(e)))?;

    Ok(Document {
        id: row.get(0)?,
        source_url: row.get(1)?,
        title: row.get(2)?,
        content_type: row.get(3)?,
        text: row.get(4)?,
        checksum: row.get(5)?,
        discovered_from: row.get(6)?,
        depth: row.get(7)?,
        fetched_at,
    })
}

fn insert_entry(conn: &Connection, chunk: &Chunk, key: &RetrievalKey) -> StorageResult<()> {
    let key_data = serde_json::to_string(key)?;
    conn.execute(
        "INSERT INTO chunks (id, document_id, sequence_index, start_offset, end_offset, text, key_kind, key_data)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
         ON CONFLICT(id) DO UPDATE SET
            document_id = excluded.document_id,
            sequence_index = excluded.sequence_index,
            start_offset = excluded.start_offset,
            end_offset = excluded.end_offset,
            text = excluded.text,
            key_kind = excluded.key_kind,
            key_data = excluded.key_data",
        params![
            chunk.id,
            chunk.document_id,
            chunk.sequence_index as i64,
            chunk.start_offset as i64,
            chunk.end_offset as i64,
            chunk.text,
            key.kind(),
            key_data,
        ],
    )?;
    Ok(())
}

impl ContentStore for SqliteStorage {
    // ===== Documents =====

    fn save(&mut self, document: &Document) -> StorageResult<()> {
        // Upsert rather than REPLACE so the cascade never wipes the chunks
        self.conn.execute(
            "INSERT INTO documents (id, source_url, title, content_type, text, checksum, discovered_from, depth, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(id) DO UPDATE SET
                source_url = excluded.source_url,
                title = excluded.title,
                content_type = excluded.content_type,
                text = excluded.text,
                checksum = excluded.checksum,
                discovered_from = excluded.discovered_from,
                depth = excluded.depth,
                fetched_at = excluded.fetched_at",
            params![
                document.id,
                document.source_url,
                document.title,
                document.content_type,
                document.text,
                document.checksum,
                document.discovered_from,
                document.depth,
                document.fetched_at.to_rfc3339(),
            ],
        )?;
        Ok(())
    }

    fn load(&self, id: &str) -> StorageResult<Option<Document>> {
        let sql = format!("SELECT {} FROM documents WHERE id = ?1", DOCUMENT_COLUMNS);
        let document = self
            .conn
            .query_row(&sql, params![id], row_to_document)
            .optional()?;
        Ok(document)
    }

    fn list_all(&self) -> StorageResult<Vec<Document>> {
        let sql = format!("SELECT {} FROM documents ORDER BY id", DOCUMENT_COLUMNS);
        let mut stmt = self.conn.prepare(&sql)?;
        let documents = stmt
            .query_map([], row_to_document)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(documents)
    }

    fn delete(&mut self, id: &str) -> StorageResult<bool> {
        let removed = self
            .conn
            .execute("DELETE FROM documents WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn count_documents(&self) -> StorageResult<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM documents", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    // ===== Ingest Log =====

    fn log_event(
        &mut self,
        url: &str,
        event: IngestEvent,
        detail: Option<&str>,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO ingest_log (url, event, detail, logged_at) VALUES (?1, ?2, ?3, ?4)",
            params![url, event.to_db_string(), detail, now],
        )?;
        Ok(())
    }

    fn recent_events(&self, limit: usize) -> StorageResult<Vec<LogRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, url, event, detail, logged_at FROM ingest_log ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(id, url, event, detail, logged_at)| {
                let event = IngestEvent::from_db_string(&event).ok_or_else(|| {
                    StorageError::Serialization(format!("Unknown ingest event: {}", event))
                })?;
                Ok(LogRecord {
                    id,
                    url,
                    event,
                    detail,
                    logged_at,
                })
            })
            .collect()
    }

    fn count_events(&self, event: IngestEvent) -> StorageResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM ingest_log WHERE event = ?1",
            params![event.to_db_string()],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

impl IndexStore for SqliteStorage {
    // ===== Entries =====

    fn upsert_entry(&mut self, chunk: &Chunk, key: &RetrievalKey) -> StorageResult<()> {
        insert_entry(&self.conn, chunk, key)
    }

    fn replace_entries(
        &mut self,
        document_id: &str,
        entries: &[(Chunk, RetrievalKey)],
    ) -> StorageResult<usize> {
        let tx = self.conn.transaction()?;

        let removed = tx.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )?;

        for (chunk, key) in entries {
            if chunk.document_id != document_id {
                return Err(StorageError::Database(format!(
                    "Chunk {} does not belong to document {}",
                    chunk.id, document_id
                )));
            }
            insert_entry(&tx, chunk, key)?;
        }

        tx.commit()?;
        Ok(removed)
    }

    fn remove_entries(&mut self, document_id: &str) -> StorageResult<usize> {
        let removed = self.conn.execute(
            "DELETE FROM chunks WHERE document_id = ?1",
            params![document_id],
        )?;
        Ok(removed)
    }

    fn load_entries(&self, key_kind: &str) -> StorageResult<Vec<StoredEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT c.id, c.document_id, c.sequence_index, c.start_offset, c.end_offset, c.text,
                    c.key_data, d.source_url, d.title
             FROM chunks c
             JOIN documents d ON d.id = c.document_id
             WHERE c.key_kind = ?1
             ORDER BY c.id",
        )?;

        let rows = stmt
            .query_map(params![key_kind], |row| {
                Ok((
                    Chunk {
                        id: row.get(0)?,
                        document_id: row.get(1)?,
                        sequence_index: row.get::<_, i64>(2)? as usize,
                        start_offset: row.get::<_, i64>(3)? as usize,
                        end_offset: row.get::<_, i64>(4)? as usize,
                        text: row.get(5)?,
                    },
                    row.get::<_, String>(6)?,
                    row.get::<_, String>(7)?,
                    row.get::<_, Option<String>>(8)?,
                ))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter()
            .map(|(chunk, key_data, source_url, title)| {
                Ok(StoredEntry {
                    chunk,
                    key: serde_json::from_str(&key_data)?,
                    source_url,
                    title,
                })
            })
            .collect()
    }

    fn count_entries(&self, document_id: Option<&str>) -> StorageResult<usize> {
        let count: i64 = match document_id {
            Some(id) => self.conn.query_row(
                "SELECT COUNT(*) FROM chunks WHERE document_id = ?1",
                params![id],
                |row| row.get(0),
            )?,
            None => self
                .conn
                .query_row("SELECT COUNT(*) FROM chunks", [], |row| row.get(0))?,
        };
        Ok(count as usize)
    }

    fn count_entries_by_kind(&self) -> StorageResult<Vec<(String, usize)>> {
        let mut stmt = self.conn.prepare(
            "SELECT key_kind, COUNT(*) FROM chunks GROUP BY key_kind ORDER BY key_kind",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let count: i64 = row.get(1)?;
                Ok((row.get::<_, String>(0)?, count as usize))
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    // ===== Meta =====

    fn get_meta(&self, key: &str) -> StorageResult<Option<String>> {
        let value = self
            .conn
            .query_row(
                "SELECT value FROM meta WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set_meta(&mut self, key: &str, value: &str) -> StorageResult<()> {
        self.conn.execute(
            "INSERT INTO meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            params![key, value],
        )?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use std::collections::BTreeMap;
    use url::Url;

    fn document(path: &str, text: &str) -> Document {
        let url = Url::parse(&format!("https://example.com/{}", path)).unwrap();
        Document::new(&url, Some(path.to_string()), text.to_string(), "text/plain", None, 0)
    }

    fn terms(word: &str) -> RetrievalKey {
        RetrievalKey::Terms(BTreeMap::from([(word.to_string(), 1)]))
    }

    #[test]
    fn test_create_in_memory() {
        let storage = SqliteStorage::new_in_memory();
        assert!(storage.is_ok());
    }

    #[test]
    fn test_save_and_load_document() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "alpha");
        storage.save(&doc).unwrap();

        let loaded = storage.load(&doc.id).unwrap().unwrap();
        assert_eq!(loaded.source_url, doc.source_url);
        assert_eq!(loaded.checksum, doc.checksum);
        assert_eq!(loaded.fetched_at.timestamp(), doc.fetched_at.timestamp());
        assert!(storage.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_existing_document() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "first");
        storage.save(&doc).unwrap();

        let mut changed = document("a.txt", "second");
        changed.title = None;
        storage.save(&changed).unwrap();

        let loaded = storage.load(&doc.id).unwrap().unwrap();
        assert_eq!(loaded.text, "second");
        assert_eq!(loaded.title, None);
        assert_eq!(storage.count_documents().unwrap(), 1);
    }

    #[test]
    fn test_save_keeps_existing_chunks() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "alpha beta");
        storage.save(&doc).unwrap();
        let chunks = chunk(&doc.id, &doc.text, 5, 1).unwrap();
        storage.upsert_entry(&chunks[0], &terms("alpha")).unwrap();

        storage.save(&doc).unwrap();
        assert_eq!(storage.count_entries(Some(&doc.id)).unwrap(), 1);
    }

    #[test]
    fn test_list_all_is_ordered_by_id() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        for path in ["c.txt", "a.txt", "b.txt"] {
            storage.save(&document(path, path)).unwrap();
        }

        let ids: Vec<String> = storage.list_all().unwrap().into_iter().map(|d| d.id).collect();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        assert_eq!(ids.len(), 3);
    }

    #[test]
    fn test_delete_cascades_to_chunks() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "alpha beta gamma");
        storage.save(&doc).unwrap();
        for c in chunk(&doc.id, &doc.text, 6, 2).unwrap() {
            storage.upsert_entry(&c, &terms("alpha")).unwrap();
        }
        assert!(storage.count_entries(None).unwrap() > 0);

        assert!(storage.delete(&doc.id).unwrap());
        assert_eq!(storage.count_entries(None).unwrap(), 0);
        assert!(!storage.delete(&doc.id).unwrap());
    }

    #[test]
    fn test_replace_entries_swaps_all_chunks() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "0123456789");
        storage.save(&doc).unwrap();

        let old: Vec<_> = chunk(&doc.id, &doc.text, 4, 1)
            .unwrap()
            .into_iter()
            .map(|c| (c, terms("old")))
            .collect();
        storage.replace_entries(&doc.id, &old).unwrap();
        assert_eq!(storage.count_entries(Some(&doc.id)).unwrap(), old.len());

        let new: Vec<_> = chunk(&doc.id, "short", 4, 1)
            .unwrap()
            .into_iter()
            .map(|c| (c, terms("new")))
            .collect();
        let removed = storage.replace_entries(&doc.id, &new).unwrap();
        assert_eq!(removed, old.len());

        let entries = storage.load_entries("terms").unwrap();
        assert_eq!(entries.len(), new.len());
        assert!(entries.iter().all(|e| e.key == terms("new")));
    }

    #[test]
    fn test_replace_entries_rolls_back_on_foreign_chunk() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "alpha");
        storage.save(&doc).unwrap();
        let original = chunk(&doc.id, &doc.text, 4, 1).unwrap();
        storage
            .replace_entries(&doc.id, &[(original[0].clone(), terms("alpha"))])
            .unwrap();

        let foreign = chunk("someone-else", "text", 4, 1).unwrap();
        let result = storage.replace_entries(&doc.id, &[(foreign[0].clone(), terms("x"))]);
        assert!(result.is_err());
        assert_eq!(storage.count_entries(Some(&doc.id)).unwrap(), 1);
    }

    #[test]
    fn test_load_entries_filters_by_kind_and_joins_documents() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let doc = document("a.txt", "alpha beta");
        storage.save(&doc).unwrap();
        let chunks = chunk(&doc.id, &doc.text, 5, 1).unwrap();
        storage.upsert_entry(&chunks[0], &terms("alpha")).unwrap();
        storage
            .upsert_entry(&chunks[1], &RetrievalKey::Vector(vec![0.5, 0.25]))
            .unwrap();

        let lexical = storage.load_entries("terms").unwrap();
        assert_eq!(lexical.len(), 1);
        assert_eq!(lexical[0].source_url, doc.source_url);
        assert_eq!(lexical[0].title.as_deref(), Some("a.txt"));

        let dense = storage.load_entries("vector").unwrap();
        assert_eq!(dense[0].key, RetrievalKey::Vector(vec![0.5, 0.25]));
    }

    #[test]
    fn test_meta_roundtrip() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        assert_eq!(storage.get_meta("index_fingerprint").unwrap(), None);
        storage.set_meta("index_fingerprint", "abc").unwrap();
        storage.set_meta("index_fingerprint", "def").unwrap();
        assert_eq!(
            storage.get_meta("index_fingerprint").unwrap().as_deref(),
            Some("def")
        );
    }

    #[test]
    fn test_ingest_log() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        storage
            .log_event("https://example.com/a.pdf", IngestEvent::FoundDocument, None)
            .unwrap();
        storage
            .log_event(
                "https://example.com/a.pdf",
                IngestEvent::Skipped,
                Some("unsupported content type"),
            )
            .unwrap();

        assert_eq!(storage.count_events(IngestEvent::Skipped).unwrap(), 1);
        let recent = storage.recent_events(10).unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].event, IngestEvent::Skipped);
        assert_eq!(recent[0].detail.as_deref(), Some("unsupported content type"));
    }

    #[test]
    fn test_file_database_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("docent.db");
        let doc = document("a.txt", "alpha");
        {
            let mut storage = SqliteStorage::new(&path).unwrap();
            storage.save(&doc).unwrap();
        }
        let storage = SqliteStorage::new(&path).unwrap();
        assert!(storage.load(&doc.id).unwrap().is_some());
    }
}
