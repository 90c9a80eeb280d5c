//! Statistics generation from the content store
//!
//! This module provides functionality for extracting and displaying
//! index statistics from the storage layer.

use crate::index::FINGERPRINT_KEY;
use crate::storage::{ContentStore, IndexStore, IngestEvent, LogRecord, SqliteStorage, StorageError};
use std::collections::BTreeMap;

/// Number of recent log records shown by `stats`
const RECENT_EVENTS: usize = 10;

/// Index statistics summary
#[derive(Debug, Clone)]
pub struct IndexStatistics {
    /// Stored documents
    pub documents: usize,

    /// Indexed chunks, all key kinds
    pub chunks: usize,

    /// Indexed chunks by key kind
    pub chunks_by_kind: BTreeMap<String, usize>,

    /// Ingest log counts by event
    pub events: BTreeMap<&'static str, usize>,

    /// Most recent ingest log records, newest first
    pub recent: Vec<LogRecord>,

    /// Fingerprint of the parameters the index was built with
    pub fingerprint: Option<String>,
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The store to query
///
/// # Returns
///
/// * `Ok(IndexStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &SqliteStorage) -> Result<IndexStatistics, StorageError> {
    let chunks_by_kind = storage.count_entries_by_kind()?.into_iter().collect();

    let mut events = BTreeMap::new();
    for event in [
        IngestEvent::FoundDocument,
        IngestEvent::UnchangedSkip,
        IngestEvent::ChangedOrNew,
        IngestEvent::Indexed,
        IngestEvent::Skipped,
    ] {
        events.insert(event.to_db_string(), storage.count_events(event)?);
    }

    Ok(IndexStatistics {
        documents: storage.count_documents()?,
        chunks: storage.count_entries(None)?,
        chunks_by_kind,
        events,
        recent: storage.recent_events(RECENT_EVENTS)?,
        fingerprint: storage.get_meta(FINGERPRINT_KEY)?,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &IndexStatistics) {
    println!("=== Index Statistics ===\n");

    println!("Overview:");
    println!("  Documents: {}", stats.documents);
    println!("  Chunks: {}", stats.chunks);
    for (kind, count) in &stats.chunks_by_kind {
        println!("    {}: {}", kind, count);
    }
    match &stats.fingerprint {
        Some(fp) => println!("  Index fingerprint: {}", &fp[..fp.len().min(16)]),
        None => println!("  Index fingerprint: (never built)"),
    }
    println!();

    println!("Ingest Log:");
    for (event, count) in &stats.events {
        println!("  {}: {}", event, count);
    }
    println!();

    if !stats.recent.is_empty() {
        println!("Recent Events:");
        for record in &stats.recent {
            match &record.detail {
                Some(detail) => println!(
                    "  {} {} {} ({})",
                    record.logged_at,
                    record.event.to_db_string(),
                    record.url,
                    detail
                ),
                None => println!(
                    "  {} {} {}",
                    record.logged_at,
                    record.event.to_db_string(),
                    record.url
                ),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use crate::index::RetrievalKey;
    use crate::storage::Document;
    use url::Url;

    #[test]
    fn test_load_statistics() {
        let mut storage = SqliteStorage::new_in_memory().unwrap();
        let url = Url::parse("https://example.com/a.txt").unwrap();
        let doc = Document::new(&url, None, "Psalms of ascent".to_string(), "text/plain", None, 1);
        storage.save(&doc).unwrap();

        let chunks = chunk(&doc.id, &doc.text, 1000, 200).unwrap();
        let pairs: Vec<_> = chunks
            .into_iter()
            .map(|c| (c, RetrievalKey::Vector(vec![1.0, 0.0])))
            .collect();
        storage.replace_entries(&doc.id, &pairs).unwrap();
        storage
            .log_event(url.as_str(), IngestEvent::Indexed, Some("1 chunks"))
            .unwrap();

        let stats = load_statistics(&storage).unwrap();
        assert_eq!(stats.documents, 1);
        assert_eq!(stats.chunks, 1);
        assert_eq!(stats.chunks_by_kind.get("vector"), Some(&1));
        assert_eq!(stats.chunks_by_kind.get("terms"), None);
        assert_eq!(stats.events.get("indexed"), Some(&1));
        assert_eq!(stats.events.get("skipped"), Some(&0));
        assert_eq!(stats.recent.len(), 1);
        assert!(stats.fingerprint.is_none());
    }
}
