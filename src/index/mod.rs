//! Chunk indexing and retrieval
//!
//! The `Indexer` turns chunks into retrieval keys through the configured
//! `RetrievalStrategy`, persists them next to the chunk text and answers
//! top-k queries over the whole corpus.

mod dense;
mod embedder;
mod lexical;
mod strategy;
mod tokenize;

pub use dense::{cosine, DenseStrategy};
pub use embedder::{Embedder, HashingEmbedder, OpenAiEmbedder, API_KEY_ENV};
pub use lexical::LexicalStrategy;
pub use strategy::RetrievalStrategy;
pub use tokenize::{term_counts, tokenize};

use crate::chunker::Chunk;
use crate::config::{Config, EmbedderKind, IndexConfig, StrategyKind};
use crate::storage::{IndexStore, SqliteStorage, StorageError, StoredEntry};
use crate::ConfigError;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard};
use thiserror::Error;

/// Meta key under which the index fingerprint is stored
pub const FINGERPRINT_KEY: &str = "index_fingerprint";

/// Errors raised while building or querying the index
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Embedding failed: {0}")]
    Embedding(String),

    #[error("Embedding has {actual} dimensions, expected {expected}")]
    DimensionMismatch { expected: usize, actual: usize },
}

/// Representation used to score a chunk against a query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetrievalKey {
    /// Fixed-length embedding
    Vector(Vec<f32>),
    /// Token multiset
    Terms(BTreeMap<String, u32>),
}

impl RetrievalKey {
    /// Storage tag of the key
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Vector(_) => "vector",
            Self::Terms(_) => "terms",
        }
    }
}

/// An indexed chunk
#[derive(Debug, Clone, PartialEq)]
pub struct IndexEntry {
    pub chunk_id: String,
    pub document_id: String,
    pub key: RetrievalKey,
}

/// A scored chunk returned by a query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrievalResult {
    pub chunk_id: String,
    pub document_id: String,
    pub source_url: String,
    pub title: Option<String>,
    pub score: f32,
    pub text: String,
    pub sequence_index: usize,
}

/// Descending score, then ascending chunk id
fn rank_ordering(a: &RetrievalResult, b: &RetrievalResult) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

/// Builds the strategy selected by the configuration
pub fn build_strategy(config: &Config) -> Result<Arc<dyn RetrievalStrategy>, ConfigError> {
    let index = &config.index;
    let strategy: Arc<dyn RetrievalStrategy> = match index.strategy {
        StrategyKind::Lexical => Arc::new(LexicalStrategy::new()),
        StrategyKind::Dense => {
            let embedder: Arc<dyn Embedder> = match index.embedder {
                EmbedderKind::Hashing => Arc::new(HashingEmbedder::new(index.dimensions)),
                EmbedderKind::Openai => Arc::new(OpenAiEmbedder::from_config(config)?),
            };
            Arc::new(DenseStrategy::new(embedder, index.dimensions))
        }
    };
    Ok(strategy)
}

/// Hash of every parameter that shapes stored chunks and keys
///
/// A stored fingerprint that differs from the current one means the index
/// must be rebuilt.
pub fn fingerprint(config: &IndexConfig, strategy: &dyn RetrievalStrategy) -> String {
    let description = format!(
        "chunk-size={};chunk-overlap={};{}",
        config.chunk_size,
        config.chunk_overlap,
        strategy.describe()
    );
    hex::encode(Sha256::digest(description.as_bytes()))
}

/// Persists retrieval keys and serves top-k queries
pub struct Indexer {
    storage: Arc<Mutex<SqliteStorage>>,
    strategy: Arc<dyn RetrievalStrategy>,
    min_score: Option<f32>,
}

impl Indexer {
    /// Creates an indexer over shared storage
    pub fn new(storage: Arc<Mutex<SqliteStorage>>, strategy: Arc<dyn RetrievalStrategy>) -> Self {
        Self {
            storage,
            strategy,
            min_score: None,
        }
    }

    /// Drops results scoring at or below `min_score`
    ///
    /// `None` keeps the strategy's own floor.
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// Score at or below which results are dropped
    pub fn min_score(&self) -> f32 {
        self.min_score.unwrap_or_else(|| self.strategy.default_min_score())
    }

    pub fn strategy(&self) -> &dyn RetrievalStrategy {
        self.strategy.as_ref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteStorage>, IndexError> {
        self.storage
            .lock()
            .map_err(|_| IndexError::Storage(StorageError::Poisoned))
    }

    /// Indexes a single chunk, overwriting any entry with the same id
    pub async fn index(&self, chunk: &Chunk) -> Result<IndexEntry, IndexError> {
        let key = self
            .strategy
            .encode_chunks(&[chunk.text.as_str()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding("no key produced".to_string()))?;

        self.lock()?.upsert_entry(chunk, &key)?;
        tracing::trace!("Indexed chunk {}", chunk.id);

        Ok(IndexEntry {
            chunk_id: chunk.id.clone(),
            document_id: chunk.document_id.clone(),
            key,
        })
    }

    /// Removes every entry of a document
    ///
    /// # Returns
    ///
    /// The number of entries removed
    pub fn remove(&self, document_id: &str) -> Result<usize, IndexError> {
        let removed = self.lock()?.remove_entries(document_id)?;
        tracing::debug!("Removed {} entries for document {}", removed, document_id);
        Ok(removed)
    }

    /// Swaps a document's entries for new chunks in one transaction
    ///
    /// Keys are computed before the storage lock is taken; the delete and
    /// inserts then run in a single transaction so queries never observe a
    /// half-replaced document.
    pub async fn replace_document(
        &self,
        document_id: &str,
        chunks: &[Chunk],
    ) -> Result<Vec<IndexEntry>, IndexError> {
        let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
        let keys = self.strategy.encode_chunks(&texts).await?;

        let pairs: Vec<(Chunk, RetrievalKey)> = chunks.iter().cloned().zip(keys).collect();
        let removed = self.lock()?.replace_entries(document_id, &pairs)?;

        tracing::debug!(
            "Replaced {} entries with {} for document {}",
            removed,
            pairs.len(),
            document_id
        );

        Ok(pairs
            .into_iter()
            .map(|(chunk, key)| IndexEntry {
                chunk_id: chunk.id,
                document_id: chunk.document_id,
                key,
            })
            .collect())
    }

    /// Returns the `top_k` best chunks for `text`
    ///
    /// Results are ordered by descending score with ties broken by ascending
    /// chunk id, so identical corpora and queries give identical output.
    pub async fn query(&self, text: &str, top_k: usize) -> Result<Vec<RetrievalResult>, IndexError> {
        if top_k == 0 {
            return Ok(Vec::new());
        }

        let query_key = self.strategy.encode_query(text).await?;
        let entries = self.lock()?.load_entries(self.strategy.key_kind())?;

        let keys: Vec<&RetrievalKey> = entries.iter().map(|e| &e.key).collect();
        let scores = self.strategy.score(&query_key, &keys);
        let min_score = self.min_score();

        let mut results: Vec<RetrievalResult> = entries
            .into_iter()
            .zip(scores)
            .filter(|(_, score)| score.is_finite() && *score > min_score)
            .filter(|(entry, _)| self.strategy.is_related(text, &entry.chunk.text))
            .map(|(entry, score)| to_result(entry, score))
            .collect();

        results.sort_by(rank_ordering);
        results.truncate(top_k);

        tracing::debug!("Query {:?} returned {} results", text, results.len());
        Ok(results)
    }

    /// Counts indexed entries
    pub fn count(&self) -> Result<usize, IndexError> {
        Ok(self.lock()?.count_entries(None)?)
    }
}

fn to_result(entry: StoredEntry, score: f32) -> RetrievalResult {
    RetrievalResult {
        chunk_id: entry.chunk.id,
        document_id: entry.chunk.document_id,
        source_url: entry.source_url,
        title: entry.title,
        score,
        text: entry.chunk.text,
        sequence_index: entry.chunk.sequence_index,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunker::chunk;
    use crate::storage::{ContentStore, Document};
    use url::Url;

    fn shared_storage() -> Arc<Mutex<SqliteStorage>> {
        Arc::new(Mutex::new(SqliteStorage::new_in_memory().unwrap()))
    }

    fn save(storage: &Arc<Mutex<SqliteStorage>>, path: &str, text: &str) -> Document {
        let url = Url::parse(&format!("https://example.com/{}", path)).unwrap();
        let doc = Document::new(&url, None, text.to_string(), "text/plain", None, 0);
        storage.lock().unwrap().save(&doc).unwrap();
        doc
    }

    fn lexical(storage: &Arc<Mutex<SqliteStorage>>) -> Indexer {
        Indexer::new(Arc::clone(storage), Arc::new(LexicalStrategy::new()))
    }

    #[tokio::test]
    async fn test_index_and_query() {
        let storage = shared_storage();
        let indexer = lexical(&storage);
        let doc = save(&storage, "a.txt", "The tabernacle was built in the wilderness.");

        for c in chunk(&doc.id, &doc.text, 1000, 200).unwrap() {
            indexer.index(&c).await.unwrap();
        }

        let results = indexer.query("tabernacle wilderness", 5).await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].document_id, doc.id);
        assert_eq!(results[0].source_url, "https://example.com/a.txt");
    }

    #[tokio::test]
    async fn test_query_is_deterministic_and_bounded() {
        let storage = shared_storage();
        let indexer = lexical(&storage);

        for i in 0..4 {
            let doc = save(
                &storage,
                &format!("{}.txt", i),
                &"Prophets and kings of Israel. ".repeat(20),
            );
            let chunks = chunk(&doc.id, &doc.text, 100, 20).unwrap();
            indexer.replace_document(&doc.id, &chunks).await.unwrap();
        }

        let first = indexer.query("prophets kings israel", 7).await.unwrap();
        let second = indexer.query("prophets kings israel", 7).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(first.len(), 7);

        for pair in first.windows(2) {
            assert!(
                pair[0].score > pair[1].score
                    || (pair[0].score == pair[1].score && pair[0].chunk_id < pair[1].chunk_id)
            );
        }
    }

    #[tokio::test]
    async fn test_remove_then_index_leaves_no_stale_entries() {
        let storage = shared_storage();
        let indexer = lexical(&storage);
        let doc = save(&storage, "a.txt", "Old text about manna in the desert.");

        let old_chunks = chunk(&doc.id, &doc.text, 10, 3).unwrap();
        indexer.replace_document(&doc.id, &old_chunks).await.unwrap();

        indexer.remove(&doc.id).unwrap();
        let new_text = "Fresh words about quail.";
        for c in chunk(&doc.id, new_text, 1000, 200).unwrap() {
            indexer.index(&c).await.unwrap();
        }

        assert!(indexer.query("manna desert", 10).await.unwrap().is_empty());
        let fresh = indexer.query("quail", 10).await.unwrap();
        assert_eq!(fresh.len(), 1);
        assert_eq!(indexer.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_replace_document_drops_old_chunks() {
        let storage = shared_storage();
        let indexer = lexical(&storage);
        let doc = save(&storage, "a.txt", &"Jericho walls ".repeat(50));

        let long = chunk(&doc.id, &doc.text, 100, 10).unwrap();
        indexer.replace_document(&doc.id, &long).await.unwrap();
        let short = chunk(&doc.id, "Jericho", 100, 10).unwrap();
        let entries = indexer.replace_document(&doc.id, &short).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(indexer.count().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_min_score_and_zero_top_k() {
        let storage = shared_storage();
        let doc = save(&storage, "a.txt", "Solomon built the temple.");
        let indexer = lexical(&storage).with_min_score(Some(100.0));
        indexer
            .replace_document(&doc.id, &chunk(&doc.id, &doc.text, 1000, 200).unwrap())
            .await
            .unwrap();

        assert!(indexer.query("solomon temple", 5).await.unwrap().is_empty());

        let open = lexical(&storage);
        assert!(open.query("solomon temple", 0).await.unwrap().is_empty());
        assert_eq!(open.query("solomon temple", 5).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_dense_strategy_end_to_end() {
        let storage = shared_storage();
        let strategy = Arc::new(DenseStrategy::new(Arc::new(HashingEmbedder::new(128)), 128));
        let indexer = Indexer::new(Arc::clone(&storage), strategy);

        let a = save(&storage, "a.txt", "Moses led Israel out of Egypt");
        let b = save(&storage, "b.txt", "Harvest festivals and barley");
        for doc in [&a, &b] {
            indexer
                .replace_document(&doc.id, &chunk(&doc.id, &doc.text, 1000, 200).unwrap())
                .await
                .unwrap();
        }

        let results = indexer.query("Moses Egypt", 1).await.unwrap();
        assert_eq!(results[0].document_id, a.id);
    }

    #[tokio::test]
    async fn test_dense_strategy_ignores_unrelated_questions() {
        let storage = shared_storage();
        let strategy = Arc::new(DenseStrategy::new(Arc::new(HashingEmbedder::new(256)), 256));
        let indexer = Indexer::new(Arc::clone(&storage), strategy);

        let mut text: String = (0..450).map(|i| format!("term{} ", i)).collect();
        text.push_str("In the beginning God created the heavens and the earth.");
        let doc = save(&storage, "genesis.txt", &text);
        indexer
            .replace_document(&doc.id, &chunk(&doc.id, &doc.text, 100_000, 200).unwrap())
            .await
            .unwrap();
        assert_eq!(indexer.count().unwrap(), 1);

        for question in [
            "sourdough bread hydration",
            "tennis racquet strings",
            "photosynthesis in chloroplasts",
            "what is it",
        ] {
            assert!(
                indexer.query(question, 5).await.unwrap().is_empty(),
                "{} should match nothing",
                question
            );
        }
    }

    #[tokio::test]
    async fn test_entries_of_other_strategy_are_ignored() {
        let storage = shared_storage();
        let doc = save(&storage, "a.txt", "Ruth gleaned in the fields of Boaz");
        let chunks = chunk(&doc.id, &doc.text, 1000, 200).unwrap();

        let dense = Indexer::new(
            Arc::clone(&storage),
            Arc::new(DenseStrategy::new(Arc::new(HashingEmbedder::new(32)), 32)),
        );
        dense.replace_document(&doc.id, &chunks).await.unwrap();

        let lexical = lexical(&storage);
        assert!(lexical.query("ruth boaz", 5).await.unwrap().is_empty());
    }

    #[test]
    fn test_fingerprint_tracks_parameters() {
        let config = IndexConfig::default();
        let strategy = LexicalStrategy::new();
        let base = fingerprint(&config, &strategy);
        assert_eq!(base, fingerprint(&config, &strategy));

        let mut resized = config.clone();
        resized.chunk_size += 1;
        assert_ne!(base, fingerprint(&resized, &strategy));

        let dense = DenseStrategy::new(Arc::new(HashingEmbedder::new(64)), 64);
        assert_ne!(base, fingerprint(&config, &dense));
    }

    #[test]
    fn test_retrieval_key_kind() {
        assert_eq!(RetrievalKey::Vector(vec![]).kind(), "vector");
        assert_eq!(RetrievalKey::Terms(BTreeMap::new()).kind(), "terms");
    }
}
