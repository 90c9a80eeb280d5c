//! Crawl-to-index ingest pipeline
//!
//! One ingest run:
//! - crawls the site and collects document references
//! - fetches and extracts each document, paced like the crawl
//! - skips documents whose extracted text is unchanged
//! - stores changed or new documents and replaces their index entries
//! - rebuilds every stored document when indexing parameters changed

use crate::chunker::chunk;
use crate::config::Config;
use crate::crawler::{CrawlOutcome, Crawler, DocumentRef, Fetcher, HttpFetcher, Scheduler};
use crate::extract::{Extractor, HtmlTextExtractor};
use crate::index::{build_strategy, fingerprint, Indexer, FINGERPRINT_KEY};
use crate::storage::{
    document_id_for, open_storage, ContentStore, Document, IndexStore, IngestEvent, SqliteStorage,
    StorageError,
};
use crate::DocentError;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Counters and skip reasons of one ingest run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestReport {
    /// Pages fetched and parsed during the crawl
    pub pages_fetched: u32,
    /// Pages whose fetch or parse failed during the crawl
    pub pages_failed: u32,
    /// Documents found by the crawl
    pub documents_discovered: usize,
    /// Documents stored and indexed in this run
    pub indexed: usize,
    /// Documents whose text had not changed
    pub unchanged: usize,
    /// Stored documents not seen by this crawl but rebuilt for new parameters
    pub reindexed: usize,
    /// Chunks written to the index
    pub chunks_indexed: usize,
    /// Documents that could not be ingested, with the reason
    pub skipped: Vec<(String, String)>,
    /// Whether the run stopped early
    pub cancelled: bool,
}

/// Result of ingesting one document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DocumentStatus {
    Indexed { chunks: usize },
    Unchanged,
    Empty,
}

/// Wires the crawler, extractor, store and indexer together
pub struct Pipeline {
    config: Config,
    crawler: Crawler,
    fetcher: Arc<dyn Fetcher>,
    extractor: Arc<dyn Extractor>,
    storage: Arc<Mutex<SqliteStorage>>,
    indexer: Arc<Indexer>,
}

impl Pipeline {
    /// Creates a pipeline from explicit collaborators
    pub fn new(
        config: Config,
        fetcher: Arc<dyn Fetcher>,
        extractor: Arc<dyn Extractor>,
        storage: Arc<Mutex<SqliteStorage>>,
        indexer: Arc<Indexer>,
    ) -> Self {
        let crawler = Crawler::new(config.crawler.clone(), Arc::clone(&fetcher));
        Self {
            config,
            crawler,
            fetcher,
            extractor,
            storage,
            indexer,
        }
    }

    /// Creates a pipeline over HTTP and the database in `storage.output-dir`
    pub fn from_config(config: Config) -> Result<Self, DocentError> {
        let storage = Arc::new(Mutex::new(open_storage(Path::new(
            &config.storage.output_dir,
        ))?));
        let strategy = build_strategy(&config)?;
        let indexer = Arc::new(
            Indexer::new(Arc::clone(&storage), strategy).with_min_score(config.retrieval.min_score),
        );
        let fetcher = Arc::new(HttpFetcher::new(&config.crawler.user_agent)?);

        Ok(Self::new(
            config,
            fetcher,
            Arc::new(HtmlTextExtractor::new()),
            storage,
            indexer,
        ))
    }

    pub fn indexer(&self) -> Arc<Indexer> {
        Arc::clone(&self.indexer)
    }

    pub fn storage(&self) -> Arc<Mutex<SqliteStorage>> {
        Arc::clone(&self.storage)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    fn lock(&self) -> Result<MutexGuard<'_, SqliteStorage>, StorageError> {
        self.storage.lock().map_err(|_| StorageError::Poisoned)
    }

    fn log_event(
        &self,
        url: &str,
        event: IngestEvent,
        detail: Option<&str>,
    ) -> Result<(), StorageError> {
        self.lock()?.log_event(url, event, detail)
    }

    /// Crawls the configured site and brings the index up to date
    ///
    /// Cancellation is checked between crawl batches and before each
    /// document; work already committed stays committed.
    ///
    /// # Returns
    ///
    /// * `Ok(IngestReport)` - Counters for the run, including skipped documents
    /// * `Err(DocentError)` - The seed was invalid or the store failed
    pub async fn ingest(&self, cancel: &CancellationToken) -> Result<IngestReport, DocentError> {
        let current = fingerprint(&self.config.index, self.indexer.strategy());
        let stored = self.lock()?.get_meta(FINGERPRINT_KEY)?;
        let parameters_changed = stored.as_deref().is_some_and(|fp| fp != current);
        let force_all = self.config.storage.reindex || parameters_changed;

        if parameters_changed {
            tracing::info!("Indexing parameters changed, rebuilding every document");
        } else if self.config.storage.reindex {
            tracing::info!("Reindex requested, rebuilding every document");
        }

        let outcome = self
            .crawler
            .crawl_with_cancel(
                &self.config.crawler.base_url,
                self.config.crawler.max_depth,
                cancel,
            )
            .await?;

        let mut report = IngestReport {
            pages_fetched: outcome.pages_fetched,
            pages_failed: outcome.pages_failed,
            documents_discovered: outcome.documents.len(),
            cancelled: outcome.cancelled,
            ..IngestReport::default()
        };

        let seen = self.ingest_discovered(&outcome, force_all, cancel, &mut report).await?;

        if force_all && !report.cancelled {
            self.rebuild_unseen(&seen, cancel, &mut report).await?;
        }

        if !report.cancelled {
            self.lock()?.set_meta(FINGERPRINT_KEY, &current)?;
        }

        tracing::info!(
            "Ingest finished: {} indexed, {} unchanged, {} rebuilt, {} skipped",
            report.indexed,
            report.unchanged,
            report.reindexed,
            report.skipped.len()
        );

        Ok(report)
    }

    async fn ingest_discovered(
        &self,
        outcome: &CrawlOutcome,
        force_all: bool,
        cancel: &CancellationToken,
        report: &mut IngestReport,
    ) -> Result<HashSet<String>, DocentError> {
        let scheduler = Scheduler::new(1, outcome.request_interval);
        let mut seen = HashSet::new();

        for doc in outcome.documents.values() {
            if cancel.is_cancelled() {
                tracing::info!("Ingest cancelled");
                report.cancelled = true;
                break;
            }

            let url = doc.url.as_str();
            self.log_event(url, IngestEvent::FoundDocument, Some(doc.source_page.as_str()))?;

            // Documents not indexed here are rebuilt from their stored text
            match self.ingest_document(doc, &scheduler, force_all).await {
                Ok(DocumentStatus::Indexed { chunks }) => {
                    seen.insert(document_id_for(&doc.url));
                    report.indexed += 1;
                    report.chunks_indexed += chunks;
                }
                Ok(DocumentStatus::Unchanged) => {
                    seen.insert(document_id_for(&doc.url));
                    report.unchanged += 1;
                }
                Ok(DocumentStatus::Empty) => {
                    self.skip(url, "no extractable text", report)?;
                }
                Err(DocentError::Storage(e)) => return Err(e.into()),
                Err(e) => self.skip(url, &e.to_string(), report)?,
            }
        }

        Ok(seen)
    }

    fn skip(&self, url: &str, reason: &str, report: &mut IngestReport) -> Result<(), StorageError> {
        tracing::warn!("Skipping {}: {}", url, reason);
        self.log_event(url, IngestEvent::Skipped, Some(reason))?;
        report.skipped.push((url.to_string(), reason.to_string()));
        Ok(())
    }

    async fn ingest_document(
        &self,
        doc: &DocumentRef,
        scheduler: &Scheduler,
        force_all: bool,
    ) -> Result<DocumentStatus, DocentError> {
        let timeout = Duration::from_secs(self.config.crawler.request_timeout);
        let response = {
            let _slot = scheduler.acquire().await.ok_or(DocentError::Cancelled)?;
            tracing::debug!("Fetching document {}", doc.url);
            self.fetcher.fetch(&doc.url, timeout).await?
        };

        let extracted = self
            .extractor
            .extract(&response.body, &response.content_type)?;
        if extracted.text.trim().is_empty() {
            return Ok(DocumentStatus::Empty);
        }

        let document = Document::new(
            &doc.url,
            extracted.title,
            extracted.text,
            &response.mime_type(),
            Some(&doc.source_page),
            doc.depth,
        );

        if !self.store_if_changed(&document, force_all)? {
            tracing::debug!("Unchanged: {}", document.source_url);
            return Ok(DocumentStatus::Unchanged);
        }

        match self.index_document(&document).await {
            Ok(chunks) => Ok(DocumentStatus::Indexed { chunks }),
            Err(e) => {
                // Entries of the previous text must not outlive the new checksum
                if let Err(cleanup) = self.indexer.remove(&document.id) {
                    tracing::warn!(
                        "Failed to clear entries of {}: {}",
                        document.source_url,
                        cleanup
                    );
                }
                Err(e)
            }
        }
    }

    /// Saves `document` unless an identical, indexed copy is already stored
    ///
    /// # Returns
    ///
    /// `true` if the document was saved and must be re-indexed
    fn store_if_changed(&self, document: &Document, force_all: bool) -> Result<bool, StorageError> {
        let mut storage = self.lock()?;

        let unchanged = match storage.load(&document.id)? {
            Some(existing) => {
                existing.checksum == document.checksum
                    && storage.count_entries(Some(&document.id))? > 0
            }
            None => false,
        };

        if unchanged && !force_all {
            storage.log_event(&document.source_url, IngestEvent::UnchangedSkip, None)?;
            return Ok(false);
        }

        storage.log_event(&document.source_url, IngestEvent::ChangedOrNew, None)?;
        storage.save(document)?;
        Ok(true)
    }

    /// Re-chunks a stored document and swaps its index entries
    ///
    /// A failed index write is retried once before the error is returned.
    async fn index_document(&self, document: &Document) -> Result<usize, DocentError> {
        let chunks = chunk(
            &document.id,
            &document.text,
            self.config.index.chunk_size,
            self.config.index.chunk_overlap,
        )?;

        let entries = match self.indexer.replace_document(&document.id, &chunks).await {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Indexing {} failed, retrying: {}", document.source_url, e);
                self.indexer.replace_document(&document.id, &chunks).await?
            }
        };

        let detail = format!("{} chunks", entries.len());
        self.log_event(&document.source_url, IngestEvent::Indexed, Some(&detail))?;
        Ok(entries.len())
    }

    /// Rebuilds stored documents this run did not index
    ///
    /// Covers documents the crawl missed and those whose fetch or
    /// extraction failed, so no entry built with old parameters survives.
    async fn rebuild_unseen(
        &self,
        seen: &HashSet<String>,
        cancel: &CancellationToken,
        report: &mut IngestReport,
    ) -> Result<(), DocentError> {
        let stored = self.lock()?.list_all()?;

        for document in stored.iter().filter(|d| !seen.contains(&d.id)) {
            if cancel.is_cancelled() {
                report.cancelled = true;
                break;
            }

            match self.index_document(document).await {
                Ok(chunks) => {
                    report.reindexed += 1;
                    report.chunks_indexed += chunks;
                }
                Err(DocentError::Storage(e)) => return Err(e.into()),
                Err(e) => self.skip(&document.source_url, &e.to_string(), report)?,
            }
        }

        Ok(())
    }
}
