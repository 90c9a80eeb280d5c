//! Crawler coordinator - main crawl orchestration logic
//!
//! This module contains the main crawl loop that coordinates all aspects of
//! the crawling process, including:
//! - Seeding a fresh `CrawlSession`
//! - Fetching frontier batches concurrently under the scheduler
//! - Parsing pages and routing links to the frontier or the document set
//! - Honoring robots.txt and cancellation

use crate::config::CrawlerConfig;
use crate::crawler::fetcher::{FetchResponse, Fetcher, HttpFetcher};
use crate::crawler::parser::parse_html;
use crate::crawler::scheduler::{effective_delay, Scheduler};
use crate::crawler::session::{CrawlNode, CrawlOutcome, CrawlSession};
use crate::robots::RobotsCache;
use crate::url::{is_same_site, normalize_url};
use crate::{DocentError, FetchError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use url::Url;

/// Depth-bounded site crawler
///
/// Each call to [`Crawler::crawl`] runs in its own `CrawlSession`; the crawler
/// itself holds only configuration and the fetch capability, so it can be
/// reused across runs.
pub struct Crawler {
    config: Arc<CrawlerConfig>,
    fetcher: Arc<dyn Fetcher>,
}

impl Crawler {
    /// Creates a crawler that fetches through `fetcher`
    pub fn new(config: CrawlerConfig, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            config: Arc::new(config),
            fetcher,
        }
    }

    /// Creates a crawler backed by an `HttpFetcher`
    pub fn from_config(config: CrawlerConfig) -> Result<Self, DocentError> {
        let fetcher = HttpFetcher::new(&config.user_agent)?;
        Ok(Self::new(config, Arc::new(fetcher)))
    }

    /// Returns the crawler configuration
    pub fn config(&self) -> &CrawlerConfig {
        &self.config
    }

    /// Crawls from `seed` until the frontier is exhausted
    ///
    /// # Arguments
    ///
    /// * `seed` - The page the crawl starts from (depth 0)
    /// * `max_depth` - Maximum link distance of fetched pages
    ///
    /// # Returns
    ///
    /// * `Ok(CrawlOutcome)` - Documents discovered and run counters
    /// * `Err(DocentError)` - The seed is not a valid HTTP(S) URL
    pub async fn crawl(&self, seed: &str, max_depth: u32) -> Result<CrawlOutcome, DocentError> {
        self.crawl_with_cancel(seed, max_depth, &CancellationToken::new())
            .await
    }

    /// Same as [`Crawler::crawl`], stopping early once `cancel` fires
    ///
    /// Cancellation is observed between frontier batches; in-flight fetches
    /// are allowed to finish.
    pub async fn crawl_with_cancel(
        &self,
        seed: &str,
        max_depth: u32,
        cancel: &CancellationToken,
    ) -> Result<CrawlOutcome, DocentError> {
        let seed = normalize_url(seed)?;
        let timeout = Duration::from_secs(self.config.request_timeout);
        let concurrency = self.config.concurrency.max(1) as usize;

        tracing::info!(
            "Starting crawl at {} (max depth {}, max pages {})",
            seed,
            max_depth,
            self.config.max_pages
        );

        let robots = RobotsCache::new(
            Arc::clone(&self.fetcher),
            &self.config.user_agent,
            timeout,
            self.config.respect_robots,
        );
        let configured_delay = Duration::from_millis(self.config.request_delay);
        let scheduler = Arc::new(Scheduler::new(
            concurrency,
            effective_delay(configured_delay, robots.crawl_delay(&seed).await),
        ));

        let mut session = CrawlSession::new(seed.clone(), max_depth, self.config.max_pages);
        let start_time = Instant::now();
        let mut cancelled = false;

        loop {
            if cancel.is_cancelled() {
                tracing::info!("Crawl cancelled, {} pages left in frontier", session.frontier_size());
                cancelled = true;
                break;
            }

            if session.is_exhausted() {
                if session.page_limit_reached() && session.frontier_size() > 0 {
                    tracing::info!(
                        "Page limit of {} reached, {} pages left unvisited",
                        self.config.max_pages,
                        session.frontier_size()
                    );
                } else {
                    tracing::info!("Frontier is empty, crawl complete");
                }
                break;
            }

            let batch = session.next_batch(concurrency);
            if batch.is_empty() {
                continue;
            }

            let mut tasks = JoinSet::new();
            for (position, node) in batch.into_iter().enumerate() {
                if !robots.is_allowed(&node.url).await {
                    tracing::info!("URL {} disallowed by robots.txt", node.url);
                    session.mark_skipped();
                    continue;
                }

                let fetcher = Arc::clone(&self.fetcher);
                let scheduler = Arc::clone(&scheduler);
                tasks.spawn(async move {
                    let _slot = scheduler.acquire().await;
                    tracing::debug!("Fetching {} (depth {})", node.url, node.depth);
                    let result = fetcher.fetch(&node.url, timeout).await;
                    (position, node, result)
                });
            }

            // Results are handled in dequeue order so frontier order does not
            // depend on which response arrived first
            let mut results = Vec::new();
            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(result) => results.push(result),
                    Err(e) => {
                        tracing::error!("Fetch task failed: {}", e);
                        session.mark_failed();
                    }
                }
            }
            results.sort_by_key(|(position, _, _)| *position);

            for (_, node, result) in results {
                self.handle_page(&mut session, &robots, &seed, &node, result)
                    .await;
            }

            tracing::debug!(
                "Batch done: {} fetched, {} documents, {} in frontier",
                session.visited().len(),
                session.documents().len(),
                session.frontier_size()
            );
        }

        let outcome = session.finish(cancelled, scheduler.interval());
        tracing::info!(
            "Crawl finished in {:?}: {} pages fetched, {} failed, {} skipped, {} documents discovered",
            start_time.elapsed(),
            outcome.pages_fetched,
            outcome.pages_failed,
            outcome.skipped,
            outcome.documents.len()
        );

        Ok(outcome)
    }

    /// Processes one fetched page
    ///
    /// This method:
    /// 1. Logs and abandons failed fetches
    /// 2. Skips non-HTML responses
    /// 3. Parses HTML and extracts links
    /// 4. Records documents and enqueues same-site pages
    async fn handle_page(
        &self,
        session: &mut CrawlSession,
        robots: &RobotsCache,
        seed: &Url,
        node: &CrawlNode,
        result: Result<FetchResponse, FetchError>,
    ) {
        let response = match result {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!("Failed to fetch {}: {}", node.url, e);
                session.mark_failed();
                return;
            }
        };

        if !response.is_html() {
            tracing::debug!(
                "Skipping {}: expected HTML, got {:?}",
                node.url,
                response.content_type
            );
            session.mark_skipped();
            return;
        }

        let base_url = Url::parse(&response.final_url).unwrap_or_else(|_| node.url.clone());
        let parsed = match parse_html(
            &response.text_lossy(),
            &base_url,
            &self.config.document_extensions,
        ) {
            Ok(parsed) => parsed,
            Err(e) => {
                tracing::warn!("Failed to parse HTML for {}: {}", node.url, e);
                session.mark_failed();
                return;
            }
        };
        session.mark_fetched();

        for link in parsed.links {
            if link.kind.is_crawlable() {
                if self.config.same_site_only && !is_same_site(seed, &link.url) {
                    tracing::trace!("Not following off-site page {}", link.url);
                    continue;
                }
                session.enqueue_page(link.url, node);
            } else if robots.is_allowed(&link.url).await {
                session.record_document(link.url, node);
            } else {
                tracing::info!("Document {} disallowed by robots.txt", link.url);
                session.mark_skipped();
            }
        }
    }
}
