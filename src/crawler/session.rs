//! Per-run crawl state
//!
//! A `CrawlSession` owns everything one crawl invocation mutates: the FIFO
//! frontier, the visited set, the discovered documents and the counters.
//! Nothing outlives the run.

use crate::url::normalize_url;
use std::collections::{BTreeMap, HashSet, VecDeque};
use std::sync::{Mutex, PoisonError};
use url::Url;

/// A page waiting in the frontier
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlNode {
    /// Normalized page URL
    pub url: Url,
    /// Link distance from the seed (the seed is 0)
    pub depth: u32,
    /// Page the link was found on (None for the seed)
    pub parent_url: Option<Url>,
}

/// A discovered document and where it was found
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentRef {
    /// Normalized document URL
    pub url: Url,
    /// Page that linked to the document
    pub source_page: Url,
    /// Depth of the linking page
    pub depth: u32,
}

impl DocumentRef {
    /// Returns true if `self` is the preferred provenance over `other`
    ///
    /// Shallower pages win; ties go to the lexicographically smaller page so
    /// the kept provenance does not depend on fetch order.
    fn preferred_over(&self, other: &DocumentRef) -> bool {
        (self.depth, self.source_page.as_str()) < (other.depth, other.source_page.as_str())
    }
}

/// Set of normalized URLs already claimed in this run
#[derive(Debug, Default)]
pub struct VisitedSet {
    inner: Mutex<HashSet<String>>,
}

impl VisitedSet {
    /// Creates an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Atomically marks `url` as visited
    ///
    /// The URL is normalized before the membership test. Returns true if this
    /// call claimed it, false if it was already present.
    pub fn claim(&self, url: &Url) -> bool {
        let key = visit_key(url);
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key)
    }

    /// Returns true if `url` has been claimed
    pub fn contains(&self, url: &Url) -> bool {
        let key = visit_key(url);
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&key)
    }

    /// Returns the number of claimed URLs
    pub fn len(&self) -> usize {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true if nothing has been claimed
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn visit_key(url: &Url) -> String {
    normalize_url(url.as_str())
        .map(String::from)
        .unwrap_or_else(|_| url.to_string())
}

/// Summary of one crawl invocation
#[derive(Debug, Clone, Default)]
pub struct CrawlOutcome {
    /// Discovered documents keyed by normalized URL
    pub documents: BTreeMap<String, DocumentRef>,
    /// Pages fetched and parsed successfully
    pub pages_fetched: u32,
    /// Pages whose fetch or parse failed
    pub pages_failed: u32,
    /// Pages or documents skipped (robots.txt, non-HTML)
    pub skipped: u32,
    /// Effective interval between request starts at the end of the run
    pub request_interval: std::time::Duration,
    /// Whether the run stopped because it was cancelled
    pub cancelled: bool,
}

impl CrawlOutcome {
    /// Returns the discovered document URLs in sorted order
    pub fn document_urls(&self) -> Vec<&str> {
        self.documents.keys().map(String::as_str).collect()
    }
}

/// Frontier, visited set and discoveries for one crawl run
#[derive(Debug)]
pub struct CrawlSession {
    max_depth: u32,
    max_pages: u32,
    frontier: VecDeque<CrawlNode>,
    visited: VisitedSet,
    pages_started: u32,
    outcome: CrawlOutcome,
}

impl CrawlSession {
    /// Creates a session whose frontier holds only the seed at depth 0
    pub fn new(seed: Url, max_depth: u32, max_pages: u32) -> Self {
        let visited = VisitedSet::new();
        visited.claim(&seed);

        let mut frontier = VecDeque::new();
        frontier.push_back(CrawlNode {
            url: seed,
            depth: 0,
            parent_url: None,
        });

        Self {
            max_depth,
            max_pages,
            frontier,
            visited,
            pages_started: 0,
            outcome: CrawlOutcome::default(),
        }
    }

    /// Returns true when the frontier is empty or the page ceiling is reached
    pub fn is_exhausted(&self) -> bool {
        self.frontier.is_empty() || self.pages_started >= self.max_pages
    }

    /// Returns true when the page ceiling has been reached
    pub fn page_limit_reached(&self) -> bool {
        self.pages_started >= self.max_pages
    }

    /// Dequeues up to `limit` nodes of the shallowest pending depth
    ///
    /// A batch never mixes depths, so every page of depth `d` is processed
    /// before any page of depth `d + 1` is dequeued. Nodes deeper than the
    /// depth bound are dropped unfetched. Each returned node counts against
    /// the page ceiling.
    pub fn next_batch(&mut self, limit: usize) -> Vec<CrawlNode> {
        let mut batch = Vec::new();

        while batch.len() < limit && self.pages_started < self.max_pages {
            let Some(front) = self.frontier.front() else {
                break;
            };
            if batch
                .first()
                .is_some_and(|first: &CrawlNode| first.depth != front.depth)
            {
                break;
            }

            let Some(node) = self.frontier.pop_front() else {
                break;
            };
            if node.depth > self.max_depth {
                tracing::trace!("Dropping {} beyond depth {}", node.url, self.max_depth);
                continue;
            }

            self.pages_started += 1;
            batch.push(node);
        }

        batch
    }

    /// Claims and enqueues a page linked from `parent`
    ///
    /// Returns false when the page would exceed the depth bound or has
    /// already been claimed.
    pub fn enqueue_page(&mut self, url: Url, parent: &CrawlNode) -> bool {
        let depth = parent.depth + 1;
        if depth > self.max_depth {
            return false;
        }
        if !self.visited.claim(&url) {
            return false;
        }

        tracing::trace!("Enqueued {} at depth {}", url, depth);
        self.frontier.push_back(CrawlNode {
            url,
            depth,
            parent_url: Some(parent.url.clone()),
        });
        true
    }

    /// Records a document link found on `parent`
    ///
    /// Returns true if the document was not known before.
    pub fn record_document(&mut self, url: Url, parent: &CrawlNode) -> bool {
        let key = visit_key(&url);
        let candidate = DocumentRef {
            url,
            source_page: parent.url.clone(),
            depth: parent.depth,
        };

        match self.outcome.documents.get_mut(&key) {
            Some(existing) => {
                if candidate.preferred_over(existing) {
                    *existing = candidate;
                }
                false
            }
            None => {
                tracing::debug!("Discovered document {} on {}", key, parent.url);
                self.outcome.documents.insert(key, candidate);
                true
            }
        }
    }

    /// Counts a successfully fetched page
    pub fn mark_fetched(&mut self) {
        self.outcome.pages_fetched += 1;
    }

    /// Counts a failed page
    pub fn mark_failed(&mut self) {
        self.outcome.pages_failed += 1;
    }

    /// Counts a skipped page or document
    pub fn mark_skipped(&mut self) {
        self.outcome.skipped += 1;
    }

    /// Returns the visited set
    pub fn visited(&self) -> &VisitedSet {
        &self.visited
    }

    /// Returns the number of nodes waiting in the frontier
    pub fn frontier_size(&self) -> usize {
        self.frontier.len()
    }

    /// Returns the documents discovered so far
    pub fn documents(&self) -> &BTreeMap<String, DocumentRef> {
        &self.outcome.documents
    }

    /// Consumes the session and returns its outcome
    pub fn finish(self, cancelled: bool, request_interval: std::time::Duration) -> CrawlOutcome {
        CrawlOutcome {
            cancelled,
            request_interval,
            ..self.outcome
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn url(s: &str) -> Url {
        Url::parse(s).unwrap()
    }

    fn seed_session(max_depth: u32, max_pages: u32) -> CrawlSession {
        CrawlSession::new(url("https://example.com/"), max_depth, max_pages)
    }

    #[test]
    fn test_claim_normalizes_before_membership() {
        let visited = VisitedSet::new();
        assert!(visited.claim(&url("https://example.com/studies")));
        assert!(!visited.claim(&url("https://example.com/studies/")));
        assert!(!visited.claim(&url("https://EXAMPLE.com/studies#intro")));
        assert_eq!(visited.len(), 1);
    }

    #[test]
    fn test_seed_is_claimed() {
        let session = seed_session(2, 10);
        assert!(session.visited().contains(&url("https://example.com")));
        assert_eq!(session.frontier_size(), 1);
    }

    #[test]
    fn test_enqueue_respects_depth_bound() {
        let mut session = seed_session(1, 10);
        let seed = session.next_batch(4).remove(0);
        assert!(session.enqueue_page(url("https://example.com/a"), &seed));

        let a = session.next_batch(4).remove(0);
        assert_eq!(a.depth, 1);
        assert!(!session.enqueue_page(url("https://example.com/b"), &a));
        assert!(session.is_exhausted());
    }

    #[test]
    fn test_enqueue_never_duplicates() {
        let mut session = seed_session(3, 10);
        let seed = session.next_batch(1).remove(0);
        assert!(session.enqueue_page(url("https://example.com/a"), &seed));
        assert!(!session.enqueue_page(url("https://example.com/a/"), &seed));
        assert!(!session.enqueue_page(url("https://example.com/"), &seed));
        assert_eq!(session.frontier_size(), 1);
    }

    #[test]
    fn test_batches_do_not_mix_depths() {
        let mut session = seed_session(3, 10);
        let seed = session.next_batch(4).remove(0);
        session.enqueue_page(url("https://example.com/a"), &seed);
        session.enqueue_page(url("https://example.com/b"), &seed);

        let level_one = session.next_batch(4);
        assert_eq!(level_one.len(), 2);
        session.enqueue_page(url("https://example.com/c"), &level_one[0]);
        session.enqueue_page(url("https://example.com/d"), &level_one[1]);

        let level_two = session.next_batch(4);
        assert!(level_two.iter().all(|n| n.depth == 2));
        assert_eq!(level_two.len(), 2);
    }

    #[test]
    fn test_page_ceiling_limits_batches() {
        let mut session = seed_session(3, 2);
        let seed = session.next_batch(4).remove(0);
        for path in ["a", "b", "c"] {
            session.enqueue_page(url(&format!("https://example.com/{}", path)), &seed);
        }

        assert_eq!(session.next_batch(4).len(), 1);
        assert!(session.page_limit_reached());
        assert!(session.next_batch(4).is_empty());
        assert!(session.is_exhausted());
    }

    #[test]
    fn test_document_provenance_prefers_shallow_then_smallest_page() {
        let mut session = seed_session(3, 10);
        let doc = url("https://example.com/d.pdf");

        let deep = CrawlNode {
            url: url("https://example.com/a"),
            depth: 2,
            parent_url: None,
        };
        let shallow_z = CrawlNode {
            url: url("https://example.com/z"),
            depth: 1,
            parent_url: None,
        };
        let shallow_b = CrawlNode {
            url: url("https://example.com/b"),
            depth: 1,
            parent_url: None,
        };

        assert!(session.record_document(doc.clone(), &deep));
        assert!(!session.record_document(doc.clone(), &shallow_z));
        assert!(!session.record_document(doc.clone(), &shallow_b));

        let kept = &session.documents()["https://example.com/d.pdf"];
        assert_eq!(kept.depth, 1);
        assert_eq!(kept.source_page.as_str(), "https://example.com/b");
    }

    #[test]
    fn test_finish_keeps_counters() {
        let mut session = seed_session(0, 10);
        session.mark_fetched();
        session.mark_failed();
        session.mark_skipped();
        let outcome = session.finish(true, std::time::Duration::from_millis(5));
        assert_eq!(outcome.pages_fetched, 1);
        assert_eq!(outcome.pages_failed, 1);
        assert_eq!(outcome.skipped, 1);
        assert!(outcome.cancelled);
    }
}
