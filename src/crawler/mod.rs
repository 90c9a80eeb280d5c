//! Crawler module for link discovery
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching behind the `Fetcher` capability
//! - HTML parsing and link classification
//! - Request pacing and concurrency limiting
//! - Per-run frontier and visited-set state
//! - Overall crawl coordination

mod coordinator;
mod fetcher;
mod parser;
mod scheduler;
mod session;

pub use coordinator::Crawler;
pub use fetcher::{build_http_client, mime_type, FetchResponse, Fetcher, HttpFetcher};
pub use parser::{parse_html, ExtractedLink, ParsedPage};
pub use scheduler::{effective_delay, ScheduledFetch, Scheduler};
pub use session::{CrawlNode, CrawlOutcome, CrawlSession, DocumentRef, VisitedSet};

pub(crate) use parser::extract_title;
