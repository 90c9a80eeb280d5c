//! Robots.txt handling module
//!
//! This module provides functionality for fetching, parsing, and caching robots.txt files.
//! Rules are fetched at most once per origin per crawl session; a missing or
//! unreachable robots.txt allows everything.

mod parser;

pub use parser::ParsedRobots;

use crate::crawler::Fetcher;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use url::Url;

/// Fetches robots.txt for the origin of `url`
///
/// # Arguments
///
/// * `fetcher` - The fetcher to request robots.txt through
/// * `url` - Any URL on the origin
/// * `timeout` - Upper bound for the request
///
/// # Returns
///
/// The parsed rules, or `ParsedRobots::allow_all()` when robots.txt is
/// missing, not successful, or unreachable.
pub async fn fetch_robots(fetcher: &dyn Fetcher, url: &Url, timeout: Duration) -> ParsedRobots {
    let robots_url = match url.join("/robots.txt") {
        Ok(robots_url) => robots_url,
        Err(e) => {
            tracing::debug!("Cannot build robots.txt URL for {}: {}", url, e);
            return ParsedRobots::allow_all();
        }
    };

    match fetcher.fetch(&robots_url, timeout).await {
        Ok(response) => {
            tracing::debug!("Loaded robots.txt from {}", robots_url);
            ParsedRobots::from_content(&response.text_lossy())
        }
        Err(e) => {
            tracing::debug!("No usable robots.txt at {} ({}), allowing all", robots_url, e);
            ParsedRobots::allow_all()
        }
    }
}

/// Per-session robots.txt rules, keyed by origin
pub struct RobotsCache {
    fetcher: Arc<dyn Fetcher>,
    user_agent: String,
    timeout: Duration,
    enabled: bool,
    rules: Mutex<HashMap<String, Arc<ParsedRobots>>>,
}

impl RobotsCache {
    /// Creates an empty cache
    ///
    /// When `enabled` is false every URL is allowed and nothing is fetched.
    pub fn new(fetcher: Arc<dyn Fetcher>, user_agent: &str, timeout: Duration, enabled: bool) -> Self {
        Self {
            fetcher,
            user_agent: user_agent.to_string(),
            timeout,
            enabled,
            rules: Mutex::new(HashMap::new()),
        }
    }

    /// Returns the rules for the origin of `url`, fetching them on first use
    pub async fn rules_for(&self, url: &Url) -> Arc<ParsedRobots> {
        if !self.enabled {
            return Arc::new(ParsedRobots::allow_all());
        }

        let origin = url.origin().ascii_serialization();
        // Held across the fetch so one origin is never requested twice
        let mut rules = self.rules.lock().await;
        if let Some(parsed) = rules.get(&origin) {
            return Arc::clone(parsed);
        }

        let parsed = Arc::new(fetch_robots(self.fetcher.as_ref(), url, self.timeout).await);
        rules.insert(origin, Arc::clone(&parsed));
        parsed
    }

    /// Checks if `url` may be fetched
    pub async fn is_allowed(&self, url: &Url) -> bool {
        self.rules_for(url)
            .await
            .is_allowed(url.as_str(), &self.user_agent)
    }

    /// Returns the crawl delay declared for the origin of `url`
    pub async fn crawl_delay(&self, url: &Url) -> Option<Duration> {
        self.rules_for(url).await.crawl_delay(&self.user_agent)
    }
}
