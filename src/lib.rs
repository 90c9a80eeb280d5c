//! Docent: a site crawler that answers questions from what it finds
//!
//! This crate discovers documents on a website, extracts their text, splits it
//! into overlapping chunks, indexes the chunks for retrieval and answers
//! natural-language questions with the most relevant excerpts and their sources.

pub mod answer;
pub mod chunker;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod index;
pub mod output;
pub mod pipeline;
pub mod robots;
pub mod storage;
pub mod url;

use thiserror::Error;

/// Main error type for Docent operations
#[derive(Debug, Error)]
pub enum DocentError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Fetch error: {0}")]
    Fetch(#[from] FetchError),

    #[error("Parse error: {0}")]
    Parse(#[from] ParseError),

    #[error("Index error: {0}")]
    Index(#[from] index::IndexError),

    #[error("Generation error: {0}")]
    Generation(#[from] answer::GenerationError),

    #[error("Storage error: {0}")]
    Storage(#[from] storage::StorageError),

    #[error("URL error: {0}")]
    UrlError(#[from] UrlError),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] ::url::ParseError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Operation cancelled")]
    Cancelled,
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),
}

/// URL-specific errors
#[derive(Debug, Error)]
pub enum UrlError {
    #[error("Failed to parse URL: {0}")]
    Parse(String),

    #[error("Invalid URL scheme: {0}")]
    InvalidScheme(String),

    #[error("Missing domain in URL")]
    MissingDomain,

    #[error("Malformed URL: {0}")]
    Malformed(String),
}

/// Failures while retrieving a URL
///
/// These are always recovered locally by the crawler: the failing branch is
/// logged and abandoned.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP {status} for {url}")]
    Status { url: String, status: u16 },

    #[error("Request timeout for {url}")]
    Timeout { url: String },

    #[error("Network error for {url}: {message}")]
    Network { url: String, message: String },
}

/// Failures while turning fetched bytes into text or links
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("HTML parse error for {url}: {message}")]
    Html { url: String, message: String },

    #[error("Unsupported content type: {0}")]
    Unsupported(String),

    #[error("Invalid text encoding: {0}")]
    Encoding(String),
}

/// Result type alias for Docent operations
pub type Result<T> = std::result::Result<T, DocentError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

/// Result type alias for URL operations
pub type UrlResult<T> = std::result::Result<T, UrlError>;

// Re-export commonly used types
pub use answer::{Answer, Assembler, Outcome};
pub use chunker::{chunk, Chunk};
pub use config::Config;
pub use crawler::{CrawlOutcome, Crawler, DocumentRef};
pub use index::{Indexer, RetrievalResult};
pub use pipeline::{IngestReport, Pipeline};
pub use url::{extract_domain, normalize_url, LinkKind};
