//! Configuration module for Docent
//!
//! This module handles loading, parsing, and validating TOML configuration files.
//!
//! # Example
//!
//! ```no_run
//! use docent::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("docent.toml")).unwrap();
//! println!("Crawler will use max depth: {}", config.crawler.max_depth);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    Config, CrawlerConfig, EmbedderKind, GeneratorConfig, IndexConfig, RetrievalConfig,
    StorageConfig, StrategyKind,
};

// Re-export parser functions
pub use parser::{compute_config_hash, load_config, load_config_with_hash, parse_config};
pub use validation::validate;
pub(crate) use validation::validate_chunk_params;
