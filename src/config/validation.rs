use crate::config::types::{
    Config, CrawlerConfig, GeneratorConfig, IndexConfig, RetrievalConfig, StorageConfig,
    StrategyKind,
};
use crate::ConfigError;
use url::Url;

/// Deepest crawl accepted from configuration
const MAX_DEPTH_LIMIT: u32 = 16;

/// Validates the entire configuration
///
/// Runs before any crawling begins so that bad values surface to the caller
/// instead of failing halfway through a run.
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_storage_config(&config.storage)?;
    validate_index_config(&config.index)?;
    validate_retrieval_config(&config.retrieval)?;
    validate_generator_config(&config.generator)?;
    Ok(())
}

/// Validates crawler configuration
fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    let url = Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid base_url '{}': {}", config.base_url, e))
    })?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' must use http or https",
            config.base_url
        )));
    }

    if url.host_str().is_none() {
        return Err(ConfigError::InvalidUrl(format!(
            "base_url '{}' has no host",
            config.base_url
        )));
    }

    if config.max_depth > MAX_DEPTH_LIMIT {
        return Err(ConfigError::Validation(format!(
            "max_depth must be <= {}, got {}",
            MAX_DEPTH_LIMIT, config.max_depth
        )));
    }

    if config.max_pages < 1 {
        return Err(ConfigError::Validation(format!(
            "max_pages must be >= 1, got {}",
            config.max_pages
        )));
    }

    if config.concurrency < 1 || config.concurrency > 64 {
        return Err(ConfigError::Validation(format!(
            "concurrency must be between 1 and 64, got {}",
            config.concurrency
        )));
    }

    if config.request_delay > 60_000 {
        return Err(ConfigError::Validation(format!(
            "request_delay must be <= 60000ms, got {}ms",
            config.request_delay
        )));
    }

    if config.request_timeout < 1 {
        return Err(ConfigError::Validation(
            "request_timeout must be >= 1 second".to_string(),
        ));
    }

    if config.document_extensions.is_empty() {
        return Err(ConfigError::Validation(
            "document_extensions cannot be empty".to_string(),
        ));
    }

    for ext in &config.document_extensions {
        if ext.is_empty() || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation(format!(
                "document extension '{}' must be non-empty and alphanumeric (no leading dot)",
                ext
            )));
        }
    }

    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.output_dir.is_empty() {
        return Err(ConfigError::Validation(
            "output_dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates chunking and key parameters
fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    validate_chunk_params(config.chunk_size, config.chunk_overlap)?;

    if config.strategy == StrategyKind::Dense && config.dimensions < 8 {
        return Err(ConfigError::Validation(format!(
            "dimensions must be >= 8 for the dense strategy, got {}",
            config.dimensions
        )));
    }

    Ok(())
}

/// Checks `size > overlap > 0`
pub(crate) fn validate_chunk_params(size: usize, overlap: usize) -> Result<(), ConfigError> {
    if overlap == 0 {
        return Err(ConfigError::Validation(
            "chunk_overlap must be > 0".to_string(),
        ));
    }

    if size <= overlap {
        return Err(ConfigError::Validation(format!(
            "chunk_size ({}) must be greater than chunk_overlap ({})",
            size, overlap
        )));
    }

    Ok(())
}

/// Validates retrieval configuration
fn validate_retrieval_config(config: &RetrievalConfig) -> Result<(), ConfigError> {
    if config.top_k < 1 {
        return Err(ConfigError::Validation(format!(
            "top_k must be >= 1, got {}",
            config.top_k
        )));
    }

    if config.min_score.is_some_and(|score| !score.is_finite()) {
        return Err(ConfigError::Validation(
            "min_score must be a finite number".to_string(),
        ));
    }

    Ok(())
}

/// Validates generator configuration
fn validate_generator_config(config: &GeneratorConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url).map_err(|e| {
        ConfigError::InvalidUrl(format!("Invalid generator base_url: {}", e))
    })?;

    if config.timeout < 1 {
        return Err(ConfigError::Validation(
            "generator timeout must be >= 1 second".to_string(),
        ));
    }

    if !(0.0..=2.0).contains(&config.temperature) {
        return Err(ConfigError::Validation(format!(
            "temperature must be between 0 and 2, got {}",
            config.temperature
        )));
    }

    if config.enabled && config.model.trim().is_empty() {
        return Err(ConfigError::Validation(
            "model cannot be empty when the generator is enabled".to_string(),
        ));
    }

    Ok(())
}
