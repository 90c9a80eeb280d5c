use serde::Deserialize;

/// Main configuration structure for Docent
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub crawler: CrawlerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub index: IndexConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub generator: GeneratorConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Seed page the crawl starts from
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum page depth to crawl from the seed (the seed is depth 0)
    #[serde(rename = "max-depth", default = "default_max_depth")]
    pub max_depth: u32,

    /// Hard ceiling on the number of pages fetched in one run
    #[serde(rename = "max-pages", default = "default_max_pages")]
    pub max_pages: u32,

    /// Minimum interval between request starts (milliseconds)
    #[serde(rename = "request-delay", default = "default_request_delay")]
    pub request_delay: u64,

    /// Timeout applied to every fetch (seconds)
    #[serde(rename = "request-timeout", default = "default_request_timeout")]
    pub request_timeout: u64,

    /// Number of frontier pages fetched concurrently
    #[serde(default = "default_concurrency")]
    pub concurrency: u32,

    /// Only follow pages on the seed's host
    #[serde(rename = "same-site-only", default = "default_true")]
    pub same_site_only: bool,

    /// Honor robots.txt rules and crawl delays
    #[serde(rename = "respect-robots", default = "default_true")]
    pub respect_robots: bool,

    /// Path extensions that mark a link as a downloadable document
    #[serde(
        rename = "document-extensions",
        default = "default_document_extensions"
    )]
    pub document_extensions: Vec<String>,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent", default = "default_user_agent")]
    pub user_agent: String,
}

/// Content store configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Directory holding the SQLite database
    #[serde(rename = "output-dir", default = "default_output_dir")]
    pub output_dir: String,

    /// Re-chunk and re-index every known document even if unchanged
    #[serde(default)]
    pub reindex: bool,
}

/// Chunking and retrieval-key configuration
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Target chunk length in characters
    #[serde(rename = "chunk-size", default = "default_chunk_size")]
    pub chunk_size: usize,

    /// Characters shared by consecutive chunks
    #[serde(rename = "chunk-overlap", default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    /// Retrieval strategy used to build keys and score queries
    #[serde(default)]
    pub strategy: StrategyKind,

    /// Vector length for the dense strategy
    #[serde(default = "default_dimensions")]
    pub dimensions: usize,

    /// Embedding backend for the dense strategy
    #[serde(default)]
    pub embedder: EmbedderKind,

    /// Embedding model name (remote embedder only)
    #[serde(rename = "embedding-model", default = "default_embedding_model")]
    pub embedding_model: String,
}

/// Query-side configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalConfig {
    /// Number of chunks retrieved per question
    #[serde(rename = "top-k", default = "default_top_k")]
    pub top_k: usize,

    /// Results scoring at or below this value are dropped
    ///
    /// Unset means the strategy's own floor: 0 for lexical and hashing
    /// dense retrieval, a similarity floor for remote embeddings.
    #[serde(rename = "min-score", default)]
    pub min_score: Option<f32>,
}

/// Language model configuration for answer phrasing
#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    /// Whether answers are rephrased by a language model
    #[serde(default)]
    pub enabled: bool,

    /// Chat model name
    #[serde(default = "default_model")]
    pub model: String,

    /// OpenAI-compatible API root, shared with the remote embedder
    #[serde(rename = "base-url", default = "default_api_base")]
    pub base_url: String,

    /// Timeout for a single generate call (seconds)
    #[serde(default = "default_generator_timeout")]
    pub timeout: u64,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Upper bound on generated tokens
    #[serde(rename = "max-tokens", default = "default_max_tokens")]
    pub max_tokens: u32,
}

/// Retrieval strategy selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyKind {
    /// Embedding vectors scored by cosine similarity
    Dense,
    /// Token multisets scored by BM25
    #[default]
    Lexical,
}

impl StrategyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dense => "dense",
            Self::Lexical => "lexical",
        }
    }
}

/// Embedding backend selector
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmbedderKind {
    /// Local feature-hashing embedder
    #[default]
    Hashing,
    /// OpenAI-compatible embeddings endpoint
    Openai,
}

impl EmbedderKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Hashing => "hashing",
            Self::Openai => "openai",
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            reindex: false,
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            strategy: StrategyKind::default(),
            dimensions: default_dimensions(),
            embedder: EmbedderKind::default(),
            embedding_model: default_embedding_model(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
            min_score: None,
        }
    }
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            model: default_model(),
            base_url: default_api_base(),
            timeout: default_generator_timeout(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

impl CrawlerConfig {
    /// Builds a crawler section with every option at its default
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            max_depth: default_max_depth(),
            max_pages: default_max_pages(),
            request_delay: default_request_delay(),
            request_timeout: default_request_timeout(),
            concurrency: default_concurrency(),
            same_site_only: true,
            respect_robots: true,
            document_extensions: default_document_extensions(),
            user_agent: default_user_agent(),
        }
    }
}

impl Config {
    /// Builds a configuration for `base_url` with every other option at its default
    pub fn for_site(base_url: impl Into<String>) -> Self {
        Self {
            crawler: CrawlerConfig::with_base_url(base_url),
            storage: StorageConfig::default(),
            index: IndexConfig::default(),
            retrieval: RetrievalConfig::default(),
            generator: GeneratorConfig::default(),
        }
    }
}

fn default_max_depth() -> u32 {
    2
}

fn default_max_pages() -> u32 {
    100
}

fn default_request_delay() -> u64 {
    500
}

fn default_request_timeout() -> u64 {
    30
}

fn default_concurrency() -> u32 {
    4
}

fn default_true() -> bool {
    true
}

fn default_document_extensions() -> Vec<String> {
    vec!["pdf".to_string(), "txt".to_string(), "md".to_string()]
}

fn default_user_agent() -> String {
    format!("docent/{}", env!("CARGO_PKG_VERSION"))
}

fn default_output_dir() -> String {
    "data".to_string()
}

fn default_chunk_size() -> usize {
    1000
}

fn default_chunk_overlap() -> usize {
    200
}

fn default_dimensions() -> usize {
    256
}

fn default_embedding_model() -> String {
    "text-embedding-3-small".to_string()
}

fn default_top_k() -> usize {
    5
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_generator_timeout() -> u64 {
    60
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    500
}
