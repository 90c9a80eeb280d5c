use crate::config::StrategyKind;
use crate::index::{IndexError, RetrievalKey};
use async_trait::async_trait;

/// How chunks are turned into retrieval keys and scored against a query
#[async_trait]
pub trait RetrievalStrategy: Send + Sync {
    /// Which configured strategy this is
    fn kind(&self) -> StrategyKind;

    /// Storage tag of the keys this strategy produces
    fn key_kind(&self) -> &'static str;

    /// Builds keys for chunk texts, in input order
    async fn encode_chunks(&self, texts: &[&str]) -> Result<Vec<RetrievalKey>, IndexError>;

    /// Builds the key for a question
    async fn encode_query(&self, text: &str) -> Result<RetrievalKey, IndexError>;

    /// Scores every corpus key against the query key, in corpus order
    ///
    /// Keys of another kind score 0.
    fn score(&self, query: &RetrievalKey, corpus: &[&RetrievalKey]) -> Vec<f32>;

    /// Stable description of every parameter that changes the keys
    fn describe(&self) -> String;

    /// Score floor used when `retrieval.min-score` is not configured
    fn default_min_score(&self) -> f32 {
        0.0
    }

    /// Whether a scored chunk can answer the query at all
    fn is_related(&self, _query: &str, _chunk_text: &str) -> bool {
        true
    }
}
