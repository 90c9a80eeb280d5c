//! Vector retrieval scored with cosine similarity

use crate::config::StrategyKind;
use crate::index::embedder::Embedder;
use crate::index::strategy::RetrievalStrategy;
use crate::index::tokenize::tokenize;
use crate::index::{IndexError, RetrievalKey};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

/// Embedding vectors compared by cosine similarity
pub struct DenseStrategy {
    embedder: Arc<dyn Embedder>,
    dimensions: usize,
}

impl DenseStrategy {
    pub fn new(embedder: Arc<dyn Embedder>, dimensions: usize) -> Self {
        Self {
            embedder,
            dimensions,
        }
    }

    fn check_dimensions(&self, vector: Vec<f32>) -> Result<RetrievalKey, IndexError> {
        if vector.len() != self.dimensions {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimensions,
                actual: vector.len(),
            });
        }
        Ok(RetrievalKey::Vector(vector))
    }
}

#[async_trait]
impl RetrievalStrategy for DenseStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Dense
    }

    fn key_kind(&self) -> &'static str {
        "vector"
    }

    async fn encode_chunks(&self, texts: &[&str]) -> Result<Vec<RetrievalKey>, IndexError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let vectors = self.embedder.embed(texts).await?;
        if vectors.len() != texts.len() {
            return Err(IndexError::Embedding(format!(
                "embedder returned {} vectors for {} texts",
                vectors.len(),
                texts.len()
            )));
        }

        vectors
            .into_iter()
            .map(|vector| self.check_dimensions(vector))
            .collect()
    }

    async fn encode_query(&self, text: &str) -> Result<RetrievalKey, IndexError> {
        let vector = self
            .embedder
            .embed(&[text])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| IndexError::Embedding("embedder returned no vector".to_string()))?;
        self.check_dimensions(vector)
    }

    fn score(&self, query: &RetrievalKey, corpus: &[&RetrievalKey]) -> Vec<f32> {
        let RetrievalKey::Vector(query) = query else {
            return vec![0.0; corpus.len()];
        };

        corpus
            .iter()
            .map(|key| match key {
                RetrievalKey::Vector(vector) => cosine(query, vector),
                RetrievalKey::Terms(_) => 0.0,
            })
            .collect()
    }

    fn describe(&self) -> String {
        format!("dense;cosine;dims={};embedder={}", self.dimensions, self.embedder.name())
    }

    fn default_min_score(&self) -> f32 {
        self.embedder.similarity_floor()
    }

    fn is_related(&self, query: &str, chunk_text: &str) -> bool {
        if !self.embedder.lexical_only() {
            return true;
        }
        shares_token(query, chunk_text)
    }
}

/// Whether `a` and `b` have at least one token in common
fn shares_token(a: &str, b: &str) -> bool {
    let tokens: HashSet<String> = tokenize(a).into_iter().collect();
    !tokens.is_empty() && tokenize(b).iter().any(|token| tokens.contains(token))
}

/// Cosine similarity; 0 for empty, zero-norm or mismatched vectors
pub fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.is_empty() || a.len() != b.len() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}
