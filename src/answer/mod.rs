//! Answer assembly from retrieved chunks
//!
//! The [`Assembler`] queries the index, builds a grounding context strictly
//! from the retrieved chunk text and either asks a [`Generator`] to phrase an
//! answer or falls back to an extractive one. Sources are always returned.

mod excerpt;
mod generator;

pub use excerpt::extract_excerpt;
pub use generator::{GenerationError, Generator, OpenAiGenerator};

use crate::config::Config;
use crate::index::{Indexer, RetrievalResult};
use crate::{ConfigError, DocentError};
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

/// Message returned when nothing relevant was retrieved
pub const NO_RELEVANT_CONTENT: &str = "I couldn't find any relevant content for your question. \
Try rephrasing your question or asking about a different topic.";

/// How an answer was produced
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum Outcome {
    /// The index holds nothing relevant; no answer was attempted
    NoRelevantContent,
    /// Phrased by the language model
    Generated,
    /// Assembled from excerpts, no generator configured
    Extractive,
    /// The generator failed; the text is the extractive fallback
    Degraded { reason: String },
}

/// A document cited by an answer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Source {
    pub document_id: String,
    pub url: String,
    pub title: Option<String>,
}

/// Answer to one question
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    pub text: String,
    /// Cited documents, deduplicated, in rank order
    pub sources: Vec<Source>,
    pub outcome: Outcome,
    /// Retrieved chunks the answer is grounded on
    pub excerpts: Vec<RetrievalResult>,
}

impl Answer {
    fn no_relevant_content() -> Self {
        Self {
            text: NO_RELEVANT_CONTENT.to_string(),
            sources: Vec::new(),
            outcome: Outcome::NoRelevantContent,
            excerpts: Vec::new(),
        }
    }

    /// Ids of the cited documents
    pub fn source_ids(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.document_id.as_str()).collect()
    }
}

/// Retrieves chunks for a question and assembles the answer
pub struct Assembler {
    indexer: Arc<Indexer>,
    generator: Option<Arc<dyn Generator>>,
    top_k: usize,
    timeout: Duration,
}

impl Assembler {
    /// Creates an extractive assembler
    pub fn new(indexer: Arc<Indexer>, top_k: usize) -> Self {
        Self {
            indexer,
            generator: None,
            top_k,
            timeout: Duration::from_secs(60),
        }
    }

    /// Phrases answers with `generator`, bounding each call by `timeout`
    pub fn with_generator(mut self, generator: Arc<dyn Generator>, timeout: Duration) -> Self {
        self.generator = Some(generator);
        self.timeout = timeout;
        self
    }

    /// Builds an assembler from configuration
    ///
    /// An enabled generator without an API key is a configuration error.
    pub fn from_config(config: &Config, indexer: Arc<Indexer>) -> Result<Self, ConfigError> {
        let assembler = Self::new(indexer, config.retrieval.top_k);
        if !config.generator.enabled {
            return Ok(assembler);
        }

        let generator = OpenAiGenerator::from_config(&config.generator)?;
        Ok(assembler.with_generator(
            Arc::new(generator),
            Duration::from_secs(config.generator.timeout),
        ))
    }

    /// Answers `question` from the indexed corpus
    ///
    /// # Returns
    ///
    /// * `Ok(Answer)` - Generated, extractive, degraded or no-relevant-content
    /// * `Err(DocentError)` - The index could not be queried
    pub async fn answer(&self, question: &str) -> Result<Answer, DocentError> {
        let results = self.indexer.query(question, self.top_k).await?;
        if results.is_empty() {
            tracing::info!("No relevant content for {:?}", question);
            return Ok(Answer::no_relevant_content());
        }

        let sources = collect_sources(&results);
        tracing::debug!(
            "Retrieved {} chunks from {} documents",
            results.len(),
            sources.len()
        );

        let (text, outcome) = match &self.generator {
            None => (extractive_answer(question, &results), Outcome::Extractive),
            Some(generator) => {
                let prompt = build_prompt(question, &render_context(&results));
                match self.generate(generator.as_ref(), &prompt).await {
                    Ok(text) => (text, Outcome::Generated),
                    Err(e) => {
                        tracing::warn!("Generation failed, answering extractively: {}", e);
                        (
                            extractive_answer(question, &results),
                            Outcome::Degraded {
                                reason: e.to_string(),
                            },
                        )
                    }
                }
            }
        };

        Ok(Answer {
            text,
            sources,
            outcome,
            excerpts: results,
        })
    }

    async fn generate(
        &self,
        generator: &dyn Generator,
        prompt: &str,
    ) -> Result<String, GenerationError> {
        let text = tokio::time::timeout(self.timeout, generator.generate(prompt))
            .await
            .map_err(|_| GenerationError::Timeout(self.timeout))??;

        let text = text.trim();
        if text.is_empty() {
            return Err(GenerationError::EmptyResponse);
        }
        Ok(text.to_string())
    }
}

/// One source per document, in the order the documents first rank
fn collect_sources(results: &[RetrievalResult]) -> Vec<Source> {
    let mut seen = HashSet::new();
    results
        .iter()
        .filter(|r| seen.insert(r.document_id.as_str()))
        .map(|r| Source {
            document_id: r.document_id.clone(),
            url: r.source_url.clone(),
            title: r.title.clone(),
        })
        .collect()
}

/// Renders retrieved chunks as numbered context blocks
pub fn render_context(results: &[RetrievalResult]) -> String {
    let mut out = String::new();
    for (i, result) in results.iter().enumerate() {
        out.push_str(&format!("[{}] Source: {}\n", i + 1, result.source_url));
        if let Some(title) = &result.title {
            out.push_str(&format!("Title: {}\n", title));
        }
        out.push_str(result.text.trim());
        out.push_str("\n---\n");
    }
    out
}

/// Builds the grounded prompt sent to the generator
pub fn build_prompt(question: &str, context: &str) -> String {
    let mut prompt = String::new();
    prompt.push_str("Context:\n");
    prompt.push_str(context);
    prompt.push_str("\nQuestion:\n");
    prompt.push_str(question.trim());
    prompt.push_str(
        "\n\nAnswer using only the context above. \
If the answer is not clearly in the context, say that you do not know.\n",
    );
    prompt
}

fn extractive_answer(question: &str, results: &[RetrievalResult]) -> String {
    let mut seen = HashSet::new();
    let mut parts = vec!["Based on the indexed content, here's what I found:\n".to_string()];

    for (i, result) in results
        .iter()
        .filter(|r| seen.insert(r.document_id.as_str()))
        .enumerate()
    {
        let title = result.title.as_deref().unwrap_or("Untitled");
        parts.push(format!("\n{}. From '{}':", i + 1, title));
        let excerpt = extract_excerpt(&result.text, question);
        if !excerpt.is_empty() {
            parts.push(format!("   {}", excerpt));
        }
        parts.push(format!("   Source: {}\n", result.source_url));
    }

    parts.join("\n")
}
