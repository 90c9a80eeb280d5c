//! Keyword retrieval scored with BM25

use crate::config::StrategyKind;
use crate::index::strategy::RetrievalStrategy;
use crate::index::tokenize::{term_counts, MIN_TOKEN_CHARS};
use crate::index::{IndexError, RetrievalKey};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};

const BM25_K1: f32 = 1.2;
const BM25_B: f32 = 0.75;

/// Token multisets scored with BM25, IDF computed over the indexed corpus
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalStrategy;

impl LexicalStrategy {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RetrievalStrategy for LexicalStrategy {
    fn kind(&self) -> StrategyKind {
        StrategyKind::Lexical
    }

    fn key_kind(&self) -> &'static str {
        "terms"
    }

    async fn encode_chunks(&self, texts: &[&str]) -> Result<Vec<RetrievalKey>, IndexError> {
        Ok(texts
            .iter()
            .map(|text| RetrievalKey::Terms(term_counts(text)))
            .collect())
    }

    async fn encode_query(&self, text: &str) -> Result<RetrievalKey, IndexError> {
        Ok(RetrievalKey::Terms(term_counts(text)))
    }

    fn score(&self, query: &RetrievalKey, corpus: &[&RetrievalKey]) -> Vec<f32> {
        let RetrievalKey::Terms(query_terms) = query else {
            return vec![0.0; corpus.len()];
        };

        let docs: Vec<Option<&BTreeMap<String, u32>>> = corpus
            .iter()
            .map(|key| match key {
                RetrievalKey::Terms(terms) => Some(terms),
                RetrievalKey::Vector(_) => None,
            })
            .collect();

        let stats = CorpusStats::collect(docs.iter().flatten().copied());

        docs.iter()
            .map(|doc| doc.map_or(0.0, |terms| bm25_score(query_terms, terms, &stats)))
            .collect()
    }

    fn describe(&self) -> String {
        format!(
            "lexical;bm25;k1={};b={};min-token={}",
            BM25_K1, BM25_B, MIN_TOKEN_CHARS
        )
    }
}

/// Document frequencies and average length over the scored corpus
struct CorpusStats<'a> {
    doc_freqs: HashMap<&'a str, usize>,
    total_docs: usize,
    avg_doc_len: f32,
}

impl<'a> CorpusStats<'a> {
    fn collect(docs: impl Iterator<Item = &'a BTreeMap<String, u32>>) -> Self {
        let mut doc_freqs = HashMap::new();
        let mut total_docs = 0usize;
        let mut total_len = 0u64;

        for terms in docs {
            total_docs += 1;
            total_len += terms.values().map(|&c| u64::from(c)).sum::<u64>();
            for term in terms.keys() {
                *doc_freqs.entry(term.as_str()).or_insert(0) += 1;
            }
        }

        let avg_doc_len = if total_docs == 0 {
            0.0
        } else {
            total_len as f32 / total_docs as f32
        };

        Self {
            doc_freqs,
            total_docs,
            avg_doc_len,
        }
    }
}

fn bm25_score(
    query_terms: &BTreeMap<String, u32>,
    doc_terms: &BTreeMap<String, u32>,
    stats: &CorpusStats<'_>,
) -> f32 {
    let doc_len: u32 = doc_terms.values().sum();
    if query_terms.is_empty() || doc_len == 0 || stats.total_docs == 0 {
        return 0.0;
    }

    let n = stats.total_docs as f32;
    let length_norm = BM25_B.mul_add(doc_len as f32 / stats.avg_doc_len.max(1.0), 1.0 - BM25_B);

    let mut score = 0.0;
    // Each distinct query term counts once
    for term in query_terms.keys() {
        let Some(&tf) = doc_terms.get(term) else {
            continue;
        };
        let df = *stats.doc_freqs.get(term.as_str()).unwrap_or(&0) as f32;
        let idf = ((n - df + 0.5) / (df + 0.5)).ln_1p().max(0.0);
        let tf = tf as f32;
        let denom = BM25_K1.mul_add(length_norm, tf);
        if denom > 0.0 {
            score += idf * (tf * (BM25_K1 + 1.0) / denom);
        }
    }
    score
}
