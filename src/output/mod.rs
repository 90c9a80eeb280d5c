//! Output module for reports printed by the command line
//!
//! This module handles:
//! - Summaries of ingest runs
//! - Answers with their cited sources
//! - Statistics read back from the content store

pub mod stats;

pub use stats::{load_statistics, print_statistics, IndexStatistics};

use crate::answer::{Answer, Outcome};
use crate::pipeline::IngestReport;

/// Prints the summary of an ingest run
///
/// # Arguments
///
/// * `report` - Counters returned by `Pipeline::ingest`
pub fn print_ingest_report(report: &IngestReport) {
    println!("=== Ingest Summary ===\n");

    println!("Crawl:");
    println!("  Pages fetched: {}", report.pages_fetched);
    println!("  Pages failed: {}", report.pages_failed);
    println!("  Documents discovered: {}", report.documents_discovered);
    println!();

    println!("Index:");
    println!("  Indexed: {}", report.indexed);
    println!("  Unchanged: {}", report.unchanged);
    if report.reindexed > 0 {
        println!("  Rebuilt from store: {}", report.reindexed);
    }
    println!("  Chunks written: {}", report.chunks_indexed);
    println!();

    if !report.skipped.is_empty() {
        println!("Skipped ({}):", report.skipped.len());
        for (url, reason) in &report.skipped {
            println!("  - {}: {}", url, reason);
        }
        println!();
    }

    if report.cancelled {
        println!("Run was cancelled before completion");
    }
}

/// Prints an answer followed by its sources
pub fn print_answer(answer: &Answer) {
    println!("{}\n", answer.text);

    if let Outcome::Degraded { reason } = &answer.outcome {
        println!("(language model unavailable: {})\n", reason);
    }

    if answer.sources.is_empty() {
        return;
    }

    println!("Sources:");
    for (i, source) in answer.sources.iter().enumerate() {
        match &source.title {
            Some(title) => println!("  [{}] {} - {}", i + 1, title, source.url),
            None => println!("  [{}] {}", i + 1, source.url),
        }
    }
}
