//! Docent main entry point
//!
//! This is the command-line interface for the Docent site crawler and
//! question answerer.

use anyhow::Context;
use clap::{Parser, Subcommand};
use docent::answer::Assembler;
use docent::config::{load_config_with_hash, validate, Config};
use docent::extract::HtmlTextExtractor;
use docent::index::{build_strategy, fingerprint, Indexer, FINGERPRINT_KEY};
use docent::output::{load_statistics, print_answer, print_ingest_report, print_statistics};
use docent::pipeline::Pipeline;
use docent::storage::{database_path, open_storage, IndexStore};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Docent: answers questions from the documents of one website
///
/// Docent crawls a site for documents, indexes their text in a local
/// SQLite database and answers questions with cited excerpts.
#[derive(Parser, Debug)]
#[command(name = "docent")]
#[command(version)]
#[command(about = "Crawl a website and answer questions from its documents", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose", global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Crawl the site and bring the index up to date
    Ingest {
        /// Re-chunk and re-index every document, even unchanged ones
        #[arg(long)]
        reindex: bool,

        /// Override crawler.max-depth
        #[arg(long, value_name = "N")]
        max_depth: Option<u32>,
    },

    /// Answer a question from the indexed documents
    Ask {
        /// The question to answer
        #[arg(required = true, num_args = 1..)]
        question: Vec<String>,

        /// Override retrieval.top-k
        #[arg(long, value_name = "N")]
        top_k: Option<usize>,
    },

    /// Show statistics from the database and exit
    Stats,

    /// Validate config and show the effective settings without crawling
    DryRun,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let (mut config, config_hash) = match load_config_with_hash(&cli.config) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };
    tracing::info!("Configuration loaded successfully (hash: {})", config_hash);

    match cli.command {
        Command::Ingest { reindex, max_depth } => {
            config.storage.reindex |= reindex;
            if let Some(depth) = max_depth {
                config.crawler.max_depth = depth;
            }
            validate(&config)?;
            handle_ingest(config).await
        }
        Command::Ask { question, top_k } => {
            if let Some(k) = top_k {
                config.retrieval.top_k = k;
            }
            validate(&config)?;
            handle_ask(&config, &question.join(" ")).await
        }
        Command::Stats => handle_stats(&config),
        Command::DryRun => handle_dry_run(&config),
    }
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("docent=info,warn"),
            1 => EnvFilter::new("docent=debug,info"),
            2 => EnvFilter::new("docent=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Handles `ingest`: crawls, extracts and indexes until done or Ctrl-C
async fn handle_ingest(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Ingesting {} (max depth {}, strategy {})",
        config.crawler.base_url,
        config.crawler.max_depth,
        config.index.strategy.as_str()
    );

    let pipeline = Pipeline::from_config(config).context("failed to set up the pipeline")?;

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupt received, finishing the current step");
            on_signal.cancel();
        }
    });

    match pipeline.ingest(&cancel).await {
        Ok(report) => {
            print_ingest_report(&report);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Ingest failed: {}", e);
            Err(e.into())
        }
    }
}

/// Handles `ask`: answers one question from the existing index
async fn handle_ask(config: &Config, question: &str) -> anyhow::Result<()> {
    let storage = open_storage(Path::new(&config.storage.output_dir))
        .context("failed to open the document database")?;
    let strategy = build_strategy(config)?;

    let current = fingerprint(&config.index, strategy.as_ref());
    match storage.get_meta(FINGERPRINT_KEY)? {
        None => tracing::warn!("The index is empty; run `ingest` first"),
        Some(stored) if stored != current => tracing::warn!(
            "The index was built with different settings; run `ingest` to rebuild it"
        ),
        Some(_) => {}
    }

    let storage = Arc::new(Mutex::new(storage));
    let indexer = Arc::new(
        Indexer::new(storage, strategy).with_min_score(config.retrieval.min_score),
    );
    let assembler = Assembler::from_config(config, indexer)?;

    let answer = assembler.answer(question).await?;
    tracing::debug!("Answer outcome: {:?}", answer.outcome);
    print_answer(&answer);

    Ok(())
}

/// Handles `stats`: shows statistics from the database
fn handle_stats(config: &Config) -> anyhow::Result<()> {
    let path = database_path(Path::new(&config.storage.output_dir));
    println!("Database: {}\n", path.display());

    let storage = open_storage(Path::new(&config.storage.output_dir))
        .context("failed to open the document database")?;
    let stats = load_statistics(&storage)?;
    print_statistics(&stats);

    Ok(())
}

/// Handles `dry-run`: prints the effective configuration
fn handle_dry_run(config: &Config) -> anyhow::Result<()> {
    println!("=== Docent Dry Run ===\n");
    println!("{:#?}\n", config);

    let strategy = build_strategy(config)?;
    println!("Retrieval: {}", strategy.describe());
    println!(
        "Database: {}",
        database_path(Path::new(&config.storage.output_dir)).display()
    );

    let unreadable = HtmlTextExtractor::unreadable_extensions(&config.crawler.document_extensions);
    if !unreadable.is_empty() {
        println!(
            "Note: .{} documents will be found but skipped; they need an external text extractor",
            unreadable.join(", .")
        );
    }

    println!("\n✓ Configuration is valid");
    println!(
        "✓ Would crawl {} to depth {}",
        config.crawler.base_url, config.crawler.max_depth
    );

    Ok(())
}
