//! Integration tests for the ingest pipeline and question answering
//!
//! A wiremock server plays the website; the database lives in a temporary
//! directory so each test starts from an empty store.

use docent::answer::{Assembler, Outcome};
use docent::config::{Config, StrategyKind};
use docent::pipeline::Pipeline;
use docent::storage::{ContentStore, IndexStore, IngestEvent};
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const EXODUS: &str = "Israel wandered forty years in the wilderness before entering Canaan. \
The manna fed them every morning of those years.";

const RUTH: &str = "Ruth the Moabite gleaned barley in the fields of Boaz near Bethlehem.";

async fn study_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    r#"<html><head><title>Studies</title></head><body>
                    <a href="/notes/exodus.txt">Exodus</a>
                    <a href="/notes/ruth.txt">Ruth</a>
                    </body></html>"#,
                ),
        )
        .mount(&server)
        .await;

    for (page, body) in [("/notes/exodus.txt", EXODUS), ("/notes/ruth.txt", RUTH)] {
        Mock::given(method("GET"))
            .and(path(page))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/plain; charset=utf-8")
                    .set_body_string(body),
            )
            .mount(&server)
            .await;
    }

    server
}

fn test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::for_site(server.uri());
    config.crawler.request_delay = 0;
    config.crawler.request_timeout = 5;
    config.storage.output_dir = dir.path().to_string_lossy().into_owned();
    config
}

async fn ingest(config: &Config) -> docent::IngestReport {
    Pipeline::from_config(config.clone())
        .unwrap()
        .ingest(&CancellationToken::new())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_ingest_then_answer_with_sources() {
    let server = study_site().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    let report = ingest(&config).await;
    assert_eq!(report.documents_discovered, 2);
    assert_eq!(report.indexed, 2);
    assert!(report.skipped.is_empty());

    let pipeline = Pipeline::from_config(config.clone()).unwrap();
    let assembler = Assembler::from_config(&config, pipeline.indexer()).unwrap();
    let answer = assembler
        .answer("How many years was Israel in the wilderness?")
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::Extractive);
    assert_eq!(answer.sources.len(), 1);
    assert_eq!(
        answer.sources[0].url,
        format!("{}/notes/exodus.txt", server.uri())
    );
    assert!(answer.text.contains("forty years"));
}

#[tokio::test]
async fn test_unrelated_question_has_no_relevant_content() {
    let server = study_site().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);
    ingest(&config).await;

    let pipeline = Pipeline::from_config(config.clone()).unwrap();
    let assembler = Assembler::from_config(&config, pipeline.indexer()).unwrap();
    let answer = assembler
        .answer("photosynthesis in chloroplasts")
        .await
        .unwrap();

    assert_eq!(answer.outcome, Outcome::NoRelevantContent);
    assert!(answer.sources.is_empty());
}

#[tokio::test]
async fn test_dense_unrelated_question_has_no_relevant_content() {
    let server = study_site().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);
    config.index.strategy = StrategyKind::Dense;
    config.index.dimensions = 64;
    ingest(&config).await;

    let pipeline = Pipeline::from_config(config.clone()).unwrap();
    let assembler = Assembler::from_config(&config, pipeline.indexer()).unwrap();
    for question in ["photosynthesis in chloroplasts", "sourdough bread hydration"] {
        let answer = assembler.answer(question).await.unwrap();
        assert_eq!(answer.outcome, Outcome::NoRelevantContent);
        assert!(answer.sources.is_empty());
    }
}

#[tokio::test]
async fn test_second_ingest_skips_unchanged_documents() {
    let server = study_site().await;
    let dir = TempDir::new().unwrap();
    let config = test_config(&server, &dir);

    ingest(&config).await;
    let second = ingest(&config).await;

    assert_eq!(second.indexed, 0);
    assert_eq!(second.unchanged, 2);

    let pipeline = Pipeline::from_config(config).unwrap();
    let storage = pipeline.storage();
    let storage = storage.lock().unwrap();
    assert_eq!(storage.count_documents().unwrap(), 2);
    assert_eq!(storage.count_events(IngestEvent::UnchangedSkip).unwrap(), 2);
}

#[tokio::test]
async fn test_strategy_change_rebuilds_the_index() {
    let server = study_site().await;
    let dir = TempDir::new().unwrap();
    let mut config = test_config(&server, &dir);

    ingest(&config).await;

    config.index.strategy = StrategyKind::Dense;
    config.index.dimensions = 64;
    let rebuilt = ingest(&config).await;
    assert_eq!(rebuilt.indexed, 2);
    assert_eq!(rebuilt.unchanged, 0);

    let pipeline = Pipeline::from_config(config.clone()).unwrap();
    {
        let storage = pipeline.storage();
        let storage = storage.lock().unwrap();
        let by_kind = storage.count_entries_by_kind().unwrap();
        assert_eq!(by_kind, vec![("vector".to_string(), 2)]);
    }

    let assembler = Assembler::from_config(&config, pipeline.indexer()).unwrap();
    let answer = assembler.answer("Ruth gleaned barley").await.unwrap();
    assert_eq!(
        answer.sources[0].url,
        format!("{}/notes/ruth.txt", server.uri())
    );
}
