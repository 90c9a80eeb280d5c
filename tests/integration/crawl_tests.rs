//! Integration tests for the crawler
//!
//! These tests use wiremock to create mock HTTP servers and test
//! the full crawl cycle end-to-end.

use docent::config::CrawlerConfig;
use docent::crawler::Crawler;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Creates a fast crawler configuration for `base_url`
fn test_config(base_url: &str) -> CrawlerConfig {
    let mut config = CrawlerConfig::with_base_url(base_url);
    config.request_delay = 0;
    config.request_timeout = 5;
    config.user_agent = "DocentTest/1.0".to_string();
    config
}

fn html(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/html; charset=utf-8")
        .set_body_string(format!("<html><body>{}</body></html>", body))
}

async fn mount_page(server: &MockServer, page: &str, body: &str) {
    Mock::given(method("GET"))
        .and(path(page))
        .respond_with(html(body))
        .mount(server)
        .await;
}

/// seed links to page A and document D2; A links to document D1
async fn seed_a_site() -> MockServer {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/a">Page A</a> <a href="/files/d2.pdf">D2</a>"#,
    )
    .await;
    mount_page(&server, "/a", r#"<a href="/files/d1.pdf">D1</a>"#).await;
    server
}

#[tokio::test]
async fn test_depth_one_finds_documents_on_linked_pages() {
    let server = seed_a_site().await;
    let base = server.uri();
    let crawler = Crawler::from_config(test_config(&base)).unwrap();

    let outcome = crawler.crawl(&base, 1).await.unwrap();

    assert_eq!(
        outcome.document_urls(),
        vec![
            format!("{}/files/d1.pdf", base).as_str(),
            format!("{}/files/d2.pdf", base).as_str(),
        ]
    );
    assert_eq!(outcome.pages_fetched, 2);

    let d1 = &outcome.documents[&format!("{}/files/d1.pdf", base)];
    assert_eq!(d1.depth, 1);
    assert_eq!(d1.source_page.as_str(), format!("{}/a", base));
}

#[tokio::test]
async fn test_depth_zero_only_reads_the_seed() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/a">Page A</a> <a href="/files/d2.pdf">D2</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/a"))
        .respond_with(html(r#"<a href="/files/d1.pdf">D1</a>"#))
        .expect(0)
        .mount(&server)
        .await;

    let base = server.uri();
    let crawler = Crawler::from_config(test_config(&base)).unwrap();
    let outcome = crawler.crawl(&base, 0).await.unwrap();

    assert_eq!(
        outcome.document_urls(),
        vec![format!("{}/files/d2.pdf", base).as_str()]
    );
}

#[tokio::test]
async fn test_equivalent_links_are_fetched_once() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/guide">one</a> <a href="/guide/">two</a> <a href="/guide#intro">three</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/guide"))
        .respond_with(html(r#"<a href="/">home</a>"#))
        .expect(1)
        .mount(&server)
        .await;

    let base = server.uri();
    let crawler = Crawler::from_config(test_config(&base)).unwrap();
    let outcome = crawler.crawl(&base, 3).await.unwrap();

    assert_eq!(outcome.pages_fetched, 2);
}

#[tokio::test]
async fn test_failed_page_does_not_stop_the_crawl() {
    let server = MockServer::start().await;
    mount_page(
        &server,
        "/",
        r#"<a href="/broken">broken</a> <a href="/ok">ok</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/broken"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    mount_page(&server, "/ok", r#"<a href="/notes.txt">notes</a>"#).await;

    let base = server.uri();
    let crawler = Crawler::from_config(test_config(&base)).unwrap();
    let outcome = crawler.crawl(&base, 2).await.unwrap();

    assert_eq!(outcome.pages_failed, 1);
    assert_eq!(
        outcome.document_urls(),
        vec![format!("{}/notes.txt", base).as_str()]
    );
}

#[tokio::test]
async fn test_page_ceiling_stops_the_crawl() {
    let server = MockServer::start().await;
    let links: String = (0..10)
        .map(|i| format!(r#"<a href="/p{}">p{}</a>"#, i, i))
        .collect();
    mount_page(&server, "/", &links).await;
    for i in 0..10 {
        mount_page(&server, &format!("/p{}", i), "").await;
    }

    let base = server.uri();
    let mut config = test_config(&base);
    config.max_pages = 3;
    let crawler = Crawler::from_config(config).unwrap();
    let outcome = crawler.crawl(&base, 1).await.unwrap();

    assert_eq!(outcome.pages_fetched, 3);
    let received = server.received_requests().await.unwrap();
    let page_requests = received
        .iter()
        .filter(|r| r.url.path() != "/robots.txt")
        .count();
    assert_eq!(page_requests, 3);
}

#[tokio::test]
async fn test_robots_txt_blocks_pages() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/robots.txt"))
        .respond_with(ResponseTemplate::new(200).set_body_string("User-agent: *\nDisallow: /private"))
        .mount(&server)
        .await;
    mount_page(
        &server,
        "/",
        r#"<a href="/private/page">secret</a> <a href="/public">public</a>"#,
    )
    .await;
    Mock::given(method("GET"))
        .and(path("/private/page"))
        .respond_with(html(""))
        .expect(0)
        .mount(&server)
        .await;
    mount_page(&server, "/public", "").await;

    let base = server.uri();
    let crawler = Crawler::from_config(test_config(&base)).unwrap();
    let outcome = crawler.crawl(&base, 2).await.unwrap();

    assert_eq!(outcome.pages_fetched, 2);
    assert_eq!(outcome.skipped, 1);
}
