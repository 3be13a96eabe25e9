//! Fetcher classification against a mock server

use crate::{article_page, mount_page, test_config};
use idcrawl::crawler::{build_http_client, FetchOutcome, Fetcher};
use std::time::Duration;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn fetcher_for(server: &MockServer, timeout: Duration) -> Fetcher {
    let dir = tempfile::tempdir().unwrap();
    let config = test_config(&server.uri(), &dir.path().join("unused.db"));
    let client = build_http_client(&config.user_agent, timeout).unwrap();
    Fetcher::new(client, config.site)
}

#[tokio::test]
async fn test_fetch_success_carries_body() {
    let server = MockServer::start().await;
    mount_page(&server, 7, article_page("world", "Seven", "June 5, 2023")).await;

    let fetcher = fetcher_for(&server, Duration::from_secs(2)).await;

    match fetcher.fetch(7).await {
        FetchOutcome::Success(document) => {
            assert_eq!(document.id, 7);
            assert_eq!(document.status_code, 200);
            assert_eq!(document.url, format!("{}/news/7", server.uri()));
            assert!(document.body.contains("Seven"));
        }
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_not_found_is_miss() {
    // Unmatched paths answer 404
    let server = MockServer::start().await;
    let fetcher = fetcher_for(&server, Duration::from_secs(2)).await;

    match fetcher.fetch(1).await {
        FetchOutcome::Miss { status_code } => assert_eq!(status_code, 404),
        other => panic!("Expected miss, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_gone_is_miss() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/3"))
        .respond_with(ResponseTemplate::new(410))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, Duration::from_secs(2)).await;

    assert!(matches!(
        fetcher.fetch(3).await,
        FetchOutcome::Miss { status_code: 410 }
    ));
}

#[tokio::test]
async fn test_fetch_server_error_is_a_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/4"))
        .respond_with(ResponseTemplate::new(500).set_body_string("<html></html>"))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, Duration::from_secs(2)).await;

    match fetcher.fetch(4).await {
        FetchOutcome::Success(document) => assert_eq!(document.status_code, 500),
        other => panic!("Expected success, got {:?}", other),
    }
}

#[tokio::test]
async fn test_fetch_timeout_is_transient() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/5"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, Duration::from_millis(200)).await;

    assert!(matches!(
        fetcher.fetch(5).await,
        FetchOutcome::TransientFailure { .. }
    ));
}

#[tokio::test]
async fn test_fetch_sends_user_agent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/news/9"))
        .and(header(
            "user-agent",
            "TestBot/1.0.0 (+https://example.com/contact; test@example.com)",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let fetcher = fetcher_for(&server, Duration::from_secs(2)).await;

    assert!(matches!(fetcher.fetch(9).await, FetchOutcome::Success(_)));
}
