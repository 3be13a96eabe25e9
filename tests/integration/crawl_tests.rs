//! End-to-end crawl runs against a mock site

use crate::{article_page, mount_page, test_config};
use chrono::NaiveDate;
use idcrawl::crawler::{Coordinator, StopReason};
use idcrawl::storage::{Checkpoint, Record, SqliteStorage, Storage};
use idcrawl::CrawlError;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn stored_record(id: i64) -> Record {
    let mut record = Record::new(id, "dawn", format!("https://www.dawn.com/news/{}", id));
    record.title = Some(format!("Stored {}", id));
    record
}

/// Every requested ID must stay unrequested
async fn forbid_page(server: &MockServer, id: i64) {
    Mock::given(method("GET"))
        .and(path(format!("/news/{}", id)))
        .respond_with(ResponseTemplate::new(200).set_body_string("unexpected"))
        .expect(0)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_crawl_stores_records_and_stops_after_threshold() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    mount_page(&server, 1, article_page("pakistan", "One", "June 5, 2023")).await;
    mount_page(&server, 2, article_page("world", "Two", "June 6, 2023")).await;
    mount_page(&server, 3, article_page("sport", "Three", "June 7, 2023")).await;

    let mut coordinator = Coordinator::new(test_config(&server.uri(), &db_path)).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::MissThreshold);
    assert_eq!(report.checkpoint.last_id, 53);
    assert_eq!(report.checkpoint.total_success_count, 3);
    assert_eq!(
        report.checkpoint.last_seen_date,
        NaiveDate::from_ymd_opt(2023, 6, 7)
    );
    assert_eq!(report.counts.fetched, 3);
    assert_eq!(report.counts.stored, 3);
    assert_eq!(report.counts.misses, 50);

    let storage = coordinator.storage();
    assert_eq!(storage.count_records("dawn").unwrap(), 3);

    let record = storage.get_record(2, "dawn").unwrap().unwrap();
    assert_eq!(record.title.as_deref(), Some("Two"));
    assert_eq!(record.category.as_deref(), Some("world"));
    assert_eq!(record.date, NaiveDate::from_ymd_opt(2023, 6, 6));
    assert_eq!(record.summary.as_deref(), Some("First paragraph."));
    assert_eq!(
        record.body.as_deref(),
        Some("Second paragraph.\nThird paragraph.")
    );
    assert_eq!(record.url, format!("{}/news/2", server.uri()));

    // The checkpoint survives reopening the database
    drop(coordinator);
    let reopened = SqliteStorage::new(&db_path).unwrap();
    let checkpoint = reopened.read_checkpoint("dawn").unwrap().unwrap();
    assert_eq!(checkpoint.last_id, 53);
    assert_eq!(checkpoint.total_success_count, 3);
}

#[tokio::test]
async fn test_empty_site_terminates_at_threshold() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = test_config(&server.uri(), &dir.path().join("crawl.db"));
    config.crawler.miss_threshold = 5;

    let mut coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::MissThreshold);
    assert_eq!(report.checkpoint.last_id, 5);
    assert_eq!(report.checkpoint.total_success_count, 0);
    assert_eq!(report.counts.stored, 0);
}

#[tokio::test]
async fn test_success_resets_miss_counter() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // IDs 1..=49 miss, 50 exists, then 51..=100 miss
    mount_page(&server, 50, article_page("world", "Fifty", "May 1, 2020")).await;

    let mut coordinator = Coordinator::new(test_config(&server.uri(), &dir.path().join("crawl.db"))).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.checkpoint.last_id, 100);
    assert_eq!(report.checkpoint.total_success_count, 1);
    assert_eq!(report.counts.misses, 99);
}

#[tokio::test]
async fn test_no_content_page_is_not_a_miss() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    let mut config = test_config(&server.uri(), &dir.path().join("crawl.db"));
    config.crawler.miss_threshold = 3;

    // 1, 2 miss; 3 exists without content; 4, 5 miss; 6 is an article; 7..=9 miss
    mount_page(&server, 3, "<html><body></body></html>".to_string()).await;
    mount_page(&server, 6, article_page("sport", "Six", "March 3, 2021")).await;

    let mut coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.checkpoint.last_id, 9);
    assert_eq!(report.counts.no_content, 1);
    assert_eq!(report.counts.stored, 1);
    assert!(coordinator.storage().get_record(3, "dawn").unwrap().is_none());
    assert!(coordinator.storage().get_record(6, "dawn").unwrap().is_some());
}

#[tokio::test]
async fn test_resume_continues_after_checkpoint() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let mut checkpoint = Checkpoint::new("dawn");
        checkpoint.last_id = 5;
        checkpoint.total_success_count = 5;
        let records: Vec<Record> = (1..=5).map(stored_record).collect();
        storage
            .write_checkpoint_and_batch(&checkpoint, &records)
            .unwrap();
    }

    for id in 1..=5 {
        forbid_page(&server, id).await;
    }
    mount_page(&server, 6, article_page("world", "Six", "June 8, 2023")).await;

    let mut coordinator = Coordinator::new(test_config(&server.uri(), &db_path)).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.checkpoint.last_id, 56);
    assert_eq!(report.checkpoint.total_success_count, 6);
    assert_eq!(report.counts.stored, 1);

    let storage = coordinator.storage();
    assert_eq!(storage.count_records("dawn").unwrap(), 6);
    assert_eq!(
        storage.get_record(1, "dawn").unwrap().unwrap().title.as_deref(),
        Some("Stored 1")
    );
}

#[tokio::test]
async fn test_resume_skips_ids_already_stored() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    {
        let mut storage = SqliteStorage::new(&db_path).unwrap();
        let mut checkpoint = Checkpoint::new("dawn");
        checkpoint.last_id = 2;
        checkpoint.total_success_count = 3;
        let records: Vec<Record> = [1, 2, 4].into_iter().map(stored_record).collect();
        storage
            .write_checkpoint_and_batch(&checkpoint, &records)
            .unwrap();
    }

    mount_page(&server, 3, article_page("pakistan", "Three", "June 8, 2023")).await;
    forbid_page(&server, 4).await;

    let mut config = test_config(&server.uri(), &db_path);
    config.crawler.miss_threshold = 3;

    let mut coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.counts.skipped, 1);
    assert_eq!(report.counts.stored, 1);
    assert_eq!(report.checkpoint.last_id, 7);
    assert_eq!(coordinator.storage().count_records("dawn").unwrap(), 4);
}

#[tokio::test]
async fn test_rerun_after_completion_is_idempotent() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    mount_page(&server, 1, article_page("world", "One", "June 5, 2023")).await;

    let mut config = test_config(&server.uri(), &db_path);
    config.crawler.miss_threshold = 3;

    let first = Coordinator::new(config.clone()).unwrap().run().await.unwrap();
    let second = Coordinator::new(config).unwrap().run().await.unwrap();

    assert_eq!(first.checkpoint.last_id, 4);
    assert_eq!(second.checkpoint.last_id, 7);
    assert_eq!(second.checkpoint.total_success_count, 1);
    assert_eq!(second.counts.stored, 0);

    let storage = SqliteStorage::new(&db_path).unwrap();
    assert_eq!(storage.count_records("dawn").unwrap(), 1);
}

#[tokio::test]
async fn test_transient_failure_retries_same_id() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    // The first request for ID 1 times out, the second one is served
    Mock::given(method("GET"))
        .and(path("/news/1"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, article_page("world", "One", "June 5, 2023")).await;

    let mut config = test_config(&server.uri(), &dir.path().join("crawl.db"));
    config.crawler.request_timeout_ms = 300;
    config.crawler.miss_threshold = 2;

    let mut coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.run().await.unwrap();

    assert_eq!(report.stop_reason, StopReason::MissThreshold);
    assert_eq!(report.counts.transient_failures, 1);
    assert_eq!(report.counts.fetched, 1);
    assert_eq!(report.counts.stored, 1);
    assert_eq!(report.counts.misses, 2);
    assert_eq!(report.checkpoint.last_id, 3);

    let record = coordinator.storage().get_record(1, "dawn").unwrap().unwrap();
    assert_eq!(record.title.as_deref(), Some("One"));
}

#[tokio::test]
async fn test_retries_exhausted_flushes_and_fails() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    mount_page(&server, 1, article_page("world", "One", "June 5, 2023")).await;
    Mock::given(method("GET"))
        .and(path("/news/2"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;

    let mut config = test_config(&server.uri(), &db_path);
    config.crawler.request_timeout_ms = 200;
    config.crawler.max_retries = 1;

    let mut coordinator = Coordinator::new(config).unwrap();
    let result = coordinator.run().await;

    // One retry after the first attempt
    match result {
        Err(CrawlError::RetriesExhausted { id, attempts, .. }) => {
            assert_eq!(id, 2);
            assert_eq!(attempts, 2);
        }
        other => panic!("Expected RetriesExhausted, got {:?}", other),
    }

    // Work before the failing ID is kept, and the failing ID is not marked attempted
    let checkpoint = coordinator.storage().read_checkpoint("dawn").unwrap().unwrap();
    assert_eq!(checkpoint.last_id, 1);
    assert_eq!(checkpoint.total_success_count, 1);
    assert!(coordinator.storage().get_record(1, "dawn").unwrap().is_some());
}

#[tokio::test]
async fn test_flush_batch_size_commits_in_batches() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();

    for id in 1..=5 {
        mount_page(&server, id, article_page("world", "Item", "June 5, 2023")).await;
    }

    let mut config = test_config(&server.uri(), &dir.path().join("crawl.db"));
    config.crawler.miss_threshold = 2;
    config.crawler.flush_batch_size = 2;

    let mut coordinator = Coordinator::new(config).unwrap();
    let report = coordinator.run().await.unwrap();

    // Two full batches, then the final flush with the fifth record
    assert_eq!(report.counts.flushes, 3);
    assert_eq!(report.counts.stored, 5);
    assert_eq!(report.checkpoint.last_id, 7);
}

#[tokio::test]
async fn test_shutdown_before_first_fetch() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    forbid_page(&server, 1).await;

    let mut coordinator = Coordinator::new(test_config(&server.uri(), &dir.path().join("crawl.db"))).unwrap();
    let report = coordinator.run_until(std::future::ready(())).await.unwrap();

    assert_eq!(report.stop_reason, StopReason::Interrupted);
    assert_eq!(report.checkpoint.last_id, 0);
    assert_eq!(report.counts.flushes, 0);
    assert!(coordinator.storage().read_checkpoint("dawn").unwrap().is_none());
}

#[tokio::test]
async fn test_shutdown_during_crawl_keeps_progress() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let db_path = dir.path().join("crawl.db");

    mount_page(&server, 1, article_page("world", "One", "June 5, 2023")).await;
    Mock::given(method("GET"))
        .and(path("/news/2"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;

    let mut coordinator = Coordinator::new(test_config(&server.uri(), &db_path)).unwrap();
    let report = coordinator
        .run_until(tokio::time::sleep(Duration::from_millis(500)))
        .await
        .unwrap();

    assert_eq!(report.stop_reason, StopReason::Interrupted);
    assert_eq!(report.checkpoint.last_id, 1);

    drop(coordinator);
    let storage = SqliteStorage::new(&db_path).unwrap();
    let checkpoint = storage.read_checkpoint("dawn").unwrap().unwrap();
    assert_eq!(checkpoint.last_id, 1);
    assert_eq!(checkpoint.total_success_count, 1);
}
