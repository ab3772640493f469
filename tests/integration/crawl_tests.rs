//! Integration tests for the harvester
//!
//! These tests use wiremock to stand in for the listing site and run the
//! full token → listing → detail → SQLite cycle end-to-end.

use listing_harvester::config::Config;
use listing_harvester::crawler::{crawl, Coordinator};
use listing_harvester::storage::{RunStatus, SqliteStorage, Storage};
use listing_harvester::{HarvestError, StopReason};
use rusqlite::Connection;
use serde_json::json;
use std::path::Path;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, header_exists, headers, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const LANDING_PAGE: &str = r#"<html><head>
    <meta name="csrf-token" content="tok-1">
    </head><body>Directory</body></html>"#;

/// Creates a test configuration pointing at the mock server
fn create_test_config(server: &MockServer, dir: &TempDir) -> Config {
    let mut config = Config::for_site(
        &format!("{}/directory", server.uri()),
        &format!("{}/directory/more", server.uri()),
    );
    config.crawler.concurrency = 2;
    config.http.timeout_secs = 5;
    config.database.path = db_path(dir);
    config
}

fn db_path(dir: &TempDir) -> String {
    dir.path().join("harvest.db").to_string_lossy().into_owned()
}

/// Listing envelope holding one block per name
fn listing_page(names: &[&str]) -> serde_json::Value {
    let blocks: String = names
        .iter()
        .map(|name| {
            format!(
                r#"<div class="listing-item">
                    <img src="/img/{0}.png">
                    <h3 class="listing-name">{0}</h3>
                    <p class="listing-locations">Berlin, Paris</p>
                    <p class="listing-description">About {0}</p>
                    <a class="listing-link" href="/company/{0}">More</a>
                </div>"#,
                name
            )
        })
        .collect();
    json!({ "html": blocks })
}

async fn mount_landing(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/directory"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LANDING_PAGE)
                .insert_header("content-type", "text/html")
                .insert_header("set-cookie", "session=abc; Path=/"),
        )
        .mount(server)
        .await;
}

async fn mount_listing(server: &MockServer, offset: u64, response: ResponseTemplate) {
    Mock::given(method("POST"))
        .and(path("/directory/more"))
        .and(body_string_contains(format!("&offset={}", offset)))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_detail(server: &MockServer, name: &str, website: &str) {
    Mock::given(method("GET"))
        .and(path(format!("/company/{}", name)))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            r#"<html><body><a class="website-link" href="{}">Website</a></body></html>"#,
            website
        )))
        .mount(server)
        .await;
}

fn open_storage(dir: &TempDir) -> SqliteStorage {
    SqliteStorage::new(Path::new(&db_path(dir))).expect("Failed to open database")
}

/// Stored row for `name`: website, locations, description, image, source
fn stored_row(dir: &TempDir, name: &str) -> (String, String, String, String, String) {
    let conn = Connection::open(db_path(dir)).expect("Failed to open database");
    conn.query_row(
        "SELECT website_url, locations, description, image_url, source_url FROM listings WHERE name = ?1",
        [name],
        |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)),
    )
    .expect("record should be stored")
}

#[tokio::test]
async fn test_full_harvest_end_to_end() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&server).await;
    mount_listing(
        &server,
        0,
        ResponseTemplate::new(200).set_body_json(listing_page(&["A", "B", "C"])),
    )
    .await;
    mount_listing(
        &server,
        20,
        ResponseTemplate::new(200).set_body_json(listing_page(&["C", "D", "E"])),
    )
    .await;
    mount_listing(&server, 40, ResponseTemplate::new(200).set_body_json(json!({ "html": "" }))).await;
    Mock::given(method("POST"))
        .and(body_string_contains("&offset=60"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(&["Z"])))
        .expect(0)
        .mount(&server)
        .await;

    mount_detail(&server, "A", "https://a.example").await;
    Mock::given(method("GET"))
        .and(path("/company/B"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.max_offset = 40;

    let summary = crawl(config, "hash".to_string())
        .await
        .expect("Harvest should run");

    assert_eq!(summary.stop_reason, StopReason::EndOfData { offset: 40 });
    assert!(summary.is_success());
    assert!(summary.counters.peak_in_flight <= 2);
    assert_eq!(summary.counters.records_seen, 6);
    assert_eq!(summary.counters.records_inserted, 5);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records("listings").unwrap(), 5);

    let (website, locations, description, image, source) = stored_row(&dir, "A");
    assert_eq!(website, "https://a.example");
    assert_eq!(locations, "Berlin, Paris");
    assert_eq!(description, "About A");
    assert_eq!(image, format!("{}/img/A.png", server.uri()));
    assert_eq!(source, format!("{}/company/A", server.uri()));

    // Failed enrichment still stores the record
    let (website, ..) = stored_row(&dir, "B");
    assert_eq!(website, "");

    let run = storage.get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.stop_reason.as_deref(), Some("end_of_data"));
    assert_eq!(run.records_inserted, 5);
}

#[tokio::test]
async fn test_listing_request_carries_token_headers_and_cookie() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/directory"))
        .and(headers("accept-language", vec!["en-US", "en;q=0.5"]))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string(LANDING_PAGE)
                .insert_header("set-cookie", "session=abc; Path=/"),
        )
        .expect(1)
        .mount(&server)
        .await;
    let landing = format!("{}/directory", server.uri());
    Mock::given(method("POST"))
        .and(path("/directory/more"))
        .and(header("x-requested-with", "XMLHttpRequest"))
        .and(header("x-csrf-token", "tok-1"))
        .and(header("referer", landing.as_str()))
        .and(header("cookie", "session=abc"))
        .and(headers("accept-language", vec!["en-US", "en;q=0.5"]))
        .and(header_exists("accept"))
        .and(header_exists("user-agent"))
        .and(body_string_contains("_token=tok-1"))
        .and(body_string_contains("&offset=0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "html": "" })))
        .expect(1)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir);
    let summary = crawl(config, "hash".to_string()).await.unwrap();

    // A request missing any header would have hit wiremock's 404 and failed the first page
    assert_eq!(summary.stop_reason, StopReason::EndOfData { offset: 0 });
}

#[tokio::test]
async fn test_missing_token_fails_startup() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    Mock::given(method("GET"))
        .and(path("/directory"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html><head></head></html>"))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = create_test_config(&server, &dir);
    let result = crawl(config, "hash".to_string()).await;

    assert!(matches!(result, Err(HarvestError::TokenUnavailable { .. })));
}

#[tokio::test]
async fn test_first_page_failure_stops_harvest() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&server).await;
    mount_listing(&server, 0, ResponseTemplate::new(500)).await;
    Mock::given(method("POST"))
        .and(body_string_contains("&offset=20"))
        .respond_with(ResponseTemplate::new(200).set_body_json(listing_page(&["A"])))
        .expect(0)
        .mount(&server)
        .await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.concurrency = 1;
    let summary = crawl(config, "hash".to_string()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::FirstPageFailed);
    assert!(!summary.is_success());
    assert_eq!(summary.counters.pages_dispatched, 1);

    let run = open_storage(&dir).get_latest_run().unwrap().unwrap();
    assert_eq!(run.status, RunStatus::Failed);
    assert_eq!(run.stop_reason.as_deref(), Some("first_page_failed"));
}

#[tokio::test]
async fn test_mid_listing_failure_does_not_stop() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&server).await;
    mount_listing(
        &server,
        0,
        ResponseTemplate::new(200).set_body_json(listing_page(&["A"])),
    )
    .await;
    mount_listing(&server, 20, ResponseTemplate::new(503)).await;
    mount_listing(
        &server,
        40,
        ResponseTemplate::new(200).set_body_string("<html>not json</html>"),
    )
    .await;
    mount_listing(
        &server,
        60,
        ResponseTemplate::new(200).set_body_json(listing_page(&["B"])),
    )
    .await;
    mount_listing(&server, 80, ResponseTemplate::new(200).set_body_json(json!({ "html": "" }))).await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.concurrency = 1;
    let summary = crawl(config, "hash".to_string()).await.unwrap();

    assert_eq!(summary.stop_reason, StopReason::EndOfData { offset: 80 });
    assert_eq!(summary.counters.pages_failed, 2);
    assert_eq!(summary.counters.pages_done, 3);
    assert_eq!(open_storage(&dir).count_records("listings").unwrap(), 2);
}

#[tokio::test]
async fn test_second_harvest_inserts_nothing_new() {
    let server = MockServer::start().await;
    let dir = TempDir::new().unwrap();

    mount_landing(&server).await;
    mount_listing(
        &server,
        0,
        ResponseTemplate::new(200).set_body_json(listing_page(&["A", "B"])),
    )
    .await;
    mount_listing(&server, 20, ResponseTemplate::new(200).set_body_json(json!({ "html": "" }))).await;
    mount_detail(&server, "A", "https://a.example").await;

    let mut config = create_test_config(&server, &dir);
    config.crawler.concurrency = 1;

    let first = Coordinator::new(config.clone(), "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();
    let second = Coordinator::new(config, "hash".to_string())
        .unwrap()
        .run()
        .await
        .unwrap();

    assert_eq!(first.counters.records_inserted, 2);
    assert_eq!(second.counters.records_inserted, 0);
    assert_eq!(second.counters.records_seen, 2);
    assert!(second.run_id > first.run_id);

    let storage = open_storage(&dir);
    assert_eq!(storage.count_records("listings").unwrap(), 2);
}
