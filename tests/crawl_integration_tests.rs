//! End-to-end crawl tests against local mock servers.
//!
//! These exercise the full pipeline: frontier, gates, HTTP fetch, atomic
//! save, and the JSONL index. The mock servers live on loopback, so each
//! config carries the loopback test allowlist for the SSRF guard.

use std::path::Path;
use std::sync::Arc;

use md5::{Digest, Md5};

use docmirror::{
    BrowserLimiter, DownloadConfig, FetchStatus, IndexRecord, start_recursive_download,
};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn test_config(server_url: &str, base: &Path, crawl_id: &str, max_depth: u8) -> DownloadConfig {
    DownloadConfig::builder()
        .start_url(server_url.to_string() + "/")
        .crawl_id(crawl_id)
        .base_dir(base)
        .max_depth(max_depth)
        .max_concurrency(2)
        .ssrf_test_allowlist(["127.0.0.1"])
        .build()
        .unwrap()
}

fn read_index(config: &DownloadConfig) -> Vec<IndexRecord> {
    let content = std::fs::read_to_string(config.index_file_path()).unwrap();
    content
        .lines()
        .map(|line| serde_json::from_str(line).unwrap())
        .collect()
}

fn host_dir(server_url: &str) -> String {
    let parsed = url::Url::parse(server_url).unwrap();
    format!(
        "{}_{}",
        parsed.host_str().unwrap(),
        parsed.port().unwrap()
    )
}

async fn run(config: DownloadConfig) {
    start_recursive_download(config, Arc::new(BrowserLimiter::new(1)))
        .await
        .unwrap();
}

#[tokio::test]
async fn single_page_crawl_saves_content_and_records_hash() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let body = "<html><body><h1>Guide</h1></body></html>";
    let page = server
        .mock("GET", "/")
        .with_status(200)
        .with_body(body)
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), base.path(), "single", 0);
    run(config.clone()).await;

    page.assert_async().await;

    let records = read_index(&config);
    assert_eq!(records.len(), 1);
    let record = &records[0];
    assert_eq!(record.fetch_status, FetchStatus::Success);
    assert_eq!(record.http_status, Some(200));

    let saved = std::fs::read(&record.local_path).unwrap();
    assert_eq!(saved, body.as_bytes());
    assert!(
        Path::new(&record.local_path).starts_with(config.content_root().canonicalize().unwrap())
    );

    let expected_md5 = hex::encode(Md5::digest(body.as_bytes()));
    assert_eq!(record.content_md5.as_deref(), Some(expected_md5.as_str()));
}

#[tokio::test]
async fn recursion_is_depth_bounded() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let root = server
        .mock("GET", "/")
        .with_body(r#"<html><a href="/b.html">next</a></html>"#)
        .expect(2) // fetched once per crawl below
        .create_async()
        .await;
    let linked = server
        .mock("GET", "/b.html")
        .with_body("<html>leaf</html>")
        .expect(1) // only the depth-1 crawl reaches it
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();

    let deep = test_config(&server.url(), base.path(), "depth1", 1);
    run(deep.clone()).await;
    let records = read_index(&deep);
    assert_eq!(records.len(), 2);
    assert!(records.iter().all(|r| r.fetch_status == FetchStatus::Success));

    let shallow = test_config(&server.url(), base.path(), "depth0", 0);
    run(shallow.clone()).await;
    let records = read_index(&shallow);
    assert_eq!(records.len(), 1, "depth 0 must not follow links");

    root.assert_async().await;
    linked.assert_async().await;
}

#[tokio::test]
async fn cross_domain_links_are_not_followed() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let mut other = mockito::Server::new_async().await;

    let other_url = other.url();
    let _root = server
        .mock("GET", "/")
        .with_body(format!(
            r#"<html><a href="{other_url}/elsewhere">off-site</a><a href="/same.html">on-site</a></html>"#
        ))
        .create_async()
        .await;
    let same = server
        .mock("GET", "/same.html")
        .with_body("<html>same site</html>")
        .create_async()
        .await;
    let foreign = other
        .mock("GET", "/elsewhere")
        .expect(0)
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), base.path(), "crossdomain", 2);
    run(config.clone()).await;

    same.assert_async().await;
    foreign.assert_async().await;

    let records = read_index(&config);
    assert_eq!(records.len(), 2);
    for record in &records {
        assert!(
            record.canonical_url.starts_with(&server.url()),
            "off-site URL leaked into the crawl: {}",
            record.canonical_url
        );
    }
}

#[tokio::test]
async fn robots_disallow_blocks_fetch_and_is_recorded() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let _robots = server
        .mock("GET", "/robots.txt")
        .with_body("User-agent: *\nDisallow: /private")
        .create_async()
        .await;
    let _root = server
        .mock("GET", "/")
        .with_body(r#"<html><a href="/private/secret.html">hidden</a></html>"#)
        .create_async()
        .await;
    let blocked = server
        .mock("GET", "/private/secret.html")
        .expect(0)
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), base.path(), "robots", 1);
    run(config.clone()).await;

    blocked.assert_async().await;

    let records = read_index(&config);
    assert_eq!(records.len(), 2);
    let disallowed = records
        .iter()
        .find(|r| r.canonical_url.ends_with("/private/secret.html"))
        .unwrap();
    assert_eq!(disallowed.fetch_status, FetchStatus::FailedRobotstxt);
    assert!(disallowed.local_path.is_empty());
}

#[tokio::test]
async fn existing_file_skipped_without_overwrite() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let page = server
        .mock("GET", "/")
        .with_body("<html>first crawl</html>")
        .expect(1)
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), base.path(), "rerun", 0);
    run(config.clone()).await;

    let first = read_index(&config);
    assert_eq!(first[0].fetch_status, FetchStatus::Success);
    let saved_path = first[0].local_path.clone();

    // Same crawl id, overwrite still off: no second fetch, bytes untouched
    run(config.clone()).await;
    page.assert_async().await;

    let records = read_index(&config);
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].fetch_status, FetchStatus::Skipped);
    assert_eq!(records[1].local_path, saved_path);
    assert_eq!(
        std::fs::read_to_string(&saved_path).unwrap(),
        "<html>first crawl</html>"
    );
}

#[tokio::test]
async fn oversized_response_leaves_no_partial_file() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let _page = server
        .mock("GET", "/")
        .with_body("x".repeat(64 * 1024))
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = DownloadConfig::builder()
        .start_url(server.url() + "/")
        .crawl_id("oversize")
        .base_dir(base.path())
        .max_depth(0)
        .max_file_size(1024)
        .ssrf_test_allowlist(["127.0.0.1"])
        .build()
        .unwrap();
    run(config.clone()).await;

    let records = read_index(&config);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fetch_status, FetchStatus::FailedRequest);
    assert!(records[0].content_md5.is_none());

    let target = config
        .content_root()
        .join(host_dir(&server.url()))
        .join("index.html");
    assert!(!target.exists(), "partial file left at {}", target.display());
}

#[tokio::test]
async fn duplicate_links_fetch_once() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let _root = server
        .mock("GET", "/")
        .with_body(
            r#"<html>
                 <a href="/b.html">one</a>
                 <a href="/b.html#section">same page</a>
                 <a href="/b.html?utm=x">same page again</a>
                 <a href="/">self</a>
               </html>"#,
        )
        .expect(1)
        .create_async()
        .await;
    let linked = server
        .mock("GET", "/b.html")
        .with_body("<html>leaf</html>")
        .expect(1)
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), base.path(), "dedup", 3);
    run(config.clone()).await;

    linked.assert_async().await;

    let records = read_index(&config);
    assert_eq!(records.len(), 2, "each unique page gets exactly one record");
}

#[tokio::test]
async fn redirect_into_private_address_is_blocked() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let _page = server
        .mock("GET", "/")
        .with_status(302)
        .with_header("location", "http://169.254.169.254/latest/meta-data/")
        .create_async()
        .await;

    let base = tempfile::tempdir().unwrap();
    let config = test_config(&server.url(), base.path(), "redirect-ssrf", 0);
    run(config.clone()).await;

    let records = read_index(&config);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fetch_status, FetchStatus::FailedRequest);
    assert!(records[0].content_md5.is_none());

    let target = config
        .content_root()
        .join(host_dir(&server.url()))
        .join("index.html");
    assert!(!target.exists(), "redirected content must not be saved");
}

#[tokio::test]
async fn loopback_blocked_without_test_allowlist() {
    init_logging();
    let mut server = mockito::Server::new_async().await;
    let page = server.mock("GET", "/").expect(0).create_async().await;

    let base = tempfile::tempdir().unwrap();
    let config = DownloadConfig::builder()
        .start_url(server.url() + "/")
        .crawl_id("ssrf")
        .base_dir(base.path())
        .max_depth(0)
        .build()
        .unwrap();
    run(config.clone()).await;

    page.assert_async().await;

    let records = read_index(&config);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].fetch_status, FetchStatus::FailedSsrf);
}
