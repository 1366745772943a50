mod common;

use std::io::{Cursor, Read};
use std::time::Duration;

use album_zipper::browser::{ChromiumLauncher, SessionLauncher};
use album_zipper::models::AssetUrlQuery;
use album_zipper::GalleryPage;
use album_zipper::utils::logging;
use reqwest::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use reqwest::StatusCode;

use common::*;

const ALBUM: &str = "https://gallery.test/media/set/?set=a.1234&type=3";

fn read_zip(bytes: Vec<u8>) -> zip::ZipArchive<Cursor<Vec<u8>>> {
    zip::ZipArchive::new(Cursor::new(bytes)).expect("响应不是合法的 zip")
}

fn entry_bytes(archive: &mut zip::ZipArchive<Cursor<Vec<u8>>>, name: &str) -> Vec<u8> {
    let mut content = Vec::new();
    archive
        .by_name(name)
        .unwrap()
        .read_to_end(&mut content)
        .unwrap();
    content
}

#[tokio::test]
async fn test_album_is_streamed_as_zip() {
    logging::init(false);
    let origin = spawn_origin().await;
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(photo_urls(&origin, &["a.jpg", "b.jpg", "c.jpg"]));
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let response = server.download(ALBUM).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[CONTENT_TYPE], "application/zip");
    assert_eq!(
        response.headers()[CONTENT_DISPOSITION],
        "attachment; filename=photos.zip"
    );

    let body = response.bytes().await.unwrap().to_vec();
    let mut archive = read_zip(body);
    assert_eq!(archive.len(), 3);
    for name in ["a.jpg", "b.jpg", "c.jpg"] {
        assert_eq!(entry_bytes(&mut archive, name), photo_bytes(name));
    }

    assert_eq!(launcher.opened(), 1);
    assert_eq!(launcher.closed(), 1);
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
async fn test_failed_photo_is_left_out() {
    let origin = spawn_origin().await;
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(photo_urls(
        &origin,
        &["a.jpg", "missing.jpg", "c.jpg"],
    ));
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let response = server.download(ALBUM).await;
    assert_eq!(response.status(), StatusCode::OK);

    let mut archive = read_zip(response.bytes().await.unwrap().to_vec());
    assert_eq!(archive.len(), 2);
    assert!(archive.by_name("missing.jpg").is_err());
    assert_eq!(entry_bytes(&mut archive, "c.jpg"), photo_bytes("c.jpg"));
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
async fn test_missing_album_is_rejected_without_session() {
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(Vec::new());
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let response = reqwest::get(server.endpoint()).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");

    let response = server.download("").await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    assert_eq!(launcher.opened(), 0);
    assert_eq!(staging_entries(staging.path()), 0);
}

#[tokio::test]
async fn test_url_parameter_alias() {
    let origin = spawn_origin().await;
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(photo_urls(&origin, &["a.jpg"]));
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let response = reqwest::Client::new()
        .get(server.endpoint())
        .query(&[("url", ALBUM)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(read_zip(response.bytes().await.unwrap().to_vec()).len(), 1);
}

#[tokio::test]
async fn test_endless_list_reports_discovery_timeout() {
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::endless();
    let config = album_zipper::Config {
        max_scroll_iterations: 5,
        ..test_config(staging.path())
    };
    let server = spawn_app(config, launcher.clone()).await;

    let response = server.download(ALBUM).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "discovery_timeout");

    assert_eq!(launcher.opened(), 1);
    assert_eq!(launcher.closed(), 1);
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
async fn test_navigation_failure_is_reported() {
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(Vec::new());
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let response = server.download("https://unreachable.test/album").await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "navigation_failed");
    assert_eq!(launcher.closed(), 1);
}

#[tokio::test]
async fn test_items_never_rendering_is_a_timeout_not_an_empty_album() {
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::never_renders();
    let config = album_zipper::Config {
        navigation_timeout_ms: 300,
        ..test_config(staging.path())
    };
    let server = spawn_app(config, launcher.clone()).await;

    let response = server.download(ALBUM).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "navigation_failed");
    assert_ne!(body["error"], "empty_archive");

    assert_eq!(launcher.opened(), 1);
    assert_eq!(launcher.closed(), 1);
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
async fn test_malformed_query_gets_json_error() {
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(Vec::new());
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    // album 与别名 url 同时出现是重复字段
    let response = reqwest::Client::new()
        .get(server.endpoint())
        .query(&[("album", ALBUM), ("url", ALBUM)])
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "invalid_request");
    assert_eq!(launcher.opened(), 0);
}

#[tokio::test]
async fn test_empty_album_reports_empty_archive() {
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(Vec::new());
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let response = server.download(ALBUM).await;
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "empty_archive");
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
async fn test_concurrent_requests_use_isolated_staging() {
    let origin = spawn_origin().await;
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(photo_urls(&origin, &["same.jpg", "other.jpg"]));
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let (first, second) = tokio::join!(server.download(ALBUM), server.download(ALBUM));
    assert_eq!(first.status(), StatusCode::OK);
    assert_eq!(second.status(), StatusCode::OK);

    let first = read_zip(first.bytes().await.unwrap().to_vec());
    let second = read_zip(second.bytes().await.unwrap().to_vec());
    assert_eq!(first.len(), 2);
    assert_eq!(second.len(), 2);

    let profiles = launcher.profiles();
    assert_eq!(profiles.len(), 2);
    assert_ne!(profiles[0], profiles[1]);
    assert_eq!(launcher.closed(), 2);
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
async fn test_client_disconnect_cancels_and_cleans_up() {
    let origin = spawn_origin().await;
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(photo_urls(&origin, &["slow-1.jpg", "a.jpg"]));
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let client = reqwest::Client::builder()
        .timeout(Duration::from_millis(500))
        .build()
        .unwrap();
    let result = client
        .get(server.endpoint())
        .query(&[("album", ALBUM)])
        .send()
        .await;
    assert!(result.is_err());

    // 慢照片需要 30 秒，清理必须远早于此发生
    assert!(wait_until_staging_empty(staging.path()).await);
    assert!(wait_until_closed(&launcher, 1).await);
}

#[tokio::test]
async fn test_shutdown_cancels_in_flight_request() {
    let origin = spawn_origin().await;
    let staging = tempfile::tempdir().unwrap();
    let launcher = FakeLauncher::with_photos(photo_urls(&origin, &["slow-1.jpg"]));
    let server = spawn_app(test_config(staging.path()), launcher.clone()).await;

    let trigger = server.shutdown.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let response = tokio::time::timeout(Duration::from_secs(10), server.download(ALBUM))
        .await
        .expect("取消后请求应尽快结束");
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body: serde_json::Value = response.json().await.unwrap();
    assert_eq!(body["error"], "cancelled");
    assert!(wait_until_staging_empty(staging.path()).await);
}

#[tokio::test]
#[ignore] // 需要本机安装 Chrome：cargo test -- --ignored
async fn test_real_browser_session() {
    logging::init(true);
    let profile = tempfile::tempdir().unwrap();
    let launcher = ChromiumLauncher::new(None, true);
    let page = launcher.open(profile.path()).await.expect("启动浏览器失败");

    let html = r#"data:text/html,<div style="height:200px;overflow:auto"><a class="p" href="https://x.test/1"><img class="p" src="https://x.test/1.jpg" style="height:600px"></a></div>"#;
    page.goto(html).await.unwrap();
    assert!(page.selector_present("a.p").await.unwrap());
    assert!(!page.selector_present(".nothing").await.unwrap());

    let metrics = page.scroll_metrics("a.p").await.unwrap();
    assert_eq!(metrics.item_count, 1);
    page.scroll_to_end("a.p").await.unwrap();

    let links = page.asset_urls(&AssetUrlQuery::href("a.p")).await.unwrap();
    assert_eq!(links, vec!["https://x.test/1".to_string()]);

    page.close().await;
    page.close().await;
}
