//! Integration tests for hfdl
//!
//! Each test stands up a mock hub with wiremock and drives a full run through
//! the public `Downloader` API: listing, filtering, destination preparation,
//! concurrent transfer, and cleanup.
//!
//! The live test at the bottom talks to huggingface.co and is ignored by default:
//! cargo test --test integration_tests -- --ignored

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use hfdl::download::{Downloader, RunOutcome, TallyProgress};
use hfdl::{DownloadConfig, DownloadError, RunState};
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const REPO: &str = "org/model";

// =============================================================================
// Helpers
// =============================================================================

async fn mount_listing(server: &MockServer, files: &[&str]) {
    let siblings: Vec<_> = files.iter().map(|f| json!({ "rfilename": f })).collect();
    Mock::given(method("GET"))
        .and(path(format!("/api/models/{}/revision/main", REPO)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": REPO,
            "siblings": siblings,
        })))
        .mount(server)
        .await;
}

async fn mount_file(server: &MockServer, filename: &str, response: ResponseTemplate) {
    Mock::given(method("GET"))
        .and(path(format!("/{}/resolve/main/{}", REPO, filename)))
        .respond_with(response)
        .mount(server)
        .await;
}

fn config_for(server: &MockServer, target: &Path) -> DownloadConfig {
    DownloadConfig::new(REPO)
        .with_endpoint(server.uri())
        .with_download_path(target)
}

fn downloader(config: DownloadConfig, progress: Arc<TallyProgress>) -> Downloader<hfdl::HubClient> {
    Downloader::for_hub(config, progress).with_notices(false)
}

// =============================================================================
// Successful Runs
// =============================================================================

#[tokio::test]
async fn test_downloads_whole_repository() {
    let server = MockServer::start().await;
    mount_listing(&server, &["config.json", "weights/model.bin"]).await;
    mount_file(&server, "config.json", ResponseTemplate::new(200).set_body_string("{}")).await;
    mount_file(
        &server,
        "weights/model.bin",
        ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]),
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let progress = Arc::new(TallyProgress::new());
    let mut dl = downloader(config_for(&server, &target), progress.clone());

    let outcome = dl.run(CancellationToken::new()).await.unwrap();
    let RunOutcome::Succeeded(summary) = outcome else {
        panic!("expected success, got {:?}", outcome);
    };

    assert_eq!(summary.files, 2);
    assert_eq!(summary.bytes, 4098);
    assert_eq!(std::fs::read(target.join("config.json")).unwrap(), b"{}");
    assert_eq!(std::fs::read(target.join("weights/model.bin")).unwrap().len(), 4096);
    assert_eq!(dl.state(), RunState::Succeeded);
    assert!(progress.is_stopped());
    assert_eq!(progress.tasks().len(), 2);
}

#[tokio::test]
async fn test_filters_select_only_matching_files() {
    let server = MockServer::start().await;
    mount_listing(&server, &["a.bin", "sub/b.json", "README.md"]).await;
    mount_file(&server, "sub/b.json", ResponseTemplate::new(200).set_body_string("[]")).await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let config = config_for(&server, &target)
        .with_include(["*.json", "*.md"])
        .with_exclude(["README*"]);
    let mut dl = downloader(config, Arc::new(TallyProgress::new()));

    let outcome = dl.run(CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Succeeded(ref s) if s.files == 1));
    assert!(target.join("sub/b.json").exists());
    assert!(!target.join("a.bin").exists());
    assert!(!target.join("README.md").exists());
}

#[tokio::test]
async fn test_chunk_limit_bounds_progress_updates() {
    let server = MockServer::start().await;
    mount_listing(&server, &["blob.bin"]).await;
    mount_file(&server, "blob.bin", ResponseTemplate::new(200).set_body_bytes(vec![1u8; 2500])).await;

    let tmp = TempDir::new().unwrap();
    let config = config_for(&server, &tmp.path().join("model")).with_chunk_limit_mb(0.001);
    let progress = Arc::new(TallyProgress::new());
    let mut dl = downloader(config, progress.clone());

    dl.run(CancellationToken::new()).await.unwrap();

    let tasks = progress.tasks();
    assert_eq!(tasks.len(), 1);
    assert_eq!(tasks[0].total, Some(2500));
    assert_eq!(tasks[0].position, 2500);
    // 1000 + 1000 + 500
    assert_eq!(tasks[0].updates, 3);
}

#[tokio::test]
async fn test_token_sent_on_listing_and_transfer() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(format!("/api/models/{}/revision/main", REPO)))
        .and(header("authorization", "Bearer hf_secret"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "siblings": [{ "rfilename": "private.bin" }],
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("/{}/resolve/main/private.bin", REPO)))
        .and(header("authorization", "Bearer hf_secret"))
        .respond_with(ResponseTemplate::new(200).set_body_string("secret"))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let config = config_for(&server, &target).with_token("hf_secret");
    let mut dl = downloader(config, Arc::new(TallyProgress::new()));

    dl.run(CancellationToken::new()).await.unwrap();
    assert_eq!(std::fs::read_to_string(target.join("private.bin")).unwrap(), "secret");
}

// =============================================================================
// Failures and Cleanup
// =============================================================================

#[tokio::test]
async fn test_failed_file_removes_destination() {
    let server = MockServer::start().await;
    mount_listing(&server, &["good.bin", "bad.bin"]).await;
    mount_file(&server, "good.bin", ResponseTemplate::new(200).set_body_bytes(vec![0u8; 128])).await;
    mount_file(&server, "bad.bin", ResponseTemplate::new(500)).await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let progress = Arc::new(TallyProgress::new());
    let mut dl = downloader(config_for(&server, &target), progress.clone());

    let err = dl.run(CancellationToken::new()).await.unwrap_err();
    match err {
        DownloadError::Transfer { ref filename, .. } => assert_eq!(filename, "bad.bin"),
        other => panic!("expected transfer error, got {:?}", other),
    }
    assert!(!target.exists());
    assert_eq!(dl.state(), RunState::Failed);
    assert!(progress.is_stopped());
}

#[tokio::test]
async fn test_failure_aborts_in_flight_sibling() {
    let server = MockServer::start().await;
    mount_listing(&server, &["shards/slow.bin", "broken.bin"]).await;
    mount_file(
        &server,
        "shards/slow.bin",
        ResponseTemplate::new(200)
            .set_body_bytes(vec![0u8; 64])
            .set_delay(Duration::from_secs(30)),
    )
    .await;
    mount_file(
        &server,
        "broken.bin",
        ResponseTemplate::new(500).set_delay(Duration::from_millis(200)),
    )
    .await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let progress = Arc::new(TallyProgress::new());
    let mut dl = downloader(config_for(&server, &target), progress.clone());

    let started = std::time::Instant::now();
    let err = tokio::time::timeout(Duration::from_secs(10), dl.run(CancellationToken::new()))
        .await
        .expect("a failed sibling should end the run promptly")
        .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(10));
    assert!(matches!(err, DownloadError::Transfer { ref filename, .. } if filename == "broken.bin"));
    assert!(!target.exists());
    assert_eq!(dl.state(), RunState::Failed);
    assert!(progress.is_stopped());
}

#[tokio::test]
async fn test_failure_keeps_foreign_content_of_existing_destination() {
    let server = MockServer::start().await;
    mount_listing(&server, &["new/good.bin", "bad.bin"]).await;
    mount_file(&server, "new/good.bin", ResponseTemplate::new(200).set_body_string("x")).await;
    mount_file(&server, "bad.bin", ResponseTemplate::new(404)).await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("notes.txt"), b"mine").unwrap();

    let config = config_for(&server, &target).with_skip_checks(true);
    let mut dl = downloader(config, Arc::new(TallyProgress::new()));

    assert!(dl.run(CancellationToken::new()).await.is_err());
    assert_eq!(std::fs::read(target.join("notes.txt")).unwrap(), b"mine");
    assert!(!target.join("new").exists());
    assert!(!target.join("bad.bin").exists());
}

#[tokio::test]
async fn test_skip_checks_downloads_into_existing_destination() {
    let server = MockServer::start().await;
    mount_listing(&server, &["a.bin"]).await;
    mount_file(&server, "a.bin", ResponseTemplate::new(200).set_body_string("abc")).await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    std::fs::create_dir(&target).unwrap();
    std::fs::write(target.join("notes.txt"), b"mine").unwrap();

    let config = config_for(&server, &target).with_skip_checks(true);
    let mut dl = downloader(config, Arc::new(TallyProgress::new()));

    dl.run(CancellationToken::new()).await.unwrap();
    assert!(target.join("notes.txt").exists());
    assert_eq!(std::fs::read_to_string(target.join("a.bin")).unwrap(), "abc");
}

#[tokio::test]
async fn test_listing_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let mut dl = downloader(config_for(&server, &target), Arc::new(TallyProgress::new()));

    let err = dl.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DownloadError::RemoteListing { .. }));
    assert!(!target.exists());
}

#[tokio::test]
async fn test_empty_filter_result_is_an_error() {
    let server = MockServer::start().await;
    mount_listing(&server, &["a.bin"]).await;

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let config = config_for(&server, &target).with_include(["*.gguf"]);
    let mut dl = downloader(config, Arc::new(TallyProgress::new()));

    let err = dl.run(CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, DownloadError::EmptyWorkSet { .. }));
    assert_eq!(err.exit_code(), 65);
    assert!(!target.exists());
}

// =============================================================================
// Cancellation
// =============================================================================

#[tokio::test]
async fn test_cancel_mid_transfer_removes_destination() {
    let server = MockServer::start().await;
    mount_listing(&server, &["slow/a.bin", "slow/b.bin"]).await;
    for name in ["slow/a.bin", "slow/b.bin"] {
        mount_file(
            &server,
            name,
            ResponseTemplate::new(200)
                .set_body_bytes(vec![0u8; 64])
                .set_delay(Duration::from_secs(30)),
        )
        .await;
    }

    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("model");
    let progress = Arc::new(TallyProgress::new());
    let mut dl = downloader(config_for(&server, &target), progress.clone());

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(300)).await;
        trigger.cancel();
    });

    let outcome = tokio::time::timeout(Duration::from_secs(10), dl.run(cancel))
        .await
        .expect("cancellation should end the run promptly")
        .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(dl.state(), RunState::Cancelled);
    assert!(progress.is_stopped());
    assert!(!target.exists());
}

// =============================================================================
// Live Hub
// =============================================================================

#[tokio::test]
#[ignore]
async fn test_live_hub_small_file() {
    let tmp = TempDir::new().unwrap();
    let target = tmp.path().join("gpt2");
    let config = DownloadConfig::new("openai-community/gpt2")
        .with_download_path(&target)
        .with_include(["config.json"]);
    let mut dl = downloader(config, Arc::new(TallyProgress::new()));

    let outcome = dl.run(CancellationToken::new()).await.unwrap();
    assert!(matches!(outcome, RunOutcome::Succeeded(ref s) if s.files == 1));
    let body = std::fs::read_to_string(target.join("config.json")).unwrap();
    assert!(body.contains("n_embd"));
}
