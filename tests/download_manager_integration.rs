//! Integration tests for DownloadManager
//!
//! Tests the complete download flow against a local media server: enqueue,
//! retry, pause, delete, history clearing and restart after a crash.

mod common;

use common::{media_body, raw_media_server, stalled_response, Fixture, StubResolver};
use std::time::Duration;
use tubefetch_core::download::{DownloadManager, WorkerOutcome};
use tubefetch_core::file::FileSink;
use tubefetch_core::storage::{DownloadRecordStore, DownloadStatus, NewDownload, VideoFormat, VideoQuality};
use tubefetch_core::TubeFetchError;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn media_server() -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(media_body()))
        .mount(&server)
        .await;
    server
}

async fn setup() -> (MockServer, Fixture, DownloadManager) {
    let server = media_server().await;
    let fx = Fixture::new(StubResolver::serving(format!("{}/media/video.mp4", server.uri()))).await;
    let manager = DownloadManager::new(fx.ctx.clone());
    (server, fx, manager)
}

fn request(title: &str) -> NewDownload {
    NewDownload::new(
        common::VIDEO_URL.to_string(),
        title.to_string(),
        VideoQuality::Hd1080,
        VideoFormat::Mp4,
    )
}

async fn download(manager: &DownloadManager, title: &str) -> String {
    let id = manager.enqueue(request(title)).await.unwrap();
    let outcome = manager.wait(&id).await.unwrap();
    assert!(outcome.is_completed(), "unexpected outcome {:?}", outcome);
    id
}

#[tokio::test]
async fn test_enqueue_runs_to_completion() {
    let (_server, fx, manager) = setup().await;

    let id = manager.enqueue(request("My Video: Part 1")).await.unwrap();
    let outcome = manager.wait(&id).await.unwrap();

    let record = match outcome {
        WorkerOutcome::Completed { record } => record,
        other => panic!("expected completion, got {:?}", other),
    };
    assert_eq!(record.file_name, "My Video_ Part 1.mp4");
    assert!(fx.output_dir().join("My Video_ Part 1.mp4").exists());

    let listed = manager.list().await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].status, DownloadStatus::Completed);
    assert_eq!(manager.active_count().await, 0);
}

#[tokio::test]
async fn test_enqueue_rejects_missing_title() {
    let (_server, _fx, manager) = setup().await;

    let err = manager.enqueue(request("   ")).await.unwrap_err();
    assert!(matches!(err, TubeFetchError::MissingRequiredField(f) if f == "title"));
    assert!(manager.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_enqueue_url_uses_video_metadata() {
    let (_server, _fx, manager) = setup().await;

    let id = manager
        .enqueue_url(common::VIDEO_URL, VideoQuality::Auto, VideoFormat::Mp3)
        .await
        .unwrap();
    manager.wait(&id).await.unwrap();

    let record = manager.get(&id).await.unwrap().unwrap();
    assert_eq!(record.title, "Never Gonna Give You Up");
    assert_eq!(record.channel_name, "Rick Astley");
    assert_eq!(record.duration, "3:33");
    assert_eq!(record.file_name, "Never Gonna Give You Up.mp3");
}

#[tokio::test]
async fn test_observe_sees_new_records() {
    let (_server, _fx, manager) = setup().await;
    let mut feed = manager.observe();
    assert!(feed.borrow_and_update().is_empty());

    let id = download(&manager, "Observed").await;

    feed.changed().await.unwrap();
    let snapshot = feed.borrow_and_update().clone();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot[0].id, id);
}

#[tokio::test]
async fn test_delete_removes_record_and_file() {
    let (_server, fx, manager) = setup().await;
    let id = download(&manager, "Delete Me").await;
    let published = fx.output_dir().join("Delete Me.mp4");
    assert!(published.exists());

    assert!(manager.delete(&id).await.unwrap());
    assert!(!published.exists());
    assert!(manager.get(&id).await.unwrap().is_none());

    // Second delete finds nothing
    assert!(!manager.delete(&id).await.unwrap());
}

#[tokio::test]
async fn test_delete_keeps_file_shared_with_another_record() {
    let (_server, fx, manager) = setup().await;
    let first = download(&manager, "Same Title").await;
    let second = download(&manager, "Same Title").await;
    let published = fx.output_dir().join("Same Title.mp4");

    let first_uri = manager.get(&first).await.unwrap().unwrap().file_uri;
    let second_uri = manager.get(&second).await.unwrap().unwrap().file_uri;
    assert!(first_uri.is_some());
    assert_eq!(first_uri, second_uri);

    assert!(manager.delete(&first).await.unwrap());
    assert!(published.exists());
    assert!(manager.get(&second).await.unwrap().is_some());

    // Last owner takes the file with it
    assert!(manager.delete(&second).await.unwrap());
    assert!(!published.exists());
}

#[tokio::test]
async fn test_delete_tolerates_missing_file() {
    let (_server, fx, manager) = setup().await;
    let id = download(&manager, "Already Gone").await;

    let record = manager.get(&id).await.unwrap().unwrap();
    let sink = tubefetch_core::file::DirectoryMediaStore::new(fx.output_dir());
    assert!(sink.delete(record.file_uri.as_deref().unwrap()).await.unwrap());

    assert!(manager.delete(&id).await.unwrap());
    assert!(manager.get(&id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_clear_completed_keeps_files_and_other_records() {
    let (_server, fx, manager) = setup().await;
    download(&manager, "Finished").await;
    fx.insert_record("failed-1", DownloadStatus::Failed).await;
    fx.insert_record("paused-1", DownloadStatus::Paused).await;

    assert_eq!(manager.clear_completed().await.unwrap(), 1);

    let remaining: Vec<String> = manager.list().await.unwrap().into_iter().map(|r| r.id).collect();
    assert_eq!(remaining.len(), 2);
    assert!(remaining.contains(&"failed-1".to_string()));
    assert!(remaining.contains(&"paused-1".to_string()));

    assert!(fx.output_dir().join("Finished.mp4").exists());
}

#[tokio::test]
async fn test_retry_only_from_failed_or_paused() {
    let (_server, fx, manager) = setup().await;
    let id = download(&manager, "Done Already").await;

    let err = manager.retry(&id).await.unwrap_err();
    assert!(matches!(err, TubeFetchError::InvalidState(_)));

    let err = manager.retry("no-such-id").await.unwrap_err();
    assert!(matches!(err, TubeFetchError::RecordNotFound(_)));

    fx.insert_record("failed-2", DownloadStatus::Failed).await;
    manager.retry("failed-2").await.unwrap();
    assert!(manager.wait("failed-2").await.unwrap().is_completed());
    assert_eq!(
        manager.get("failed-2").await.unwrap().unwrap().status,
        DownloadStatus::Completed
    );
}

#[tokio::test]
async fn test_retry_after_failed_attempt_succeeds() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/media/video.mp4"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/media/video.mp4"))
        .respond_with(ResponseTemplate::new(200).set_body_bytes(media_body()))
        .mount(&server)
        .await;

    let fx = Fixture::new(StubResolver::serving(format!("{}/media/video.mp4", server.uri()))).await;
    let manager = DownloadManager::new(fx.ctx.clone());

    let id = manager.enqueue(request("Flaky")).await.unwrap();
    assert!(matches!(
        manager.wait(&id).await.unwrap(),
        WorkerOutcome::Failed { .. }
    ));

    let failed = manager.get(&id).await.unwrap().unwrap();
    assert_eq!(failed.status, DownloadStatus::Failed);
    assert!(failed.error_message.is_some());

    manager.retry(&id).await.unwrap();
    assert!(manager.wait(&id).await.unwrap().is_completed());

    let record = manager.get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, DownloadStatus::Completed);
    assert!(record.error_message.is_none());
}

#[tokio::test]
async fn test_pause_waiting_record() {
    let (_server, fx, manager) = setup().await;
    fx.insert_record("pending-1", DownloadStatus::Pending).await;

    manager.pause("pending-1").await.unwrap();
    assert_eq!(
        manager.get("pending-1").await.unwrap().unwrap().status,
        DownloadStatus::Paused
    );

    // Terminal records are left alone
    let id = download(&manager, "Keep Me").await;
    manager.pause(&id).await.unwrap();
    assert_eq!(
        manager.get(&id).await.unwrap().unwrap().status,
        DownloadStatus::Completed
    );
}

/// Manager over a host that sends one chunk and then stalls
async fn stalled_setup() -> (Fixture, DownloadManager) {
    let url = raw_media_server(stalled_response(), true).await;
    let fx = Fixture::new(StubResolver::serving(url)).await;
    let manager = DownloadManager::new(fx.ctx.clone());
    (fx, manager)
}

async fn wait_for_first_chunk(manager: &DownloadManager, id: &str) {
    let mut feed = manager.observe();
    tokio::time::timeout(
        Duration::from_secs(5),
        feed.wait_for(|records| {
            records
                .iter()
                .any(|r| r.id == id && r.status == DownloadStatus::Downloading && r.progress > 0.0)
        }),
    )
    .await
    .expect("first chunk within 5s")
    .unwrap();
}

#[tokio::test]
async fn test_pause_running_download() {
    let (fx, manager) = stalled_setup().await;
    let id = manager.enqueue(request("Slow Video")).await.unwrap();
    wait_for_first_chunk(&manager, &id).await;
    assert_eq!(manager.active_count().await, 1);

    manager.pause(&id).await.unwrap();

    assert!(matches!(manager.wait(&id).await, Some(WorkerOutcome::Paused)));
    assert_eq!(manager.active_count().await, 0);

    let record = manager.get(&id).await.unwrap().unwrap();
    assert_eq!(record.status, DownloadStatus::Paused);
    assert_eq!(fx.store.updates().last().map(|(s, _)| *s), Some(DownloadStatus::Paused));
    assert!(!fx.output_dir().join("Slow Video.mp4").exists());
}

#[tokio::test]
async fn test_delete_running_download() {
    let (fx, manager) = stalled_setup().await;
    let id = manager.enqueue(request("Slow Delete")).await.unwrap();
    wait_for_first_chunk(&manager, &id).await;

    assert!(manager.delete(&id).await.unwrap());

    assert!(manager.get(&id).await.unwrap().is_none());
    assert!(manager.wait(&id).await.is_none());
    assert!(manager.list().await.unwrap().is_empty());
    assert!(!fx.output_dir().join("Slow Delete.mp4").exists());
}

#[tokio::test]
async fn test_resume_interrupted_restarts_active_records() {
    let (_server, fx, manager) = setup().await;

    let mut stale = fx.insert_record("stale-1", DownloadStatus::Downloading).await;
    stale.progress = 0.4;
    fx.store.update(&stale).await.unwrap();
    fx.insert_record("failed-3", DownloadStatus::Failed).await;

    assert_eq!(manager.resume_interrupted().await.unwrap(), 1);
    assert!(manager.wait("stale-1").await.unwrap().is_completed());
    assert!(manager.wait("failed-3").await.is_none());

    assert_eq!(
        manager.get("failed-3").await.unwrap().unwrap().status,
        DownloadStatus::Failed
    );
}
