//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tubefetch_core::api::resolver::{StreamInfo, VideoInfo, VideoResolver};
use tubefetch_core::config::DownloadConfig;
use tubefetch_core::download::WorkerContext;
use tubefetch_core::file::DirectoryMediaStore;
use tubefetch_core::notify::{NotificationBoard, NotificationChannel};
use tubefetch_core::storage::{
    Database, DownloadRecord, DownloadRecordStore, DownloadStatus, NewDownload, SqliteRecordStore, VideoFormat,
    VideoQuality,
};
use tubefetch_core::{Result, TubeFetchError};

pub const VIDEO_URL: &str = "https://www.youtube.com/watch?v=dQw4w9WgXcQ";

/// 100 bytes, copied in 25-byte chunks by [`Fixture`]
pub fn media_body() -> Vec<u8> {
    (0..100u8).collect()
}

/// Media host that answers every request with `response` verbatim
///
/// With `hold_open` the connection stays up after the bytes are written, so a
/// client expecting more body blocks in its next read.
pub async fn raw_media_server(response: Vec<u8>, hold_open: bool) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let response = response.clone();
            tokio::spawn(async move {
                let mut request = [0u8; 4096];
                let _ = socket.read(&mut request).await;
                let _ = socket.write_all(&response).await;
                if hold_open {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}/media/video.mp4", addr)
}

/// [`media_body`] sent chunked, with no Content-Length
pub fn chunked_response() -> Vec<u8> {
    let mut response = b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\nConnection: close\r\n\r\n".to_vec();
    for chunk in media_body().chunks(25) {
        response.extend_from_slice(format!("{:x}\r\n", chunk.len()).as_bytes());
        response.extend_from_slice(chunk);
        response.extend_from_slice(b"\r\n");
    }
    response.extend_from_slice(b"0\r\n\r\n");
    response
}

/// Announces all 100 bytes of [`media_body`] but only sends the first 25
pub fn stalled_response() -> Vec<u8> {
    let mut response = b"HTTP/1.1 200 OK\r\nContent-Length: 100\r\n\r\n".to_vec();
    response.extend_from_slice(&media_body()[..25]);
    response
}

/// Resolver that hands out a fixed media URL, or fails every lookup
pub struct StubResolver {
    pub stream_url: Option<String>,
    pub lookups: Mutex<usize>,
}

impl StubResolver {
    pub fn serving(url: impl Into<String>) -> Self {
        Self {
            stream_url: Some(url.into()),
            lookups: Mutex::new(0),
        }
    }

    pub fn without_streams() -> Self {
        Self {
            stream_url: None,
            lookups: Mutex::new(0),
        }
    }

    pub fn lookups(&self) -> usize {
        *self.lookups.lock().unwrap()
    }
}

#[async_trait]
impl VideoResolver for StubResolver {
    async fn fetch_video_info(&self, _url: &str) -> Result<VideoInfo> {
        Ok(VideoInfo {
            title: "Never Gonna Give You Up".to_string(),
            duration: 213,
            thumbnail: String::new(),
            channel: "Rick Astley".to_string(),
            view_count: 1_500_000_000,
            upload_date: "2009-10-25".to_string(),
        })
    }

    async fn resolve_stream(&self, _url: &str, format: VideoFormat, quality: VideoQuality) -> Result<StreamInfo> {
        *self.lookups.lock().unwrap() += 1;

        match &self.stream_url {
            Some(url) => Ok(StreamInfo {
                download_url: url.clone(),
                title: String::new(),
                quality: quality.label().to_string(),
                format: format.extension().to_string(),
            }),
            None => Err(TubeFetchError::NoMatchingStream {
                format: format.extension().to_string(),
                quality: quality.label().to_string(),
            }),
        }
    }
}

/// Store wrapper that records every update and can cancel a worker once
/// progress reaches a threshold
pub struct RecordingStore {
    inner: SqliteRecordStore,
    updates: Mutex<Vec<(DownloadStatus, f64)>>,
    cancel_at: Mutex<Option<(f64, CancellationToken)>>,
}

impl RecordingStore {
    pub fn new(inner: SqliteRecordStore) -> Self {
        Self {
            inner,
            updates: Mutex::new(Vec::new()),
            cancel_at: Mutex::new(None),
        }
    }

    pub fn cancel_when_progress_reaches(&self, fraction: f64, token: CancellationToken) {
        *self.cancel_at.lock().unwrap() = Some((fraction, token));
    }

    pub fn updates(&self) -> Vec<(DownloadStatus, f64)> {
        self.updates.lock().unwrap().clone()
    }

    /// Progress values written while DOWNLOADING, after the initial reset
    pub fn download_progress(&self) -> Vec<f64> {
        self.updates()
            .into_iter()
            .filter(|(status, progress)| *status == DownloadStatus::Downloading && *progress > 0.0)
            .map(|(_, progress)| progress)
            .collect()
    }
}

#[async_trait]
impl DownloadRecordStore for RecordingStore {
    async fn insert(&self, record: &DownloadRecord) -> Result<()> {
        self.inner.insert(record).await
    }

    async fn update(&self, record: &DownloadRecord) -> Result<()> {
        self.updates
            .lock()
            .unwrap()
            .push((record.status, record.progress));

        if let Some((threshold, token)) = self.cancel_at.lock().unwrap().as_ref() {
            if record.progress >= *threshold {
                token.cancel();
            }
        }

        self.inner.update(record).await
    }

    async fn get(&self, id: &str) -> Result<Option<DownloadRecord>> {
        self.inner.get(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        self.inner.delete(id).await
    }

    async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        self.inner.list_all().await
    }

    fn observe_all(&self) -> watch::Receiver<Vec<DownloadRecord>> {
        self.inner.observe_all()
    }

    async fn delete_completed(&self) -> Result<u64> {
        self.inner.delete_completed().await
    }
}

/// Worker collaborators over an in-memory database and a temp directory
pub struct Fixture {
    pub dir: TempDir,
    pub store: Arc<RecordingStore>,
    pub resolver: Arc<StubResolver>,
    pub board: Arc<NotificationBoard>,
    pub ctx: WorkerContext,
}

impl Fixture {
    pub async fn new(resolver: StubResolver) -> Self {
        let dir = TempDir::new().unwrap();
        let db = Database::new_in_memory().await.unwrap();
        let store = Arc::new(RecordingStore::new(SqliteRecordStore::new(db).await.unwrap()));
        let resolver = Arc::new(resolver);
        let board = Arc::new(NotificationBoard::new());
        let sink = Arc::new(DirectoryMediaStore::new(dir.path().join("out")));

        let config = DownloadConfig {
            output_directory: dir.path().join("out"),
            temp_directory: dir.path().join("tmp"),
            chunk_size: 25,
            connect_timeout_secs: 5,
            read_timeout_secs: 5,
        };

        let ctx = WorkerContext::new(
            store.clone(),
            resolver.clone(),
            sink,
            board.clone(),
            Arc::new(NotificationChannel::downloads()),
            &config,
        )
        .unwrap();

        Self {
            dir,
            store,
            resolver,
            board,
            ctx,
        }
    }

    pub fn output_dir(&self) -> PathBuf {
        self.dir.path().join("out")
    }

    pub fn temp_dir(&self) -> PathBuf {
        self.dir.path().join("tmp")
    }

    /// Insert a record directly, bypassing the manager
    pub async fn insert_record(&self, id: &str, status: DownloadStatus) -> DownloadRecord {
        let request = NewDownload::new(
            VIDEO_URL.to_string(),
            "Never Gonna Give You Up".to_string(),
            VideoQuality::Hd720,
            VideoFormat::Mp4,
        );
        let mut record = request.into_record(
            id.to_string(),
            format!("{}.mp4", id),
            chrono::Utc::now().timestamp_millis(),
        );
        record.status = status;

        self.store.insert(&record).await.unwrap();
        record
    }

    pub async fn record(&self, id: &str) -> DownloadRecord {
        self.store.get(id).await.unwrap().expect("record exists")
    }
}
