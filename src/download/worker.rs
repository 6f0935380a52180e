//! Download worker
//!
//! Drives one download request end-to-end:
//! 1. Ongoing notification
//! 2. Record to DOWNLOADING with progress 0
//! 3. Stream lookup through the [`VideoResolver`]
//! 4. GET the media URL and copy it into `<temp_dir>/<record_id>.part` in
//!    fixed-size chunks, persisting progress after each chunk
//! 5. PROCESSING while the [`FileSink`] publishes the file, then COMPLETED
//!
//! Every failure is folded into the record (FAILED plus `error_message`) and a
//! [`WorkerOutcome`]; nothing escapes the task. Cancellation is observed before
//! the stream lookup and between chunks, and ends in PAUSED. The temp file is
//! left behind on failure and on pause.

use crate::api::resolver::VideoResolver;
use crate::config::DownloadConfig;
use crate::download::progress::{format_file_size, speed_string, SpeedTracker, TransferProgress};
use crate::error::{FailureKind, Result, TubeFetchError};
use crate::file::paths::temp_file_path;
use crate::file::sink::FileSink;
use crate::notify::{notification_id_for, Notification, NotificationChannel, Notifier};
use crate::storage::models::{DownloadRecord, VideoFormat, VideoQuality};
use crate::storage::store::DownloadRecordStore;
use futures_util::TryStreamExt;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::fs;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::time::timeout;
use tokio_util::io::StreamReader;
use tokio_util::sync::CancellationToken;

/// Raw worker parameters as handed over by the scheduler
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkRequest {
    pub record_id: Option<String>,
    pub url: Option<String>,
    pub title: Option<String>,
    pub file_name: Option<String>,
    pub quality: Option<VideoQuality>,
    pub format: Option<VideoFormat>,
}

/// Validated worker parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerInput {
    pub record_id: String,
    pub url: String,
    pub title: String,
    pub file_name: String,
    pub quality: VideoQuality,
    pub format: VideoFormat,
}

impl WorkRequest {
    /// Parameters for running `record`
    pub fn for_record(record: &DownloadRecord) -> Self {
        Self {
            record_id: Some(record.id.clone()),
            url: Some(record.source_url.clone()),
            title: Some(record.title.clone()),
            file_name: Some(record.file_name.clone()),
            quality: Some(record.quality),
            format: Some(record.format),
        }
    }

    /// All fields are required; empty strings count as missing
    pub fn validate(self) -> Result<WorkerInput> {
        fn required(value: Option<String>, field: &str) -> Result<String> {
            match value {
                Some(v) if !v.trim().is_empty() => Ok(v),
                _ => Err(TubeFetchError::missing(field)),
            }
        }

        Ok(WorkerInput {
            record_id: required(self.record_id, "record_id")?,
            url: required(self.url, "url")?,
            title: required(self.title, "title")?,
            file_name: required(self.file_name, "file_name")?,
            quality: self.quality.ok_or_else(|| TubeFetchError::missing("quality"))?,
            format: self.format.ok_or_else(|| TubeFetchError::missing("format"))?,
        })
    }
}

/// How a worker run ended
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum WorkerOutcome {
    Completed { record: DownloadRecord },
    /// Cancelled; the record is PAUSED and a retry starts from zero
    Paused,
    Failed { failure: FailureKind },
}

impl WorkerOutcome {
    pub fn is_completed(&self) -> bool {
        matches!(self, WorkerOutcome::Completed { .. })
    }
}

/// Byte transfer settings
#[derive(Debug, Clone)]
pub struct TransferSettings {
    pub temp_directory: PathBuf,
    pub chunk_size: usize,
    pub read_timeout: Duration,
}

impl TransferSettings {
    pub fn from_config(config: &DownloadConfig) -> Self {
        Self {
            temp_directory: config.temp_directory.clone(),
            chunk_size: config.chunk_size.max(1),
            read_timeout: Duration::from_secs(config.read_timeout_secs),
        }
    }
}

/// Collaborators shared by every worker
#[derive(Clone)]
pub struct WorkerContext {
    pub store: Arc<dyn DownloadRecordStore>,
    pub resolver: Arc<dyn VideoResolver>,
    pub sink: Arc<dyn FileSink>,
    pub notifier: Arc<dyn Notifier>,
    pub channel: Arc<NotificationChannel>,
    pub http: reqwest::Client,
    pub settings: TransferSettings,
}

impl WorkerContext {
    /// Build the context, including the media HTTP client (connect timeout only;
    /// reads are timed per chunk)
    pub fn new(
        store: Arc<dyn DownloadRecordStore>,
        resolver: Arc<dyn VideoResolver>,
        sink: Arc<dyn FileSink>,
        notifier: Arc<dyn Notifier>,
        channel: Arc<NotificationChannel>,
        config: &DownloadConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()?;

        Ok(Self {
            store,
            resolver,
            sink,
            notifier,
            channel,
            http,
            settings: TransferSettings::from_config(config),
        })
    }
}

/// Where an attempt stopped without an error
enum Stop {
    Finished,
    Cancelled,
}

/// Runs a single download request
pub struct DownloadWorker {
    ctx: WorkerContext,
}

impl DownloadWorker {
    pub fn new(ctx: WorkerContext) -> Self {
        Self { ctx }
    }

    /// Run the request to a terminal outcome
    pub async fn run(&self, request: WorkRequest, cancel: CancellationToken) -> WorkerOutcome {
        let input = match request.validate() {
            Ok(input) => input,
            Err(e) => {
                log::error!("Rejected download request: {}", e);
                return WorkerOutcome::Failed { failure: e.failure_kind() };
            }
        };

        let notification_id = notification_id_for(&input.record_id);
        self.ctx.notifier.post(
            &self.ctx.channel,
            notification_id,
            Notification::Ongoing { title: input.title.clone(), progress: None },
        );

        let mut record = match self.ctx.store.get(&input.record_id).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                let e = TubeFetchError::not_found(format!("Download not found: {}", input.record_id));
                return self.fail_without_record(&input, notification_id, e);
            }
            Err(e) => return self.fail_without_record(&input, notification_id, e),
        };

        record.mark_downloading();
        if let Err(e) = self.ctx.store.update(&record).await {
            return self.fail(record, notification_id, e).await;
        }
        log::info!("Download {} started: {}", record.id, input.title);

        match self.attempt(&input, &mut record, &cancel, notification_id).await {
            Ok(Stop::Finished) => {
                log::info!("Download {} completed ({})", record.id, record.file_size);
                self.ctx.notifier.post(
                    &self.ctx.channel,
                    notification_id,
                    Notification::Completed {
                        title: input.title.clone(),
                        file_size: record.file_size.clone(),
                    },
                );
                WorkerOutcome::Completed { record }
            }
            Ok(Stop::Cancelled) => self.pause(record, notification_id).await,
            Err(e) => self.fail(record, notification_id, e).await,
        }
    }

    async fn attempt(
        &self,
        input: &WorkerInput,
        record: &mut DownloadRecord,
        cancel: &CancellationToken,
        notification_id: i32,
    ) -> Result<Stop> {
        if cancel.is_cancelled() {
            return Ok(Stop::Cancelled);
        }

        let stream = self
            .ctx
            .resolver
            .resolve_stream(&input.url, input.format, input.quality)
            .await?;

        let temp = temp_file_path(&self.ctx.settings.temp_directory, &input.record_id);
        let bytes = match self
            .transfer(&stream.download_url, &temp, record, cancel, notification_id)
            .await?
        {
            Some(bytes) => bytes,
            None => return Ok(Stop::Cancelled),
        };

        record.mark_processing();
        self.ctx.store.update(record).await?;

        let entry = self
            .ctx
            .sink
            .publish(&temp, &input.file_name, input.format.mime_type())
            .await?;

        record.mark_completed(format_file_size(bytes), entry.path, entry.uri);
        self.ctx.store.update(record).await?;

        Ok(Stop::Finished)
    }

    /// Copy the response body into `temp`; `None` when cancelled mid-way
    async fn transfer(
        &self,
        url: &str,
        temp: &Path,
        record: &mut DownloadRecord,
        cancel: &CancellationToken,
        notification_id: i32,
    ) -> Result<Option<u64>> {
        let settings = &self.ctx.settings;
        let read_timeout_secs = settings.read_timeout.as_secs();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            sent = timeout(settings.read_timeout, self.ctx.http.get(url).send()) => {
                sent.map_err(|_| TubeFetchError::Timeout(read_timeout_secs))??
            }
        };

        let status = response.status();
        if !status.is_success() {
            return Err(TubeFetchError::HttpStatus { status: status.as_u16() });
        }

        let content_length = response.content_length();
        if content_length == Some(0) {
            return Err(TubeFetchError::EmptyResponseBody);
        }

        if let Some(parent) = temp.parent() {
            fs::create_dir_all(parent).await?;
        }
        let mut file = fs::File::create(temp).await?;

        let body = response
            .bytes_stream()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e));
        let mut reader = StreamReader::new(Box::pin(body));

        let mut buffer = vec![0u8; settings.chunk_size];
        let mut progress = TransferProgress::new(content_length);
        let mut speed = SpeedTracker::new();

        loop {
            if cancel.is_cancelled() {
                file.flush().await?;
                log::info!(
                    "Download {} cancelled after {} bytes",
                    record.id,
                    progress.bytes_copied
                );
                return Ok(None);
            }

            let n = match read_chunk(&mut reader, &mut buffer, settings.read_timeout, cancel).await? {
                Some(0) => break,
                Some(n) => n,
                // Partial chunk is dropped; a resumed download starts over
                None => continue,
            };

            file.write_all(&buffer[..n]).await?;
            progress.add(n);
            speed.add_position(progress.bytes_copied);

            if let Some(fraction) = progress.fraction() {
                record.advance_progress(fraction);
            }
            record.download_speed = speed_string(speed.average_speed());
            self.ctx.store.update(record).await?;

            self.ctx.notifier.post(
                &self.ctx.channel,
                notification_id,
                Notification::Ongoing {
                    title: record.title.clone(),
                    progress: progress.fraction(),
                },
            );

            log::debug!(
                "Download {}: {} bytes ({:.0}%)",
                record.id,
                progress.bytes_copied,
                record.progress_percentage()
            );
        }

        file.flush().await?;

        if progress.bytes_copied == 0 {
            return Err(TubeFetchError::EmptyResponseBody);
        }

        Ok(Some(progress.bytes_copied))
    }

    async fn pause(&self, mut record: DownloadRecord, notification_id: i32) -> WorkerOutcome {
        record.mark_paused();
        if let Err(e) = self.ctx.store.update(&record).await {
            log::warn!("Could not persist pause for {}: {}", record.id, e);
        }

        log::info!("Download {} paused", record.id);
        self.ctx.notifier.post(
            &self.ctx.channel,
            notification_id,
            Notification::Paused { title: record.title.clone() },
        );

        WorkerOutcome::Paused
    }

    async fn fail(&self, mut record: DownloadRecord, notification_id: i32, error: TubeFetchError) -> WorkerOutcome {
        log::error!("Download {} failed: {}", record.id, error);

        let reason = error.user_message();
        record.mark_failed(reason.clone());
        if let Err(e) = self.ctx.store.update(&record).await {
            log::warn!("Could not persist failure for {}: {}", record.id, e);
        }

        self.ctx.notifier.post(
            &self.ctx.channel,
            notification_id,
            Notification::Failed { title: record.title.clone(), reason },
        );

        WorkerOutcome::Failed { failure: error.failure_kind() }
    }

    fn fail_without_record(&self, input: &WorkerInput, notification_id: i32, error: TubeFetchError) -> WorkerOutcome {
        log::error!("Download {} failed: {}", input.record_id, error);

        self.ctx.notifier.post(
            &self.ctx.channel,
            notification_id,
            Notification::Failed { title: input.title.clone(), reason: error.user_message() },
        );

        WorkerOutcome::Failed { failure: error.failure_kind() }
    }
}

/// Fill `buffer` unless the stream ends first; returns bytes read
///
/// Each read gets its own `read_timeout`, so a body that keeps trickling is
/// never cut off while a stalled one is. `None` when `cancel` fires.
async fn read_chunk<R: AsyncRead + Unpin>(
    reader: &mut R,
    buffer: &mut [u8],
    read_timeout: Duration,
    cancel: &CancellationToken,
) -> Result<Option<usize>> {
    let mut filled = 0;
    while filled < buffer.len() {
        let n = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(None),
            read = timeout(read_timeout, reader.read(&mut buffer[filled..])) => read
                .map_err(|_| TubeFetchError::Timeout(read_timeout.as_secs()))?
                .map_err(|e| TubeFetchError::NetworkError(format!("Read failed: {}", e)))?,
        };
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(Some(filled))
}
