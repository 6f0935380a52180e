//! Download manager
//!
//! This module ties record persistence to worker tasks:
//! - Creates PENDING records and spawns one worker task per request
//! - Pause by cancellation (the worker persists PAUSED)
//! - Manual retry from FAILED/PAUSED, always restarting from zero bytes
//! - Deletes records together with their published file
//! - Restarts work left unfinished by a previous process
//!
//! There is no concurrency limit and no queue ordering; every request gets its
//! own tokio task as soon as it is created.

use crate::api::resolver::{VideoInfo, VideoResolver};
use crate::download::worker::{DownloadWorker, WorkRequest, WorkerContext, WorkerOutcome};
use crate::error::{FailureKind, Result, TubeFetchError};
use crate::file::paths::file_name_for;
use crate::file::sink::FileSink;
use crate::notify::{notification_id_for, Notification, Notifier};
use crate::storage::models::{DownloadRecord, NewDownload, VideoFormat, VideoQuality};
use crate::storage::store::DownloadRecordStore;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// How long pause/delete wait for a worker to acknowledge cancellation
const STOP_GRACE: Duration = Duration::from_secs(2);

/// Worker task handle
///
/// Entries stay after the task ends so [`DownloadManager::wait`] can still
/// report the outcome; they are replaced on retry and dropped on delete.
struct ActiveDownload {
    cancel: CancellationToken,
    done: watch::Receiver<Option<WorkerOutcome>>,
}

impl ActiveDownload {
    fn is_running(&self) -> bool {
        self.done.borrow().is_none()
    }
}

/// Download manager
pub struct DownloadManager {
    ctx: WorkerContext,
    active: Arc<RwLock<HashMap<String, ActiveDownload>>>,
}

impl DownloadManager {
    pub fn new(ctx: WorkerContext) -> Self {
        Self {
            ctx,
            active: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Create a PENDING record and start its worker
    pub async fn enqueue(&self, request: NewDownload) -> Result<String> {
        if request.source_url.trim().is_empty() {
            return Err(TubeFetchError::missing("source_url"));
        }
        if request.title.trim().is_empty() {
            return Err(TubeFetchError::missing("title"));
        }

        let id = Uuid::new_v4().to_string();
        let file_name = file_name_for(&request.title, request.format);
        let created_at = chrono::Utc::now().timestamp_millis();

        let record = request.into_record(id.clone(), file_name, created_at);
        self.ctx.store.insert(&record).await?;

        log::info!("Enqueued download {} ({})", id, record.title);
        self.spawn(&record).await;

        Ok(id)
    }

    /// Look up metadata for `url`, then enqueue it
    pub async fn enqueue_url(&self, url: &str, quality: VideoQuality, format: VideoFormat) -> Result<String> {
        let info = self.ctx.resolver.fetch_video_info(url).await?;
        self.enqueue(info.to_new_download(url, quality, format)).await
    }

    pub async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo> {
        self.ctx.resolver.fetch_video_info(url).await
    }

    pub async fn get(&self, id: &str) -> Result<Option<DownloadRecord>> {
        self.ctx.store.get(id).await
    }

    /// All records, newest first
    pub async fn list(&self) -> Result<Vec<DownloadRecord>> {
        self.ctx.store.list_all().await
    }

    pub fn observe(&self) -> watch::Receiver<Vec<DownloadRecord>> {
        self.ctx.store.observe_all()
    }

    /// Pause a download
    ///
    /// A running worker is cancelled and given up to 2 seconds to persist
    /// PAUSED itself. A record that is still waiting (or whose worker did not
    /// stop in time) is set PAUSED directly. Terminal records are left alone.
    pub async fn pause(&self, id: &str) -> Result<()> {
        self.stop_worker(id).await;

        let mut record = self.require(id).await?;
        if record.status.is_active() {
            record.mark_paused();
            self.ctx.store.update(&record).await?;
            self.ctx.notifier.post(
                &self.ctx.channel,
                notification_id_for(id),
                Notification::Paused { title: record.title.clone() },
            );
            log::info!("Download {} paused while {}", id, record.status.as_str());
        }

        Ok(())
    }

    /// Retry a FAILED or PAUSED download from the beginning
    pub async fn retry(&self, id: &str) -> Result<()> {
        let mut record = self.require(id).await?;

        if !record.status.can_retry() {
            return Err(TubeFetchError::InvalidState(format!(
                "Download cannot be retried while {}",
                record.status.as_str()
            )));
        }
        if self.is_running(id).await {
            return Err(TubeFetchError::InvalidState(format!(
                "Download {} is still stopping",
                id
            )));
        }

        record.reset_for_retry();
        self.ctx.store.update(&record).await?;

        log::info!("Retrying download {}", id);
        self.spawn(&record).await;

        Ok(())
    }

    /// Resume a paused download (restarts from zero bytes)
    pub async fn resume(&self, id: &str) -> Result<()> {
        self.retry(id).await
    }

    /// Delete a record and its published file
    ///
    /// A missing file is logged and ignored, and a file another record still
    /// points at is kept. Fails with `InvalidState` if the worker does not stop
    /// in time. Returns false if no such record.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        if !self.stop_worker(id).await {
            return Err(TubeFetchError::InvalidState(format!(
                "Download {} is still stopping",
                id
            )));
        }
        self.active.write().await.remove(id);

        let record = match self.ctx.store.get(id).await? {
            Some(record) => record,
            None => return Ok(false),
        };

        if let Some(uri) = record.file_uri.as_deref() {
            if self.file_shared_with_other(id, uri).await? {
                log::warn!("Keeping {} for download {}: another download uses it", uri, id);
            } else {
                self.delete_file(id, uri).await;
            }
        }

        let deleted = self.ctx.store.delete(id).await?;
        self.ctx.notifier.cancel(notification_id_for(id));

        Ok(deleted)
    }

    async fn file_shared_with_other(&self, id: &str, uri: &str) -> Result<bool> {
        Ok(self
            .ctx
            .store
            .list_all()
            .await?
            .iter()
            .any(|other| other.id != id && other.file_uri.as_deref() == Some(uri)))
    }

    async fn delete_file(&self, id: &str, uri: &str) {
        match self.ctx.sink.delete(uri).await {
            Ok(true) => log::info!("Deleted file {}", uri),
            Ok(false) => log::warn!("File already gone for download {}: {}", id, uri),
            Err(e) => log::warn!("Failed to delete file for download {}: {}", id, e),
        }
    }

    /// Delete COMPLETED records; their files are kept
    pub async fn clear_completed(&self) -> Result<u64> {
        let count = self.ctx.store.delete_completed().await?;
        log::info!("Cleared {} completed downloads", count);
        Ok(count)
    }

    /// Wait for the worker of `id` to finish
    ///
    /// Returns None if no worker was started for this record in this process.
    pub async fn wait(&self, id: &str) -> Option<WorkerOutcome> {
        let mut done = {
            let active = self.active.read().await;
            active.get(id)?.done.clone()
        };

        let outcome = match done.wait_for(Option::is_some).await {
            Ok(outcome) => outcome.clone(),
            Err(_) => None,
        };

        Some(outcome.unwrap_or_else(|| WorkerOutcome::Failed {
            failure: FailureKind::Io {
                message: "worker ended without an outcome".to_string(),
            },
        }))
    }

    /// Number of workers still running
    pub async fn active_count(&self) -> usize {
        self.active
            .read()
            .await
            .values()
            .filter(|d| d.is_running())
            .count()
    }

    /// Restart records a previous process left unfinished
    ///
    /// PENDING, QUEUED, DOWNLOADING and PROCESSING records without a worker
    /// are reset and started again from zero bytes.
    pub async fn resume_interrupted(&self) -> Result<usize> {
        let mut resumed = 0;

        for mut record in self.ctx.store.list_all().await? {
            if !record.status.is_active() || self.is_running(&record.id).await {
                continue;
            }

            record.reset_for_retry();
            self.ctx.store.update(&record).await?;
            self.spawn(&record).await;
            resumed += 1;
        }

        if resumed > 0 {
            log::info!("Restarted {} interrupted downloads", resumed);
        }

        Ok(resumed)
    }

    /// Cancel every running worker
    pub async fn shutdown(&self) {
        for download in self.active.read().await.values() {
            download.cancel.cancel();
        }
    }

    // ========================================================================
    // Internal Methods
    // ========================================================================

    async fn require(&self, id: &str) -> Result<DownloadRecord> {
        self.ctx
            .store
            .get(id)
            .await?
            .ok_or_else(|| TubeFetchError::not_found(format!("Download not found: {}", id)))
    }

    async fn is_running(&self, id: &str) -> bool {
        self.active
            .read()
            .await
            .get(id)
            .map(ActiveDownload::is_running)
            .unwrap_or(false)
    }

    /// Cancel the worker for `id` (if running) and wait briefly for it
    ///
    /// Returns false if the worker is still running after [`STOP_GRACE`].
    async fn stop_worker(&self, id: &str) -> bool {
        let done = {
            let active = self.active.read().await;
            match active.get(id) {
                Some(download) if download.is_running() => {
                    download.cancel.cancel();
                    Some(download.done.clone())
                }
                _ => None,
            }
        };

        let Some(mut done) = done else {
            return true;
        };

        // A closed channel means the task is gone, which counts as stopped
        let stopped = tokio::time::timeout(STOP_GRACE, done.wait_for(Option::is_some))
            .await
            .is_ok();
        if !stopped {
            log::warn!("Worker for {} did not stop within {:?}", id, STOP_GRACE);
        }
        stopped
    }

    /// Start a worker task for a record
    async fn spawn(&self, record: &DownloadRecord) {
        let cancel = CancellationToken::new();
        let (done_tx, done_rx) = watch::channel(None);

        let worker = DownloadWorker::new(self.ctx.clone());
        let request = WorkRequest::for_record(record);
        let token = cancel.clone();

        tokio::spawn(async move {
            let outcome = worker.run(request, token).await;
            let _ = done_tx.send(Some(outcome));
        });

        self.active.write().await.insert(
            record.id.clone(),
            ActiveDownload {
                cancel,
                done: done_rx,
            },
        );
    }
}
