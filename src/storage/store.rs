// TubeFetch - Video Downloads for Android
// Copyright (C) 2025 Henning Berge
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.


//! Download record store
//!
//! Keyed by record id, last write wins. Every mutation re-publishes the full
//! list (newest first) on a `watch` channel, which is what the download list
//! screen observes. Mutations and their snapshot are serialized, so the feed
//! always ends on the latest table state.

use crate::error::{Result, TubeFetchError};
use crate::storage::database::Database;
use crate::storage::models::{DownloadRecord, DownloadStatus, VideoFormat, VideoQuality};
use async_trait::async_trait;
use sqlx::Row;
use tokio::sync::{watch, Mutex};

/// Persistence contract used by the download worker and manager
#[async_trait]
pub trait DownloadRecordStore: Send + Sync {
    /// Insert a record, replacing any row with the same id
    async fn insert(&self, record: &DownloadRecord) -> Result<()>;

    /// Replace the row with `record.id`; `RecordNotFound` if it was deleted
    async fn update(&self, record: &DownloadRecord) -> Result<()>;

    async fn get(&self, id: &str) -> Result<Option<DownloadRecord>>;

    /// Returns false when no row matched
    async fn delete(&self, id: &str) -> Result<bool>;

    /// All records, newest first
    async fn list_all(&self) -> Result<Vec<DownloadRecord>>;

    /// Live feed of [`list_all`](Self::list_all)
    fn observe_all(&self) -> watch::Receiver<Vec<DownloadRecord>>;

    /// Delete COMPLETED rows only, returning how many went away
    async fn delete_completed(&self) -> Result<u64>;
}

/// SQLite-backed record store
pub struct SqliteRecordStore {
    db: Database,
    feed: watch::Sender<Vec<DownloadRecord>>,
    /// Held across write + re-query + send
    write_lock: Mutex<()>,
}

impl SqliteRecordStore {
    /// Create the store and prime the live feed with the current rows
    pub async fn new(db: Database) -> Result<Self> {
        let initial = Self::query_all(&db).await?;
        let (feed, _) = watch::channel(initial);
        Ok(Self {
            db,
            feed,
            write_lock: Mutex::new(()),
        })
    }

    async fn query_all(db: &Database) -> Result<Vec<DownloadRecord>> {
        let rows = sqlx::query("SELECT * FROM downloads ORDER BY created_at DESC, rowid DESC")
            .fetch_all(db.pool())
            .await?;

        rows.into_iter().map(row_to_record).collect()
    }

    /// Push the current table contents to observers; call with `write_lock` held
    async fn publish(&self) {
        match Self::query_all(&self.db).await {
            Ok(records) => {
                self.feed.send_replace(records);
            }
            Err(e) => log::warn!("Failed to refresh download feed: {}", e),
        }
    }
}

#[async_trait]
impl DownloadRecordStore for SqliteRecordStore {
    async fn insert(&self, record: &DownloadRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        sqlx::query(
            r#"
            INSERT OR REPLACE INTO downloads (
                id, title, duration, thumbnail_url, source_url, channel_name,
                view_count, upload_date, file_name, status, progress,
                download_speed, file_size, quality, format, download_path,
                file_uri, error_message, created_at
            )
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&record.id)
        .bind(&record.title)
        .bind(&record.duration)
        .bind(&record.thumbnail_url)
        .bind(&record.source_url)
        .bind(&record.channel_name)
        .bind(&record.view_count)
        .bind(&record.upload_date)
        .bind(&record.file_name)
        .bind(record.status.as_str())
        .bind(record.progress)
        .bind(&record.download_speed)
        .bind(&record.file_size)
        .bind(record.quality.label())
        .bind(record.format.extension())
        .bind(&record.download_path)
        .bind(&record.file_uri)
        .bind(&record.error_message)
        .bind(record.created_at)
        .execute(self.db.pool())
        .await?;

        self.publish().await;
        Ok(())
    }

    async fn update(&self, record: &DownloadRecord) -> Result<()> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query(
            r#"
            UPDATE downloads SET
                title = ?, duration = ?, thumbnail_url = ?, source_url = ?,
                channel_name = ?, view_count = ?, upload_date = ?, file_name = ?,
                status = ?, progress = ?, download_speed = ?, file_size = ?,
                quality = ?, format = ?, download_path = ?, file_uri = ?,
                error_message = ?, created_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&record.title)
        .bind(&record.duration)
        .bind(&record.thumbnail_url)
        .bind(&record.source_url)
        .bind(&record.channel_name)
        .bind(&record.view_count)
        .bind(&record.upload_date)
        .bind(&record.file_name)
        .bind(record.status.as_str())
        .bind(record.progress)
        .bind(&record.download_speed)
        .bind(&record.file_size)
        .bind(record.quality.label())
        .bind(record.format.extension())
        .bind(&record.download_path)
        .bind(&record.file_uri)
        .bind(&record.error_message)
        .bind(record.created_at)
        .bind(&record.id)
        .execute(self.db.pool())
        .await?;

        if result.rows_affected() == 0 {
            return Err(TubeFetchError::not_found(format!("Download not found: {}", record.id)));
        }

        self.publish().await;
        Ok(())
    }

    async fn get(&self, id: &str) -> Result<Option<DownloadRecord>> {
        let row = sqlx::query("SELECT * FROM downloads WHERE id = ?")
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;

        row.map(row_to_record).transpose()
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM downloads WHERE id = ?")
            .bind(id)
            .execute(self.db.pool())
            .await?;

        self.publish().await;
        Ok(result.rows_affected() > 0)
    }

    async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        Self::query_all(&self.db).await
    }

    fn observe_all(&self) -> watch::Receiver<Vec<DownloadRecord>> {
        self.feed.subscribe()
    }

    async fn delete_completed(&self) -> Result<u64> {
        let _guard = self.write_lock.lock().await;

        let result = sqlx::query("DELETE FROM downloads WHERE status = ?")
            .bind(DownloadStatus::Completed.as_str())
            .execute(self.db.pool())
            .await?;

        if result.rows_affected() > 0 {
            if let Err(e) = self.db.reclaim_free_pages().await {
                log::warn!("Incremental vacuum after clearing downloads failed: {}", e);
            }
        }

        self.publish().await;
        Ok(result.rows_affected())
    }
}

/// Convert database row to DownloadRecord
fn row_to_record(row: sqlx::sqlite::SqliteRow) -> Result<DownloadRecord> {
    let status: String = row.try_get("status")?;
    let quality: String = row.try_get("quality")?;
    let format: String = row.try_get("format")?;

    Ok(DownloadRecord {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        duration: row.try_get("duration")?,
        thumbnail_url: row.try_get("thumbnail_url")?,
        source_url: row.try_get("source_url")?,
        channel_name: row.try_get("channel_name")?,
        view_count: row.try_get("view_count")?,
        upload_date: row.try_get("upload_date")?,
        file_name: row.try_get("file_name")?,
        status: DownloadStatus::from_str(&status)?,
        progress: row.try_get("progress")?,
        download_speed: row.try_get("download_speed")?,
        file_size: row.try_get("file_size")?,
        quality: VideoQuality::from_label(&quality)?,
        format: VideoFormat::from_extension(&format)?,
        download_path: row.try_get("download_path")?,
        file_uri: row.try_get("file_uri")?,
        error_message: row.try_get("error_message")?,
        created_at: row.try_get("created_at")?,
    })
}
