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


//! Publishing finished downloads
//!
//! On Android the real sink is MediaStore (owned by the Kotlin layer). The
//! [`DirectoryMediaStore`] publishes into a plain directory and is what the
//! CLI, the desktop build and the tests use.
//!
//! # Key Operations
//! - Publish: move the temp file into the download directory (rename, with a
//!   copy + delete fallback across filesystems), replacing a previous file of
//!   the same name
//! - Existence checks by URI
//! - Deletion by URI, where an already-missing file is reported, not raised

use crate::error::{Result, TubeFetchError};
use crate::file::paths::{file_uri_to_path, path_to_file_uri};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::fs;
use tokio::time::sleep;

/// Maximum retry attempts for file operations
const MAX_RETRY_ATTEMPTS: u32 = 3;

/// Delay between retry attempts
const RETRY_DELAY: Duration = Duration::from_millis(100);

/// Where a published file ended up
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaEntry {
    /// Absolute filesystem path
    pub path: String,
    /// Content URI the platform uses to open the file
    pub uri: String,
}

/// Destination for completed downloads
#[async_trait]
pub trait FileSink: Send + Sync {
    /// Publish `temp_file` under `file_name`; the temp file is consumed
    async fn publish(&self, temp_file: &Path, file_name: &str, mime_type: &str) -> Result<MediaEntry>;

    async fn exists(&self, uri: &str) -> bool;

    /// Remove the published file; `Ok(false)` if it was already gone
    async fn delete(&self, uri: &str) -> Result<bool>;
}

/// Publishes into a directory on the local filesystem
#[derive(Debug, Clone)]
pub struct DirectoryMediaStore {
    root: PathBuf,
}

impl DirectoryMediaStore {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    /// Move with retry
    ///
    /// 1. Delete the destination if it exists
    /// 2. Create the destination directory
    /// 3. Rename (atomic on the same filesystem), else copy and delete
    /// 4. Retry up to 3 times on failure
    async fn safe_move(&self, source: &Path, destination: &Path) -> Result<()> {
        let mut attempts = 0;

        loop {
            attempts += 1;

            match Self::try_move(source, destination).await {
                Ok(()) => return Ok(()),
                Err(e) if attempts >= MAX_RETRY_ATTEMPTS => {
                    return Err(TubeFetchError::MediaStoreError(format!(
                        "Failed to move file after {} attempts: {} -> {}: {}",
                        MAX_RETRY_ATTEMPTS,
                        source.display(),
                        destination.display(),
                        e
                    )));
                }
                Err(e) => {
                    log::debug!("Move attempt {} failed: {}", attempts, e);
                    sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    async fn try_move(source: &Path, destination: &Path) -> Result<()> {
        if !Self::file_exists(source).await {
            return Err(TubeFetchError::FileNotFound(source.display().to_string()));
        }

        if Self::file_exists(destination).await {
            fs::remove_file(destination).await?;
        }

        if let Some(parent) = destination.parent() {
            Self::ensure_directory_exists(parent).await?;
        }

        if fs::rename(source, destination).await.is_ok() {
            return Ok(());
        }

        // Rename fails across mount points (cache dir vs shared storage)
        fs::copy(source, destination).await.map_err(|e| {
            TubeFetchError::FileIoError(format!(
                "Copy failed: {} -> {}: {}",
                source.display(),
                destination.display(),
                e
            ))
        })?;
        fs::remove_file(source).await?;

        Ok(())
    }

    async fn ensure_directory_exists(path: &Path) -> Result<()> {
        if Self::file_exists(path).await {
            return Ok(());
        }

        fs::create_dir_all(path).await.map_err(|e| {
            TubeFetchError::FileIoError(format!(
                "Failed to create directory {}: {}",
                path.display(),
                e
            ))
        })
    }

    async fn file_exists(path: &Path) -> bool {
        fs::try_exists(path).await.unwrap_or(false)
    }
}

#[async_trait]
impl FileSink for DirectoryMediaStore {
    async fn publish(&self, temp_file: &Path, file_name: &str, mime_type: &str) -> Result<MediaEntry> {
        let destination = self.root.join(file_name);
        self.safe_move(temp_file, &destination).await?;

        let path = destination
            .canonicalize()
            .unwrap_or_else(|_| destination.clone());
        let uri = path_to_file_uri(&path)?;

        log::info!("Published {} ({}) to {}", file_name, mime_type, path.display());

        Ok(MediaEntry {
            path: path.display().to_string(),
            uri,
        })
    }

    async fn exists(&self, uri: &str) -> bool {
        match file_uri_to_path(uri) {
            Ok(path) => Self::file_exists(&path).await,
            Err(_) => false,
        }
    }

    async fn delete(&self, uri: &str) -> Result<bool> {
        let path = file_uri_to_path(uri)?;

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(TubeFetchError::FileIoError(format!(
                "Delete failed: {}: {}",
                path.display(),
                e
            ))),
        }
    }
}
