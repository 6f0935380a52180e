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


//! Core configuration
//!
//! Every field has a default, so `{}` is a valid configuration. The Android
//! layer sends a JSON object with the paths it got from `Context`; the CLI
//! reads an optional JSON file.

use crate::error::{Result, TubeFetchError};
use crate::storage::Database;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default remote extraction API
pub const DEFAULT_API_BASE_URL: &str = "https://api.tubefetch.app";

/// Copy buffer size used by the download worker
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

/// Top-level settings for [`crate::app::TubeFetchCore`]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    /// SQLite file holding download records
    pub database_path: PathBuf,

    pub api: ApiConfig,

    pub download: DownloadConfig,
}

/// Remote stream resolver settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub base_url: String,
    pub user_agent: String,
    /// Whole-request timeout for metadata and stream lookups
    pub timeout_secs: u64,
}

/// Byte transfer and output settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DownloadConfig {
    /// Public download directory files are published into
    pub output_directory: PathBuf,

    /// Where `<record_id>.part` files live while copying
    pub temp_directory: PathBuf,

    pub chunk_size: usize,
    pub connect_timeout_secs: u64,
    pub read_timeout_secs: u64,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            database_path: Database::get_default_path(),
            api: ApiConfig::default(),
            download: DownloadConfig::default(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            user_agent: format!("TubeFetch/{}", env!("CARGO_PKG_VERSION")),
            timeout_secs: 30,
        }
    }
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_directory: default_output_directory(),
            temp_directory: std::env::temp_dir().join("tubefetch"),
            chunk_size: DEFAULT_CHUNK_SIZE,
            connect_timeout_secs: 30,
            read_timeout_secs: 30,
        }
    }
}

impl CoreConfig {
    /// Load configuration from a JSON file
    pub async fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = tokio::fs::read_to_string(path).await.map_err(|e| {
            TubeFetchError::InvalidConfiguration(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;

        Self::from_json(&contents)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| TubeFetchError::InvalidConfiguration(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api.base_url.trim().is_empty() {
            return Err(TubeFetchError::InvalidConfiguration(
                "api.base_url must not be empty".to_string(),
            ));
        }
        if self.api.timeout_secs == 0 {
            return Err(TubeFetchError::InvalidConfiguration(
                "api.timeout_secs must be greater than zero".to_string(),
            ));
        }
        if self.download.chunk_size == 0 {
            return Err(TubeFetchError::InvalidConfiguration(
                "download.chunk_size must be greater than zero".to_string(),
            ));
        }
        if self.download.connect_timeout_secs == 0 || self.download.read_timeout_secs == 0 {
            return Err(TubeFetchError::InvalidConfiguration(
                "download timeouts must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

fn default_output_directory() -> PathBuf {
    #[cfg(target_os = "android")]
    {
        PathBuf::from("/storage/emulated/0/Download/TubeFetch")
    }

    #[cfg(not(target_os = "android"))]
    {
        let home = std::env::var("HOME")
            .or_else(|_| std::env::var("USERPROFILE"))
            .unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join("Downloads").join("TubeFetch")
    }
}
