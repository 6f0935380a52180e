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


//! Download record model and its enumerations
//!
//! One [`DownloadRecord`] row exists per download request. The descriptive
//! fields are display strings only; control flow looks at `status` and
//! `progress`.
//!
//! # Status lifecycle
//! ```text
//! PENDING ─► DOWNLOADING ─► PROCESSING ─► COMPLETED
//!               │   ▲
//!               ▼   │ retry (progress reset to 0)
//!        FAILED / PAUSED
//! ```
//! There is no enforced transition table; the download manager only gates
//! which user actions are offered for a status.

use crate::error::{Result, TubeFetchError};
use serde::{Deserialize, Serialize};

/// Status of a download record
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DownloadStatus {
    Pending,
    Queued,
    Downloading,
    Processing,
    Paused,
    Completed,
    Failed,
}

impl DownloadStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DownloadStatus::Pending => "pending",
            DownloadStatus::Queued => "queued",
            DownloadStatus::Downloading => "downloading",
            DownloadStatus::Processing => "processing",
            DownloadStatus::Paused => "paused",
            DownloadStatus::Completed => "completed",
            DownloadStatus::Failed => "failed",
        }
    }

    pub fn from_str(s: &str) -> Result<Self> {
        match s {
            "pending" => Ok(DownloadStatus::Pending),
            "queued" => Ok(DownloadStatus::Queued),
            "downloading" => Ok(DownloadStatus::Downloading),
            "processing" => Ok(DownloadStatus::Processing),
            "paused" => Ok(DownloadStatus::Paused),
            "completed" => Ok(DownloadStatus::Completed),
            "failed" => Ok(DownloadStatus::Failed),
            _ => Err(TubeFetchError::InvalidInput(format!("Invalid download status: {}", s))),
        }
    }

    /// Worker is (or is about to be) moving bytes for this record
    pub fn is_active(&self) -> bool {
        matches!(
            self,
            DownloadStatus::Pending
                | DownloadStatus::Queued
                | DownloadStatus::Downloading
                | DownloadStatus::Processing
        )
    }

    /// Status offers the manual retry action
    pub fn can_retry(&self) -> bool {
        matches!(self, DownloadStatus::Failed | DownloadStatus::Paused)
    }
}

/// Requested video quality
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum VideoQuality {
    #[serde(rename = "auto")]
    Auto,
    #[serde(rename = "360p")]
    Sd360,
    #[serde(rename = "480p")]
    Sd480,
    #[serde(rename = "720p")]
    Hd720,
    #[serde(rename = "1080p")]
    Hd1080,
    #[serde(rename = "1440p")]
    Qhd1440,
    #[serde(rename = "2160p")]
    Uhd4k,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 7] = [
        VideoQuality::Auto,
        VideoQuality::Sd360,
        VideoQuality::Sd480,
        VideoQuality::Hd720,
        VideoQuality::Hd1080,
        VideoQuality::Qhd1440,
        VideoQuality::Uhd4k,
    ];

    /// Label used on the wire and in the database
    pub fn label(&self) -> &'static str {
        match self {
            VideoQuality::Auto => "auto",
            VideoQuality::Sd360 => "360p",
            VideoQuality::Sd480 => "480p",
            VideoQuality::Hd720 => "720p",
            VideoQuality::Hd1080 => "1080p",
            VideoQuality::Qhd1440 => "1440p",
            VideoQuality::Uhd4k => "2160p",
        }
    }

    pub fn from_label(label: &str) -> Result<Self> {
        let normalized = label.trim().to_ascii_lowercase();
        match normalized.as_str() {
            "auto" => Ok(VideoQuality::Auto),
            "360p" | "360" => Ok(VideoQuality::Sd360),
            "480p" | "480" => Ok(VideoQuality::Sd480),
            "720p" | "720" => Ok(VideoQuality::Hd720),
            "1080p" | "1080" => Ok(VideoQuality::Hd1080),
            "1440p" | "1440" => Ok(VideoQuality::Qhd1440),
            "2160p" | "2160" | "4k" => Ok(VideoQuality::Uhd4k),
            _ => Err(TubeFetchError::InvalidInput(format!("Invalid video quality: {}", label))),
        }
    }
}

impl Default for VideoQuality {
    fn default() -> Self {
        VideoQuality::Auto
    }
}

/// Requested container/codec
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VideoFormat {
    Mp4,
    Mp3,
    Webm,
    M4a,
    Wav,
}

impl VideoFormat {
    pub const ALL: [VideoFormat; 5] = [
        VideoFormat::Mp4,
        VideoFormat::Mp3,
        VideoFormat::Webm,
        VideoFormat::M4a,
        VideoFormat::Wav,
    ];

    /// File extension without the dot
    pub fn extension(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "mp4",
            VideoFormat::Mp3 => "mp3",
            VideoFormat::Webm => "webm",
            VideoFormat::M4a => "m4a",
            VideoFormat::Wav => "wav",
        }
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            VideoFormat::Mp4 => "video/mp4",
            VideoFormat::Mp3 => "audio/mpeg",
            VideoFormat::Webm => "video/webm",
            VideoFormat::M4a => "audio/mp4",
            VideoFormat::Wav => "audio/wav",
        }
    }

    pub fn from_extension(ext: &str) -> Result<Self> {
        let normalized = ext.trim().trim_start_matches('.').to_ascii_lowercase();
        VideoFormat::ALL
            .iter()
            .copied()
            .find(|f| f.extension() == normalized)
            .ok_or_else(|| TubeFetchError::InvalidInput(format!("Invalid video format: {}", ext)))
    }
}

impl Default for VideoFormat {
    fn default() -> Self {
        VideoFormat::Mp4
    }
}

/// One persisted download request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub id: String,

    // Display fields
    pub title: String,
    pub duration: String,
    pub thumbnail_url: String,
    pub source_url: String,
    pub channel_name: String,
    pub view_count: String,
    pub upload_date: String,

    /// Sanitized title plus the format extension
    pub file_name: String,

    // Control fields
    pub status: DownloadStatus,
    /// Fraction 0.0 - 1.0
    pub progress: f64,
    pub download_speed: String,
    pub file_size: String,

    pub quality: VideoQuality,
    pub format: VideoFormat,

    // Populated on success only
    pub download_path: Option<String>,
    pub file_uri: Option<String>,

    pub error_message: Option<String>,

    /// Unix epoch milliseconds
    pub created_at: i64,
}

impl DownloadRecord {
    /// Enter DOWNLOADING for a fresh attempt
    pub fn mark_downloading(&mut self) {
        self.status = DownloadStatus::Downloading;
        self.progress = 0.0;
        self.download_speed.clear();
        self.error_message = None;
    }

    /// Move progress forward; smaller values and non-DOWNLOADING states are ignored
    pub fn advance_progress(&mut self, fraction: f64) -> bool {
        if self.status != DownloadStatus::Downloading {
            return false;
        }
        let fraction = fraction.clamp(0.0, 1.0);
        if fraction > self.progress {
            self.progress = fraction;
            true
        } else {
            false
        }
    }

    pub fn mark_processing(&mut self) {
        self.status = DownloadStatus::Processing;
    }

    pub fn mark_completed(&mut self, file_size: String, download_path: String, file_uri: String) {
        self.status = DownloadStatus::Completed;
        self.progress = 1.0;
        self.download_speed.clear();
        self.file_size = file_size;
        self.download_path = Some(download_path);
        self.file_uri = Some(file_uri);
        self.error_message = None;
    }

    /// FAILED keeps whatever progress the attempt reached
    pub fn mark_failed(&mut self, message: String) {
        self.status = DownloadStatus::Failed;
        self.download_speed.clear();
        self.error_message = Some(message);
    }

    pub fn mark_paused(&mut self) {
        self.status = DownloadStatus::Paused;
        self.download_speed.clear();
    }

    /// Reset for a manual retry; the next attempt starts from zero bytes
    pub fn reset_for_retry(&mut self) {
        self.status = DownloadStatus::Queued;
        self.progress = 0.0;
        self.download_speed.clear();
        self.error_message = None;
    }

    /// Calculate download percentage
    pub fn progress_percentage(&self) -> f64 {
        self.progress * 100.0
    }
}

/// Parameters for creating a download record
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDownload {
    pub source_url: String,
    pub title: String,
    #[serde(default)]
    pub duration: String,
    #[serde(default)]
    pub thumbnail_url: String,
    #[serde(default)]
    pub channel_name: String,
    #[serde(default)]
    pub view_count: String,
    #[serde(default)]
    pub upload_date: String,
    #[serde(default)]
    pub quality: VideoQuality,
    #[serde(default)]
    pub format: VideoFormat,
}

impl NewDownload {
    pub fn new(source_url: String, title: String, quality: VideoQuality, format: VideoFormat) -> Self {
        Self {
            source_url,
            title,
            quality,
            format,
            ..Default::default()
        }
    }

    /// Build the PENDING record for this request
    pub fn into_record(self, id: String, file_name: String, created_at: i64) -> DownloadRecord {
        DownloadRecord {
            id,
            title: self.title,
            duration: self.duration,
            thumbnail_url: self.thumbnail_url,
            source_url: self.source_url,
            channel_name: self.channel_name,
            view_count: self.view_count,
            upload_date: self.upload_date,
            file_name,
            status: DownloadStatus::Pending,
            progress: 0.0,
            download_speed: String::new(),
            file_size: String::new(),
            quality: self.quality,
            format: self.format,
            download_path: None,
            file_uri: None,
            error_message: None,
            created_at,
        }
    }
}
