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


//! Video metadata and stream resolution
//!
//! The worker treats the resolver as opaque: any error ends the current
//! attempt, and no retry happens here.

use crate::error::{Result, TubeFetchError};
use crate::storage::models::{NewDownload, VideoFormat, VideoQuality};
use async_trait::async_trait;
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

lazy_static! {
    static ref VIDEO_ID: Regex = Regex::new(r"^[A-Za-z0-9_-]{11}$").unwrap();
}

const YOUTUBE_HOSTS: [&str; 4] = [
    "youtube.com",
    "www.youtube.com",
    "m.youtube.com",
    "music.youtube.com",
];

/// Metadata shown before the user picks quality and format
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoInfo {
    pub title: String,
    /// Seconds
    #[serde(default)]
    pub duration: u64,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub channel: String,
    #[serde(default)]
    pub view_count: u64,
    #[serde(default)]
    pub upload_date: String,
}

impl VideoInfo {
    /// Download request carrying this video's display fields
    pub fn to_new_download(&self, source_url: &str, quality: VideoQuality, format: VideoFormat) -> NewDownload {
        NewDownload {
            source_url: source_url.to_string(),
            title: self.title.clone(),
            duration: format_duration(self.duration),
            thumbnail_url: self.thumbnail.clone(),
            channel_name: self.channel.clone(),
            view_count: format_view_count(self.view_count),
            upload_date: self.upload_date.clone(),
            quality,
            format,
        }
    }
}

/// A direct, time-limited media URL
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamInfo {
    #[serde(alias = "downloadUrl", alias = "url")]
    pub download_url: String,
    #[serde(default)]
    pub title: String,
    /// Server's label for what it actually picked
    #[serde(default)]
    pub quality: String,
    #[serde(default)]
    pub format: String,
}

#[async_trait]
pub trait VideoResolver: Send + Sync {
    async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo>;

    async fn resolve_stream(
        &self,
        url: &str,
        format: VideoFormat,
        quality: VideoQuality,
    ) -> Result<StreamInfo>;
}

/// Check that `url` is a YouTube video link and return its 11-character id
///
/// Accepts `watch?v=`, `/shorts/`, `/embed/`, `/live/` and `youtu.be/` forms
/// over http or https.
pub fn validate_video_url(url: &str) -> Result<String> {
    let invalid = || TubeFetchError::InvalidVideoUrl(url.to_string());

    let parsed = Url::parse(url.trim()).map_err(|_| invalid())?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(invalid());
    }

    let host = parsed.host_str().ok_or_else(invalid)?.to_ascii_lowercase();
    let mut segments = parsed.path_segments().into_iter().flatten().filter(|s| !s.is_empty());

    let candidate = if host == "youtu.be" {
        segments.next().map(str::to_string)
    } else if YOUTUBE_HOSTS.contains(&host.as_str()) {
        match segments.next() {
            Some("watch") => parsed
                .query_pairs()
                .find(|(k, _)| k == "v")
                .map(|(_, v)| v.into_owned()),
            Some("shorts") | Some("embed") | Some("live") => segments.next().map(str::to_string),
            _ => None,
        }
    } else {
        None
    };

    candidate
        .filter(|id| VIDEO_ID.is_match(id))
        .ok_or_else(invalid)
}

/// "987 views", "12.3K views", "1.2M views", "3.4B views"
pub fn format_view_count(views: u64) -> String {
    let count = views as f64;
    if views >= 1_000_000_000 {
        format!("{:.1}B views", count / 1_000_000_000.0)
    } else if views >= 1_000_000 {
        format!("{:.1}M views", count / 1_000_000.0)
    } else if views >= 1_000 {
        format!("{:.1}K views", count / 1_000.0)
    } else if views == 1 {
        "1 view".to_string()
    } else {
        format!("{} views", views)
    }
}

/// "3:05" under an hour, "1:02:03" above
pub fn format_duration(seconds: u64) -> String {
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    let secs = seconds % 60;

    if hours > 0 {
        format!("{}:{:02}:{:02}", hours, minutes, secs)
    } else {
        format!("{}:{:02}", minutes, secs)
    }
}
