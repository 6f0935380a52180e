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


//! HTTP client for the TubeFetch extraction API
//!
//! # Endpoints
//! - `GET {base}/api/info?url=<url>` - video metadata
//! - `GET {base}/api/stream?url=<url>&format=<ext>&quality=<label>` - direct media URL
//!
//! Source URLs are validated locally before any request is sent.

use crate::api::resolver::{validate_video_url, StreamInfo, VideoInfo, VideoResolver};
use crate::config::ApiConfig;
use crate::error::{Result, TubeFetchError};
use crate::storage::models::{VideoFormat, VideoQuality};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, USER_AGENT};
use reqwest::{Client, Response, StatusCode};
use std::time::Duration;

const INFO_ENDPOINT: &str = "/api/info";
const STREAM_ENDPOINT: &str = "/api/stream";

/// [`VideoResolver`] backed by the remote extraction API
#[derive(Debug, Clone)]
pub struct RemoteApiResolver {
    client: Client,
    base_url: String,
}

impl RemoteApiResolver {
    /// Build a resolver from API settings
    ///
    /// # Errors
    /// Returns error if the user agent is not a valid header value or the
    /// HTTP client cannot be built
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| TubeFetchError::InvalidInput(format!("Invalid user agent: {}", e)))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn get(&self, endpoint: &str, query: &[(&str, &str)]) -> Result<Response> {
        let url = format!("{}{}", self.base_url, endpoint);
        log::debug!("GET {} {:?}", url, query);

        self.client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| TubeFetchError::ApiUnreachable {
                endpoint: endpoint.to_string(),
                message: if e.is_timeout() {
                    "timed out".to_string()
                } else {
                    e.to_string()
                },
            })
    }

    /// Parse a success body, keeping the endpoint in the error
    async fn parse<T>(endpoint: &str, response: Response) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let body = response.text().await.map_err(|e| {
            TubeFetchError::InvalidApiResponse(format!("{}: failed to read body: {}", endpoint, e))
        })?;

        serde_json::from_str(&body)
            .map_err(|e| TubeFetchError::InvalidApiResponse(format!("{}: {}", endpoint, e)))
    }
}

#[async_trait]
impl VideoResolver for RemoteApiResolver {
    async fn fetch_video_info(&self, url: &str) -> Result<VideoInfo> {
        validate_video_url(url)?;

        let response = self.get(INFO_ENDPOINT, &[("url", url)]).await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TubeFetchError::UpstreamStatus {
                status: status.as_u16(),
                endpoint: INFO_ENDPOINT.to_string(),
            });
        }

        Self::parse(INFO_ENDPOINT, response).await
    }

    async fn resolve_stream(
        &self,
        url: &str,
        format: VideoFormat,
        quality: VideoQuality,
    ) -> Result<StreamInfo> {
        validate_video_url(url)?;

        let no_stream = || TubeFetchError::NoMatchingStream {
            format: format.extension().to_string(),
            quality: quality.label().to_string(),
        };

        let response = self
            .get(
                STREAM_ENDPOINT,
                &[
                    ("url", url),
                    ("format", format.extension()),
                    ("quality", quality.label()),
                ],
            )
            .await?;

        match response.status() {
            StatusCode::NOT_FOUND => return Err(no_stream()),
            s if !s.is_success() => {
                return Err(TubeFetchError::UpstreamStatus {
                    status: s.as_u16(),
                    endpoint: STREAM_ENDPOINT.to_string(),
                })
            }
            _ => {}
        }

        let stream: StreamInfo = Self::parse(STREAM_ENDPOINT, response).await?;
        if stream.download_url.trim().is_empty() {
            return Err(no_stream());
        }

        log::info!(
            "Resolved {} stream ({} {}) for {}",
            format.extension(),
            stream.quality,
            stream.format,
            url
        );

        Ok(stream)
    }
}
