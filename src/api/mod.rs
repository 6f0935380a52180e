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


//! Remote extraction API
//!
//! Looks up video metadata and resolves direct media URLs for a requested
//! format and quality. The media bytes themselves are fetched by the
//! download worker.

pub mod client;
pub mod resolver;

// Re-export commonly used types
pub use client::RemoteApiResolver;
pub use resolver::{
    format_duration, format_view_count, validate_video_url, StreamInfo, VideoInfo, VideoResolver,
};
