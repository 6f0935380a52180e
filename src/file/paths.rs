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


//! File naming and path helpers
//!
//! # Layout
//! - Published files: `<output_directory>/<sanitized title>.<ext>`
//! - In-flight copies: `<temp_directory>/<record_id>.part`

use crate::error::{Result, TubeFetchError};
use crate::storage::models::VideoFormat;
use lazy_static::lazy_static;
use regex::Regex;
use std::path::{Path, PathBuf};
use url::Url;

/// Longest file stem we produce, in UTF-8 bytes
pub const MAX_FILE_STEM_BYTES: usize = 200;

/// Used when a title sanitizes down to nothing
const FALLBACK_FILE_STEM: &str = "video";

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Turn a video title into a safe file stem
///
/// Letters and digits (any script) plus space, `.`, `_` and `-` survive; every
/// other character becomes `_`. Whitespace runs collapse to one space and
/// leading/trailing dots and spaces are dropped.
pub fn sanitize_file_name(title: &str) -> String {
    let collapsed = WHITESPACE_RUN.replace_all(title, " ");

    let replaced: String = collapsed
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || matches!(c, ' ' | '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let trimmed = trim_name(&replaced);
    let truncated = truncate_component(trimmed, MAX_FILE_STEM_BYTES);
    let result = trim_name(&truncated);

    if result.is_empty() {
        FALLBACK_FILE_STEM.to_string()
    } else {
        result.to_string()
    }
}

fn trim_name(name: &str) -> &str {
    name.trim_matches(|c| c == ' ' || c == '.')
}

/// Target file name for a record: sanitized title plus the format extension
pub fn file_name_for(title: &str, format: VideoFormat) -> String {
    format!("{}.{}", sanitize_file_name(title), format.extension())
}

/// Truncate to at most `max_bytes`, never splitting a character
pub fn truncate_component(text: &str, max_bytes: usize) -> String {
    if text.len() <= max_bytes {
        return text.to_string();
    }

    let mut index = max_bytes;
    while index > 0 && !text.is_char_boundary(index) {
        index -= 1;
    }

    text[..index].to_string()
}

/// Temp file a worker streams into for one record
pub fn temp_file_path(temp_directory: &Path, record_id: &str) -> PathBuf {
    temp_directory.join(format!("{}.part", record_id))
}

/// Percent-encoded `file://` URI for an absolute path
pub fn path_to_file_uri(path: &Path) -> Result<String> {
    Url::from_file_path(path)
        .map(|u| u.to_string())
        .map_err(|_| TubeFetchError::invalid_input(format!("Not an absolute path: {}", path.display())))
}

/// Inverse of [`path_to_file_uri`]; plain paths are accepted as-is
pub fn file_uri_to_path(uri: &str) -> Result<PathBuf> {
    if !uri.starts_with("file:") {
        return Ok(PathBuf::from(uri));
    }

    let parsed = Url::parse(uri)
        .map_err(|e| TubeFetchError::invalid_input(format!("Invalid file URI {}: {}", uri, e)))?;

    parsed
        .to_file_path()
        .map_err(|_| TubeFetchError::invalid_input(format!("Not a local file URI: {}", uri)))
}
