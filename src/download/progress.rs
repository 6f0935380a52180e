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


//! Transfer progress and display formatting
//!
//! # Progress Information
//! - Bytes copied / content length (when the server sent one)
//! - Current speed with a sliding-window average
//! - Human-readable sizes for the record's `file_size` and `download_speed`

use std::collections::VecDeque;
use std::time::{Duration, Instant};

const KB: f64 = 1024.0;
const MB: f64 = KB * 1024.0;
const GB: f64 = MB * 1024.0;

/// Format a byte count for display ("500 B", "2.0 KB", "5.0 MB", "2.0 GB")
pub fn format_file_size(bytes: u64) -> String {
    let size = bytes as f64;
    if size >= GB {
        format!("{:.1} GB", size / GB)
    } else if size >= MB {
        format!("{:.1} MB", size / MB)
    } else if size >= KB {
        format!("{:.1} KB", size / KB)
    } else {
        format!("{} B", bytes)
    }
}

/// Format a rate in bytes per second ("1.5 MB/s")
pub fn speed_string(bytes_per_second: f64) -> String {
    format!("{}/s", format_file_size(bytes_per_second.max(0.0) as u64))
}

/// Byte counter for one transfer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferProgress {
    pub bytes_copied: u64,
    /// None when the server sent no usable Content-Length
    pub content_length: Option<u64>,
}

impl TransferProgress {
    pub fn new(content_length: Option<u64>) -> Self {
        Self {
            bytes_copied: 0,
            content_length,
        }
    }

    pub fn add(&mut self, bytes: usize) {
        self.bytes_copied += bytes as u64;
    }

    /// `bytes_copied / content_length`, clamped to 1.0; None while unknown
    pub fn fraction(&self) -> Option<f64> {
        match self.content_length {
            Some(total) if total > 0 => Some((self.bytes_copied as f64 / total as f64).min(1.0)),
            _ => None,
        }
    }
}

/// Speed tracker with moving average
///
/// Uses a sliding window to smooth out network fluctuations. Before two
/// samples exist in the window the overall average since start is used.
#[derive(Debug)]
pub struct SpeedTracker {
    samples: VecDeque<SpeedSample>,
    window_duration: Duration,
    start_time: Instant,
}

#[derive(Debug, Clone)]
struct SpeedSample {
    timestamp: Instant,
    /// Total bytes at this point in time
    position: u64,
}

impl SpeedTracker {
    /// Create new speed tracker with default 5-second window
    pub fn new() -> Self {
        Self::with_window(Duration::from_secs(5))
    }

    pub fn with_window(window_duration: Duration) -> Self {
        Self {
            samples: VecDeque::new(),
            window_duration,
            start_time: Instant::now(),
        }
    }

    /// Add a position sample (total bytes copied so far)
    pub fn add_position(&mut self, position: u64) {
        let now = Instant::now();

        self.samples.push_back(SpeedSample {
            timestamp: now,
            position,
        });

        while let Some(sample) = self.samples.front() {
            if now.duration_since(sample.timestamp) > self.window_duration {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    /// Current average speed in bytes per second
    pub fn average_speed(&self) -> f64 {
        let (first, last) = match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => (first, last),
            _ => return 0.0,
        };

        let time_delta = last.timestamp.duration_since(first.timestamp).as_secs_f64();
        if self.samples.len() >= 2 && time_delta > 0.0 {
            return last.position.saturating_sub(first.position) as f64 / time_delta;
        }

        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            last.position as f64 / elapsed
        } else {
            0.0
        }
    }
}

impl Default for SpeedTracker {
    fn default() -> Self {
        Self::new()
    }
}
