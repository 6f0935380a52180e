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


//! Download orchestration
//!
//! One worker task per download request streams the resolved media URL to a
//! temp file, reports progress through the record store and notifications,
//! and publishes the result. The manager creates records and controls workers.

pub mod manager;
pub mod progress;
pub mod worker;

// Re-export commonly used types
pub use manager::DownloadManager;
pub use progress::{format_file_size, speed_string};
pub use worker::{DownloadWorker, WorkRequest, WorkerContext, WorkerInput, WorkerOutcome};
