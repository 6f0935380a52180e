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


//! Database storage and models
//!
//! This module persists download records in SQLite using sqlx.
//!
//! # Database Schema
//! - downloads: one row per download request, keyed by an opaque string id
//! - _migrations: applied schema migrations
//!
//! # Usage Example
//! ```no_run
//! use tubefetch_core::storage::{Database, DownloadRecordStore, SqliteRecordStore};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let db = Database::new("./tubefetch.db").await?;
//! let store = SqliteRecordStore::new(db).await?;
//!
//! for record in store.list_all().await? {
//!     println!("{}: {:?} {:.0}%", record.title, record.status, record.progress_percentage());
//! }
//! # Ok(())
//! # }
//! ```

pub mod database;
pub mod migrations;
pub mod models;
pub mod store;

// Re-export commonly used types
pub use database::Database;
pub use models::{DownloadRecord, DownloadStatus, NewDownload, VideoFormat, VideoQuality};
pub use store::{DownloadRecordStore, SqliteRecordStore};
