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


//! SQLite pool for the download table
//!
//! File databases run in WAL mode so the record feed can re-query while a
//! worker is writing progress. Auto-vacuum is incremental: clearing finished
//! downloads hands the freed pages back to the filesystem.

use crate::error::{Result, TubeFetchError};
use sqlx::{
    sqlite::{
        SqliteAutoVacuum, SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions,
        SqliteSynchronous,
    },
    ConnectOptions,
};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

const DATABASE_FILE: &str = "tubefetch.db";

#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Open (or create) the database file and apply migrations
    pub async fn new<P: AsRef<Path>>(database_path: P) -> Result<Self> {
        let path = database_path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                TubeFetchError::FileIoError(format!(
                    "Failed to create database directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .auto_vacuum(SqliteAutoVacuum::Incremental)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(30))
            .disable_statement_logging();

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(30))
            .connect_with(connect_opts)
            .await?;

        let db = Self::migrated(pool).await?;
        log::info!("Opened download database at {}", path.display());
        Ok(db)
    }

    /// Private in-memory database for tests
    pub async fn new_in_memory() -> Result<Self> {
        let connect_opts = SqliteConnectOptions::from_str("sqlite::memory:")?
            .auto_vacuum(SqliteAutoVacuum::Incremental)
            .disable_statement_logging();

        // A second connection would see a different in-memory database
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(connect_opts)
            .await?;

        Self::migrated(pool).await
    }

    async fn migrated(pool: SqlitePool) -> Result<Self> {
        crate::storage::migrations::run_migrations(&pool)
            .await
            .map_err(|e| TubeFetchError::MigrationFailed(e.to_string()))?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(self) -> Result<()> {
        self.pool.close().await;
        Ok(())
    }

    /// Return every page on the freelist to the filesystem
    pub async fn reclaim_free_pages(&self) -> Result<()> {
        sqlx::query("PRAGMA incremental_vacuum").execute(&self.pool).await?;
        Ok(())
    }

    /// Where the desktop CLI keeps its database when none is configured
    ///
    /// Android always passes `context.getDatabasePath()` explicitly.
    pub fn get_default_path() -> PathBuf {
        let var = if cfg!(target_os = "windows") { "APPDATA" } else { "HOME" };
        let base = PathBuf::from(std::env::var(var).unwrap_or_else(|_| ".".to_string()));

        let data_dir = if cfg!(target_os = "macos") {
            base.join("Library").join("Application Support")
        } else if cfg!(target_os = "windows") {
            base
        } else {
            base.join(".local").join("share")
        };

        data_dir.join("TubeFetch").join(DATABASE_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_in_memory_database_is_migrated() {
        let db = Database::new_in_memory().await.unwrap();

        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM downloads")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_file_database_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("nested").join(DATABASE_FILE);

        let db = Database::new(&db_path).await.unwrap();
        assert!(db_path.exists());

        // 2 = INCREMENTAL
        let mode: i64 = sqlx::query_scalar("PRAGMA auto_vacuum")
            .fetch_one(db.pool())
            .await
            .unwrap();
        assert_eq!(mode, 2);

        db.close().await.unwrap();
    }

    #[test]
    fn test_default_path_ends_in_app_directory() {
        let path = Database::get_default_path();
        assert!(path.ends_with(Path::new("TubeFetch").join(DATABASE_FILE)));
    }
}
