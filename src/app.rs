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


//! Application assembly
//!
//! Opens the database, builds the default collaborators and hands them to a
//! [`DownloadManager`]. The Android bridge and the CLI both go through here.

use crate::api::client::RemoteApiResolver;
use crate::api::resolver::VideoResolver;
use crate::config::CoreConfig;
use crate::download::manager::DownloadManager;
use crate::download::worker::WorkerContext;
use crate::error::Result;
use crate::file::sink::{DirectoryMediaStore, FileSink};
use crate::notify::{NotificationChannel, Notifier};
use crate::storage::{Database, SqliteRecordStore};
use std::sync::Arc;

/// A running download core
pub struct TubeFetchCore {
    config: CoreConfig,
    database: Database,
    manager: DownloadManager,
}

impl TubeFetchCore {
    /// Open with the remote API resolver and a directory-backed media store
    pub async fn open(config: CoreConfig, notifier: Arc<dyn Notifier>) -> Result<Self> {
        config.validate()?;

        let resolver = Arc::new(RemoteApiResolver::new(&config.api)?);
        let sink = Arc::new(DirectoryMediaStore::new(config.download.output_directory.clone()));

        Self::assemble(config, resolver, sink, notifier).await
    }

    /// Open with caller-supplied collaborators
    pub async fn assemble(
        config: CoreConfig,
        resolver: Arc<dyn VideoResolver>,
        sink: Arc<dyn FileSink>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let database = Database::new(&config.database_path).await?;
        let store = Arc::new(SqliteRecordStore::new(database.clone()).await?);
        let channel = Arc::new(NotificationChannel::downloads());

        let ctx = WorkerContext::new(store, resolver, sink, notifier, channel, &config.download)?;
        let manager = DownloadManager::new(ctx);

        log::info!(
            "TubeFetch core ready (database {}, output {})",
            config.database_path.display(),
            config.download.output_directory.display()
        );

        Ok(Self {
            config,
            database,
            manager,
        })
    }

    pub fn manager(&self) -> &DownloadManager {
        &self.manager
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    /// Cancel running workers and close the database
    pub async fn close(self) -> Result<()> {
        self.manager.shutdown().await;
        self.database.close().await
    }
}
