uniffi::setup_scaffolding!();

pub mod api;
pub mod app;
pub mod config;
pub mod download;
pub mod error;
pub mod file;
pub mod notify;
pub mod storage;

// JNI bridge for Android
#[cfg(target_os = "android")]
mod jni_bridge;

pub use crate::config::CoreConfig;
pub use crate::app::TubeFetchCore;
pub use crate::download::{DownloadManager, WorkerOutcome};
pub use crate::error::{FailureKind, Result, TubeFetchError};
pub use crate::storage::{DownloadRecord, DownloadStatus, NewDownload, VideoFormat, VideoQuality};

use std::sync::Once;

static INIT_LOGGING: Once = Once::new();

/// Install the env_logger backend once
///
/// Defaults to `info`; `RUST_LOG` overrides it.
pub fn init_logging() {
    INIT_LOGGING.call_once(|| {
        use std::io::Write;

        let mut builder = env_logger::Builder::new();
        builder
            .filter_level(log::LevelFilter::Info)
            .format(|buf, record| {
                writeln!(
                    buf,
                    "{} [{}] {}: {}",
                    chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
                    record.level(),
                    record.target(),
                    record.args()
                )
            })
            .parse_env("RUST_LOG");
        // Another logger may already be installed by the host
        let _ = builder.try_init();
    });
}

/// Human-readable byte count ("2.0 KB")
#[uniffi::export]
pub fn format_file_size(bytes: u64) -> String {
    crate::download::progress::format_file_size(bytes)
}

/// Safe file stem for a video title
#[uniffi::export]
pub fn sanitize_file_name(title: String) -> String {
    crate::file::paths::sanitize_file_name(&title)
}
