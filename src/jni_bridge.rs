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


//! JNI bridge for Android - Exposes the download core to the Kotlin app
//!
//! # Architecture
//! Kotlin (NativeCore) → JNI → Rust
//!
//! # Design Patterns
//! 1. **JSON Communication**: All complex data is serialized to JSON for FFI crossing
//! 2. **Error Handling**: All errors are caught and returned as JSON error responses
//! 3. **Async Runtime**: Tokio runtime is used to execute async Rust functions
//! 4. **No Panics**: All panics are caught to prevent crashes across FFI boundary
//!
//! Notifications are not posted from Rust. Each core collects them on a
//! [`NotificationBoard`] and the app drains it with `nativeDrainNotifications`
//! and forwards the updates to `NotificationManager`.
//!
//! # Response Format
//! All functions return JSON strings with this structure:
//! ```json
//! {
//!   "success": true,
//!   "data": { ... }
//! }
//! ```
//! Or on error:
//! ```json
//! {
//!   "success": false,
//!   "error": "Error message",
//!   "failure": { "kind": "http", "status": 404, "message": "..." }
//! }
//! ```

use jni::objects::{JClass, JString};
use jni::sys::jstring;
use jni::JNIEnv;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex};

use crate::config::CoreConfig;
use crate::app::TubeFetchCore;
use crate::error::{Result, TubeFetchError};
use crate::notify::NotificationBoard;
use crate::storage::NewDownload;

struct CoreHandle {
    core: TubeFetchCore,
    board: Arc<NotificationBoard>,
}

lazy_static::lazy_static! {
    static ref RUNTIME: std::result::Result<tokio::runtime::Runtime, String> =
        tokio::runtime::Runtime::new().map_err(|e| format!("Failed to create Tokio runtime: {}", e));

    // Global core cache (db_path -> core instance)
    static ref CORES: Mutex<HashMap<String, Arc<CoreHandle>>> = Mutex::new(HashMap::new());
}

fn runtime() -> Result<&'static tokio::runtime::Runtime> {
    RUNTIME
        .as_ref()
        .map_err(|e| TubeFetchError::InvalidConfiguration(e.clone()))
}

fn cached_core(db_path: &str) -> Option<Arc<CoreHandle>> {
    CORES
        .lock()
        .unwrap_or_else(|e| e.into_inner())
        .get(db_path)
        .cloned()
}

/// Get the core opened by `nativeInitCore` for this database
fn get_core(db_path: &str) -> Result<Arc<CoreHandle>> {
    cached_core(db_path).ok_or_else(|| {
        TubeFetchError::InvalidState(format!("Core not initialized for {}", db_path))
    })
}

/// Open a core for `config`, or return the one already open for its database
async fn get_or_create_core(config: CoreConfig) -> Result<Arc<CoreHandle>> {
    let key = config.database_path.to_string_lossy().to_string();

    if let Some(handle) = cached_core(&key) {
        return Ok(handle);
    }

    let board = Arc::new(NotificationBoard::new());
    let core = TubeFetchCore::open(config, board.clone()).await?;
    let resumed = core.manager().resume_interrupted().await?;
    log::info!("Opened core for {} ({} downloads restarted)", key, resumed);

    let handle = Arc::new(CoreHandle { core, board });
    let mut cores = CORES.lock().unwrap_or_else(|e| e.into_inner());
    Ok(cores.entry(key).or_insert(handle).clone())
}

// ============================================================================
// HELPER FUNCTIONS
// ============================================================================

/// Convert JString to Rust String
fn jstring_to_string(env: &mut JNIEnv, jstr: JString) -> Result<String> {
    env.get_string(&jstr)
        .map(|s| s.into())
        .map_err(|e| TubeFetchError::InvalidInput(format!("JNI string conversion failed: {}", e)))
}

/// Create success response JSON
fn success_response<T: Serialize>(data: T) -> String {
    serde_json::json!({
        "success": true,
        "data": data
    })
    .to_string()
}

/// Create error response JSON
fn error_response(error: &TubeFetchError) -> String {
    serde_json::json!({
        "success": false,
        "error": error.user_message(),
        "failure": error.failure_kind()
    })
    .to_string()
}

fn panic_response(message: &str) -> String {
    serde_json::json!({
        "success": false,
        "error": message
    })
    .to_string()
}

/// Wrap a function call with panic catching
fn catch_panic<F>(f: F) -> String
where
    F: FnOnce() -> String,
{
    match panic::catch_unwind(AssertUnwindSafe(f)) {
        Ok(result) => result,
        Err(panic_err) => {
            let panic_msg = if let Some(s) = panic_err.downcast_ref::<String>() {
                s.clone()
            } else if let Some(s) = panic_err.downcast_ref::<&str>() {
                s.to_string()
            } else {
                "Unknown panic occurred".to_string()
            };
            panic_response(&format!("Rust panic: {}", panic_msg))
        }
    }
}

/// Decode the JSON params, run `f` and encode its result as a response
fn handle_json<P, T, F>(env: &mut JNIEnv, params_json: JString, f: F) -> jstring
where
    P: DeserializeOwned,
    T: Serialize,
    F: FnOnce(P) -> Result<T>,
{
    let params_str_result = jstring_to_string(env, params_json);

    let response = catch_panic(move || {
        let result = params_str_result.and_then(|params_str| {
            let params: P = serde_json::from_str(&params_str)
                .map_err(|e| TubeFetchError::InvalidInput(format!("Invalid JSON: {}", e)))?;
            f(params)
        });

        match result {
            Ok(data) => success_response(data),
            Err(e) => {
                log::warn!("Native call failed: {}", e);
                error_response(&e)
            }
        }
    });

    match env.new_string(response) {
        Ok(s) => s.into_raw(),
        Err(e) => {
            log::error!("Failed to create Java string: {}", e);
            std::ptr::null_mut()
        }
    }
}

#[derive(Deserialize)]
struct RecordParams {
    db_path: String,
    id: String,
}

#[derive(Deserialize)]
struct CoreParams {
    db_path: String,
}

// ============================================================================
// CORE LIFECYCLE
// ============================================================================

/// Open the core for a configuration and restart interrupted downloads
///
/// # Arguments (JSON string)
/// A `CoreConfig` object; omitted fields take their defaults.
/// ```json
/// {
///   "database_path": "/data/data/com.tubefetch.app/files/tubefetch.db",
///   "download": { "output_directory": "/storage/emulated/0/Download/TubeFetch" }
/// }
/// ```
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "db_path": "...", "active": 0 } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeInitCore(
    mut env: JNIEnv,
    _class: JClass,
    config_json: JString,
) -> jstring {
    crate::init_logging();

    handle_json(&mut env, config_json, |config: CoreConfig| {
        config.validate()?;
        runtime()?.block_on(async {
            let handle = get_or_create_core(config).await?;
            Ok(serde_json::json!({
                "db_path": handle.core.config().database_path,
                "active": handle.core.manager().active_count().await,
            }))
        })
    })
}

// ============================================================================
// VIDEO INFO
// ============================================================================

/// Fetch metadata for a video URL
///
/// # Arguments (JSON string)
/// ```json
/// { "db_path": "...", "url": "https://www.youtube.com/watch?v=dQw4w9WgXcQ" }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeFetchVideoInfo(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    #[derive(Deserialize)]
    struct Params {
        db_path: String,
        url: String,
    }

    handle_json(&mut env, params_json, |params: Params| {
        let handle = get_core(&params.db_path)?;
        runtime()?.block_on(handle.core.manager().fetch_video_info(&params.url))
    })
}

// ============================================================================
// DOWNLOADS
// ============================================================================

/// Create a download record and start it
///
/// # Arguments (JSON string)
/// ```json
/// {
///   "db_path": "...",
///   "source_url": "https://youtu.be/dQw4w9WgXcQ",
///   "title": "Video title",
///   "quality": "720p",
///   "format": "mp4",
///   "thumbnail_url": "https://...",
///   "duration": "3:32"
/// }
/// ```
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "id": "uuid-string" } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeEnqueueDownload(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    #[derive(Deserialize)]
    struct Params {
        db_path: String,
        #[serde(flatten)]
        request: NewDownload,
    }

    handle_json(&mut env, params_json, |params: Params| {
        let handle = get_core(&params.db_path)?;
        let request = params.request;

        let id = runtime()?.block_on(handle.core.manager().enqueue(request))?;
        Ok(serde_json::json!({ "id": id }))
    })
}

/// Get one download record
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeGetDownload(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: RecordParams| {
        let handle = get_core(&params.db_path)?;
        runtime()?
            .block_on(handle.core.manager().get(&params.id))?
            .ok_or_else(|| TubeFetchError::not_found(format!("Download not found: {}", params.id)))
    })
}

/// List all download records, newest first
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "downloads": [...] } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeListDownloads(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: CoreParams| {
        let handle = get_core(&params.db_path)?;
        let downloads = runtime()?.block_on(handle.core.manager().list())?;
        Ok(serde_json::json!({ "downloads": downloads }))
    })
}

/// Pause a download
///
/// # Arguments (JSON string)
/// ```json
/// { "db_path": "...", "id": "uuid-string" }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativePauseDownload(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: RecordParams| {
        let handle = get_core(&params.db_path)?;
        runtime()?.block_on(handle.core.manager().pause(&params.id))?;
        Ok(serde_json::json!({ "id": params.id }))
    })
}

/// Retry a failed or paused download from the beginning
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeRetryDownload(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: RecordParams| {
        let handle = get_core(&params.db_path)?;
        runtime()?.block_on(handle.core.manager().retry(&params.id))?;
        Ok(serde_json::json!({ "id": params.id }))
    })
}

/// Delete a download record and its file
///
/// # Returns (JSON)
/// ```json
/// { "success": true, "data": { "deleted": true } }
/// ```
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeDeleteDownload(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: RecordParams| {
        let handle = get_core(&params.db_path)?;
        let deleted = runtime()?.block_on(handle.core.manager().delete(&params.id))?;
        Ok(serde_json::json!({ "deleted": deleted }))
    })
}

/// Remove completed records from history (files are kept)
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeClearCompleted(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: CoreParams| {
        let handle = get_core(&params.db_path)?;
        let cleared = runtime()?.block_on(handle.core.manager().clear_completed())?;
        Ok(serde_json::json!({ "cleared": cleared }))
    })
}

// ============================================================================
// NOTIFICATIONS
// ============================================================================

/// Take pending notification updates
///
/// # Returns (JSON)
/// ```json
/// {
///   "success": true,
///   "data": {
///     "updates": [
///       {
///         "notification_id": 1234,
///         "channel_id": "tubefetch_downloads",
///         "notification": { "type": "ongoing", "title": "...", "progress": 0.5 }
///       }
///     ]
///   }
/// }
/// ```
/// A null `notification` means cancel that id.
#[no_mangle]
pub extern "C" fn Java_com_tubefetch_app_core_NativeCore_nativeDrainNotifications(
    mut env: JNIEnv,
    _class: JClass,
    params_json: JString,
) -> jstring {
    handle_json(&mut env, params_json, |params: CoreParams| {
        let handle = get_core(&params.db_path)?;
        Ok(serde_json::json!({ "updates": handle.board.drain() }))
    })
}
