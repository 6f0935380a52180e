//! Error types for TubeFetch
//!
//! This module defines error types using thiserror for ergonomic error handling.
//! Errors are grouped by domain (input, resolution, transport, storage, database)
//! so the download worker can fold any of them into a [`FailureKind`] when it
//! records a failed attempt.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using our TubeFetchError type
pub type Result<T> = std::result::Result<T, TubeFetchError>;

/// Main error type for TubeFetch
#[derive(Error, Debug)]
pub enum TubeFetchError {
    // ===== Input Errors =====

    /// A required worker or request parameter was absent or empty
    #[error("Missing required field: {0}")]
    MissingRequiredField(String),

    /// Caller supplied a value that cannot be used
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    // ===== Resolution Errors =====

    /// Source URL is not a recognizable video URL
    #[error("Invalid video URL: {0}")]
    InvalidVideoUrl(String),

    /// Remote API answered with a non-success status
    #[error("API request to {endpoint} failed with status {status}")]
    UpstreamStatus {
        status: u16,
        endpoint: String,
    },

    /// Remote API could not be reached or did not answer in time
    #[error("API request to {endpoint} failed: {message}")]
    ApiUnreachable {
        endpoint: String,
        message: String,
    },

    /// Remote API has no stream for the requested format/quality
    #[error("No {format} stream available at quality {quality}")]
    NoMatchingStream {
        format: String,
        quality: String,
    },

    /// Remote API returned a body we could not interpret
    #[error("Invalid API response: {0}")]
    InvalidApiResponse(String),

    // ===== Transport Errors =====

    /// Media server answered the byte request with a non-success status
    #[error("Server responded with HTTP {status}")]
    HttpStatus {
        status: u16,
    },

    /// Media server answered successfully but sent no bytes
    #[error("Server returned an empty response body")]
    EmptyResponseBody,

    /// Connect or read timeout expired
    #[error("Operation timed out after {0} seconds")]
    Timeout(u64),

    /// Connection-level failure
    #[error("Network error: {0}")]
    NetworkError(String),

    // ===== File/Storage Errors =====

    /// File or directory not found
    #[error("File not found: {0}")]
    FileNotFound(String),

    /// Generic file I/O error with context
    #[error("File I/O error: {0}")]
    FileIoError(String),

    /// Publishing into the media store failed
    #[error("Media store error: {0}")]
    MediaStoreError(String),

    // ===== Database Errors =====

    /// Database schema migration failed
    #[error("Database migration failed: {0}")]
    MigrationFailed(String),

    /// Database record not found
    #[error("Record not found: {0}")]
    RecordNotFound(String),

    /// Operation not allowed in the record's current state
    #[error("Invalid state: {0}")]
    InvalidState(String),

    // ===== Configuration Errors =====

    /// Configuration value rejected by validation
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    // ===== External Library Errors =====

    /// HTTP client error from reqwest
    #[error("HTTP client error: {0}")]
    ReqwestError(#[from] reqwest::Error),

    /// JSON serialization/deserialization error
    #[error("JSON serialization error: {0}")]
    SerdeJsonError(#[from] serde_json::Error),

    /// Database driver error from sqlx
    #[error("Database error: {0}")]
    SqlxError(#[from] sqlx::Error),

    /// Standard I/O error
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Why a download attempt ended in FAILED
///
/// This is what the worker reports back to its scheduler and what the
/// platform layer shows next to the FAILED badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FailureKind {
    /// A required input was missing; never retried
    MissingInput { field: String },
    /// Stream lookup failed upstream
    Resolution { message: String },
    /// Transport failure; `status` is set when the server answered
    Http { status: Option<u16>, message: String },
    /// Local filesystem, media store or database failure
    Io { message: String },
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailureKind::MissingInput { field } => write!(f, "missing input: {}", field),
            FailureKind::Resolution { message } => write!(f, "resolution failed: {}", message),
            FailureKind::Http { status: Some(status), message } => {
                write!(f, "HTTP {}: {}", status, message)
            }
            FailureKind::Http { status: None, message } => write!(f, "transport failed: {}", message),
            FailureKind::Io { message } => write!(f, "I/O failed: {}", message),
        }
    }
}

// Helper methods for creating common errors
impl TubeFetchError {
    /// Create a RecordNotFound error with a resource name
    pub fn not_found<S: Into<String>>(resource: S) -> Self {
        TubeFetchError::RecordNotFound(resource.into())
    }

    /// Create an InvalidInput error with a message
    pub fn invalid_input<S: Into<String>>(message: S) -> Self {
        TubeFetchError::InvalidInput(message.into())
    }

    /// Create a MissingRequiredField error for a field name
    pub fn missing<S: Into<String>>(field: S) -> Self {
        TubeFetchError::MissingRequiredField(field.into())
    }

    /// Check if error came from stream or metadata lookup
    pub fn is_resolution_error(&self) -> bool {
        matches!(
            self,
            TubeFetchError::InvalidVideoUrl(_)
                | TubeFetchError::UpstreamStatus { .. }
                | TubeFetchError::ApiUnreachable { .. }
                | TubeFetchError::NoMatchingStream { .. }
                | TubeFetchError::InvalidApiResponse(_)
        )
    }

    /// Check if error came from the byte transfer
    pub fn is_transport_error(&self) -> bool {
        matches!(
            self,
            TubeFetchError::HttpStatus { .. }
                | TubeFetchError::EmptyResponseBody
                | TubeFetchError::Timeout(_)
                | TubeFetchError::NetworkError(_)
                | TubeFetchError::ReqwestError(_)
        )
    }

    /// Check if error is related to file/disk operations
    pub fn is_storage_error(&self) -> bool {
        matches!(
            self,
            TubeFetchError::FileNotFound(_)
                | TubeFetchError::FileIoError(_)
                | TubeFetchError::MediaStoreError(_)
                | TubeFetchError::IoError(_)
        )
    }

    /// Fold this error into the worker failure taxonomy
    pub fn failure_kind(&self) -> FailureKind {
        match self {
            TubeFetchError::MissingRequiredField(field) => FailureKind::MissingInput {
                field: field.clone(),
            },
            TubeFetchError::HttpStatus { status } => FailureKind::Http {
                status: Some(*status),
                message: self.to_string(),
            },
            TubeFetchError::ReqwestError(e) => FailureKind::Http {
                status: e.status().map(|s| s.as_u16()),
                message: e.to_string(),
            },
            e if e.is_resolution_error() => FailureKind::Resolution {
                message: e.to_string(),
            },
            e if e.is_transport_error() => FailureKind::Http {
                status: None,
                message: e.to_string(),
            },
            e => FailureKind::Io {
                message: e.to_string(),
            },
        }
    }

    /// Get user-friendly error message suitable for display
    pub fn user_message(&self) -> String {
        match self {
            TubeFetchError::InvalidVideoUrl(_) => {
                "That link doesn't look like a YouTube video.".to_string()
            }
            TubeFetchError::NoMatchingStream { format, quality } => {
                format!(
                    "This video isn't available as {} at {}. Try another quality or format.",
                    format.to_uppercase(),
                    quality
                )
            }
            TubeFetchError::UpstreamStatus { status, .. } => {
                format!("The download service is unavailable right now (error {}).", status)
            }
            TubeFetchError::ApiUnreachable { .. } => {
                "The download service could not be reached. Check your network and retry.".to_string()
            }
            TubeFetchError::HttpStatus { status } => {
                format!("The video server refused the download (HTTP {}).", status)
            }
            TubeFetchError::EmptyResponseBody => {
                "The video server sent an empty file. Please try again.".to_string()
            }
            TubeFetchError::Timeout(_) => {
                "The connection timed out. Check your network and retry.".to_string()
            }
            _ => self.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_maps_to_missing_input() {
        let err = TubeFetchError::missing("url");
        assert_eq!(
            err.failure_kind(),
            FailureKind::MissingInput { field: "url".to_string() }
        );
    }

    #[test]
    fn test_http_status_keeps_code() {
        let err = TubeFetchError::HttpStatus { status: 403 };
        match err.failure_kind() {
            FailureKind::Http { status, .. } => assert_eq!(status, Some(403)),
            other => panic!("unexpected kind: {:?}", other),
        }
        assert!(err.is_transport_error());
    }

    #[test]
    fn test_resolution_errors() {
        let err = TubeFetchError::NoMatchingStream {
            format: "mp3".to_string(),
            quality: "auto".to_string(),
        };
        assert!(err.is_resolution_error());
        assert!(matches!(err.failure_kind(), FailureKind::Resolution { .. }));
        assert!(err.user_message().contains("MP3"));
    }

    #[test]
    fn test_storage_errors_map_to_io() {
        let err = TubeFetchError::MediaStoreError("disk full".to_string());
        assert!(err.is_storage_error());
        assert_eq!(
            err.failure_kind(),
            FailureKind::Io { message: "Media store error: disk full".to_string() }
        );
    }

    #[test]
    fn test_failure_kind_serializes_tagged() {
        let kind = FailureKind::Http { status: Some(404), message: "gone".to_string() };
        let json = serde_json::to_string(&kind).unwrap();
        assert!(json.contains("\"kind\":\"http\""));
        assert!(json.contains("404"));
    }
}
