// src/error.rs

//! Unified error handling for the quest tracker.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Result type alias for quest tracker operations.
pub type Result<T> = std::result::Result<T, AppError>;

/// Failure of the fetch capability for a single URL.
///
/// Recoverable: the page cache falls back to stale content when it has any.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// Request did not complete in time
    #[error("timed out fetching {url}")]
    Timeout { url: String },

    /// DNS, connection, or TLS failure
    #[error("transport error fetching {url}: {message}")]
    Transport { url: String, message: String },

    /// Server answered with HTTP status >= 400
    #[error("HTTP {status} fetching {url}")]
    Status { url: String, status: u16 },

    /// Response body could not be read as text
    #[error("unreadable body from {url}: {message}")]
    Body { url: String, message: String },
}

impl FetchError {
    /// Classify a `reqwest` error for the given URL.
    pub fn from_reqwest(url: &str, error: &reqwest::Error) -> Self {
        if error.is_timeout() {
            Self::Timeout {
                url: url.to_string(),
            }
        } else if let Some(status) = error.status() {
            Self::Status {
                url: url.to_string(),
                status: status.as_u16(),
            }
        } else if error.is_body() || error.is_decode() {
            Self::Body {
                url: url.to_string(),
                message: error.to_string(),
            }
        } else {
            Self::Transport {
                url: url.to_string(),
                message: error.to_string(),
            }
        }
    }
}

/// Unified application error type.
#[derive(Error, Debug)]
pub enum AppError {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Persistence failure on a specific file; nothing was committed
    #[error("store error at {}: {source}", path.display())]
    Store {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// TOML parsing failed
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),

    /// URL parsing failed
    #[error("URL parse error: {0}")]
    Url(#[from] url::ParseError),

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// A page fetch failed and no cached copy exists
    #[error("fetch failed: {0}")]
    Fetch(#[from] FetchError),

    /// No catalog page could be fetched or read from cache
    #[error("catalog build failed: {0}")]
    Build(String),

    /// New catalog lost too many quests compared to the previous one
    #[error(
        "catalog shrank from {previous_count} to {current_count} quests ({drop_percent:.1}% > {threshold_percent}%)"
    )]
    CatalogShrink {
        current_count: usize,
        previous_count: usize,
        drop_percent: f64,
        threshold_percent: u8,
    },

    /// Another sync run is already in flight
    #[error("a sync run is already in progress")]
    SyncInProgress,

    /// Sync run was cancelled before commit
    #[error("sync run was cancelled")]
    Cancelled,

    /// Background worker terminated abnormally
    #[error("sync worker failed: {0}")]
    Worker(String),

    /// Profile import document could not be understood
    #[error("import error: {0}")]
    Import(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Data validation error
    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Create a store error for the given path.
    pub fn store(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Store {
            path: path.into(),
            source,
        }
    }

    /// Create a catalog build error.
    pub fn build(message: impl fmt::Display) -> Self {
        Self::Build(message.to_string())
    }

    /// Create an import error.
    pub fn import(message: impl fmt::Display) -> Self {
        Self::Import(message.to_string())
    }

    /// Create a configuration error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this error aborted a sync run, leaving the previous catalog in use.
    pub fn is_sync_failure(&self) -> bool {
        matches!(
            self,
            Self::Build(_) | Self::CatalogShrink { .. } | Self::Cancelled | Self::Worker(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_error_display() {
        let err = FetchError::Status {
            url: "https://wiki.example/a".into(),
            status: 404,
        };
        assert_eq!(err.to_string(), "HTTP 404 fetching https://wiki.example/a");
    }

    #[test]
    fn test_fetch_error_converts() {
        let err: AppError = FetchError::Timeout {
            url: "https://wiki.example/a".into(),
        }
        .into();
        assert!(matches!(err, AppError::Fetch(FetchError::Timeout { .. })));
    }

    #[test]
    fn test_sync_failure_classification() {
        assert!(AppError::build("no pages").is_sync_failure());
        assert!(AppError::Cancelled.is_sync_failure());
        assert!(!AppError::validation("bad name").is_sync_failure());
    }
}
