//! Error types for the document intelligence workspace.
//!
//! Library crates use [`DocIntelError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics, and the API
//! crate maps it onto HTTP status codes.

use std::path::PathBuf;

/// Top-level error type for all document intelligence operations.
#[derive(Debug, thiserror::Error)]
pub enum DocIntelError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error while downloading a source document.
    #[error("network error: {0}")]
    Network(String),

    /// Catalog or metadata parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Database or storage layer error.
    #[error("storage error: {0}")]
    Storage(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (unknown document type, inconsistent catalog, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },

    /// Missing or rejected API credentials.
    #[error("authentication error: {0}")]
    Auth(String),
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DocIntelError>;

impl DocIntelError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DocIntelError::config("missing workspace root");
        assert_eq!(err.to_string(), "config error: missing workspace root");

        let err = DocIntelError::validation("unknown document type 'memo'");
        assert!(err.to_string().contains("'memo'"));

        let err = DocIntelError::Auth("missing bearer token".into());
        assert_eq!(err.to_string(), "authentication error: missing bearer token");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = DocIntelError::io(
            "/data/raw",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert!(err.to_string().contains("/data/raw"));
    }
}
