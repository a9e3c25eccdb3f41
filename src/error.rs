use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the vodchat core.
///
/// Record- and file-level variants are normally absorbed by the ingestor and
/// tallied in its summary; the rest propagate to the caller.
#[derive(Debug, Error)]
pub enum Error {
    /// A single chat line or metadata document lacked a required field.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// A whole input file could not be read or is not a JSON container.
    #[error("cannot process {}: {message}", path.display())]
    FileAccess { path: PathBuf, message: String },

    /// A search pattern is not valid regex syntax.
    #[error("invalid pattern `{pattern}`: {message}")]
    InvalidPattern { pattern: String, message: String },

    /// Aggregation was asked for a zero or negative width, or for a key
    /// range too wide to split into windows.
    #[error("invalid window: {0}")]
    InvalidWindow(String),

    /// The database could not be opened at all.
    #[error("storage unavailable at {}: {message}", path.display())]
    StorageUnavailable { path: PathBuf, message: String },

    #[error("storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("config error: {0}")]
    Config(String),
}

impl Error {
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }

    pub fn storage_unavailable(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::StorageUnavailable {
            path: path.into(),
            message: message.to_string(),
        }
    }

    pub fn file_access(path: impl Into<PathBuf>, message: impl std::fmt::Display) -> Self {
        Self::FileAccess {
            path: path.into(),
            message: message.to_string(),
        }
    }

    /// True for errors that must abort a whole ingestion run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::StorageUnavailable { .. } | Self::Storage(_))
    }
}
