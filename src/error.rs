//! Centralized error types for mailgist.

use std::path::PathBuf;
use thiserror::Error;

use crate::backend::BackendError;

/// All errors produced by the mailgist pipeline.
#[derive(Error, Debug)]
pub enum Error {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The specified file does not exist.
    #[error("File not found: {0}")]
    FileNotFound(PathBuf),

    /// The raw bytes could not be parsed as a MIME message at all.
    #[error("Malformed email document: {0}")]
    MalformedDocument(String),

    /// The backend never produced a valid category score within the attempt budget.
    #[error("Could not classify the email after {attempts} attempt(s)")]
    ClassificationUnavailable { attempts: u32 },

    /// The generation backend failed at the transport level.
    #[error("Generation backend error: {0}")]
    Backend(#[from] BackendError),
}

/// Convenience alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Whether the caller sent something we could not work with, as opposed
    /// to an infrastructure failure.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::MalformedDocument(_) | Self::ClassificationUnavailable { .. }
        )
    }
}
