//! Error types for binder-core

use thiserror::Error;

use crate::names::InvalidName;

/// Result type alias using binder-core's Error
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in binder-core operations
#[derive(Error, Debug)]
pub enum Error {
    /// User-supplied name failed validation
    #[error(transparent)]
    InvalidName(#[from] InvalidName),

    /// Invalid input
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Backend could not be reached or is not configured
    #[error("Backend unavailable: {0}")]
    BackendUnavailable(String),

    /// libSQL error
    #[error("Database error: {0}")]
    Database(#[from] libsql::Error),

    /// Object storage error
    #[error("Storage error: {0}")]
    Storage(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Archive encoding error
    #[error("Archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    /// Entity vanished or never existed for this owner
    #[error("{0} not found")]
    NotFound(String),

    /// Binary payload over the local storage ceiling
    #[error("Payload of {size} bytes exceeds the {limit} byte local storage limit")]
    QuotaExceeded { size: u64, limit: u64 },

    /// Operation not supported by the active backend
    #[error("Feature unavailable: {0}")]
    FeatureUnavailable(String),
}

/// Coarse classification of [`Error`] used to pick user-facing handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Bad user input, recovered before any backend call.
    Validation,
    /// Network/storage layer failure, retryable by the user.
    BackendUnavailable,
    /// Stale reference.
    NotFound,
    /// Local binary payload over the size ceiling.
    QuotaExceeded,
    /// Operation not offered by the active backend.
    FeatureUnavailable,
}

impl Error {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidName(_) | Self::InvalidInput(_) => ErrorKind::Validation,
            Self::BackendUnavailable(_)
            | Self::Database(_)
            | Self::Storage(_)
            | Self::Io(_)
            | Self::Serialization(_)
            | Self::Archive(_) => ErrorKind::BackendUnavailable,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::QuotaExceeded { .. } => ErrorKind::QuotaExceeded,
            Self::FeatureUnavailable(_) => ErrorKind::FeatureUnavailable,
        }
    }

    /// Whether retrying the same operation later may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::BackendUnavailable)
    }
}
