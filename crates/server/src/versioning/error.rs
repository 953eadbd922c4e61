//! Upload coordination errors.

use folio_metadata::MetadataError;
use folio_storage::StorageError;
use thiserror::Error;

/// Errors returned by the [`UploadCoordinator`](super::UploadCoordinator).
#[derive(Debug, Error)]
pub enum VersioningError {
    #[error("not found: {0}")]
    NotFound(String),

    /// A residual or duplicate record prevents the upload.
    #[error("conflict: {0}")]
    Conflict(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    /// Lock, query, commit or rollback failure. Nothing was committed.
    #[error("metadata transaction failed: {0}")]
    Transaction(#[from] MetadataError),

    /// A read outside the upload transaction failed.
    #[error("metadata read failed: {0}")]
    Metadata(MetadataError),

    /// Metadata for `version` is committed but its content was not stored.
    #[error("content missing for {document_id} version {version}: {source}")]
    ContentMissing {
        document_id: String,
        version: i64,
        #[source]
        source: StorageError,
    },

    /// Reading stored content failed.
    #[error("storage error: {0}")]
    Storage(StorageError),

    #[error("invalid input: {0}")]
    Invalid(#[from] folio_core::Error),
}

impl VersioningError {
    /// Whether metadata was committed before this error occurred.
    ///
    /// Only [`ContentMissing`](Self::ContentMissing) leaves a committed
    /// version behind; every other error means the upload changed nothing.
    pub fn metadata_committed(&self) -> bool {
        matches!(self, Self::ContentMissing { .. })
    }

    /// The committed version left without content, if any.
    pub fn committed_version(&self) -> Option<i64> {
        match self {
            Self::ContentMissing { version, .. } => Some(*version),
            _ => None,
        }
    }

    /// Short label used for metrics and logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::AlreadyExists(_) => "already_exists",
            Self::Transaction(_) => "transaction",
            Self::Metadata(_) => "metadata",
            Self::ContentMissing { .. } => "content_missing",
            Self::Storage(_) => "storage",
            Self::Invalid(_) => "invalid",
        }
    }
}

impl From<StorageError> for VersioningError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(what) => Self::NotFound(what),
            other => Self::Storage(other),
        }
    }
}

/// Result type for coordinator operations.
pub type VersioningResult<T> = std::result::Result<T, VersioningError>;
