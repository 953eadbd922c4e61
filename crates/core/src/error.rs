//! Error types for the core domain.

use thiserror::Error;

/// Core domain error type.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid document id: {0}")]
    InvalidDocumentId(String),

    #[error("invalid file name: {0}")]
    InvalidFileName(String),

    #[error("invalid user id: {0}")]
    InvalidUserId(String),

    #[error("invalid version: {0}")]
    InvalidVersion(String),

    #[error("invalid content size: {0}")]
    InvalidSize(u64),
}

/// Result type alias for core operations.
pub type Result<T> = std::result::Result<T, Error>;
