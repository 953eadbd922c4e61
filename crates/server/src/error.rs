//! API error types.

use crate::versioning::VersioningError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// API error response.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    /// Error code for programmatic handling.
    pub code: String,
    /// Human-readable error message.
    pub message: String,
}

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("internal error: {0}")]
    Internal(String),

    #[error("{0}")]
    Versioning(#[from] VersioningError),

    #[error("metadata error: {0}")]
    Metadata(#[from] folio_metadata::MetadataError),

    #[error("core error: {0}")]
    Core(#[from] folio_core::Error),
}

impl ApiError {
    /// Get the error code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "not_found",
            Self::BadRequest(_) => "bad_request",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal_error",
            Self::Versioning(e) => match e {
                VersioningError::NotFound(_) => "not_found",
                VersioningError::Conflict(_) => "conflict",
                VersioningError::AlreadyExists(_) => "already_exists",
                VersioningError::Transaction(_) => "transaction_failed",
                VersioningError::Metadata(_) => "metadata_error",
                VersioningError::ContentMissing { .. } => "content_missing",
                VersioningError::Storage(_) => "storage_error",
                VersioningError::Invalid(_) => "bad_request",
            },
            Self::Metadata(_) => "metadata_error",
            Self::Core(_) => "bad_request",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Versioning(e) => match e {
                VersioningError::NotFound(_) => StatusCode::NOT_FOUND,
                VersioningError::Conflict(_) | VersioningError::AlreadyExists(_) => {
                    StatusCode::CONFLICT
                }
                VersioningError::Invalid(_) => StatusCode::BAD_REQUEST,
                VersioningError::Transaction(_)
                | VersioningError::Metadata(_)
                | VersioningError::ContentMissing { .. }
                | VersioningError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Metadata(e) => match e {
                folio_metadata::MetadataError::NotFound(_) => StatusCode::NOT_FOUND,
                folio_metadata::MetadataError::AlreadyExists(_) => StatusCode::CONFLICT,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::Core(_) => StatusCode::BAD_REQUEST,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(code = self.code(), error = %self, "Request failed");
        }
        let body = ErrorResponse {
            code: self.code().to_string(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;
    use folio_storage::StorageError;

    #[test]
    fn test_versioning_error_status_mapping() {
        let missing = ApiError::from(VersioningError::ContentMissing {
            document_id: "doc1".to_string(),
            version: 2,
            source: StorageError::Io(std::io::Error::other("disk full")),
        });
        assert_eq!(missing.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(missing.code(), "content_missing");

        let conflict = ApiError::from(VersioningError::Conflict("residual".to_string()));
        assert_eq!(conflict.status_code(), StatusCode::CONFLICT);

        let not_found = ApiError::from(VersioningError::NotFound("doc1".to_string()));
        assert_eq!(not_found.status_code(), StatusCode::NOT_FOUND);

        let invalid = ApiError::from(VersioningError::Invalid(
            folio_core::Error::InvalidVersion("0".to_string()),
        ));
        assert_eq!(invalid.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(invalid.code(), "bad_request");

        let read = ApiError::from(VersioningError::Metadata(
            folio_metadata::MetadataError::Internal("pool closed".to_string()),
        ));
        assert_eq!(read.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(read.code(), "metadata_error");
    }

    #[test]
    fn test_core_error_is_bad_request() {
        let err = ApiError::from(folio_core::Error::InvalidDocumentId("..".to_string()));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }
}
