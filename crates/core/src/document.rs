//! Document identifiers and input sanitising.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Externally supplied, stable identity of a document.
///
/// IDs are trimmed on construction and must be usable as a single path
/// component by storage backends.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DocumentId(String);

impl DocumentId {
    /// Create from a string, trimming surrounding whitespace and validating.
    pub fn new(id: impl AsRef<str>) -> crate::Result<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            return Err(crate::Error::InvalidDocumentId(
                "document id cannot be empty".to_string(),
            ));
        }

        let len = id.chars().count();
        if len > crate::MAX_DOCUMENT_ID_LEN {
            return Err(crate::Error::InvalidDocumentId(format!(
                "document id must be at most {} chars, got {len}",
                crate::MAX_DOCUMENT_ID_LEN
            )));
        }

        if id == "." || id.contains("..") {
            return Err(crate::Error::InvalidDocumentId(format!(
                "relative path segments not allowed: {id}"
            )));
        }

        for c in id.chars() {
            if c == '/' || c == '\\' || c.is_control() {
                return Err(crate::Error::InvalidDocumentId(format!(
                    "invalid character in document id: {c:?}"
                )));
            }
        }

        Ok(Self(id.to_string()))
    }

    /// Get the ID string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume the ID and return the inner string.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Debug for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DocumentId({self})")
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DocumentId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DocumentId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<DocumentId> for String {
    fn from(id: DocumentId) -> Self {
        id.0
    }
}

impl std::str::FromStr for DocumentId {
    type Err = crate::Error;

    fn from_str(s: &str) -> crate::Result<Self> {
        Self::new(s)
    }
}

/// Reduce a client supplied file name to a display name.
///
/// Only the final path component is kept, and names longer than
/// [`crate::MAX_FILE_NAME_LEN`] characters are truncated.
pub fn sanitize_file_name(name: &str) -> crate::Result<String> {
    let base = name
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or_default()
        .trim();

    if base.is_empty() || base == "." || base == ".." {
        return Err(crate::Error::InvalidFileName(format!(
            "file name has no usable component: {name:?}"
        )));
    }

    if base.chars().any(char::is_control) {
        return Err(crate::Error::InvalidFileName(
            "file name contains control characters".to_string(),
        ));
    }

    Ok(base.chars().take(crate::MAX_FILE_NAME_LEN).collect())
}

/// Validate the ID of the user performing an operation.
pub fn sanitize_user_id(user_id: &str) -> crate::Result<String> {
    let user_id = user_id.trim();
    if user_id.is_empty() {
        return Err(crate::Error::InvalidUserId(
            "user id cannot be empty".to_string(),
        ));
    }
    if user_id.chars().count() > crate::MAX_USER_ID_LEN {
        return Err(crate::Error::InvalidUserId(format!(
            "user id must be at most {} chars",
            crate::MAX_USER_ID_LEN
        )));
    }
    if user_id.chars().any(char::is_control) {
        return Err(crate::Error::InvalidUserId(
            "user id contains control characters".to_string(),
        ));
    }
    Ok(user_id.to_string())
}
