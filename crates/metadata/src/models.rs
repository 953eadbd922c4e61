//! Database models mapping to the metadata schema.

use sqlx::FromRow;
use time::OffsetDateTime;

// =============================================================================
// Documents
// =============================================================================

/// Current-state pointer record for one document.
///
/// Exactly one row exists per `id`. `version` always equals the highest
/// version number with a [`VersionRow`].
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct DocumentRow {
    pub id: String,
    pub name: String,
    pub version: i64,
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
    pub modified_at: OffsetDateTime,
    pub creator_id: String,
    pub modifier_id: String,
}

impl DocumentRow {
    /// Build the row for a document's first upload.
    pub fn first_version(
        id: impl Into<String>,
        name: impl Into<String>,
        size_bytes: i64,
        user_id: impl Into<String>,
        now: OffsetDateTime,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            id: id.into(),
            name: name.into(),
            version: 1,
            size_bytes,
            created_at: now,
            modified_at: now,
            creator_id: user_id.clone(),
            modifier_id: user_id,
        }
    }
}

/// Fields written to a document row when a new version lands.
#[derive(Debug, Clone)]
pub struct DocumentUpdate {
    pub name: String,
    pub size_bytes: i64,
    pub modified_at: OffsetDateTime,
    pub modifier_id: String,
}

// =============================================================================
// Version history
// =============================================================================

/// Immutable history entry for one uploaded version.
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct VersionRow {
    pub document_id: String,
    pub version: i64,
    pub name: String,
    pub size_bytes: i64,
    pub created_at: OffsetDateTime,
    pub modifier_id: String,
}
