//! Version history repository.

use crate::error::MetadataResult;
use crate::models::VersionRow;
use async_trait::async_trait;

/// Read access to version history.
#[async_trait]
pub trait VersionRepo: Send + Sync {
    /// List a document's versions, newest first.
    async fn list_versions(
        &self,
        document_id: &str,
        offset: u32,
        limit: u32,
    ) -> MetadataResult<Vec<VersionRow>>;

    /// Get one version record.
    async fn get_version(&self, document_id: &str, version: i64)
    -> MetadataResult<Option<VersionRow>>;
}
