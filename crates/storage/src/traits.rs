//! Storage trait definitions.

use crate::error::StorageResult;
use async_trait::async_trait;
use bytes::Bytes;
use folio_core::DocumentId;
use futures::Stream;
use std::pin::Pin;
use tokio::io::AsyncRead;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = StorageResult<Bytes>> + Send>>;

/// Source of bytes for a content write.
pub type ContentReader<'a> = &'a mut (dyn AsyncRead + Send + Unpin);

/// Metadata about one stored version's content.
#[derive(Clone, Debug)]
pub struct ContentMeta {
    /// Content size in bytes.
    pub size: u64,
    /// Last modification time (if available).
    pub last_modified: Option<std::time::SystemTime>,
}

/// Durable byte storage keyed by `(document, version)`.
///
/// Implementations own their key layout; callers only ever address content
/// by document ID and version number.
#[async_trait]
pub trait ContentStore: Send + Sync + 'static {
    /// Stream `reader` into storage for the given version.
    ///
    /// Existing content for the same key is replaced. Readers never observe a
    /// partially written blob. Returns the number of bytes stored.
    async fn write(
        &self,
        document_id: &DocumentId,
        version: i64,
        file_name: &str,
        reader: ContentReader<'_>,
    ) -> StorageResult<u64>;

    /// Open the content of a version as a byte stream starting at offset 0.
    ///
    /// Returns [`StorageError::NotFound`](crate::StorageError::NotFound) when
    /// no content exists for the version.
    async fn read(&self, document_id: &DocumentId, version: i64) -> StorageResult<ByteStream>;

    /// Get the size of a version's content without reading it.
    async fn head(&self, document_id: &DocumentId, version: i64) -> StorageResult<ContentMeta>;

    /// Remove a version's content. Removing absent content succeeds.
    async fn delete(&self, document_id: &DocumentId, version: i64) -> StorageResult<()>;

    /// Check whether content exists for a version.
    async fn exists(&self, document_id: &DocumentId, version: i64) -> StorageResult<bool>;

    /// Static identifier of the backend type, used for logging.
    fn backend_name(&self) -> &'static str;

    /// Verify the backend is reachable and writable.
    ///
    /// Called at server startup. The default implementation does nothing.
    async fn health_check(&self) -> StorageResult<()> {
        Ok(())
    }
}
