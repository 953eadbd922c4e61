//! Document repository and the upload transaction handle.

use crate::error::MetadataResult;
use crate::models::{DocumentRow, DocumentUpdate, VersionRow};
use async_trait::async_trait;

/// Repository for document pointer records.
#[async_trait]
pub trait DocumentRepo: Send + Sync {
    /// Open a transaction for a read-modify-write of one document.
    async fn begin_document_tx(&self) -> MetadataResult<Box<dyn DocumentTx>>;

    /// Get a document by ID.
    async fn get_document(&self, id: &str) -> MetadataResult<Option<DocumentRow>>;

    /// Change a document's display name. Version history is untouched.
    ///
    /// Returns `NotFound` if the document does not exist.
    async fn rename_document(&self, id: &str, name: &str) -> MetadataResult<()>;
}

/// An open metadata transaction.
///
/// Every statement runs inside the same database transaction. Dropping the
/// handle without calling [`commit`](Self::commit) rolls back.
#[async_trait]
pub trait DocumentTx: Send {
    /// Lock the document row for the rest of the transaction and return it.
    ///
    /// Concurrent transactions locking the same ID wait here; different IDs
    /// never wait on each other. Returns `None` when no row exists yet, in
    /// which case the caller holds the right to create it.
    async fn lock_document(&mut self, id: &str) -> MetadataResult<Option<DocumentRow>>;

    /// Check whether a version record exists.
    async fn version_record_exists(&mut self, id: &str, version: i64) -> MetadataResult<bool>;

    /// Insert the first row of a document.
    ///
    /// Returns `AlreadyExists` if another writer created it first. The
    /// transaction stays usable after that error.
    async fn create_document(&mut self, document: &DocumentRow) -> MetadataResult<()>;

    /// Atomically bump the document's version and return the new number.
    async fn increment_version(&mut self, id: &str) -> MetadataResult<i64>;

    /// Insert an immutable version record.
    ///
    /// Returns `AlreadyExists` if the `(document_id, version)` pair is taken.
    /// The transaction stays usable after that error.
    async fn insert_version_record(&mut self, record: &VersionRow) -> MetadataResult<()>;

    /// Overwrite the mutable fields of the document row.
    async fn update_document_metadata(
        &mut self,
        id: &str,
        update: &DocumentUpdate,
    ) -> MetadataResult<()>;

    /// Delete version records below `keep_from` and return the removed
    /// version numbers in ascending order.
    async fn prune_versions(&mut self, id: &str, keep_from: i64) -> MetadataResult<Vec<i64>>;

    /// Commit the transaction.
    async fn commit(self: Box<Self>) -> MetadataResult<()>;

    /// Roll the transaction back explicitly.
    async fn rollback(self: Box<Self>) -> MetadataResult<()>;
}
