//! Upload coordination: version assignment, content placement and retention.

use super::error::{VersioningError, VersioningResult};
use super::locks::DocumentLocks;
use crate::metrics;
use folio_core::{DocumentId, RetentionPolicy, sanitize_file_name, sanitize_user_id};
use folio_metadata::{
    DocumentRow, DocumentTx, DocumentUpdate, MetadataError, MetadataStore, VersionRow, now_utc,
};
use folio_storage::{ByteStream, ContentStore, StorageError};
use std::io::SeekFrom;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Instant;
use tokio::io::{AsyncRead, AsyncSeek, AsyncSeekExt};
use tracing::instrument;

/// How many times a lost first-upload race re-runs the document lock.
const MAX_CREATE_ATTEMPTS: u32 = 3;

/// Which version a download refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VersionSelector {
    /// The document's current version.
    Latest,
    /// An explicit version number (always >= 1).
    Number(i64),
}

impl FromStr for VersionSelector {
    type Err = folio_core::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.is_empty() || s.eq_ignore_ascii_case("latest") {
            return Ok(Self::Latest);
        }
        match s.parse::<i64>() {
            Ok(version) if version >= 1 => Ok(Self::Number(version)),
            _ => Err(folio_core::Error::InvalidVersion(s.to_string())),
        }
    }
}

/// A version record together with whether its content is stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionStatus {
    pub record: VersionRow,
    pub content_present: bool,
}

/// A resolved download: which version to stream and what to call it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadTarget {
    pub version: i64,
    pub file_name: String,
    pub size_bytes: i64,
}

/// Coordinates uploads across the metadata store and the content store.
///
/// Version numbers are assigned under a per-document lock inside one metadata
/// transaction. Content is written only after that transaction commits, so a
/// failed write leaves a committed version without content
/// ([`VersioningError::ContentMissing`]).
pub struct UploadCoordinator {
    metadata: Arc<dyn MetadataStore>,
    content: Arc<dyn ContentStore>,
    locks: DocumentLocks,
    retention: RetentionPolicy,
}

impl UploadCoordinator {
    /// Create a coordinator over the given stores.
    pub fn new(
        metadata: Arc<dyn MetadataStore>,
        content: Arc<dyn ContentStore>,
        retention: RetentionPolicy,
    ) -> Self {
        Self {
            metadata,
            content,
            locks: DocumentLocks::new(),
            retention,
        }
    }

    /// The in-process document lock registry.
    pub fn locks(&self) -> &DocumentLocks {
        &self.locks
    }

    /// The retention policy applied after each upload.
    pub fn retention(&self) -> RetentionPolicy {
        self.retention
    }

    /// Store a new version of `document_id` and return its version number.
    ///
    /// `reader` is rewound to its start before the content is written.
    /// `size` is the declared content length recorded in metadata.
    #[instrument(skip_all, fields(document_id = %document_id, size = size))]
    pub async fn upload<R>(
        &self,
        document_id: &DocumentId,
        file_name: &str,
        mut reader: R,
        size: u64,
        user_id: &str,
    ) -> VersioningResult<i64>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin,
    {
        let started = Instant::now();
        let result = self
            .upload_inner(document_id, file_name, &mut reader, size, user_id)
            .await;

        match &result {
            Ok(version) => {
                metrics::UPLOADS_COMMITTED.inc();
                metrics::BYTES_UPLOADED.inc_by(size);
                metrics::UPLOAD_DURATION.observe(started.elapsed().as_secs_f64());
                tracing::info!(version = *version, "Upload stored");
            }
            Err(err) => {
                metrics::record_upload_error(err.kind());
                if err.metadata_committed() {
                    metrics::CONTENT_MISSING.inc();
                }
            }
        }
        result
    }

    async fn upload_inner<R>(
        &self,
        document_id: &DocumentId,
        file_name: &str,
        reader: &mut R,
        size: u64,
        user_id: &str,
    ) -> VersioningResult<i64>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin,
    {
        let file_name = sanitize_file_name(file_name)?;
        let user_id = sanitize_user_id(user_id)?;
        let size_bytes =
            i64::try_from(size).map_err(|_| folio_core::Error::InvalidSize(size))?;

        let version = self
            .commit_metadata(document_id, &file_name, size_bytes, &user_id)
            .await?;

        self.write_content(document_id, version, &file_name, reader, size)
            .await?;
        self.discard_if_pruned(document_id, version).await;

        if self.retention.should_prune(version) {
            self.apply_retention(document_id, version).await;
        }

        Ok(version)
    }

    /// Assign the next version and commit its metadata.
    ///
    /// The document lock is held for exactly the lifetime of the transaction.
    async fn commit_metadata(
        &self,
        document_id: &DocumentId,
        file_name: &str,
        size_bytes: i64,
        user_id: &str,
    ) -> VersioningResult<i64> {
        let _guard = self.locks.acquire(document_id.as_str()).await;
        let mut tx = self.metadata.begin_document_tx().await?;

        let staged = stage_version(&mut *tx, document_id, file_name, size_bytes, user_id).await;
        match staged {
            Ok(version) => {
                tx.commit().await?;
                tracing::debug!(version, "Version metadata committed");
                Ok(version)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback().await {
                    tracing::warn!(
                        error = %rollback_err,
                        "Failed to roll back upload transaction"
                    );
                }
                Err(err)
            }
        }
    }

    async fn write_content<R>(
        &self,
        document_id: &DocumentId,
        version: i64,
        file_name: &str,
        reader: &mut R,
        size: u64,
    ) -> VersioningResult<()>
    where
        R: AsyncRead + AsyncSeek + Send + Unpin,
    {
        let missing = |source: StorageError| VersioningError::ContentMissing {
            document_id: document_id.to_string(),
            version,
            source,
        };

        reader
            .seek(SeekFrom::Start(0))
            .await
            .map_err(|e| missing(StorageError::Io(e)))?;

        match self
            .content
            .write(document_id, version, file_name, reader)
            .await
        {
            Ok(written) => {
                if written != size {
                    tracing::warn!(
                        version,
                        declared = size,
                        written,
                        "Stored content size differs from declared size"
                    );
                }
                Ok(())
            }
            Err(source) => {
                tracing::error!(
                    version,
                    error = %source,
                    "Content write failed after metadata commit; version has no content"
                );
                Err(missing(source))
            }
        }
    }

    /// Remove the blob just written if retention pruned its record meanwhile.
    ///
    /// Later uploads may prune this version while its content is still being
    /// written, in which case their blob delete ran before the blob existed.
    async fn discard_if_pruned(&self, document_id: &DocumentId, version: i64) {
        match self.metadata.get_version(document_id.as_str(), version).await {
            Ok(Some(_)) => {}
            Ok(None) => {
                tracing::warn!(
                    version,
                    "Version pruned during content write, discarding its content"
                );
                if let Err(err) = self.content.delete(document_id, version).await {
                    tracing::warn!(
                        version,
                        error = %err,
                        "Failed to delete content of pruned version"
                    );
                }
            }
            Err(err) => {
                tracing::warn!(
                    version,
                    error = %err,
                    "Failed to confirm version record after content write"
                );
            }
        }
    }

    /// Drop version records and blobs that fall outside the retention window.
    ///
    /// Failures are logged and never fail the upload.
    async fn apply_retention(&self, document_id: &DocumentId, current: i64) {
        let keep_from = self.retention.keep_from(current);

        let pruned = match self.prune_records(document_id, keep_from).await {
            Ok(pruned) => pruned,
            Err(err) => {
                tracing::warn!(keep_from, error = %err, "Failed to prune old versions");
                return;
            }
        };

        for version in &pruned {
            if let Err(err) = self.content.delete(document_id, *version).await {
                tracing::warn!(
                    version = *version,
                    error = %err,
                    "Failed to delete content of pruned version"
                );
            }
        }

        if !pruned.is_empty() {
            metrics::VERSIONS_PRUNED.inc_by(pruned.len() as u64);
            tracing::info!(keep_from, pruned = ?pruned, "Pruned old versions");
        }
    }

    async fn prune_records(
        &self,
        document_id: &DocumentId,
        keep_from: i64,
    ) -> Result<Vec<i64>, MetadataError> {
        let mut tx = self.metadata.begin_document_tx().await?;
        let pruned = tx.prune_versions(document_id.as_str(), keep_from).await?;
        tx.commit().await?;
        Ok(pruned)
    }

    /// Open the stored content of a version.
    pub async fn fetch_content(
        &self,
        document_id: &DocumentId,
        version: i64,
    ) -> VersioningResult<ByteStream> {
        check_version(version)?;
        Ok(self.content.read(document_id, version).await?)
    }

    /// Size in bytes of a version's stored content.
    pub async fn content_size(
        &self,
        document_id: &DocumentId,
        version: i64,
    ) -> VersioningResult<u64> {
        check_version(version)?;
        Ok(self.content.head(document_id, version).await?.size)
    }

    /// List version records, newest first.
    pub async fn list_versions(
        &self,
        document_id: &DocumentId,
        offset: u32,
        limit: u32,
    ) -> VersioningResult<Vec<VersionRow>> {
        self.metadata
            .list_versions(document_id.as_str(), offset, limit)
            .await
            .map_err(VersioningError::Metadata)
    }

    /// Get the record of one version.
    pub async fn get_version(
        &self,
        document_id: &DocumentId,
        version: i64,
    ) -> VersioningResult<VersionRow> {
        check_version(version)?;
        self.metadata
            .get_version(document_id.as_str(), version)
            .await
            .map_err(VersioningError::Metadata)?
            .ok_or_else(|| {
                VersioningError::NotFound(format!("version {version} of document {document_id}"))
            })
    }

    /// Get a version record and whether its content is present.
    pub async fn version_status(
        &self,
        document_id: &DocumentId,
        version: i64,
    ) -> VersioningResult<VersionStatus> {
        let record = self.get_version(document_id, version).await?;
        let content_present = self
            .content
            .exists(document_id, version)
            .await
            .map_err(VersioningError::Storage)?;
        Ok(VersionStatus {
            record,
            content_present,
        })
    }

    /// Get the current document record.
    pub async fn get_document(&self, document_id: &DocumentId) -> VersioningResult<DocumentRow> {
        self.metadata
            .get_document(document_id.as_str())
            .await
            .map_err(VersioningError::Metadata)?
            .ok_or_else(|| VersioningError::NotFound(format!("document {document_id}")))
    }

    /// Change a document's display name. Version history is untouched.
    pub async fn rename_document(
        &self,
        document_id: &DocumentId,
        name: &str,
    ) -> VersioningResult<DocumentRow> {
        let name = sanitize_file_name(name)?;
        match self.metadata.rename_document(document_id.as_str(), &name).await {
            Ok(()) => {}
            Err(MetadataError::NotFound(_)) => {
                return Err(VersioningError::NotFound(format!("document {document_id}")));
            }
            Err(err) => return Err(VersioningError::Metadata(err)),
        }
        tracing::info!(document_id = %document_id, name = %name, "Document renamed");
        self.get_document(document_id).await
    }

    /// Resolve which version and file name a download should serve.
    pub async fn resolve_download(
        &self,
        document_id: &DocumentId,
        selector: VersionSelector,
    ) -> VersioningResult<DownloadTarget> {
        match selector {
            VersionSelector::Latest => {
                let document = self.get_document(document_id).await?;
                Ok(DownloadTarget {
                    version: document.version,
                    file_name: document.name,
                    size_bytes: document.size_bytes,
                })
            }
            VersionSelector::Number(version) => {
                let record = self.get_version(document_id, version).await?;
                Ok(DownloadTarget {
                    version: record.version,
                    file_name: record.name,
                    size_bytes: record.size_bytes,
                })
            }
        }
    }
}

/// Write the document and version rows for the next version inside `tx`.
async fn stage_version(
    tx: &mut dyn DocumentTx,
    document_id: &DocumentId,
    file_name: &str,
    size_bytes: i64,
    user_id: &str,
) -> VersioningResult<i64> {
    let id = document_id.as_str();
    let now = now_utc();
    let mut create_attempts = 0;

    let (version, previous_modified) = loop {
        if let Some(existing) = tx.lock_document(id).await? {
            let version = tx.increment_version(id).await?;
            let record = version_record(id, version, file_name, size_bytes, user_id, now);
            match tx.insert_version_record(&record).await {
                Ok(()) => {}
                Err(err) if err.is_already_exists() => {
                    tracing::debug!(version, "Version record already present, keeping it");
                }
                Err(err) => return Err(err.into()),
            }
            break (version, Some(existing.modified_at));
        }

        if tx.version_record_exists(id, 1).await? {
            return Err(VersioningError::Conflict(format!(
                "residual version record for document {id}, use a different ID"
            )));
        }

        let row = DocumentRow::first_version(id, file_name, size_bytes, user_id, now);
        match tx.create_document(&row).await {
            Ok(()) => {}
            Err(err) if err.is_already_exists() => {
                create_attempts += 1;
                if create_attempts >= MAX_CREATE_ATTEMPTS {
                    return Err(VersioningError::Conflict(format!(
                        "document {id} is being created concurrently"
                    )));
                }
                tracing::debug!(attempt = create_attempts, "Lost document creation race, retrying");
                continue;
            }
            Err(err) => return Err(err.into()),
        }

        let record = version_record(id, 1, file_name, size_bytes, user_id, now);
        match tx.insert_version_record(&record).await {
            Ok(()) => {}
            Err(err) if err.is_already_exists() => {
                return Err(VersioningError::AlreadyExists(format!(
                    "version 1 of document {id}"
                )));
            }
            Err(err) => return Err(err.into()),
        }
        break (1, None);
    };

    let modified_at = previous_modified.map_or(now, |previous| previous.max(now));
    tx.update_document_metadata(
        id,
        &DocumentUpdate {
            name: file_name.to_string(),
            size_bytes,
            modified_at,
            modifier_id: user_id.to_string(),
        },
    )
    .await?;

    Ok(version)
}

fn version_record(
    id: &str,
    version: i64,
    file_name: &str,
    size_bytes: i64,
    user_id: &str,
    now: time::OffsetDateTime,
) -> VersionRow {
    VersionRow {
        document_id: id.to_string(),
        version,
        name: file_name.to_string(),
        size_bytes,
        created_at: now,
        modifier_id: user_id.to_string(),
    }
}

fn check_version(version: i64) -> VersioningResult<()> {
    if version < 1 {
        return Err(folio_core::Error::InvalidVersion(version.to_string()).into());
    }
    Ok(())
}
