//! Local filesystem content backend.

use crate::error::{StorageError, StorageResult};
use crate::traits::{ByteStream, ContentMeta, ContentReader, ContentStore};
use async_trait::async_trait;
use bytes::Bytes;
use folio_core::DocumentId;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use uuid::Uuid;

/// Default chunk size for streaming reads (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Top-level directory holding per-document content.
const DOCUMENTS_DIR: &str = "documents";

/// File name of a version's content inside its version directory.
const CONTENT_FILE: &str = "content";

/// Local filesystem content store.
///
/// Content for version `n` of document `id` lives at
/// `<root>/documents/<id>/v<n>/content`.
pub struct FilesystemBackend {
    root: PathBuf,
}

impl FilesystemBackend {
    /// Create a new filesystem backend rooted at `root`.
    pub async fn new(root: impl AsRef<Path>) -> StorageResult<Self> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(DOCUMENTS_DIR)).await?;
        Ok(Self { root })
    }

    /// Root directory of this backend.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Relative key of a version's content.
    fn content_key(document_id: &DocumentId, version: i64) -> StorageResult<String> {
        if version < 1 {
            return Err(StorageError::InvalidKey(format!(
                "version must be positive, got {version}"
            )));
        }
        Ok(format!(
            "{DOCUMENTS_DIR}/{}/v{version}/{CONTENT_FILE}",
            document_id.as_str()
        ))
    }

    /// Get the full path for a key, with path traversal protection.
    ///
    /// Runs `key_path_sync` on the blocking pool since it touches the
    /// filesystem through `canonicalize` and `symlink_metadata`.
    async fn key_path(&self, key: &str) -> StorageResult<PathBuf> {
        let root = self.root.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || Self::key_path_sync(&root, &key))
            .await
            .map_err(|e| {
                StorageError::Io(std::io::Error::other(format!("spawn_blocking failed: {e}")))
            })?
    }

    /// Resolve `key` under `root`, rejecting anything that escapes the root.
    fn key_path_sync(root: &Path, key: &str) -> StorageResult<PathBuf> {
        if key.contains("..") || key.starts_with('/') || key.starts_with('\\') {
            return Err(StorageError::InvalidKey(format!(
                "path traversal not allowed: {key}"
            )));
        }

        for component in Path::new(key).components() {
            if !matches!(component, std::path::Component::Normal(_)) {
                return Err(StorageError::InvalidKey(format!(
                    "contains unsafe path component: {key}"
                )));
            }
        }

        let path = root.join(key);
        let root_canonical = root.canonicalize().map_err(|e| {
            StorageError::Io(std::io::Error::new(
                e.kind(),
                format!("failed to canonicalize root: {e}"),
            ))
        })?;

        // Walk up from the target to the nearest existing entry; a symlink
        // anywhere on that path must still resolve inside the root.
        let mut candidate = Some(path.as_path());
        while let Some(current) = candidate {
            match std::fs::symlink_metadata(current) {
                Ok(meta) => {
                    let canonical = current.canonicalize().map_err(|e| {
                        if meta.file_type().is_symlink() {
                            StorageError::InvalidKey(format!(
                                "symlink target missing or invalid: {key}"
                            ))
                        } else {
                            StorageError::Io(std::io::Error::new(
                                e.kind(),
                                format!("failed to canonicalize path: {e}"),
                            ))
                        }
                    })?;

                    if !canonical.starts_with(&root_canonical) {
                        return Err(StorageError::InvalidKey(format!(
                            "resolved path escapes storage root: {key}"
                        )));
                    }
                    return Ok(path);
                }
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
                Err(err) => {
                    return Err(StorageError::Io(std::io::Error::new(
                        err.kind(),
                        format!("failed to stat path: {err}"),
                    )));
                }
            }
            candidate = current.parent();
        }

        Ok(path)
    }

    /// Resolve the on-disk path of a version's content.
    async fn content_path(&self, document_id: &DocumentId, version: i64) -> StorageResult<PathBuf> {
        let key = Self::content_key(document_id, version)?;
        self.key_path(&key).await
    }

    fn not_found(document_id: &DocumentId, version: i64) -> StorageError {
        StorageError::NotFound(format!("{document_id} v{version}"))
    }

    /// Remove now-empty version and document directories after a delete.
    async fn prune_empty_dirs(&self, content_path: &Path) {
        let documents_root = self.root.join(DOCUMENTS_DIR);
        let mut dir = content_path.parent();
        while let Some(current) = dir {
            if current == documents_root || !current.starts_with(&documents_root) {
                break;
            }
            // remove_dir fails on non-empty directories, which ends the walk.
            if fs::remove_dir(current).await.is_err() {
                break;
            }
            dir = current.parent();
        }
    }
}

#[async_trait]
impl ContentStore for FilesystemBackend {
    #[instrument(skip(self, reader), fields(backend = "filesystem", document_id = %document_id))]
    async fn write(
        &self,
        document_id: &DocumentId,
        version: i64,
        file_name: &str,
        reader: ContentReader<'_>,
    ) -> StorageResult<u64> {
        let path = self.content_path(document_id, version).await?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }

        // Unique temp name so concurrent writers to one key never share a file.
        let temp_path = path.with_file_name(format!("{CONTENT_FILE}.tmp.{}", Uuid::new_v4()));

        let result: StorageResult<u64> = async {
            let mut file = fs::File::create(&temp_path).await?;
            let written = tokio::io::copy(reader, &mut file).await?;
            file.flush().await?;
            file.sync_all().await?;
            Ok(written)
        }
        .await;

        let written = match result {
            Ok(written) => written,
            Err(e) => {
                if let Err(cleanup) = fs::remove_file(&temp_path).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!(
                        path = %temp_path.display(),
                        error = %cleanup,
                        "Failed to remove temporary content file"
                    );
                }
                return Err(e);
            }
        };

        fs::rename(&temp_path, &path).await?;
        tracing::debug!(version, size = written, "Stored content");
        Ok(written)
    }

    #[instrument(skip(self), fields(backend = "filesystem", document_id = %document_id))]
    async fn read(&self, document_id: &DocumentId, version: i64) -> StorageResult<ByteStream> {
        use tokio::io::AsyncReadExt;

        let path = self.content_path(document_id, version).await?;
        let file = fs::File::open(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Self::not_found(document_id, version)
            } else {
                StorageError::Io(e)
            }
        })?;

        let stream = async_stream::try_stream! {
            let mut file = file;
            let mut buf = vec![0u8; STREAM_CHUNK_SIZE];
            loop {
                let n = file.read(&mut buf).await?;
                if n == 0 {
                    break;
                }
                yield Bytes::copy_from_slice(&buf[..n]);
            }
        };

        Ok(Box::pin(stream))
    }

    #[instrument(skip(self), fields(backend = "filesystem", document_id = %document_id))]
    async fn head(&self, document_id: &DocumentId, version: i64) -> StorageResult<ContentMeta> {
        let path = self.content_path(document_id, version).await?;
        let metadata = fs::metadata(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Self::not_found(document_id, version)
            } else {
                StorageError::Io(e)
            }
        })?;

        Ok(ContentMeta {
            size: metadata.len(),
            last_modified: metadata.modified().ok(),
        })
    }

    #[instrument(skip(self), fields(backend = "filesystem", document_id = %document_id))]
    async fn delete(&self, document_id: &DocumentId, version: i64) -> StorageResult<()> {
        let path = self.content_path(document_id, version).await?;
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(StorageError::Io(e)),
        }
        self.prune_empty_dirs(&path).await;
        Ok(())
    }

    #[instrument(skip(self), fields(backend = "filesystem", document_id = %document_id))]
    async fn exists(&self, document_id: &DocumentId, version: i64) -> StorageResult<bool> {
        let path = self.content_path(document_id, version).await?;
        fs::try_exists(&path).await.map_err(StorageError::Io)
    }

    fn backend_name(&self) -> &'static str {
        "filesystem"
    }

    async fn health_check(&self) -> StorageResult<()> {
        let probe = self.root.join(format!(".health.{}", Uuid::new_v4()));
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::TryStreamExt;
    use tempfile::TempDir;

    fn doc(id: &str) -> DocumentId {
        DocumentId::new(id).unwrap()
    }

    async fn read_all(backend: &FilesystemBackend, id: &DocumentId, version: i64) -> Vec<u8> {
        let chunks: Vec<Bytes> = backend
            .read(id, version)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        chunks.concat()
    }

    #[tokio::test]
    async fn test_write_then_read() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = doc("doc1");

        let mut reader: &[u8] = b"hello world!";
        let written = backend.write(&id, 1, "a.txt", &mut reader).await.unwrap();
        assert_eq!(written, 12);

        assert_eq!(read_all(&backend, &id, 1).await, b"hello world!");
        assert_eq!(backend.head(&id, 1).await.unwrap().size, 12);
        assert!(temp.path().join("documents/doc1/v1/content").exists());
    }

    #[tokio::test]
    async fn test_write_overwrites_existing() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = doc("doc1");

        let mut first: &[u8] = b"first";
        backend.write(&id, 1, "a.txt", &mut first).await.unwrap();
        let mut second: &[u8] = b"second version";
        backend.write(&id, 1, "a.txt", &mut second).await.unwrap();

        assert_eq!(read_all(&backend, &id, 1).await, b"second version");
    }

    #[tokio::test]
    async fn test_large_content_streams_in_chunks() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = doc("big");

        let data: Vec<u8> = (0..(STREAM_CHUNK_SIZE * 3 + 17))
            .map(|i| (i % 251) as u8)
            .collect();
        let mut reader: &[u8] = &data;
        backend.write(&id, 4, "big.bin", &mut reader).await.unwrap();

        let chunks: Vec<Bytes> = backend
            .read(&id, 4)
            .await
            .unwrap()
            .try_collect()
            .await
            .unwrap();
        assert_eq!(chunks.len(), 4);
        assert_eq!(chunks.concat(), data);
    }

    #[tokio::test]
    async fn test_read_missing_is_not_found() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        match backend.read(&doc("nope"), 1).await {
            Err(StorageError::NotFound(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
            Ok(_) => panic!("expected not found"),
        }
        assert!(matches!(
            backend.head(&doc("nope"), 1).await,
            Err(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent_and_prunes_dirs() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = doc("doc1");

        let mut reader: &[u8] = b"x";
        backend.write(&id, 1, "a.txt", &mut reader).await.unwrap();
        let mut reader: &[u8] = b"y";
        backend.write(&id, 2, "a.txt", &mut reader).await.unwrap();

        backend.delete(&id, 1).await.unwrap();
        backend.delete(&id, 1).await.unwrap();
        assert!(!backend.exists(&id, 1).await.unwrap());
        assert!(!temp.path().join("documents/doc1/v1").exists());
        assert!(temp.path().join("documents/doc1/v2").exists());

        backend.delete(&id, 2).await.unwrap();
        assert!(!temp.path().join("documents/doc1").exists());
        assert!(temp.path().join("documents").exists());
    }

    #[tokio::test]
    async fn test_rejects_non_positive_version() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let mut reader: &[u8] = b"x";

        let result = backend.write(&doc("doc1"), 0, "a.txt", &mut reader).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
    }

    #[tokio::test]
    async fn test_failed_write_leaves_no_temp_files() {
        struct BrokenReader;

        impl tokio::io::AsyncRead for BrokenReader {
            fn poll_read(
                self: std::pin::Pin<&mut Self>,
                _cx: &mut std::task::Context<'_>,
                _buf: &mut tokio::io::ReadBuf<'_>,
            ) -> std::task::Poll<std::io::Result<()>> {
                std::task::Poll::Ready(Err(std::io::Error::other("connection reset")))
            }
        }

        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        let id = doc("doc1");

        let mut reader = BrokenReader;
        let result = backend.write(&id, 1, "a.txt", &mut reader).await;
        assert!(matches!(result, Err(StorageError::Io(_))));
        assert!(!backend.exists(&id, 1).await.unwrap());

        let version_dir = temp.path().join("documents/doc1/v1");
        let leftovers = std::fs::read_dir(&version_dir).unwrap().count();
        assert_eq!(leftovers, 0);
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_symlinked_document_dir_is_rejected() {
        let temp = TempDir::new().unwrap();
        let outside = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();

        std::os::unix::fs::symlink(outside.path(), temp.path().join("documents/evil")).unwrap();

        let mut reader: &[u8] = b"x";
        let result = backend.write(&doc("evil"), 1, "a.txt", &mut reader).await;
        assert!(matches!(result, Err(StorageError::InvalidKey(_))));
        assert_eq!(std::fs::read_dir(outside.path()).unwrap().count(), 0);
    }

    #[tokio::test]
    async fn test_health_check() {
        let temp = TempDir::new().unwrap();
        let backend = FilesystemBackend::new(temp.path()).await.unwrap();
        backend.health_check().await.unwrap();
        assert_eq!(backend.backend_name(), "filesystem");
    }
}
