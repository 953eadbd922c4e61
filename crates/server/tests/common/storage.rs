//! Content store test utilities.

use async_trait::async_trait;
use folio_core::DocumentId;
use folio_storage::{
    ByteStream, ContentMeta, ContentReader, ContentStore, FilesystemBackend, StorageError,
    StorageResult,
};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};
use tempfile::TempDir;
use tokio::sync::Notify;

/// A filesystem content store in a temporary directory.
/// Note: #[allow(dead_code)] because each test file compiles common/ separately.
#[allow(dead_code)]
pub struct TestStorage {
    pub backend: Arc<dyn ContentStore>,
    _temp_dir: TempDir,
}

#[allow(dead_code)]
impl TestStorage {
    /// Create a new test store with a temporary root.
    pub async fn new() -> StorageResult<Self> {
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let backend = FilesystemBackend::new(temp_dir.path()).await?;

        Ok(Self {
            backend: Arc::new(backend),
            _temp_dir: temp_dir,
        })
    }

    /// Get a reference to the content store.
    pub fn store(&self) -> Arc<dyn ContentStore> {
        self.backend.clone()
    }
}

/// Content store wrapper whose writes can be made to fail or stall on demand.
#[allow(dead_code)]
pub struct FailingContentStore {
    inner: Arc<dyn ContentStore>,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
    deletes: AtomicUsize,
    held_version: AtomicI64,
    write_held: Notify,
    release: Notify,
}

#[allow(dead_code)]
impl FailingContentStore {
    pub fn new(inner: Arc<dyn ContentStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            writes: AtomicUsize::new(0),
            deletes: AtomicUsize::new(0),
            held_version: AtomicI64::new(0),
            write_held: Notify::new(),
            release: Notify::new(),
        }
    }

    /// Stall the write of `version` until [`release_write`](Self::release_write).
    pub fn hold_write(&self, version: i64) {
        self.held_version.store(version, Ordering::SeqCst);
    }

    /// Wait until the held write has started.
    pub async fn write_started(&self) {
        self.write_held.notified().await;
    }

    /// Let the held write proceed.
    pub fn release_write(&self) {
        self.release.notify_one();
    }

    /// Make every following write fail (or succeed again).
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Number of write attempts seen so far.
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Number of delete calls seen so far.
    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ContentStore for FailingContentStore {
    async fn write(
        &self,
        document_id: &DocumentId,
        version: i64,
        file_name: &str,
        reader: ContentReader<'_>,
    ) -> StorageResult<u64> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Io(std::io::Error::other(
                "injected write failure",
            )));
        }
        if self.held_version.load(Ordering::SeqCst) == version {
            self.write_held.notify_one();
            self.release.notified().await;
        }
        self.inner
            .write(document_id, version, file_name, reader)
            .await
    }

    async fn read(&self, document_id: &DocumentId, version: i64) -> StorageResult<ByteStream> {
        self.inner.read(document_id, version).await
    }

    async fn head(&self, document_id: &DocumentId, version: i64) -> StorageResult<ContentMeta> {
        self.inner.head(document_id, version).await
    }

    async fn delete(&self, document_id: &DocumentId, version: i64) -> StorageResult<()> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.inner.delete(document_id, version).await
    }

    async fn exists(&self, document_id: &DocumentId, version: i64) -> StorageResult<bool> {
        self.inner.exists(document_id, version).await
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}
