//! In-process per-document lock registry.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, Weak};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type Slot = Arc<AsyncMutex<()>>;

/// Hands out one async mutex per document ID.
///
/// Entries are created on first use and dropped once no task holds or waits
/// for them, so the map only ever contains contended documents.
#[derive(Clone, Default)]
pub struct DocumentLocks {
    slots: Arc<Mutex<HashMap<String, Weak<AsyncMutex<()>>>>>,
}

/// Exclusive access to one document until dropped.
pub struct DocumentLockGuard {
    document_id: String,
    guard: Option<OwnedMutexGuard<()>>,
    registry: DocumentLocks,
}

impl DocumentLocks {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `document_id`.
    pub async fn acquire(&self, document_id: &str) -> DocumentLockGuard {
        let slot = self.slot(document_id);
        let guard = slot.lock_owned().await;
        DocumentLockGuard {
            document_id: document_id.to_string(),
            guard: Some(guard),
            registry: self.clone(),
        }
    }

    /// Number of documents with a live lock entry.
    pub fn len(&self) -> usize {
        self.map().values().filter(|w| w.strong_count() > 0).count()
    }

    /// Whether no document currently has a live lock entry.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn slot(&self, document_id: &str) -> Slot {
        let mut slots = self.map();
        if let Some(existing) = slots.get(document_id).and_then(Weak::upgrade) {
            return existing;
        }
        let slot: Slot = Arc::new(AsyncMutex::new(()));
        slots.insert(document_id.to_string(), Arc::downgrade(&slot));
        slot
    }

    fn release(&self, document_id: &str) {
        let mut slots = self.map();
        if slots
            .get(document_id)
            .is_some_and(|weak| weak.strong_count() == 0)
        {
            slots.remove(document_id);
        }
    }

    fn map(&self) -> std::sync::MutexGuard<'_, HashMap<String, Weak<AsyncMutex<()>>>> {
        // The map holds no invariants a panicking holder could break.
        self.slots
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DocumentLockGuard {
    /// The document this guard protects.
    pub fn document_id(&self) -> &str {
        &self.document_id
    }
}

impl Drop for DocumentLockGuard {
    fn drop(&mut self) {
        // Drop the owned guard first so its Arc no longer counts as a holder.
        self.guard.take();
        self.registry.release(&self.document_id);
    }
}

impl std::fmt::Debug for DocumentLockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentLockGuard")
            .field("document_id", &self.document_id)
            .finish()
    }
}
