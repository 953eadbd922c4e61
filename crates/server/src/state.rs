//! Application state shared across handlers.

use crate::versioning::UploadCoordinator;
use folio_core::config::AppConfig;
use folio_metadata::MetadataStore;
use folio_storage::ContentStore;
use std::sync::Arc;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<AppConfig>,
    /// Content storage backend.
    pub content: Arc<dyn ContentStore>,
    /// Metadata store.
    pub metadata: Arc<dyn MetadataStore>,
    /// Upload coordinator built over both stores.
    pub coordinator: Arc<UploadCoordinator>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// The coordinator is built here so every handler shares one document
    /// lock registry.
    pub fn new(
        config: AppConfig,
        content: Arc<dyn ContentStore>,
        metadata: Arc<dyn MetadataStore>,
    ) -> Self {
        let coordinator = Arc::new(UploadCoordinator::new(
            metadata.clone(),
            content.clone(),
            config.retention.policy(),
        ));

        Self {
            config: Arc::new(config),
            content,
            metadata,
            coordinator,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use folio_metadata::SqliteStore;
    use folio_storage::FilesystemBackend;
    use tempfile::tempdir;

    #[tokio::test]
    async fn coordinator_uses_configured_retention() {
        let temp = tempdir().unwrap();
        let content: Arc<dyn ContentStore> =
            Arc::new(FilesystemBackend::new(temp.path()).await.unwrap());
        let metadata: Arc<dyn MetadataStore> = Arc::new(
            SqliteStore::new(temp.path().join("metadata.db"))
                .await
                .unwrap(),
        );

        let mut config = AppConfig::for_testing();
        config.retention.keep_versions = 3;

        let state = AppState::new(config, content, metadata);
        assert_eq!(state.coordinator.retention().retained(), 3);
        assert_eq!(state.content.backend_name(), "filesystem");
    }
}
