//! Metadata store abstraction and implementations for Folio.
//!
//! This crate persists the relational half of a document:
//! - Document pointer rows (current version, display name, size, authorship)
//! - Immutable version history records
//! - Transactions with per-document locking for upload coordination

pub mod error;
pub mod models;
pub mod postgres;
pub mod repos;
pub mod store;

pub use error::{MetadataError, MetadataResult};
pub use models::{DocumentRow, DocumentUpdate, VersionRow};
pub use postgres::PostgresStore;
pub use repos::{DocumentRepo, DocumentTx, VersionRepo};
pub use store::{MetadataStore, SqliteStore};

use folio_core::config::MetadataConfig;
use std::sync::Arc;
use time::OffsetDateTime;

/// Current UTC time truncated to microseconds.
///
/// PostgreSQL stores microsecond precision; truncating up front keeps values
/// identical across a round trip on every backend.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    let micros = now.nanosecond() / 1_000 * 1_000;
    now.replace_nanosecond(micros).unwrap_or(now)
}

/// Create a metadata store from configuration.
pub async fn from_config(config: &MetadataConfig) -> MetadataResult<Arc<dyn MetadataStore>> {
    config.validate().map_err(MetadataError::Config)?;

    match config {
        MetadataConfig::Sqlite { path } => {
            let store = SqliteStore::new(path).await?;
            tracing::info!(
                path = %path.display(),
                "SQLite metadata store ready (single-process deployments only)"
            );
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
        MetadataConfig::Postgres {
            url,
            host,
            port,
            username,
            password,
            database,
            ssl_mode,
            max_connections,
            statement_timeout_ms,
        } => {
            let store = if let Some(url) = url {
                tracing::info!("Connecting to PostgreSQL using connection URL");
                PostgresStore::from_url(url, *max_connections, *statement_timeout_ms).await?
            } else if let (Some(host), Some(database)) = (host.as_ref(), database.as_ref()) {
                PostgresStore::from_params(
                    host,
                    port.unwrap_or(5432),
                    username.as_deref(),
                    password.as_deref(),
                    database,
                    *ssl_mode,
                    *max_connections,
                    *statement_timeout_ms,
                )
                .await?
            } else {
                return Err(MetadataError::Config(
                    "postgres config requires either 'url' or 'host' + 'database'".to_string(),
                ));
            };
            Ok(Arc::new(store) as Arc<dyn MetadataStore>)
        }
    }
}
