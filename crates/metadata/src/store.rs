//! Metadata store trait and the SQLite implementation.

use crate::error::{MetadataError, MetadataResult, is_unique_violation};
use crate::models::{DocumentRow, DocumentUpdate, VersionRow};
use crate::repos::{DocumentRepo, DocumentTx, VersionRepo};
use async_trait::async_trait;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite, Transaction};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Combined metadata store trait.
#[async_trait]
pub trait MetadataStore: DocumentRepo + VersionRepo + Send + Sync {
    /// Run database migrations.
    async fn migrate(&self) -> MetadataResult<()>;

    /// Check database connectivity and health.
    async fn health_check(&self) -> MetadataResult<()>;

    /// Short backend identifier for logging.
    fn backend_name(&self) -> &'static str;
}

/// SQLite-based metadata store.
///
/// The pool holds a single connection, so an open [`DocumentTx`] excludes
/// every other statement until it finishes.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
}

impl SqliteStore {
    /// Create a new SQLite store. `":memory:"` opens a private in-memory database.
    pub async fn new(path: impl AsRef<Path>) -> MetadataResult<Self> {
        let path = path.as_ref();

        let opts = if path == Path::new(":memory:") {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = path.parent()
                && !parent.as_os_str().is_empty()
            {
                std::fs::create_dir_all(parent)?;
            }
            SqliteConnectOptions::from_str(&format!("sqlite:{}?mode=rwc", path.display()))?
                .create_if_missing(true)
                .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
                .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
        };

        // Another process holding the file waits instead of failing outright.
        let opts = opts.busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            // Keep the in-memory database alive for the store's lifetime.
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for SqliteStore {
    async fn migrate(&self) -> MetadataResult<()> {
        sqlx::query(SCHEMA_SQL).execute(&self.pool).await?;
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "sqlite"
    }
}

#[async_trait]
impl DocumentRepo for SqliteStore {
    async fn begin_document_tx(&self) -> MetadataResult<Box<dyn DocumentTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(SqliteDocumentTx { tx }))
    }

    async fn get_document(&self, id: &str) -> MetadataResult<Option<DocumentRow>> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn rename_document(&self, id: &str, name: &str) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE documents SET name = ? WHERE id = ?")
            .bind(name)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("document {id}")));
        }
        Ok(())
    }
}

#[async_trait]
impl VersionRepo for SqliteStore {
    async fn list_versions(
        &self,
        document_id: &str,
        offset: u32,
        limit: u32,
    ) -> MetadataResult<Vec<VersionRow>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT * FROM document_versions
            WHERE document_id = ?
            ORDER BY version DESC
            LIMIT ? OFFSET ?
            "#,
        )
        .bind(document_id)
        .bind(i64::from(limit))
        .bind(i64::from(offset))
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn get_version(
        &self,
        document_id: &str,
        version: i64,
    ) -> MetadataResult<Option<VersionRow>> {
        let row = sqlx::query_as::<_, VersionRow>(
            "SELECT * FROM document_versions WHERE document_id = ? AND version = ?",
        )
        .bind(document_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

/// Upload transaction on the SQLite store.
struct SqliteDocumentTx {
    tx: Transaction<'static, Sqlite>,
}

#[async_trait]
impl DocumentTx for SqliteDocumentTx {
    async fn lock_document(&mut self, id: &str) -> MetadataResult<Option<DocumentRow>> {
        // A no-op write takes SQLite's write lock up front, so a second
        // process sharing the file cannot interleave between read and update.
        sqlx::query("UPDATE documents SET id = id WHERE id = ?")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = ?")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(row)
    }

    async fn version_record_exists(&mut self, id: &str, version: i64) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM document_versions WHERE document_id = ? AND version = ?)",
        )
        .bind(id)
        .bind(version)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn create_document(&mut self, document: &DocumentRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                id, name, version, size_bytes, created_at, modified_at,
                creator_id, modifier_id
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO NOTHING
            "#,
        )
        .bind(&document.id)
        .bind(&document.name)
        .bind(document.version)
        .bind(document.size_bytes)
        .bind(document.created_at)
        .bind(document.modified_at)
        .bind(&document.creator_id)
        .bind(&document.modifier_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::AlreadyExists(format!(
                "document {}",
                document.id
            )));
        }
        Ok(())
    }

    async fn increment_version(&mut self, id: &str) -> MetadataResult<i64> {
        let version: Option<i64> = sqlx::query_scalar(
            "UPDATE documents SET version = version + 1 WHERE id = ? RETURNING version",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        version.ok_or_else(|| MetadataError::NotFound(format!("document {id}")))
    }

    async fn insert_version_record(&mut self, record: &VersionRow) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            INSERT INTO document_versions (
                document_id, version, name, size_bytes, created_at, modifier_id
            ) VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(document_id, version) DO NOTHING
            "#,
        )
        .bind(&record.document_id)
        .bind(record.version)
        .bind(&record.name)
        .bind(record.size_bytes)
        .bind(record.created_at)
        .bind(&record.modifier_id)
        .execute(&mut *self.tx)
        .await;

        match result {
            Ok(done) if done.rows_affected() == 0 => Err(MetadataError::AlreadyExists(format!(
                "version {} of document {}",
                record.version, record.document_id
            ))),
            Ok(_) => Ok(()),
            Err(e) if is_unique_violation(&e) => Err(MetadataError::AlreadyExists(format!(
                "version {} of document {}",
                record.version, record.document_id
            ))),
            Err(e) => Err(e.into()),
        }
    }

    async fn update_document_metadata(
        &mut self,
        id: &str,
        update: &DocumentUpdate,
    ) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET name = ?, size_bytes = ?, modified_at = ?, modifier_id = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.name)
        .bind(update.size_bytes)
        .bind(update.modified_at)
        .bind(&update.modifier_id)
        .bind(id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::NotFound(format!("document {id}")));
        }
        Ok(())
    }

    async fn prune_versions(&mut self, id: &str, keep_from: i64) -> MetadataResult<Vec<i64>> {
        let mut pruned: Vec<i64> = sqlx::query_scalar(
            "DELETE FROM document_versions WHERE document_id = ? AND version < ? RETURNING version",
        )
        .bind(id)
        .bind(keep_from)
        .fetch_all(&mut *self.tx)
        .await?;
        pruned.sort_unstable();
        Ok(pruned)
    }

    async fn commit(self: Box<Self>) -> MetadataResult<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> MetadataResult<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS documents (
    id TEXT PRIMARY KEY NOT NULL,
    name TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modified_at TEXT NOT NULL,
    creator_id TEXT NOT NULL,
    modifier_id TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS document_versions (
    document_id TEXT NOT NULL,
    version INTEGER NOT NULL CHECK (version >= 1),
    name TEXT NOT NULL,
    size_bytes INTEGER NOT NULL,
    created_at TEXT NOT NULL,
    modifier_id TEXT NOT NULL,
    PRIMARY KEY (document_id, version)
);

CREATE INDEX IF NOT EXISTS idx_document_versions_created
    ON document_versions(document_id, created_at);
"#;
