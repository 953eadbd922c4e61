//! PostgreSQL-based metadata store implementation.

use crate::error::{MetadataError, MetadataResult};
use crate::models::{DocumentRow, DocumentUpdate, VersionRow};
use crate::repos::{DocumentRepo, DocumentTx, VersionRepo};
use crate::store::MetadataStore;
use async_trait::async_trait;
use folio_core::config::PgSslMode;
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode as SqlxPgSslMode};
use sqlx::{Pool, Postgres, Transaction};
use std::str::FromStr;

/// PostgreSQL schema (embedded).
const POSTGRES_SCHEMA: &str = include_str!("postgres_schema.sql");

fn postgres_schema_statements(schema: &str) -> Vec<&str> {
    schema
        .split(';')
        .filter_map(|statement| {
            let trimmed = statement.trim();
            if trimmed.is_empty() {
                return None;
            }
            let has_sql = trimmed.lines().any(|line| {
                let line = line.trim();
                !line.is_empty() && !line.starts_with("--")
            });
            has_sql.then_some(trimmed)
        })
        .collect()
}

/// PostgreSQL-based metadata store.
///
/// Upload transactions take a transaction-scoped advisory lock keyed by the
/// document ID, so several server processes can share one database.
pub struct PostgresStore {
    pool: Pool<Postgres>,
}

impl PostgresStore {
    /// Create a new PostgreSQL store from a connection URL.
    pub async fn from_url(
        url: &str,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let opts = PgConnectOptions::from_str(url)?;
        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    /// Create a new PostgreSQL store from individual connection parameters.
    #[allow(clippy::too_many_arguments)]
    pub async fn from_params(
        host: &str,
        port: u16,
        username: Option<&str>,
        password: Option<&str>,
        database: &str,
        ssl_mode: Option<PgSslMode>,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        let mut opts = PgConnectOptions::new()
            .host(host)
            .port(port)
            .database(database);

        if let Some(user) = username {
            opts = opts.username(user);
        }

        if let Some(pass) = password {
            opts = opts.password(pass);
        }

        if let Some(mode) = ssl_mode {
            let sqlx_mode = match mode {
                PgSslMode::Disable => SqlxPgSslMode::Disable,
                PgSslMode::Prefer => SqlxPgSslMode::Prefer,
                PgSslMode::Require => SqlxPgSslMode::Require,
            };
            opts = opts.ssl_mode(sqlx_mode);
        }

        // Log connection info without password
        tracing::info!(
            host = host,
            port = port,
            database = database,
            username = username.unwrap_or("<none>"),
            ssl_mode = ?ssl_mode,
            "Connecting to PostgreSQL with individual parameters"
        );

        Self::connect(opts, max_connections, statement_timeout_ms).await
    }

    async fn connect(
        mut opts: PgConnectOptions,
        max_connections: u32,
        statement_timeout_ms: Option<u64>,
    ) -> MetadataResult<Self> {
        if let Some(timeout_ms) = statement_timeout_ms {
            opts = opts.options([("statement_timeout", format!("{}ms", timeout_ms))]);
            tracing::info!("PostgreSQL statement_timeout set to {}ms", timeout_ms);
        }

        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect_with(opts)
            .await?;

        let store = Self { pool };
        store.migrate().await?;

        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Postgres> {
        &self.pool
    }
}

#[async_trait]
impl MetadataStore for PostgresStore {
    async fn migrate(&self) -> MetadataResult<()> {
        // Prepared statements cannot hold several commands, so run them one by one.
        for statement in postgres_schema_statements(POSTGRES_SCHEMA) {
            sqlx::query(statement).execute(&self.pool).await?;
        }
        Ok(())
    }

    async fn health_check(&self) -> MetadataResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}

#[async_trait]
impl DocumentRepo for PostgresStore {
    async fn begin_document_tx(&self) -> MetadataResult<Box<dyn DocumentTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresDocumentTx { tx }))
    }

    async fn get_document(&self, id: &str) -> MetadataResult<Option<DocumentRow>> {
        let row = sqlx::query_as::<_, DocumentRow>("SELECT * FROM documents WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    async fn rename_document(&self, id: &str, name: &str) -> MetadataResult<()> {
        let result = sqlx::query("UPDATE documents SET name = $1 WHERE id = $2")
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
impl VersionRepo for PostgresStore {
    async fn list_versions(
        &self,
        document_id: &str,
        offset: u32,
        limit: u32,
    ) -> MetadataResult<Vec<VersionRow>> {
        let rows = sqlx::query_as::<_, VersionRow>(
            r#"
            SELECT * FROM document_versions
            WHERE document_id = $1
            ORDER BY version DESC
            LIMIT $2 OFFSET $3
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
            "SELECT * FROM document_versions WHERE document_id = $1 AND version = $2",
        )
        .bind(document_id)
        .bind(version)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }
}

/// Upload transaction on the PostgreSQL store.
struct PostgresDocumentTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl DocumentTx for PostgresDocumentTx {
    async fn lock_document(&mut self, id: &str) -> MetadataResult<Option<DocumentRow>> {
        // The advisory lock also covers IDs with no row yet, which FOR UPDATE
        // alone cannot lock. It is released on commit or rollback.
        sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        let row = sqlx::query_as::<_, DocumentRow>(
            "SELECT * FROM documents WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row)
    }

    async fn version_record_exists(&mut self, id: &str, version: i64) -> MetadataResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM document_versions WHERE document_id = $1 AND version = $2)",
        )
        .bind(id)
        .bind(version)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(exists)
    }

    async fn create_document(&mut self, document: &DocumentRow) -> MetadataResult<()> {
        // ON CONFLICT keeps the transaction usable; a raised 23505 would abort it.
        let result = sqlx::query(
            r#"
            INSERT INTO documents (
                id, name, version, size_bytes, created_at, modified_at,
                creator_id, modifier_id
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
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
            "UPDATE documents SET version = version + 1 WHERE id = $1 RETURNING version",
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
            ) VALUES ($1, $2, $3, $4, $5, $6)
            ON CONFLICT (document_id, version) DO NOTHING
            "#,
        )
        .bind(&record.document_id)
        .bind(record.version)
        .bind(&record.name)
        .bind(record.size_bytes)
        .bind(record.created_at)
        .bind(&record.modifier_id)
        .execute(&mut *self.tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(MetadataError::AlreadyExists(format!(
                "version {} of document {}",
                record.version, record.document_id
            )));
        }
        Ok(())
    }

    async fn update_document_metadata(
        &mut self,
        id: &str,
        update: &DocumentUpdate,
    ) -> MetadataResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE documents
            SET name = $1, size_bytes = $2, modified_at = $3, modifier_id = $4
            WHERE id = $5
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
            "DELETE FROM document_versions WHERE document_id = $1 AND version < $2 RETURNING version",
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
