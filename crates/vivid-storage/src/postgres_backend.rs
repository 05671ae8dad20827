//! PostgreSQL storage backend.
//!
//! Stores every document in a single `documents` table. Keys are the
//! collection paths used by the core (`products/<id>`), values are the
//! serialized JSON bytes.
//!
//! Feature-gated behind `postgres-backend`. Uses `sqlx` on the Tokio runtime,
//! so every call is fully async.

use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use tracing::debug;

use crate::{StorageBackend, StorageError};

/// A storage backend backed by PostgreSQL.
///
/// # Examples
///
/// ```no_run
/// # use vivid_storage::PostgresBackend;
/// # #[tokio::main]
/// # async fn main() {
/// let backend = PostgresBackend::connect("postgres://localhost/vivid").await.unwrap();
/// # }
/// ```
#[derive(Clone)]
pub struct PostgresBackend {
    pool: PgPool,
}

impl std::fmt::Debug for PostgresBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PostgresBackend")
            .field("pool", &"[PgPool]")
            .finish_non_exhaustive()
    }
}

impl PostgresBackend {
    /// Connect to PostgreSQL and create the `documents` table if needed.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Open`] if the connection or migration fails.
    pub async fn connect(database_url: &str) -> Result<Self, StorageError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .connect(database_url)
            .await
            .map_err(|e| StorageError::Open {
                location: "[redacted]".to_owned(),
                reason: e.to_string(),
            })?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS documents (\
                key   TEXT  PRIMARY KEY, \
                value BYTEA NOT NULL\
            )",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Open {
            location: "documents".to_owned(),
            reason: format!("migration failed: {e}"),
        })?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_documents_key_prefix \
             ON documents (key text_pattern_ops)",
        )
        .execute(&pool)
        .await
        .map_err(|e| StorageError::Open {
            location: "documents".to_owned(),
            reason: format!("index creation failed: {e}"),
        })?;

        debug!("documents table ready");

        Ok(Self { pool })
    }

    /// Return a reference to the underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Escape `LIKE` wildcards so a prefix matches literally.
fn like_prefix(prefix: &str) -> String {
    let mut pattern = String::with_capacity(prefix.len().saturating_add(1));
    for ch in prefix.chars() {
        if matches!(ch, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(ch);
    }
    pattern.push('%');
    pattern
}

#[async_trait::async_trait]
impl StorageBackend for PostgresBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let row: Option<(Vec<u8>,)> = sqlx::query_as("SELECT value FROM documents WHERE key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StorageError::Read {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(row.map(|(v,)| v))
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        sqlx::query(
            "INSERT INTO documents (key, value) VALUES ($1, $2) \
             ON CONFLICT (key) DO UPDATE SET value = EXCLUDED.value",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Write {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM documents WHERE key = $1")
            .bind(key)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Delete {
                key: key.to_owned(),
                reason: e.to_string(),
            })?;

        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let rows: Vec<(String,)> =
            sqlx::query_as("SELECT key FROM documents WHERE key LIKE $1 ESCAPE '\\' ORDER BY key")
                .bind(like_prefix(prefix))
                .fetch_all(&self.pool)
                .await
                .map_err(|e| StorageError::List {
                    prefix: prefix.to_owned(),
                    reason: e.to_string(),
                })?;

        Ok(rows.into_iter().map(|(k,)| k).collect())
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let rows: Vec<(String, Vec<u8>)> = sqlx::query_as(
            "SELECT key, value FROM documents WHERE key LIKE $1 ESCAPE '\\' ORDER BY key",
        )
        .bind(like_prefix(prefix))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::List {
            prefix: prefix.to_owned(),
            reason: e.to_string(),
        })?;

        Ok(rows)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let row: Option<(bool,)> =
            sqlx::query_as("SELECT EXISTS(SELECT 1 FROM documents WHERE key = $1)")
                .bind(key)
                .fetch_optional(&self.pool)
                .await
                .map_err(|e| StorageError::Read {
                    key: key.to_owned(),
                    reason: e.to_string(),
                })?;

        Ok(row.is_some_and(|(e,)| e))
    }
}
