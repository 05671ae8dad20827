//! Storage backend abstraction for the Vivid Vision storefront.
//!
//! This crate defines the [`StorageBackend`] trait: a plain key/value
//! interface that knows nothing about products, users, or bans. The typed
//! document store in `vivid-core` serializes every document to JSON before it
//! reaches this layer.
//!
//! Two implementations are provided:
//!
//! - [`PostgresBackend`]: production backend, a single `documents` table (feature `postgres-backend`)
//! - [`MemoryBackend`]: in-memory, for tests and local development

mod error;
mod memory;
#[cfg(feature = "postgres-backend")]
mod postgres_backend;

pub use error::StorageError;
pub use memory::MemoryBackend;
#[cfg(feature = "postgres-backend")]
pub use postgres_backend::PostgresBackend;

/// A pluggable key/value storage backend.
///
/// Keys are UTF-8 strings using `/` as a separator (e.g. `products/<id>`,
/// `comments/<product_id>/<comment_id>`). Values are opaque byte arrays,
/// in practice JSON documents.
///
/// Implementations must be safe to share across async tasks (`Send + Sync`).
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync + 'static {
    /// Retrieve a value by key.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store a key/value pair, overwriting any existing value.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Write`] if the underlying backend fails.
    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete a key. Deleting a non-existent key is not an error.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Delete`] if the underlying backend fails.
    async fn delete(&self, key: &str) -> Result<(), StorageError>;

    /// List all keys that start with the given prefix, sorted ascending.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] if the underlying backend fails.
    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError>;

    /// Fetch every key/value pair under a prefix, sorted ascending by key.
    ///
    /// The default implementation lists keys and fetches each one. Keys that
    /// disappear between the two calls are skipped.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::List`] or [`StorageError::Read`] if the
    /// underlying backend fails.
    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let keys = self.list(prefix).await?;
        let mut entries = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(value) = self.get(&key).await? {
                entries.push((key, value));
            }
        }
        Ok(entries)
    }

    /// Check whether a key exists in storage.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Read`] if the underlying backend fails.
    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        Ok(self.get(key).await?.is_some())
    }
}
