//! In-memory storage backend.
//!
//! Holds every document in a `BTreeMap` behind a `RwLock`. Nothing survives
//! a restart, which is exactly what unit tests and `VIVID_STORAGE=memory`
//! development runs want.

use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::{StorageBackend, StorageError};

/// An in-memory storage backend backed by a `BTreeMap`.
///
/// Keys stay sorted, so prefix listing is a `range` walk. Clones share the
/// same underlying map.
///
/// # Examples
///
/// ```
/// # use vivid_storage::{MemoryBackend, StorageBackend};
/// # #[tokio::main]
/// # async fn main() {
/// let backend = MemoryBackend::new();
/// backend.put("products/p1", b"{}").await.unwrap();
/// let val = backend.get("products/p1").await.unwrap();
/// assert_eq!(val, Some(b"{}".to_vec()));
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    data: Arc<RwLock<BTreeMap<String, Vec<u8>>>>,
}

impl MemoryBackend {
    /// Create a new empty in-memory backend.
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: Arc::new(RwLock::new(BTreeMap::new())),
        }
    }

    /// Number of stored keys.
    pub async fn len(&self) -> usize {
        self.data.read().await.len()
    }

    /// Whether the backend holds no keys at all.
    pub async fn is_empty(&self) -> bool {
        self.data.read().await.is_empty()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl StorageBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError> {
        let data = self.data.read().await;
        Ok(data.get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.insert(key.to_owned(), value.to_vec());
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), StorageError> {
        let mut data = self.data.write().await;
        data.remove(key);
        Ok(())
    }

    async fn list(&self, prefix: &str) -> Result<Vec<String>, StorageError> {
        let data = self.data.read().await;
        let keys = data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        Ok(keys)
    }

    async fn scan(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>, StorageError> {
        let data = self.data.read().await;
        let entries = data
            .range(prefix.to_owned()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Ok(entries)
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let data = self.data.read().await;
        Ok(data.contains_key(key))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn get_missing_document_returns_none() {
        let backend = MemoryBackend::new();
        assert_eq!(backend.get("users/nobody").await.unwrap(), None);
    }

    #[tokio::test]
    async fn put_overwrites_existing_document() {
        let backend = MemoryBackend::new();
        backend.put("products/p1", b"v1").await.unwrap();
        backend.put("products/p1", b"v2").await.unwrap();
        assert_eq!(backend.get("products/p1").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(backend.len().await, 1);
    }

    #[tokio::test]
    async fn delete_missing_key_is_noop() {
        let backend = MemoryBackend::new();
        backend.delete("bans/none").await.unwrap();
        assert!(backend.is_empty().await);
    }

    #[tokio::test]
    async fn list_stays_inside_collection() {
        let backend = MemoryBackend::new();
        backend.put("comments/p1/a", b"1").await.unwrap();
        backend.put("comments/p1/b", b"2").await.unwrap();
        backend.put("comments/p2/c", b"3").await.unwrap();
        backend.put("users/u1", b"4").await.unwrap();

        let keys = backend.list("comments/p1/").await.unwrap();
        assert_eq!(keys, vec!["comments/p1/a", "comments/p1/b"]);
    }

    #[tokio::test]
    async fn scan_returns_values_in_key_order() {
        let backend = MemoryBackend::new();
        backend.put("orders/b", b"2").await.unwrap();
        backend.put("orders/a", b"1").await.unwrap();
        backend.put("products/x", b"3").await.unwrap();

        let entries = backend.scan("orders/").await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("orders/a".to_owned(), b"1".to_vec()),
                ("orders/b".to_owned(), b"2".to_vec()),
            ]
        );
    }

    #[tokio::test]
    async fn exists_tracks_puts_and_deletes() {
        let backend = MemoryBackend::new();
        assert!(!backend.exists("sessions/s").await.unwrap());
        backend.put("sessions/s", b"{}").await.unwrap();
        assert!(backend.exists("sessions/s").await.unwrap());
        backend.delete("sessions/s").await.unwrap();
        assert!(!backend.exists("sessions/s").await.unwrap());
    }

    #[tokio::test]
    async fn clone_shares_state() {
        let backend = MemoryBackend::new();
        let clone = backend.clone();
        backend.put("categories/c", b"val").await.unwrap();
        assert_eq!(clone.get("categories/c").await.unwrap(), Some(b"val".to_vec()));
    }
}
