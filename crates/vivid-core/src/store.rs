//! Typed document store.
//!
//! Every document the storefront keeps (users, products, comments, bans,
//! sessions, ...) passes through [`DocumentStore`], which serializes it to
//! JSON on the way down and deserializes it on the way up. The storage
//! backend below only ever sees bytes under collection-prefixed keys.
//!
//! # Key layout
//!
//! - `users/<id>`
//! - `products/<id>`, `categories/<id>`
//! - `comments/<product_id>/<comment_id>`
//! - `orders/<id>`, `bans/<id>`, `announcements/<id>`
//! - `sessions/<sha256(token)>`

use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;
use vivid_storage::StorageBackend;

use crate::error::StoreError;

/// JSON document store wrapping a storage backend.
///
/// Cheap to clone; clones share the backend.
#[derive(Clone)]
pub struct DocumentStore {
    storage: Arc<dyn StorageBackend>,
}

impl DocumentStore {
    /// Create a store over the given backend.
    #[must_use]
    pub fn new(storage: Arc<dyn StorageBackend>) -> Self {
        Self { storage }
    }

    /// Read and decode a document.
    ///
    /// Returns `Ok(None)` if the key does not exist.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Storage`] if the backend fails.
    /// - [`StoreError::Codec`] if the stored bytes are not a valid `T`.
    pub async fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, StoreError> {
        match self.storage.get(key).await? {
            None => Ok(None),
            Some(bytes) => decode(key, &bytes).map(Some),
        }
    }

    /// Encode and write a document, replacing any previous version.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Codec`] if `value` cannot be serialized.
    /// - [`StoreError::Storage`] if the backend fails.
    pub async fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(value).map_err(|e| StoreError::Codec {
            key: key.to_owned(),
            reason: e.to_string(),
        })?;
        self.storage.put(key, &bytes).await?;
        Ok(())
    }

    /// Delete a document. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the backend fails.
    pub async fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.storage.delete(key).await?;
        Ok(())
    }

    /// Check whether a document exists.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the backend fails.
    pub async fn exists(&self, key: &str) -> Result<bool, StoreError> {
        Ok(self.storage.exists(key).await?)
    }

    /// List document keys under a prefix.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Storage`] if the backend fails.
    pub async fn keys(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        Ok(self.storage.list(prefix).await?)
    }

    /// Decode every document under a prefix, in key order.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Storage`] if the backend fails.
    /// - [`StoreError::Codec`] on the first document that does not decode.
    pub async fn scan<T: DeserializeOwned>(&self, prefix: &str) -> Result<Vec<T>, StoreError> {
        let entries = self.storage.scan(prefix).await?;
        entries
            .iter()
            .map(|(key, bytes)| decode(key, bytes))
            .collect()
    }

    /// Read every document under a prefix as untyped JSON, keyed.
    ///
    /// Used by data migrations that must see fields the current types no
    /// longer declare.
    ///
    /// # Errors
    ///
    /// Same as [`scan`](Self::scan).
    pub async fn scan_raw(
        &self,
        prefix: &str,
    ) -> Result<Vec<(String, serde_json::Value)>, StoreError> {
        let entries = self.storage.scan(prefix).await?;
        entries
            .into_iter()
            .map(|(key, bytes)| {
                let value = decode(&key, &bytes)?;
                Ok((key, value))
            })
            .collect()
    }

    /// Write untyped JSON at a key. Counterpart of [`scan_raw`](Self::scan_raw).
    ///
    /// # Errors
    ///
    /// Same as [`put`](Self::put).
    pub async fn put_raw(&self, key: &str, value: &serde_json::Value) -> Result<(), StoreError> {
        self.put(key, value).await
    }
}

fn decode<T: DeserializeOwned>(key: &str, bytes: &[u8]) -> Result<T, StoreError> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Codec {
        key: key.to_owned(),
        reason: e.to_string(),
    })
}

impl fmt::Debug for DocumentStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DocumentStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use vivid_storage::MemoryBackend;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Doc {
        name: String,
        qty: u32,
    }

    fn make_store() -> (DocumentStore, MemoryBackend) {
        let backend = MemoryBackend::new();
        let store = DocumentStore::new(Arc::new(backend.clone()));
        (store, backend)
    }

    #[tokio::test]
    async fn put_then_get_decodes_document() {
        let (store, _) = make_store();
        let doc = Doc { name: "lamp".to_owned(), qty: 2 };
        store.put("products/p1", &doc).await.unwrap();
        let back: Option<Doc> = store.get("products/p1").await.unwrap();
        assert_eq!(back, Some(doc));
    }

    #[tokio::test]
    async fn missing_document_is_none() {
        let (store, _) = make_store();
        let back: Option<Doc> = store.get("products/none").await.unwrap();
        assert!(back.is_none());
    }

    #[tokio::test]
    async fn garbage_bytes_surface_codec_error() {
        let (store, backend) = make_store();
        backend.put("products/bad", b"not json").await.unwrap();
        let result = store.get::<Doc>("products/bad").await;
        assert!(matches!(result, Err(StoreError::Codec { ref key, .. }) if key == "products/bad"));
    }

    #[tokio::test]
    async fn scan_only_returns_collection_members() {
        let (store, _) = make_store();
        store.put("orders/a", &Doc { name: "a".to_owned(), qty: 1 }).await.unwrap();
        store.put("orders/b", &Doc { name: "b".to_owned(), qty: 2 }).await.unwrap();
        store.put("users/u", &Doc { name: "u".to_owned(), qty: 3 }).await.unwrap();

        let docs: Vec<Doc> = store.scan("orders/").await.unwrap();
        let names: Vec<_> = docs.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[tokio::test]
    async fn delete_then_exists_is_false() {
        let (store, _) = make_store();
        store.put("bans/x", &Doc { name: "x".to_owned(), qty: 0 }).await.unwrap();
        assert!(store.exists("bans/x").await.unwrap());
        store.delete("bans/x").await.unwrap();
        assert!(!store.exists("bans/x").await.unwrap());
    }

    #[tokio::test]
    async fn scan_raw_keeps_unknown_fields() {
        let (store, backend) = make_store();
        backend
            .put("products/old", br#"{"name":"Mug","imageUrl":"http://img/mug.jpg"}"#)
            .await
            .unwrap();
        let raw = store.scan_raw("products/").await.unwrap();
        assert_eq!(raw.len(), 1);
        assert_eq!(raw[0].1["imageUrl"], "http://img/mug.jpg");
    }
}
