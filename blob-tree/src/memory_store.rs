use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::store::{bytes_stream, collect_stream};
use crate::{BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult};

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// In-memory store for testing and development.
///
/// Keys live in a `BTreeMap`, so listings come back in lexicographic order
/// like the cloud stores. Clones share the same contents.
#[derive(Clone)]
pub struct MemoryBlobStore {
    container: String,
    blobs: Arc<RwLock<BTreeMap<String, StoredBlob>>>,
    /// Keys whose writes, reads and deletes are forced to fail
    failing: Arc<RwLock<HashSet<String>>>,
}

impl MemoryBlobStore {
    /// Create an empty store for `container`
    pub fn new<S: Into<String>>(container: S) -> Self {
        Self {
            container: container.into(),
            blobs: Arc::new(RwLock::new(BTreeMap::new())),
            failing: Arc::new(RwLock::new(HashSet::new())),
        }
    }

    /// Insert a blob directly, bypassing the async API
    pub fn insert<K: Into<String>, D: Into<Bytes>>(&self, key: K, data: D) {
        self.blobs.write().insert(
            key.into(),
            StoredBlob {
                data: data.into(),
                content_type: None,
                last_modified: Utc::now(),
            },
        );
    }

    /// Raw contents of a blob, if present
    pub fn contents(&self, key: &str) -> Option<Bytes> {
        self.blobs.read().get(key).map(|b| b.data.clone())
    }

    /// Stored content type of a blob, if present
    pub fn content_type_of(&self, key: &str) -> Option<String> {
        self.blobs.read().get(key).and_then(|b| b.content_type.clone())
    }

    /// All keys in listing order
    pub fn keys(&self) -> Vec<String> {
        self.blobs.read().keys().cloned().collect()
    }

    /// Number of stored blobs
    pub fn len(&self) -> usize {
        self.blobs.read().len()
    }

    /// Whether the store holds no blobs
    pub fn is_empty(&self) -> bool {
        self.blobs.read().is_empty()
    }

    /// Make every operation on `key` fail with a backend error
    pub fn fail_key<S: Into<String>>(&self, key: S) {
        self.failing.write().insert(key.into());
    }

    fn check_failing(&self, key: &str) -> BlobResult<()> {
        if self.failing.read().contains(key) {
            return Err(BlobError::backend(std::io::Error::new(
                std::io::ErrorKind::Other,
                format!("injected failure for {}", key),
            )));
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        self.check_failing(key)?;
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;

        self.blobs.write().insert(
            key.to_string(),
            StoredBlob {
                data,
                content_type: content_type.map(str::to_string),
                last_modified: Utc::now(),
            },
        );

        Ok(PutResult {
            etag: None,
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        self.check_failing(key)?;
        let blob = self
            .blobs
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| BlobError::not_found(key))?;

        Ok(GetResult {
            size_bytes: blob.data.len() as u64,
            content_type: blob.content_type,
            etag: None,
            stream: bytes_stream(blob.data),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        self.check_failing(key)?;
        let blobs = self.blobs.read();
        let blob = blobs.get(key).ok_or_else(|| BlobError::not_found(key))?;

        Ok(ObjectHead {
            size_bytes: blob.data.len() as u64,
            content_type: blob.content_type.clone(),
            etag: None,
            last_modified: Some(blob.last_modified),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.check_failing(key)?;
        match self.blobs.write().remove(key) {
            Some(_) => Ok(()),
            None => Err(BlobError::not_found(key)),
        }
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>> {
        let blobs = self.blobs.read();
        let infos = blobs
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, blob)| BlobInfo {
                key: key.clone(),
                size_bytes: blob.data.len() as u64,
                content_type: blob.content_type.clone(),
                etag: None,
                last_modified: Some(blob.last_modified),
            })
            .collect();
        Ok(infos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_list_is_prefix_scoped_and_ordered() {
        let store = MemoryBlobStore::new("stains");
        store.insert("phb/0002.png", "b");
        store.insert("dmg/0001.png", "a");
        store.insert("phb/0001.png", "c");
        store.insert("phbx/0001.png", "d");

        let keys: Vec<String> = store
            .list("phb/")
            .await
            .unwrap()
            .into_iter()
            .map(|i| i.key)
            .collect();

        assert_eq!(keys, vec!["phb/0001.png", "phb/0002.png"]);
    }

    #[tokio::test]
    async fn test_delete_missing_is_not_found() {
        let store = MemoryBlobStore::new("stains");
        let err = store.delete("nope.png").await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_failing_key_rejects_put() {
        let store = MemoryBlobStore::new("stains");
        store.fail_key("bad.png");

        let result = store
            .put("bad.png", None, bytes_stream(Bytes::from_static(b"x")))
            .await;

        assert!(matches!(result, Err(BlobError::Backend { .. })));
        assert!(store.is_empty());
    }
}
