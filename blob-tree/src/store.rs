use std::pin::Pin;

use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use chrono::{DateTime, Utc};
use futures::{Stream, StreamExt};

use crate::{BlobError, BlobResult};

/// Stream of bytes for blob content
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, std::io::Error>> + Send>>;

/// Flat key/value blob storage with prefix listing - implemented by every backend.
///
/// Backends report a missing key as [`BlobError::NotFound`] and every other
/// failure as-is; the directory client decides what NotFound means for each
/// operation.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Container or bucket this store is bound to
    fn container(&self) -> &str;

    /// Store a blob from a stream, overwriting any existing blob at `key`
    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult>;

    /// Get a blob as a stream
    async fn get(&self, key: &str) -> BlobResult<GetResult>;

    /// Get blob metadata without content
    async fn head(&self, key: &str) -> BlobResult<ObjectHead>;

    /// Delete a blob
    async fn delete(&self, key: &str) -> BlobResult<()>;

    /// List every blob whose key starts with `prefix`, as one logical
    /// sequence (pagination is consumed inside the backend)
    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>>;
}

/// Result of a successful put operation
#[derive(Debug, Clone)]
pub struct PutResult {
    pub etag: Option<String>,
    pub size_bytes: u64,
}

/// Result of a get operation
pub struct GetResult {
    pub stream: ByteStream,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
}

/// Metadata about a blob
#[derive(Debug, Clone)]
pub struct ObjectHead {
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

/// One entry of a prefix listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlobInfo {
    /// Full key inside the container
    pub key: String,
    pub size_bytes: u64,
    pub content_type: Option<String>,
    pub etag: Option<String>,
    pub last_modified: Option<DateTime<Utc>>,
}

impl BlobInfo {
    /// Listing entry with only key and size known
    pub fn new<S: Into<String>>(key: S, size_bytes: u64) -> Self {
        Self {
            key: key.into(),
            size_bytes,
            content_type: None,
            etag: None,
            last_modified: None,
        }
    }
}

/// Wrap an in-memory payload as a single-chunk stream
pub fn bytes_stream(data: Bytes) -> ByteStream {
    Box::pin(futures::stream::once(async move { Ok(data) }))
}

/// Drain a stream into one contiguous buffer
pub async fn collect_stream(mut stream: ByteStream) -> BlobResult<Bytes> {
    let mut data = BytesMut::new();
    while let Some(chunk) = stream.next().await {
        let chunk = chunk.map_err(BlobError::from)?;
        data.extend_from_slice(&chunk);
    }
    Ok(data.freeze())
}
