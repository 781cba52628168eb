use async_trait::async_trait;
use azure_core::StatusCode;
use azure_storage::ConnectionString;
use azure_storage_blobs::prelude::*;
use chrono::{DateTime, Utc};
use futures::StreamExt;
use serde::Deserialize;
use tracing::debug;

use crate::store::{bytes_stream, collect_stream};
use crate::{BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult};

/// Azure Blob Storage settings
#[derive(Debug, Clone, Deserialize)]
pub struct AzureConfig {
    /// Storage account connection string
    /// (`DefaultEndpointsProtocol=https;AccountName=...;AccountKey=...`)
    pub connection_string: String,
    pub container: String,
}

impl AzureConfig {
    /// Settings for a connection string and container
    pub fn new<C: Into<String>, N: Into<String>>(connection_string: C, container: N) -> Self {
        Self {
            connection_string: connection_string.into(),
            container: container.into(),
        }
    }
}

/// Store backed by one Azure Blob Storage container
#[derive(Clone)]
pub struct AzureBlobStore {
    container_client: ContainerClient,
    container: String,
}

impl AzureBlobStore {
    /// Parse the connection string and probe the container eagerly
    pub async fn connect(config: AzureConfig) -> BlobResult<Self> {
        let connection = ConnectionString::new(&config.connection_string)
            .map_err(|e| BlobError::connection_with("invalid Azure connection string", e))?;
        let account = connection
            .account_name
            .ok_or_else(|| BlobError::connection("Azure connection string has no AccountName"))?
            .to_string();
        let credentials = connection
            .storage_credentials()
            .map_err(|e| BlobError::connection_with("unusable Azure credentials", e))?;

        let container_client = ClientBuilder::new(account, credentials).container_client(config.container.clone());

        container_client
            .get_properties()
            .await
            .map_err(|e| BlobError::connection_with(format!("container {} is not reachable", config.container), e))?;

        debug!("Connected to container {}", config.container);
        Ok(Self {
            container_client,
            container: config.container,
        })
    }

    fn map_azure_error(key: &str, err: azure_core::Error) -> BlobError {
        let missing = err
            .as_http_error()
            .map(|http| http.status() == StatusCode::NotFound)
            .unwrap_or(false);
        if missing {
            BlobError::not_found(key)
        } else {
            BlobError::backend(err)
        }
    }

    fn to_utc(dt: &time::OffsetDateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(dt.unix_timestamp(), dt.nanosecond())
    }
}

#[async_trait]
impl BlobStore for AzureBlobStore {
    fn container(&self) -> &str {
        &self.container
    }

    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;

        let mut request = self.container_client.blob_client(key).put_block_blob(data);
        if let Some(ct) = content_type {
            request = request.content_type(ct.to_string());
        }

        let result = request.await.map_err(|e| Self::map_azure_error(key, e))?;

        Ok(PutResult {
            etag: Some(result.etag),
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let blob_client = self.container_client.blob_client(key);
        let properties = blob_client
            .get_properties()
            .await
            .map_err(|e| Self::map_azure_error(key, e))?;
        let data = blob_client
            .get_content()
            .await
            .map_err(|e| Self::map_azure_error(key, e))?;

        Ok(GetResult {
            size_bytes: data.len() as u64,
            content_type: Some(properties.blob.properties.content_type),
            etag: Some(properties.blob.properties.etag.to_string()),
            stream: bytes_stream(data.into()),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let properties = self
            .container_client
            .blob_client(key)
            .get_properties()
            .await
            .map_err(|e| Self::map_azure_error(key, e))?;
        let props = properties.blob.properties;

        Ok(ObjectHead {
            size_bytes: props.content_length,
            content_type: Some(props.content_type),
            etag: Some(props.etag.to_string()),
            last_modified: Self::to_utc(&props.last_modified),
        })
    }

    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.container_client
            .blob_client(key)
            .delete()
            .await
            .map_err(|e| Self::map_azure_error(key, e))?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>> {
        let mut pages = self
            .container_client
            .list_blobs()
            .prefix(prefix.to_string())
            .into_stream();

        let mut blobs = Vec::new();
        while let Some(page) = pages.next().await {
            let page = page.map_err(BlobError::backend)?;
            for blob in page.blobs.blobs() {
                blobs.push(BlobInfo {
                    key: blob.name.clone(),
                    size_bytes: blob.properties.content_length,
                    content_type: Some(blob.properties.content_type.clone()),
                    etag: Some(blob.properties.etag.to_string()),
                    last_modified: Self::to_utc(&blob.properties.last_modified),
                });
            }
        }

        debug!("Listed {} blobs under {:?} in {}", blobs.len(), prefix, self.container);
        Ok(blobs)
    }
}
