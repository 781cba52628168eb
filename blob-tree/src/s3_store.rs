use std::env;

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_credential_types::Credentials;
use aws_sdk_s3::{primitives::ByteStream as AwsByteStream, types::ObjectCannedAcl, Client};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::debug;

use crate::store::{bytes_stream, collect_stream};
use crate::{BlobError, BlobInfo, BlobResult, BlobStore, ByteStream, GetResult, ObjectHead, PutResult};

/// S3-compatible storage settings (AWS S3, DigitalOcean Spaces, MinIO, ...)
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    pub region: String,
    /// Custom endpoint, e.g. `https://nyc3.digitaloceanspaces.com`
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Static credentials; when absent the SDK default provider chain is used
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<String>,
    #[serde(default)]
    pub force_path_style: bool,
    /// Canned ACL applied to every put, e.g. `public-read` for a public gallery
    #[serde(default)]
    pub acl: Option<String>,
}

impl S3Config {
    /// Settings for `bucket` in `region` with SDK defaults for the rest
    pub fn new<B: Into<String>, R: Into<String>>(bucket: B, region: R) -> Self {
        Self {
            bucket: bucket.into(),
            region: region.into(),
            endpoint_url: None,
            access_key_id: None,
            secret_access_key: None,
            force_path_style: false,
            acl: None,
        }
    }

    /// Use a custom endpoint instead of AWS
    pub fn with_endpoint<S: Into<String>>(mut self, endpoint_url: S) -> Self {
        self.endpoint_url = Some(endpoint_url.into());
        self
    }

    /// Use static credentials instead of the SDK provider chain
    pub fn with_credentials<A: Into<String>, S: Into<String>>(
        mut self,
        access_key_id: A,
        secret_access_key: S,
    ) -> Self {
        self.access_key_id = Some(access_key_id.into());
        self.secret_access_key = Some(secret_access_key.into());
        self
    }

    /// Address the bucket in the path (MinIO and similar)
    pub fn with_path_style(mut self) -> Self {
        self.force_path_style = true;
        self
    }

    /// Canned ACL for every upload, e.g. `public-read`
    pub fn with_acl<S: Into<String>>(mut self, acl: S) -> Self {
        self.acl = Some(acl.into());
        self
    }

    /// Read `S3_BUCKET`, `S3_REGION` and the optional `S3_ENDPOINT_URL`,
    /// `S3_ACCESS_KEY_ID`, `S3_SECRET_ACCESS_KEY`, `S3_FORCE_PATH_STYLE`,
    /// `S3_ACL`.
    ///
    /// For binaries only; the directory client never reads the environment.
    pub fn from_env() -> BlobResult<Self> {
        fn required(key: &str) -> BlobResult<String> {
            env::var(key).map_err(|_| BlobError::invalid(format!("{} environment variable required", key)))
        }

        Ok(Self {
            bucket: required("S3_BUCKET")?,
            region: required("S3_REGION")?,
            endpoint_url: env::var("S3_ENDPOINT_URL").ok(),
            access_key_id: env::var("S3_ACCESS_KEY_ID").ok(),
            secret_access_key: env::var("S3_SECRET_ACCESS_KEY").ok(),
            force_path_style: env::var("S3_FORCE_PATH_STYLE")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            acl: env::var("S3_ACL").ok(),
        })
    }
}

/// Store backed by any S3-compatible service through the AWS SDK
#[derive(Clone)]
pub struct S3CompatibleStore {
    client: Client,
    bucket: String,
    acl: Option<ObjectCannedAcl>,
}

impl S3CompatibleStore {
    /// Build the client and probe the bucket so bad credentials or a wrong
    /// endpoint fail here rather than on the first transfer.
    pub async fn connect(config: S3Config) -> BlobResult<Self> {
        let client = Self::create_client(&config).await;
        let mut store = Self::from_client(client, config.bucket);
        if let Some(acl) = config.acl.as_deref() {
            store = store.with_acl(acl);
        }

        store
            .client
            .head_bucket()
            .bucket(&store.bucket)
            .send()
            .await
            .map_err(|e| BlobError::connection_with(format!("bucket {} is not reachable", store.bucket), e))?;

        debug!("Connected to bucket {}", store.bucket);
        Ok(store)
    }

    /// Wrap an existing SDK client without probing
    pub fn from_client<S: Into<String>>(client: Client, bucket: S) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            acl: None,
        }
    }

    /// Apply a canned ACL (`private`, `public-read`, ...) to every put
    pub fn with_acl(mut self, acl: &str) -> Self {
        self.acl = Some(ObjectCannedAcl::from(acl));
        self
    }

    async fn create_client(config: &S3Config) -> Client {
        let mut loader = aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region.clone()));

        if let (Some(access_key_id), Some(secret_access_key)) = (&config.access_key_id, &config.secret_access_key) {
            let credentials = Credentials::new(
                access_key_id.clone(),
                secret_access_key.clone(),
                None,
                None,
                "blob-tree",
            );
            loader = loader.credentials_provider(credentials);
        }

        if let Some(endpoint_url) = &config.endpoint_url {
            loader = loader.endpoint_url(endpoint_url.clone());
        }

        let sdk_config = loader.load().await;

        Client::from_conf(
            aws_sdk_s3::config::Builder::from(&sdk_config)
                .force_path_style(config.force_path_style)
                .build(),
        )
    }

    fn map_aws_error(err: impl std::error::Error + Send + Sync + 'static) -> BlobError {
        BlobError::backend(err)
    }

    fn to_utc(dt: &aws_sdk_s3::primitives::DateTime) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(dt.secs(), dt.subsec_nanos())
    }
}

#[async_trait]
impl BlobStore for S3CompatibleStore {
    fn container(&self) -> &str {
        &self.bucket
    }

    async fn put(
        &self,
        key: &str,
        content_type: Option<&str>,
        stream: ByteStream,
    ) -> BlobResult<PutResult> {
        let data = collect_stream(stream).await?;
        let size_bytes = data.len() as u64;

        let mut request = self
            .client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(AwsByteStream::from(data));

        if let Some(ct) = content_type {
            request = request.content_type(ct);
        }
        if let Some(acl) = &self.acl {
            request = request.acl(acl.clone());
        }

        let result = request.send().await.map_err(Self::map_aws_error)?;

        Ok(PutResult {
            etag: result.e_tag().map(str::to_string),
            size_bytes,
        })
    }

    async fn get(&self, key: &str) -> BlobResult<GetResult> {
        let result = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err.as_service_error().map(|e| e.is_no_such_key()).unwrap_or(false);
                if missing {
                    BlobError::not_found(key)
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        let content_type = result.content_type().map(str::to_string);
        let etag = result.e_tag().map(str::to_string);
        let body = result.body.collect().await.map_err(Self::map_aws_error)?.into_bytes();

        Ok(GetResult {
            size_bytes: body.len() as u64,
            content_type,
            etag,
            stream: bytes_stream(body),
        })
    }

    async fn head(&self, key: &str) -> BlobResult<ObjectHead> {
        let result = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|err| {
                let missing = err.as_service_error().map(|e| e.is_not_found()).unwrap_or(false);
                if missing {
                    BlobError::not_found(key)
                } else {
                    Self::map_aws_error(err)
                }
            })?;

        Ok(ObjectHead {
            size_bytes: result.content_length().unwrap_or(0).max(0) as u64,
            content_type: result.content_type().map(str::to_string),
            etag: result.e_tag().map(str::to_string),
            last_modified: result.last_modified().and_then(Self::to_utc),
        })
    }

    // S3 answers 204 for missing keys, so NotFound never surfaces here.
    async fn delete(&self, key: &str) -> BlobResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(Self::map_aws_error)?;
        Ok(())
    }

    async fn list(&self, prefix: &str) -> BlobResult<Vec<BlobInfo>> {
        let mut blobs = Vec::new();
        let mut continuation_token: Option<String> = None;

        loop {
            let mut request = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .prefix(prefix);

            if let Some(token) = continuation_token.take() {
                request = request.continuation_token(token);
            }

            let result = request.send().await.map_err(Self::map_aws_error)?;

            for object in result.contents() {
                if let Some(key) = object.key() {
                    blobs.push(BlobInfo {
                        key: key.to_string(),
                        size_bytes: object.size().unwrap_or(0).max(0) as u64,
                        content_type: None,
                        etag: object.e_tag().map(str::to_string),
                        last_modified: object.last_modified().and_then(Self::to_utc),
                    });
                }
            }

            continuation_token = result.next_continuation_token().map(str::to_string);
            if continuation_token.is_none() {
                break;
            }
        }

        debug!("Listed {} objects under {:?} in {}", blobs.len(), prefix, self.bucket);
        Ok(blobs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_builder() {
        let config = S3Config::new("stains", "nyc3")
            .with_endpoint("https://nyc3.digitaloceanspaces.com")
            .with_credentials("key", "secret")
            .with_path_style();

        assert_eq!(config.bucket, "stains");
        assert_eq!(config.endpoint_url.as_deref(), Some("https://nyc3.digitaloceanspaces.com"));
        assert_eq!(config.access_key_id.as_deref(), Some("key"));
        assert!(config.force_path_style);
        assert_eq!(config.acl, None);
    }

    #[test]
    fn test_config_from_env() {
        env::set_var("S3_BUCKET", "stains");
        env::set_var("S3_REGION", "nyc3");
        env::set_var("S3_FORCE_PATH_STYLE", "true");
        env::set_var("S3_ACL", "public-read");

        let config = S3Config::from_env().unwrap();
        assert_eq!(config.bucket, "stains");
        assert_eq!(config.region, "nyc3");
        assert!(config.force_path_style);
        assert_eq!(config.acl.as_deref(), Some("public-read"));

        env::remove_var("S3_BUCKET");
        let err = S3Config::from_env().unwrap_err();
        assert!(matches!(err, BlobError::Invalid { .. }));

        env::remove_var("S3_REGION");
        env::remove_var("S3_FORCE_PATH_STYLE");
        env::remove_var("S3_ACL");
    }

    #[test]
    fn test_store_acl_is_parsed() {
        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("nyc3"))
            .build();
        let store = S3CompatibleStore::from_client(Client::from_conf(sdk_config), "stains").with_acl("public-read");

        assert_eq!(store.acl, Some(ObjectCannedAcl::PublicRead));
    }

    #[tokio::test]
    async fn test_from_client_binds_bucket() {
        let sdk_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("nyc3"))
            .build();
        let store = S3CompatibleStore::from_client(Client::from_conf(sdk_config), "stains");

        assert_eq!(store.container(), "stains");
    }
}
