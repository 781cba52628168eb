use serde::Deserialize;

#[cfg(feature = "azure")]
use crate::AzureConfig;
use crate::S3Config;

/// What to do when an upload targets a key that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadMode {
    /// Write unconditionally (no existence check)
    #[default]
    Overwrite,
    /// Probe the key first and leave existing blobs alone
    SkipExisting,
}

/// What to do when a download targets a local file that already exists
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DownloadMode {
    #[default]
    Overwrite,
    /// Keep the local file and count the blob as skipped
    SkipExisting,
}

/// Configuration for tree operations
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Upper bound on in-flight per-file store calls within one batch.
    /// `1` processes units strictly one after another.
    pub concurrency: usize,

    /// Overwrite or skip keys that already exist
    pub upload_mode: UploadMode,

    /// Overwrite or keep local files that already exist
    pub download_mode: DownloadMode,

    /// Attach a content type guessed from the file extension to each put
    pub guess_content_type: bool,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            upload_mode: UploadMode::Overwrite,
            download_mode: DownloadMode::Overwrite,
            guess_content_type: true,
        }
    }
}

impl TreeConfig {
    /// Create a new config with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the batch concurrency (clamped to at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Process one unit at a time
    pub fn sequential(self) -> Self {
        self.with_concurrency(1)
    }

    /// Leave existing blobs untouched on upload
    pub fn skip_existing(mut self) -> Self {
        self.upload_mode = UploadMode::SkipExisting;
        self
    }

    /// Leave existing local files untouched on download
    pub fn keep_local_files(mut self) -> Self {
        self.download_mode = DownloadMode::SkipExisting;
        self
    }

    /// Do not attach guessed content types on upload
    pub fn without_content_types(mut self) -> Self {
        self.guess_content_type = false;
        self
    }

    pub(crate) fn effective_concurrency(&self) -> usize {
        self.concurrency.max(1)
    }
}

/// Which backend a client binds to, and how to reach it
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// S3-compatible object storage (AWS S3, DigitalOcean Spaces, ...)
    S3(S3Config),
    /// Azure Blob Storage
    #[cfg(feature = "azure")]
    Azure(AzureConfig),
    /// Process-local store, mainly for tests
    Memory { container: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = TreeConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.upload_mode, UploadMode::Overwrite);
        assert_eq!(config.download_mode, DownloadMode::Overwrite);
        assert!(config.guess_content_type);
    }

    #[test]
    fn test_builder_clamps_concurrency() {
        let config = TreeConfig::new().with_concurrency(0).skip_existing();
        assert_eq!(config.concurrency, 1);
        assert_eq!(config.upload_mode, UploadMode::SkipExisting);

        let config = TreeConfig::new().keep_local_files();
        assert_eq!(config.download_mode, DownloadMode::SkipExisting);
    }

    #[test]
    fn test_effective_concurrency_guards_zero() {
        let config = TreeConfig {
            concurrency: 0,
            ..TreeConfig::default()
        };
        assert_eq!(config.effective_concurrency(), 1);
    }
}
