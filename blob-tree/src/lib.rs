//! # blob-tree: directory trees on flat blob storage
//!
//! `blob-tree` keeps a local directory tree and a container in an object
//! store in step. Object stores have no directories, only keys; this crate
//! treats `/`-separated key segments as a pseudo-directory tree and offers
//! the tree operations a media pipeline needs: upload, download, listing
//! and recursive delete.
//!
//! ## Key Features
//!
//! - **Tree operations**: upload/download whole directories, list files or
//!   pseudo-directories, recursive delete, container-to-container mirroring
//! - **Storage agnostic**: S3-compatible stores (AWS S3, DigitalOcean Spaces),
//!   Azure Blob Storage (`azure` feature) and an in-memory store
//! - **Explicit batch results**: every per-file failure is reported, nothing
//!   is silently dropped
//! - **Bounded concurrency**: per-file calls run through a small pool
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use blob_tree::prelude::*;
//! use std::path::Path;
//!
//! # #[tokio::main]
//! # async fn main() -> BlobResult<()> {
//! let store = StoreConfig::S3(
//!     S3Config::new("stains", "nyc3").with_endpoint("https://nyc3.digitaloceanspaces.com"),
//! );
//! let client = BlobDirClient::connect(store, TreeConfig::default()).await?;
//!
//! // stains/phb/0001.png lands at key phb/0001.png
//! client.upload(Path::new("stains/phb"), "").await?.into_result()?;
//!
//! // and comes back as out/phb/0001.png
//! client.download("phb", Path::new("out/")).await?.into_result()?;
//!
//! for dir in client.list_dirs("", true).await? {
//!     println!("{}", dir);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │  Your command   │  ← CLI, CI job, backup script
//! ├─────────────────┤
//! │  BlobDirClient  │  ← Tree ⇄ key mapping, batching
//! ├─────────────────┤
//! │    BlobStore    │  ← put / get / head / delete / list
//! └─────────────────┘
//! ```

mod client;
mod config;
mod content;
mod error;
mod memory_store;
pub mod path;
mod report;
mod s3_store;
pub mod store;

#[cfg(feature = "azure")]
mod azure_store;

// Re-export main types for clean API
pub use client::BlobDirClient;
pub use config::{DownloadMode, StoreConfig, TreeConfig, UploadMode};
pub use content::{ContentTypes, DEFAULT_CONTENT_TYPE};
pub use error::{BlobError, BlobResult};
pub use memory_store::MemoryBlobStore;
pub use path::BlobPath;
pub use report::{BatchFailure, BatchReport};
pub use s3_store::{S3CompatibleStore, S3Config};
pub use store::{BlobInfo, BlobStore, ByteStream, GetResult, ObjectHead, PutResult};

#[cfg(feature = "azure")]
pub use azure_store::{AzureBlobStore, AzureConfig};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::{
        BatchReport, BlobDirClient, BlobError, BlobPath, BlobResult, BlobStore, MemoryBlobStore, S3Config,
        StoreConfig, TreeConfig,
    };
}
