use thiserror::Error;

use crate::report::BatchFailure;

/// Result type for blob tree operations
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while moving trees between disk and a blob store
#[derive(Error, Debug)]
pub enum BlobError {
    #[error("Blob not found: {key}")]
    NotFound { key: String },

    #[error("Invalid request: {message}")]
    Invalid { message: String },

    #[error("Connection failed: {message}")]
    Connection {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Upload of {path} failed: {source}")]
    Upload {
        path: String,
        #[source]
        source: Box<BlobError>,
    },

    #[error("Download of {key} failed: {source}")]
    Download {
        key: String,
        #[source]
        source: Box<BlobError>,
    },

    #[error("Delete of {key} failed: {source}")]
    Delete {
        key: String,
        #[source]
        source: Box<BlobError>,
    },

    #[error("Mirror of {key} failed: {source}")]
    Mirror {
        key: String,
        #[source]
        source: Box<BlobError>,
    },

    #[error("{} of {total} operations failed", .failures.len())]
    Batch {
        total: usize,
        failures: Vec<BatchFailure>,
    },

    #[error("Storage backend error: {source}")]
    Backend {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("I/O error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
}

impl BlobError {
    /// Create a backend error from any error type
    pub fn backend<E>(error: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend {
            source: Box::new(error),
        }
    }

    /// Create an invalid request (precondition) error
    pub fn invalid<S: Into<String>>(message: S) -> Self {
        Self::Invalid {
            message: message.into(),
        }
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(key: S) -> Self {
        Self::NotFound { key: key.into() }
    }

    /// Create a connection error without an underlying cause
    pub fn connection<S: Into<String>>(message: S) -> Self {
        Self::Connection {
            message: message.into(),
            source: None,
        }
    }

    /// Create a connection error wrapping the SDK failure
    pub fn connection_with<S, E>(message: S, error: E) -> Self
    where
        S: Into<String>,
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Connection {
            message: message.into(),
            source: Some(Box::new(error)),
        }
    }

    /// Wrap a failure for one local file of an upload
    pub fn upload<S: Into<String>>(path: S, source: BlobError) -> Self {
        Self::Upload {
            path: path.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure for one key of a download
    pub fn download<S: Into<String>>(key: S, source: BlobError) -> Self {
        Self::Download {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure for one key of a delete
    pub fn delete<S: Into<String>>(key: S, source: BlobError) -> Self {
        Self::Delete {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// Wrap a failure for one key of a mirror
    pub fn mirror<S: Into<String>>(key: S, source: BlobError) -> Self {
        Self::Mirror {
            key: key.into(),
            source: Box::new(source),
        }
    }

    /// True when the store reported the key as missing
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }
}
