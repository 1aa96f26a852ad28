//! Blob store abstraction trait
//!
//! This module defines the BlobStore trait that all storage backends must implement.

use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use relay_core::RelayError;
use thiserror::Error;

/// Storage operation errors
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Read failed: {0}")]
    ReadFailed(String),

    #[error("Blob not found: {0}")]
    NotFound(String),

    #[error("Invalid blob name: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

impl From<StorageError> for RelayError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::NotFound(name) => RelayError::BlobNotFound(name),
            StorageError::ConfigError(message) => RelayError::Config(message),
            other => RelayError::StorageWriteFailed(other.to_string()),
        }
    }
}

/// A blob read back from a store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredBlob {
    pub data: Bytes,
    /// Content type recorded at write time, when the backend keeps one.
    pub content_type: Option<String>,
}

/// Blob store abstraction trait
///
/// A store addresses blobs by name inside a single container. Implementations
/// never derive names from caller input beyond validating them; the pipeline
/// generates names with [`crate::generate_blob_name`].
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Write `data` under `name`, replacing any previous content, and return
    /// the blob's externally resolvable URL. `content_type` is recorded with
    /// the blob and returned by [`BlobStore::get`].
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> StorageResult<String>;

    /// Read a blob. Returns `StorageError::NotFound` when absent.
    async fn get(&self, name: &str) -> StorageResult<StoredBlob>;

    async fn exists(&self, name: &str) -> StorageResult<bool>;

    /// Externally resolvable URL for `name`, whether or not it exists yet.
    fn url_for(&self, name: &str) -> String;

    /// Container (bucket or directory) this store is bound to.
    fn container(&self) -> &str;

    fn backend_type(&self) -> StorageBackend;
}

/// Reject names that could escape the container.
pub(crate) fn validate_blob_name(name: &str) -> StorageResult<()> {
    if name.is_empty() {
        return Err(StorageError::InvalidKey("Blob name is empty".to_string()));
    }
    if name.contains("..") || name.starts_with('/') || name.contains('\\') {
        return Err(StorageError::InvalidKey(format!(
            "Blob name contains invalid characters: {}",
            name
        )));
    }
    Ok(())
}
