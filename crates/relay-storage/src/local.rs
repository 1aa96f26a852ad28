use crate::traits::{validate_blob_name, BlobStore, StorageError, StorageResult, StoredBlob};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Directory under the base path holding one content type file per blob,
/// mirrored per container.
const CONTENT_TYPE_DIR: &str = ".content-types";

/// Local filesystem blob store bound to one container directory
#[derive(Clone)]
pub struct LocalStorage {
    container: String,
    container_path: PathBuf,
    content_types_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new LocalStorage instance
    ///
    /// # Arguments
    /// * `base_path` - Root directory for all containers (e.g., "/var/lib/relay")
    /// * `base_url` - Base URL the root directory is served from (e.g., "http://localhost:8080/blobs")
    /// * `container` - Container name; blobs live in `{base_path}/{container}`
    pub async fn new(
        base_path: impl Into<PathBuf>,
        base_url: String,
        container: &str,
    ) -> StorageResult<Self> {
        validate_blob_name(container)
            .map_err(|_| StorageError::ConfigError(format!("Invalid container name: {}", container)))?;
        let base_path = base_path.into();
        let container_path = base_path.join(container);
        let content_types_path = base_path.join(CONTENT_TYPE_DIR).join(container);

        for dir in [&container_path, &content_types_path] {
            fs::create_dir_all(dir).await.map_err(|e| {
                StorageError::ConfigError(format!(
                    "Failed to create storage directory {}: {}",
                    dir.display(),
                    e
                ))
            })?;
        }

        Ok(LocalStorage {
            container: container.to_string(),
            container_path,
            content_types_path,
            base_url,
        })
    }

    /// Convert a blob name to a filesystem path inside the container directory.
    fn name_to_path(&self, name: &str) -> StorageResult<PathBuf> {
        validate_blob_name(name)?;
        let path = self.container_path.join(name);
        if path.parent() != Some(self.container_path.as_path()) {
            return Err(StorageError::InvalidKey(
                "Blob name resolves outside the container directory".to_string(),
            ));
        }
        Ok(path)
    }

    async fn write_file(path: &Path, data: &[u8]) -> StorageResult<()> {
        let mut file = fs::File::create(path).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to create file {}: {}", path.display(), e))
        })?;

        file.write_all(data).await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to write file {}: {}", path.display(), e))
        })?;

        file.sync_all().await.map_err(|e| {
            StorageError::WriteFailed(format!("Failed to sync file {}: {}", path.display(), e))
        })?;

        Ok(())
    }
}

#[async_trait]
impl BlobStore for LocalStorage {
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        let path = self.name_to_path(name)?;
        let size = data.len();
        let start = std::time::Instant::now();

        Self::write_file(&path, &data).await?;
        Self::write_file(&self.content_types_path.join(name), content_type.as_bytes()).await?;

        tracing::info!(
            path = %path.display(),
            blob_name = %name,
            content_type = %content_type,
            size_bytes = size,
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage put successful"
        );

        Ok(self.url_for(name))
    }

    async fn get(&self, name: &str) -> StorageResult<StoredBlob> {
        let path = self.name_to_path(name)?;
        let start = std::time::Instant::now();

        if !fs::try_exists(&path).await.unwrap_or(false) {
            return Err(StorageError::NotFound(name.to_string()));
        }

        let data = fs::read(&path).await.map_err(|e| {
            StorageError::ReadFailed(format!("Failed to read file {}: {}", path.display(), e))
        })?;

        tracing::debug!(
            path = %path.display(),
            blob_name = %name,
            size_bytes = data.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "Local storage get successful"
        );

        // Blobs written before content types were recorded have no sidecar.
        let content_type = fs::read_to_string(self.content_types_path.join(name))
            .await
            .ok()
            .filter(|ct| !ct.is_empty());

        Ok(StoredBlob {
            data: Bytes::from(data),
            content_type,
        })
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        let path = self.name_to_path(name)?;
        Ok(fs::try_exists(&path).await.unwrap_or(false))
    }

    fn url_for(&self, name: &str) -> String {
        format!(
            "{}/{}/{}",
            self.base_url.trim_end_matches('/'),
            self.container,
            name
        )
    }

    fn container(&self) -> &str {
        &self.container
    }

    fn backend_type(&self) -> StorageBackend {
        StorageBackend::Local
    }
}
