#[cfg(feature = "storage-local")]
use crate::LocalStorage;
#[cfg(feature = "storage-s3")]
use crate::S3Storage;
use crate::{BlobStore, InMemoryStorage, StorageBackend, StorageError, StorageResult};
use relay_core::RelayConfig;
use std::sync::Arc;

const MEMORY_BASE_URL: &str = "memory://relay";

/// Create the blob store for `container` based on configuration
///
/// The S3 backend maps each container to a bucket of the same name; the local
/// backend maps it to a subdirectory of `LOCAL_STORAGE_PATH`.
pub async fn create_blob_store(
    config: &RelayConfig,
    container: &str,
) -> StorageResult<Arc<dyn BlobStore>> {
    match config.storage_backend {
        #[cfg(feature = "storage-s3")]
        StorageBackend::S3 => {
            let region = config.s3_region().map(String::from).ok_or_else(|| {
                StorageError::ConfigError("S3_REGION or AWS_REGION not configured".to_string())
            })?;
            let endpoint = config.s3_endpoint.clone();

            let storage = S3Storage::new(container.to_string(), region, endpoint).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-s3"))]
        StorageBackend::S3 => Err(StorageError::ConfigError(
            "S3 storage backend not available (storage-s3 feature not enabled)".to_string(),
        )),

        #[cfg(feature = "storage-local")]
        StorageBackend::Local => {
            let base_path = config.local_storage_path.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_PATH not configured".to_string())
            })?;
            let base_url = config.local_storage_base_url.clone().ok_or_else(|| {
                StorageError::ConfigError("LOCAL_STORAGE_BASE_URL not configured".to_string())
            })?;

            let storage = LocalStorage::new(base_path, base_url, container).await?;
            Ok(Arc::new(storage))
        }

        #[cfg(not(feature = "storage-local"))]
        StorageBackend::Local => Err(StorageError::ConfigError(
            "Local storage backend not available (storage-local feature not enabled)".to_string(),
        )),

        StorageBackend::Memory => {
            tracing::warn!(container = %container, "Using in-memory blob store; contents are lost on exit");
            Ok(Arc::new(InMemoryStorage::new(MEMORY_BASE_URL, container)))
        }
    }
}

#[cfg(all(test, feature = "storage-local"))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn creates_local_store_per_container() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = RelayConfig::for_tenant("JoesFoodHouse");
        config.storage_backend = StorageBackend::Local;
        config.local_storage_path = Some(dir.path().to_string_lossy().to_string());
        config.local_storage_base_url = Some("http://localhost:8080/blobs".to_string());

        let working = create_blob_store(&config, "images").await.unwrap();
        let public = create_blob_store(&config, "publicimages").await.unwrap();

        assert_eq!(working.backend_type(), StorageBackend::Local);
        assert_eq!(working.container(), "images");
        assert_eq!(public.container(), "publicimages");
        assert!(dir.path().join("publicimages").is_dir());
    }

    #[tokio::test]
    async fn local_store_without_path_is_config_error() {
        let mut config = RelayConfig::for_tenant("JoesFoodHouse");
        config.storage_backend = StorageBackend::Local;

        let result = create_blob_store(&config, "images").await;
        assert!(matches!(result, Err(StorageError::ConfigError(_))));
    }

    #[tokio::test]
    async fn memory_backend() {
        let config = RelayConfig::for_tenant("JoesFoodHouse");
        let store = create_blob_store(&config, "images").await.unwrap();
        assert_eq!(store.backend_type(), StorageBackend::Memory);
        assert_eq!(store.url_for("x"), "memory://relay/images/x");
    }
}
