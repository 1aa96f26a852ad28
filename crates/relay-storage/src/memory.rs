//! In-memory blob store for tests and local dry runs.

use crate::traits::{validate_blob_name, BlobStore, StorageError, StorageResult, StoredBlob};
use crate::StorageBackend;
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Clone)]
pub struct InMemoryStorage {
    container: String,
    base_url: String,
    blobs: Arc<RwLock<HashMap<String, StoredBlob>>>,
    puts: Arc<AtomicUsize>,
}

impl InMemoryStorage {
    pub fn new(base_url: impl Into<String>, container: impl Into<String>) -> Self {
        Self {
            container: container.into(),
            base_url: base_url.into(),
            blobs: Arc::new(RwLock::new(HashMap::new())),
            puts: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of blobs currently stored.
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    pub async fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.blobs.read().await.keys().cloned().collect();
        names.sort();
        names
    }

    /// Content type the blob was last written with.
    pub async fn content_type(&self, name: &str) -> Option<String> {
        self.blobs
            .read()
            .await
            .get(name)
            .and_then(|blob| blob.content_type.clone())
    }

    /// Number of `put` calls made, including overwrites.
    pub fn put_count(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BlobStore for InMemoryStorage {
    async fn put(&self, name: &str, data: Bytes, content_type: &str) -> StorageResult<String> {
        validate_blob_name(name)?;
        self.puts.fetch_add(1, Ordering::SeqCst);
        self.blobs.write().await.insert(
            name.to_string(),
            StoredBlob {
                data,
                content_type: Some(content_type.to_string()),
            },
        );
        Ok(self.url_for(name))
    }

    async fn get(&self, name: &str) -> StorageResult<StoredBlob> {
        validate_blob_name(name)?;
        self.blobs
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn exists(&self, name: &str) -> StorageResult<bool> {
        validate_blob_name(name)?;
        Ok(self.blobs.read().await.contains_key(name))
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
        StorageBackend::Memory
    }
}
