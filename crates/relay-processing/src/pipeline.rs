//! Image fetch/publish pipeline
//!
//! Blob names are generated here and never derived from the source URI. The
//! same name is used in the working and public stores.

use futures::future::join_all;
use relay_core::{
    ImageType, ImageUpdateRequest, OptimizeImageTask, ProductImageUpdate, RelayError,
    RelayResult, TenantId,
};
use relay_storage::{generate_blob_name, BlobStore};
use std::sync::Arc;
use url::Url;

use crate::fetch::ImageFetcher;
use crate::transform::ImageTransform;

/// Content type for published bytes of unknown format.
const FALLBACK_CONTENT_TYPE: &str = "application/octet-stream";

/// Content type to publish `data` under.
///
/// The transform may change the format, so the bytes are sniffed first; the
/// type recorded with the working blob is used when they are not a known
/// image format.
fn published_content_type(data: &[u8], source: Option<&str>) -> String {
    #[cfg(feature = "image")]
    if let Ok(format) = image::guess_format(data) {
        return format.to_mime_type().to_string();
    }
    #[cfg(not(feature = "image"))]
    let _ = data;

    source.unwrap_or(FALLBACK_CONTENT_TYPE).to_string()
}

#[derive(Clone)]
pub struct ImagePipeline {
    fetcher: Arc<dyn ImageFetcher>,
    working: Arc<dyn BlobStore>,
    public: Arc<dyn BlobStore>,
    transform: Arc<dyn ImageTransform>,
}

impl ImagePipeline {
    pub fn new(
        fetcher: Arc<dyn ImageFetcher>,
        working: Arc<dyn BlobStore>,
        public: Arc<dyn BlobStore>,
        transform: Arc<dyn ImageTransform>,
    ) -> Self {
        Self {
            fetcher,
            working,
            public,
            transform,
        }
    }

    /// Stage A: fetch the three source images into the working store.
    ///
    /// All three fetch/store operations run concurrently and are awaited to
    /// completion; if any failed, the first failure in request order is
    /// returned. Blobs written by successful siblings are left in place.
    #[tracing::instrument(skip(self, request), fields(product_id = %request.product_id))]
    pub async fn stage_raw_images(
        &self,
        request: &ImageUpdateRequest,
    ) -> RelayResult<[OptimizeImageTask; 3]> {
        let sources = request.sources();
        let results = join_all(
            sources
                .iter()
                .map(|(image_type, uri)| self.stage_one(*image_type, uri, &request.product_id)),
        )
        .await;

        let failed = results.iter().filter(|r| r.is_err()).count();
        if failed > 0 {
            let orphaned: Vec<&str> = results
                .iter()
                .filter_map(|r| r.as_ref().ok())
                .map(|task| task.blob_name.as_str())
                .collect();
            if !orphaned.is_empty() {
                tracing::warn!(
                    failed = failed,
                    orphaned_blobs = ?orphaned,
                    "Image staging failed; working blobs from successful fetches are left behind"
                );
            }
        }

        let mut tasks = Vec::with_capacity(3);
        for result in results {
            tasks.push(result?);
        }
        let tasks: [OptimizeImageTask; 3] = tasks
            .try_into()
            .map_err(|_| RelayError::malformed("image update request must yield 3 images"))?;

        tracing::info!(
            blob_names = ?tasks.iter().map(|t| t.blob_name.as_str()).collect::<Vec<_>>(),
            "Staged raw images"
        );
        Ok(tasks)
    }

    async fn stage_one(
        &self,
        image_type: ImageType,
        uri: &Url,
        product_id: &str,
    ) -> RelayResult<OptimizeImageTask> {
        let fetched = self.fetcher.fetch(uri).await?;
        let blob_name = generate_blob_name();

        self.working
            .put(&blob_name, fetched.data, &fetched.content_type)
            .await
            .map_err(|e| {
                tracing::error!(
                    error = %e,
                    blob_name = %blob_name,
                    image_type = %image_type,
                    "Failed to write fetched image to working store"
                );
                RelayError::StorageWriteFailed(e.to_string())
            })?;

        tracing::debug!(
            blob_name = %blob_name,
            image_type = %image_type,
            source = %uri,
            "Fetched image stored"
        );

        Ok(OptimizeImageTask {
            blob_name,
            image_type,
            product_id: product_id.to_string(),
        })
    }

    /// Stage B: read a staged blob, transform it and publish it under the same
    /// name. Fails with `BlobNotFound` without touching the public store when
    /// the working blob is missing.
    #[tracing::instrument(
        skip(self, task, tenant_id),
        fields(blob_name = %task.blob_name, image_type = %task.image_type, product_id = %task.product_id)
    )]
    pub async fn optimize_and_publish(
        &self,
        task: &OptimizeImageTask,
        tenant_id: &TenantId,
    ) -> RelayResult<ProductImageUpdate> {
        if !self.working.exists(&task.blob_name).await? {
            tracing::error!("Referenced working blob does not exist");
            return Err(RelayError::BlobNotFound(task.blob_name.clone()));
        }

        // The blob can vanish between the existence check and the read; the
        // store's NotFound maps to BlobNotFound as well.
        let original = self.working.get(&task.blob_name).await?;
        let original_size = original.data.len();

        let optimized = self.transform.transform(original.data).await?;
        let optimized_size = optimized.len();
        let content_type = published_content_type(&optimized, original.content_type.as_deref());

        let image_uri = self
            .public
            .put(&task.blob_name, optimized, &content_type)
            .await
            .map_err(|e| RelayError::StorageWriteFailed(e.to_string()))?;

        tracing::info!(
            original_size = original_size,
            optimized_size = optimized_size,
            content_type = %content_type,
            image_uri = %image_uri,
            "Published optimized image"
        );

        Ok(ProductImageUpdate {
            tenant_id: tenant_id.clone(),
            image_type: task.image_type,
            image_uri,
            product_id: task.product_id.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fetch::FetchedImage;
    use crate::transform::IdentityTransform;
    use async_trait::async_trait;
    use bytes::Bytes;
    use relay_storage::InMemoryStorage;
    use std::collections::HashSet;

    /// Serves the URI itself as the image bytes; fails for hosts named "down".
    struct EchoFetcher;

    #[async_trait]
    impl ImageFetcher for EchoFetcher {
        async fn fetch(&self, uri: &Url) -> RelayResult<FetchedImage> {
            if uri.host_str() == Some("down") {
                return Err(RelayError::fetch_failed(uri.as_str(), "connection refused"));
            }
            Ok(FetchedImage {
                data: Bytes::from(uri.as_str().to_string()),
                content_type: "image/png".to_string(),
            })
        }
    }

    fn request(line: &str) -> ImageUpdateRequest {
        relay_core::decode_image_update_request(line).unwrap()
    }

    fn pipeline(
        working: &InMemoryStorage,
        public: &InMemoryStorage,
        transform: Arc<dyn ImageTransform>,
    ) -> ImagePipeline {
        ImagePipeline::new(
            Arc::new(EchoFetcher),
            Arc::new(working.clone()),
            Arc::new(public.clone()),
            transform,
        )
    }

    #[tokio::test]
    async fn stage_a_yields_three_distinct_tasks() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let pipeline = pipeline(&working, &public, Arc::new(IdentityTransform));

        let tasks = pipeline
            .stage_raw_images(&request(
                "https://cdn/b.png https://cdn/l.png https://cdn/p.png PROD42",
            ))
            .await
            .unwrap();

        let types: Vec<ImageType> = tasks.iter().map(|t| t.image_type).collect();
        assert_eq!(types, ImageType::ALL.to_vec());
        assert!(tasks.iter().all(|t| t.product_id == "PROD42"));

        let names: HashSet<&str> = tasks.iter().map(|t| t.blob_name.as_str()).collect();
        assert_eq!(names.len(), 3);
        assert_eq!(working.len().await, 3);
        assert!(public.is_empty().await);

        // Bytes are stored unmodified.
        let brand = working.get(&tasks[0].blob_name).await.unwrap();
        assert_eq!(brand.data, Bytes::from_static(b"https://cdn/b.png"));
        assert_eq!(brand.content_type.as_deref(), Some("image/png"));
    }

    #[tokio::test]
    async fn stage_a_fails_as_a_whole_when_one_fetch_fails() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let pipeline = pipeline(&working, &public, Arc::new(IdentityTransform));

        let err = pipeline
            .stage_raw_images(&request(
                "https://cdn/b.png https://down/l.png https://cdn/p.png PROD42",
            ))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::UpstreamFetchFailed { ref uri, .. } if uri == "https://down/l.png"));
        // Siblings ran to completion and their blobs are not cleaned up.
        assert_eq!(working.len().await, 2);
    }

    #[tokio::test]
    async fn stage_b_publishes_under_same_name() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let upper = |data: Bytes| -> RelayResult<Bytes> { Ok(Bytes::from(data.to_ascii_uppercase())) };
        let pipeline = pipeline(&working, &public, Arc::new(upper));

        working
            .put("abc", Bytes::from_static(b"raw"), "image/png")
            .await
            .unwrap();
        let task = OptimizeImageTask {
            blob_name: "abc".to_string(),
            image_type: ImageType::Logo,
            product_id: "PROD42".to_string(),
        };

        let update = pipeline
            .optimize_and_publish(&task, &TenantId::new("JoesFoodHouse"))
            .await
            .unwrap();

        assert_eq!(update.tenant_id.as_str(), "JoesFoodHouse");
        assert_eq!(update.image_type, ImageType::Logo);
        assert_eq!(update.product_id, "PROD42");
        assert_eq!(update.image_uri, "memory://relay/publicimages/abc");
        assert_eq!(public.get("abc").await.unwrap().data, Bytes::from_static(b"RAW"));
        // Original stays in the working store.
        assert_eq!(working.get("abc").await.unwrap().data, Bytes::from_static(b"raw"));
    }

    #[tokio::test]
    async fn stage_b_publishes_with_working_blob_content_type() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let pipeline = pipeline(&working, &public, Arc::new(IdentityTransform));

        working
            .put("abc", Bytes::from_static(b"raw"), "image/png")
            .await
            .unwrap();
        let task = OptimizeImageTask {
            blob_name: "abc".to_string(),
            image_type: ImageType::Brand,
            product_id: "PROD42".to_string(),
        };

        pipeline
            .optimize_and_publish(&task, &TenantId::new("JoesFoodHouse"))
            .await
            .unwrap();

        assert_eq!(public.content_type("abc").await.as_deref(), Some("image/png"));
    }

    #[cfg(feature = "image")]
    #[tokio::test]
    async fn stage_b_content_type_follows_transformed_format() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let to_png = |_: Bytes| -> RelayResult<Bytes> {
            Ok(Bytes::from_static(b"\x89PNG\r\n\x1a\n\0\0\0\rIHDR"))
        };
        let pipeline = pipeline(&working, &public, Arc::new(to_png));

        working
            .put("abc", Bytes::from_static(b"GIF89a"), "image/gif")
            .await
            .unwrap();
        let task = OptimizeImageTask {
            blob_name: "abc".to_string(),
            image_type: ImageType::Image,
            product_id: "PROD42".to_string(),
        };

        pipeline
            .optimize_and_publish(&task, &TenantId::new("JoesFoodHouse"))
            .await
            .unwrap();

        assert_eq!(public.content_type("abc").await.as_deref(), Some("image/png"));
    }

    #[test]
    fn unknown_bytes_without_source_type_publish_as_octet_stream() {
        assert_eq!(
            published_content_type(b"not an image", None),
            "application/octet-stream"
        );
        assert_eq!(
            published_content_type(b"not an image", Some("image/jpeg")),
            "image/jpeg"
        );
    }

    #[tokio::test]
    async fn stage_b_missing_blob_never_writes_public_store() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let pipeline = pipeline(&working, &public, Arc::new(IdentityTransform));

        let task = OptimizeImageTask {
            blob_name: "missing".to_string(),
            image_type: ImageType::Brand,
            product_id: "PROD42".to_string(),
        };
        let err = pipeline
            .optimize_and_publish(&task, &TenantId::new("JoesFoodHouse"))
            .await
            .unwrap_err();

        assert!(matches!(err, RelayError::BlobNotFound(name) if name == "missing"));
        assert_eq!(public.put_count(), 0);
    }

    #[tokio::test]
    async fn stage_b_transform_failure_skips_publish() {
        let working = InMemoryStorage::new("memory://relay", "images");
        let public = InMemoryStorage::new("memory://relay", "publicimages");
        let failing =
            |_: Bytes| -> RelayResult<Bytes> { Err(RelayError::TransformFailed("corrupt".to_string())) };
        let pipeline = pipeline(&working, &public, Arc::new(failing));

        working
            .put("abc", Bytes::from_static(b"raw"), "image/png")
            .await
            .unwrap();
        let task = OptimizeImageTask {
            blob_name: "abc".to_string(),
            image_type: ImageType::Image,
            product_id: "PROD42".to_string(),
        };

        let err = pipeline
            .optimize_and_publish(&task, &TenantId::new("JoesFoodHouse"))
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::TransformFailed(_)));
        assert_eq!(public.put_count(), 0);
    }
}
