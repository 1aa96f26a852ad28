//! Image transforms applied by the optimize stage.
//!
//! The transform is a capability handed to the pipeline, so a real optimizer can
//! replace the pass-through without touching pipeline control flow.

use async_trait::async_trait;
use bytes::Bytes;
use relay_core::{RelayResult, TransformKind};
use std::sync::Arc;

#[async_trait]
pub trait ImageTransform: Send + Sync {
    async fn transform(&self, data: Bytes) -> RelayResult<Bytes>;
}

/// Returns the input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

#[async_trait]
impl ImageTransform for IdentityTransform {
    async fn transform(&self, data: Bytes) -> RelayResult<Bytes> {
        Ok(data)
    }
}

#[async_trait]
impl<F> ImageTransform for F
where
    F: Fn(Bytes) -> RelayResult<Bytes> + Send + Sync,
{
    async fn transform(&self, data: Bytes) -> RelayResult<Bytes> {
        self(data)
    }
}

/// Decodes the image and encodes it again in its own format, dropping
/// metadata chunks and ancillary data the encoder does not write.
#[cfg(feature = "image")]
#[derive(Debug, Clone, Copy, Default)]
pub struct ReencodeTransform;

#[cfg(feature = "image")]
impl ReencodeTransform {
    fn reencode(data: &[u8]) -> RelayResult<Vec<u8>> {
        use relay_core::RelayError;
        use std::io::Cursor;

        let format = image::guess_format(data)
            .map_err(|e| RelayError::TransformFailed(format!("unrecognized image format: {}", e)))?;
        let img = image::load_from_memory_with_format(data, format)
            .map_err(|e| RelayError::TransformFailed(format!("failed to decode image: {}", e)))?;

        let mut out = Vec::with_capacity(data.len());
        img.write_to(&mut Cursor::new(&mut out), format)
            .map_err(|e| RelayError::TransformFailed(format!("failed to encode image: {}", e)))?;
        Ok(out)
    }
}

#[cfg(feature = "image")]
#[async_trait]
impl ImageTransform for ReencodeTransform {
    async fn transform(&self, data: Bytes) -> RelayResult<Bytes> {
        // Image decode is CPU-bound; run off the async pool to avoid blocking other tasks.
        let out = tokio::task::spawn_blocking(move || Self::reencode(&data))
            .await
            .map_err(|e| relay_core::RelayError::TransformFailed(e.to_string()))??;
        Ok(Bytes::from(out))
    }
}

/// Build the configured transform.
pub fn transform_for(kind: TransformKind) -> RelayResult<Arc<dyn ImageTransform>> {
    match kind {
        TransformKind::Identity => Ok(Arc::new(IdentityTransform)),
        #[cfg(feature = "image")]
        TransformKind::Reencode => Ok(Arc::new(ReencodeTransform)),
        #[cfg(not(feature = "image"))]
        TransformKind::Reencode => Err(relay_core::RelayError::Config(
            "reencode transform not available (image feature not enabled)".to_string(),
        )),
    }
}
