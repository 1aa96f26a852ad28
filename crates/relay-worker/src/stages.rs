//! Relay stages
//!
//! Each stage consumes one inbound message body and emits zero or more
//! messages to its outbound queue. Stages hold no state between invocations;
//! everything they need travels in the message or in [`RelayContext`].

use futures::future::join_all;
use relay_core::{
    decode_image_update_request, decode_update, OptimizeImageTask, ProductUpdate, RelayError,
    RelayResult, TenantId,
};
use relay_processing::ImagePipeline;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::dispatch::relay_batch;
use crate::queue::{send_json, QueueSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    /// One update line from the partner, relayed to the central update queue.
    SingleUpdate,
    /// Newline separated update lines, fanned out onto the update queue.
    BatchUpdate,
    /// Three image URIs and a product id; images are staged for optimization.
    ImageUpdate,
    /// One staged image, optimized and published.
    OptimizeImage,
}

impl Stage {
    pub const ALL: [Stage; 4] = [
        Stage::SingleUpdate,
        Stage::BatchUpdate,
        Stage::ImageUpdate,
        Stage::OptimizeImage,
    ];
}

impl Display for Stage {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Stage::SingleUpdate => write!(f, "single_update"),
            Stage::BatchUpdate => write!(f, "batch_update"),
            Stage::ImageUpdate => write!(f, "image_update"),
            Stage::OptimizeImage => write!(f, "optimize_image"),
        }
    }
}

/// Result of a successful stage invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageOutcome {
    /// Messages sent to the stage's outbound queue.
    pub emitted: usize,
}

/// Everything the stages need, passed explicitly.
#[derive(Clone)]
pub struct RelayContext {
    tenant_id: TenantId,
    pipeline: ImagePipeline,
    queues: QueueSet,
    chunk_size: usize,
}

impl RelayContext {
    pub fn new(
        tenant_id: TenantId,
        pipeline: ImagePipeline,
        queues: QueueSet,
        chunk_size: usize,
    ) -> Self {
        Self {
            tenant_id,
            pipeline,
            queues,
            chunk_size,
        }
    }

    pub fn tenant_id(&self) -> &TenantId {
        &self.tenant_id
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    /// Run the stage triggered by a message on `stage`'s inbound queue.
    pub async fn dispatch(&self, stage: Stage, body: &str) -> RelayResult<StageOutcome> {
        match stage {
            Stage::SingleUpdate => self.relay_single_update(body).await,
            Stage::BatchUpdate => self.relay_batch_update(body).await,
            Stage::ImageUpdate => self.relay_image_update(body).await,
            Stage::OptimizeImage => self.relay_optimize_image(body).await,
        }
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn relay_single_update(&self, body: &str) -> RelayResult<StageOutcome> {
        let message = decode_update(body)?;
        let update = ProductUpdate::from_message(message, &self.tenant_id);

        send_json(self.queues.central_update.as_ref(), &update).await?;

        tracing::info!(
            branch_id = %update.branch_id,
            product_id = %update.product_id,
            reason_code = %update.reason_code,
            "Relayed product update"
        );
        Ok(StageOutcome { emitted: 1 })
    }

    #[tracing::instrument(skip(self, body), fields(chunk_size = self.chunk_size))]
    pub async fn relay_batch_update(&self, body: &str) -> RelayResult<StageOutcome> {
        let queue = self.queues.update.as_ref();
        let count = relay_batch(body, self.chunk_size, move |line: &str| queue.send(line.to_string()))
            .await?;

        tracing::info!(count = count, queue = %queue.name(), "Relayed batch update");
        Ok(StageOutcome { emitted: count })
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn relay_image_update(&self, body: &str) -> RelayResult<StageOutcome> {
        let request = decode_image_update_request(body)?;
        let tasks = self.pipeline.stage_raw_images(&request).await?;

        let bodies = tasks
            .iter()
            .map(serde_json::to_string)
            .collect::<Result<Vec<_>, _>>()?;

        let queue = self.queues.optimize_image.as_ref();
        let results = join_all(bodies.into_iter().map(|body| queue.send(body))).await;
        let emitted = results.iter().filter(|r| r.is_ok()).count();
        if let Some(error) = results.into_iter().find_map(Result::err) {
            tracing::error!(
                product_id = %request.product_id,
                emitted = emitted,
                error = %error,
                "Failed to enqueue optimize tasks"
            );
            return Err(error);
        }

        tracing::info!(
            product_id = %request.product_id,
            count = emitted,
            "Queued images for optimization"
        );
        Ok(StageOutcome { emitted })
    }

    #[tracing::instrument(skip(self, body))]
    pub async fn relay_optimize_image(&self, body: &str) -> RelayResult<StageOutcome> {
        let task: OptimizeImageTask = serde_json::from_str(body)
            .map_err(|e| RelayError::malformed(format!("invalid optimize task: {}", e)))?;

        let update = self
            .pipeline
            .optimize_and_publish(&task, &self.tenant_id)
            .await?;

        send_json(self.queues.central_image_update.as_ref(), &update).await?;

        tracing::info!(
            blob_name = %task.blob_name,
            product_id = %update.product_id,
            image_uri = %update.image_uri,
            "Relayed product image update"
        );
        Ok(StageOutcome { emitted: 1 })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queue::{in_memory_queue_set, InMemoryQueue, MessageQueue};
    use relay_processing::{FetchedImage, IdentityTransform, ImageFetcher};
    use relay_storage::InMemoryStorage;
    use std::sync::Arc;

    struct NoFetch;

    #[async_trait::async_trait]
    impl ImageFetcher for NoFetch {
        async fn fetch(&self, uri: &url::Url) -> RelayResult<FetchedImage> {
            Err(RelayError::fetch_failed(uri.as_str(), "offline"))
        }
    }

    fn context_with(queues: QueueSet) -> RelayContext {
        let pipeline = ImagePipeline::new(
            Arc::new(NoFetch),
            Arc::new(InMemoryStorage::new("memory://relay", "images")),
            Arc::new(InMemoryStorage::new("memory://relay", "publicimages")),
            Arc::new(IdentityTransform),
        );
        RelayContext::new(TenantId::new("JoesFoodHouse"), pipeline, queues, 250)
    }

    #[tokio::test]
    async fn single_update_emits_contract_json() {
        let central = InMemoryQueue::new("productupdate");
        let mut queues = in_memory_queue_set();
        queues.central_update = Arc::new(central.clone());
        let context = context_with(queues);

        let outcome = context
            .dispatch(Stage::SingleUpdate, "B1 P1 5 EA COUNT")
            .await
            .unwrap();
        assert_eq!(outcome.emitted, 1);

        let sent = central.pending().await;
        assert_eq!(sent.len(), 1);
        let update: ProductUpdate = serde_json::from_str(&sent[0]).unwrap();
        assert_eq!(update.tenant_id.as_str(), "JoesFoodHouse");
        assert_eq!(update.branch_id, "B1");
        assert_eq!(update.product_id, "P1");
        assert_eq!(update.reason_code, "COUNT");
    }

    #[tokio::test]
    async fn malformed_single_update_sends_nothing() {
        let central = InMemoryQueue::new("productupdate");
        let mut queues = in_memory_queue_set();
        queues.central_update = Arc::new(central.clone());
        let context = context_with(queues);

        let err = context
            .dispatch(Stage::SingleUpdate, "B1 P1 5")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedMessage(_)));
        assert_eq!(central.send_count(), 0);
    }

    #[tokio::test]
    async fn image_update_fails_whole_stage_on_fetch_error() {
        let optimize = InMemoryQueue::new("optproductimage");
        let mut queues = in_memory_queue_set();
        queues.optimize_image = Arc::new(optimize.clone());
        let context = context_with(queues);

        let err = context
            .dispatch(
                Stage::ImageUpdate,
                "https://cdn/b.png https://cdn/l.png https://cdn/p.png PROD42",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::UpstreamFetchFailed { .. }));
        assert_eq!(optimize.send_count(), 0);
    }

    #[tokio::test]
    async fn optimize_stage_rejects_invalid_task_json() {
        let context = context_with(in_memory_queue_set());
        let err = context
            .dispatch(Stage::OptimizeImage, "not json")
            .await
            .unwrap_err();
        assert!(matches!(err, RelayError::MalformedMessage(_)));
    }

    #[tokio::test]
    async fn batch_update_fans_out_lines() {
        let update = InMemoryQueue::new("update");
        let mut queues = in_memory_queue_set();
        queues.update = Arc::new(update.clone());
        let context = context_with(queues);

        let outcome = context
            .dispatch(Stage::BatchUpdate, "B1 P1 5 EA COUNT\nB1 P2 3 EA DAMAGE")
            .await
            .unwrap();
        assert_eq!(outcome.emitted, 2);
        assert_eq!(update.name(), "update");
        assert_eq!(
            update.pending().await,
            vec!["B1 P1 5 EA COUNT".to_string(), "B1 P2 3 EA DAMAGE".to_string()]
        );
    }
}
