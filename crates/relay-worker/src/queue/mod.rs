//! Message queue abstraction
//!
//! Delivery guarantees, visibility timeouts and dead-lettering belong to the
//! queue service. A received message that is never acked is redelivered by the
//! service; the relay itself does not retry.

mod memory;
#[cfg(feature = "sqs")]
mod sqs;

pub use memory::InMemoryQueue;
#[cfg(feature = "sqs")]
pub use sqs::SqsQueue;

use async_trait::async_trait;
use relay_core::constants::{
    BATCH_UPDATE_QUEUE, CENTRAL_IMAGE_UPDATE_QUEUE, CENTRAL_UPDATE_QUEUE, IMAGE_UPDATE_QUEUE,
    OPTIMIZE_IMAGE_QUEUE, UPDATE_QUEUE,
};
use relay_core::{RelayConfig, RelayError, RelayResult};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

use crate::stages::Stage;

/// A message pulled from a queue, pending acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub id: String,
    pub body: String,
    /// Handle used to acknowledge this particular delivery.
    pub receipt: String,
}

#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Queue name, used in logs and errors.
    fn name(&self) -> &str;

    async fn send(&self, body: String) -> RelayResult<()>;

    /// Receive up to `max_messages`, waiting at most `wait` when the queue is
    /// empty. Returns an empty vector on timeout.
    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> RelayResult<Vec<ReceivedMessage>>;

    /// Acknowledge (delete) a delivery so it is not redelivered.
    async fn ack(&self, message: &ReceivedMessage) -> RelayResult<()>;
}

/// Serialize `value` as JSON and send it.
pub async fn send_json<T>(queue: &dyn MessageQueue, value: &T) -> RelayResult<()>
where
    T: Serialize + Sync + ?Sized,
{
    let body = serde_json::to_string(value)?;
    queue.send(body).await
}

/// The six queues the relay reads from and writes to.
#[derive(Clone)]
pub struct QueueSet {
    /// Partner queue of single update lines. Inbound for the single update
    /// stage and outbound for the batch stage.
    pub update: Arc<dyn MessageQueue>,
    pub batch_update: Arc<dyn MessageQueue>,
    pub image_update: Arc<dyn MessageQueue>,
    pub optimize_image: Arc<dyn MessageQueue>,
    pub central_update: Arc<dyn MessageQueue>,
    pub central_image_update: Arc<dyn MessageQueue>,
}

impl QueueSet {
    /// Queue that triggers `stage`.
    pub fn inbound(&self, stage: Stage) -> &Arc<dyn MessageQueue> {
        match stage {
            Stage::SingleUpdate => &self.update,
            Stage::BatchUpdate => &self.batch_update,
            Stage::ImageUpdate => &self.image_update,
            Stage::OptimizeImage => &self.optimize_image,
        }
    }
}

/// Create the queue set based on configuration
///
/// With both queue URL prefixes set, queues are SQS queues addressed as
/// `<prefix>/<name>`. With neither set, outside production, in-memory queues
/// are used so the worker can run locally.
pub async fn create_queue_set(config: &RelayConfig) -> RelayResult<QueueSet> {
    match (
        config.partner_queue_url_prefix.as_deref(),
        config.central_queue_url_prefix.as_deref(),
    ) {
        #[cfg(feature = "sqs")]
        (Some(partner), Some(central)) => {
            let client = SqsQueue::client_for_region(config.aws_region.as_deref()).await;
            let queue = |prefix: &str, name: &str| -> Arc<dyn MessageQueue> {
                Arc::new(SqsQueue::new(client.clone(), name, queue_url(prefix, name)))
            };
            Ok(QueueSet {
                update: queue(partner, UPDATE_QUEUE),
                batch_update: queue(partner, BATCH_UPDATE_QUEUE),
                image_update: queue(partner, IMAGE_UPDATE_QUEUE),
                optimize_image: queue(partner, OPTIMIZE_IMAGE_QUEUE),
                central_update: queue(central, CENTRAL_UPDATE_QUEUE),
                central_image_update: queue(central, CENTRAL_IMAGE_UPDATE_QUEUE),
            })
        }

        #[cfg(not(feature = "sqs"))]
        (Some(_), Some(_)) => Err(RelayError::Config(
            "SQS queues not available (sqs feature not enabled)".to_string(),
        )),

        (None, None) if !config.is_production() => {
            tracing::warn!("No queue URL prefixes configured; using in-memory queues");
            Ok(in_memory_queue_set())
        }

        _ => Err(RelayError::Config(
            "PARTNER_QUEUE_URL_PREFIX and CENTRAL_QUEUE_URL_PREFIX must both be set".to_string(),
        )),
    }
}

/// A queue set backed entirely by fresh in-memory queues.
pub fn in_memory_queue_set() -> QueueSet {
    QueueSet {
        update: Arc::new(InMemoryQueue::new(UPDATE_QUEUE)),
        batch_update: Arc::new(InMemoryQueue::new(BATCH_UPDATE_QUEUE)),
        image_update: Arc::new(InMemoryQueue::new(IMAGE_UPDATE_QUEUE)),
        optimize_image: Arc::new(InMemoryQueue::new(OPTIMIZE_IMAGE_QUEUE)),
        central_update: Arc::new(InMemoryQueue::new(CENTRAL_UPDATE_QUEUE)),
        central_image_update: Arc::new(InMemoryQueue::new(CENTRAL_IMAGE_UPDATE_QUEUE)),
    }
}

#[cfg_attr(not(feature = "sqs"), allow(dead_code))]
fn queue_url(prefix: &str, name: &str) -> String {
    format!("{}/{}", prefix.trim_end_matches('/'), name)
}
