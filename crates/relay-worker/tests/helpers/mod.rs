//! Test helpers: an in-memory relay with inspectable queues and stores.
//!
//! Run from workspace root: `cargo test -p relay-worker --test relay_pipeline_test`.

#![allow(dead_code)]

use async_trait::async_trait;
use bytes::Bytes;
use relay_core::{RelayError, RelayResult, TenantId};
use relay_processing::{FetchedImage, IdentityTransform, ImageFetcher, ImagePipeline, ImageTransform};
use relay_storage::{BlobStore, InMemoryStorage};
use relay_worker::{InMemoryQueue, MessageQueue, QueueSet, RelayContext};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use url::Url;

pub const TENANT: &str = "JoesFoodHouse";
pub const BLOB_BASE_URL: &str = "memory://relay";

/// Serves `image-bytes:<uri>` for every URI except hosts listed as down.
pub struct StubFetcher {
    down_hosts: Vec<String>,
    pub calls: AtomicUsize,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self {
            down_hosts: Vec::new(),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_down_host(host: &str) -> Self {
        Self {
            down_hosts: vec![host.to_string()],
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ImageFetcher for StubFetcher {
    async fn fetch(&self, uri: &Url) -> RelayResult<FetchedImage> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(host) = uri.host_str() {
            if self.down_hosts.iter().any(|h| h == host) {
                return Err(RelayError::fetch_failed(uri.as_str(), "connection refused"));
            }
        }
        Ok(FetchedImage {
            data: Bytes::from(format!("image-bytes:{}", uri)),
            content_type: "image/png".to_string(),
        })
    }
}

/// Queue whose sends fail after `succeed_first` successful sends.
pub struct FailingQueue {
    inner: InMemoryQueue,
    succeed_first: usize,
    attempts: AtomicUsize,
}

impl FailingQueue {
    pub fn new(name: &str, succeed_first: usize) -> Self {
        Self {
            inner: InMemoryQueue::new(name),
            succeed_first,
            attempts: AtomicUsize::new(0),
        }
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    pub async fn delivered(&self) -> Vec<String> {
        self.inner.pending().await
    }
}

#[async_trait]
impl MessageQueue for FailingQueue {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn send(&self, body: String) -> RelayResult<()> {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        if attempt >= self.succeed_first {
            return Err(RelayError::QueueSendFailed {
                queue: self.name().to_string(),
                reason: "throttled".to_string(),
            });
        }
        self.inner.send(body).await
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> RelayResult<Vec<relay_worker::ReceivedMessage>> {
        self.inner.receive(max_messages, wait).await
    }

    async fn ack(&self, message: &relay_worker::ReceivedMessage) -> RelayResult<()> {
        self.inner.ack(message).await
    }
}

/// Concrete handles onto every queue and store of a test relay.
pub struct TestRelay {
    pub context: RelayContext,
    pub update: InMemoryQueue,
    pub batch_update: InMemoryQueue,
    pub image_update: InMemoryQueue,
    pub optimize_image: InMemoryQueue,
    pub central_update: InMemoryQueue,
    pub central_image_update: InMemoryQueue,
    pub working: InMemoryStorage,
    pub public: InMemoryStorage,
}

pub struct TestRelayBuilder {
    fetcher: Arc<dyn ImageFetcher>,
    transform: Arc<dyn ImageTransform>,
    chunk_size: usize,
    update_override: Option<Arc<dyn MessageQueue>>,
}

impl TestRelayBuilder {
    pub fn new() -> Self {
        Self {
            fetcher: Arc::new(StubFetcher::new()),
            transform: Arc::new(IdentityTransform),
            chunk_size: relay_core::constants::DEFAULT_CHUNK_SIZE,
            update_override: None,
        }
    }

    pub fn fetcher(mut self, fetcher: Arc<dyn ImageFetcher>) -> Self {
        self.fetcher = fetcher;
        self
    }

    pub fn transform(mut self, transform: Arc<dyn ImageTransform>) -> Self {
        self.transform = transform;
        self
    }

    pub fn chunk_size(mut self, chunk_size: usize) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Replace the single-update queue the batch stage emits to.
    pub fn update_queue(mut self, queue: Arc<dyn MessageQueue>) -> Self {
        self.update_override = Some(queue);
        self
    }

    pub fn build(self) -> TestRelay {
        let update = InMemoryQueue::new("update");
        let batch_update = InMemoryQueue::new("batchupdate");
        let image_update = InMemoryQueue::new("productimage");
        let optimize_image = InMemoryQueue::new("optproductimage");
        let central_update = InMemoryQueue::new("productupdate");
        let central_image_update = InMemoryQueue::new("productimageupdate");
        let working = InMemoryStorage::new(BLOB_BASE_URL, "images");
        let public = InMemoryStorage::new(BLOB_BASE_URL, "publicimages");

        let queues = QueueSet {
            update: self
                .update_override
                .unwrap_or_else(|| Arc::new(update.clone()) as Arc<dyn MessageQueue>),
            batch_update: Arc::new(batch_update.clone()),
            image_update: Arc::new(image_update.clone()),
            optimize_image: Arc::new(optimize_image.clone()),
            central_update: Arc::new(central_update.clone()),
            central_image_update: Arc::new(central_image_update.clone()),
        };

        let pipeline = ImagePipeline::new(
            self.fetcher,
            Arc::new(working.clone()) as Arc<dyn BlobStore>,
            Arc::new(public.clone()) as Arc<dyn BlobStore>,
            self.transform,
        );

        TestRelay {
            context: RelayContext::new(TenantId::new(TENANT), pipeline, queues, self.chunk_size),
            update,
            batch_update,
            image_update,
            optimize_image,
            central_update,
            central_image_update,
            working,
            public,
        }
    }
}

/// Poll `queue` until it holds at least `count` pending messages.
pub async fn wait_for_pending(queue: &InMemoryQueue, count: usize, timeout: Duration) -> Vec<String> {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let pending = queue.pending().await;
        if pending.len() >= count || tokio::time::Instant::now() >= deadline {
            return pending;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}

/// Poll `queue` until no delivery is waiting for an ack.
pub async fn wait_for_acked(queue: &InMemoryQueue, timeout: Duration) -> usize {
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        let in_flight = queue.in_flight().await;
        if in_flight == 0 || tokio::time::Instant::now() >= deadline {
            return in_flight;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
}
