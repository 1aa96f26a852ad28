//! Relay worker
//!
//! Polls the partner queues and relays updates to the central system.
//! Run with: TENANT_ID=xxx PARTNER_QUEUE_URL_PREFIX=xxx CENTRAL_QUEUE_URL_PREFIX=xxx relay-worker

use anyhow::Context;
use relay_core::RelayConfig;
use relay_processing::{transform_for, HttpImageFetcher, ImagePipeline};
use relay_storage::create_blob_store;
use relay_worker::{create_queue_set, init_telemetry, RelayContext, RelayWorker, RelayWorkerConfig};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = RelayConfig::from_env().context("Failed to load relay configuration")?;
    init_telemetry(config.log_format)?;

    tracing::info!(
        environment = %config.environment,
        tenant_id = %config.tenant_id,
        storage_backend = %config.storage_backend,
        "Starting relay worker"
    );

    let context = build_context(&config).await?;
    let worker = RelayWorker::start(Arc::new(context), RelayWorkerConfig::from(&config));

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for shutdown signal")?;

    worker.shutdown().await;
    Ok(())
}

async fn build_context(config: &RelayConfig) -> anyhow::Result<RelayContext> {
    let working = create_blob_store(config, &config.working_container)
        .await
        .context("Failed to create working image store")?;
    let public = create_blob_store(config, &config.public_container)
        .await
        .context("Failed to create public image store")?;

    let fetcher = HttpImageFetcher::new(
        Duration::from_secs(config.image_fetch_timeout_secs),
        config.image_max_bytes,
    )
    .context("Failed to create image fetcher")?;
    let transform = transform_for(config.image_transform).context("Failed to build image transform")?;

    let pipeline = ImagePipeline::new(Arc::new(fetcher), working, public, transform);
    let queues = create_queue_set(config)
        .await
        .context("Failed to create queues")?;

    Ok(RelayContext::new(
        config.tenant_id.clone(),
        pipeline,
        queues,
        config.batch_chunk_size,
    ))
}
