//! Relay worker: one poll loop per stage, bounded concurrency, and shutdown.
//!
//! A message is acked only after its stage succeeds. Failed messages are left
//! unacked so the queue service redelivers or dead-letters them; the worker
//! never retries on its own.
//!
//! Shutdown: [`RelayWorker::shutdown`] stops the poll loops and waits for them
//! to exit. It does not wait for in-flight stage invocations; their messages
//! are redelivered if the process exits before they are acked.

use relay_core::{LogLevel, RelayConfig, RelayError};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{watch, Semaphore};
use tokio::task::JoinHandle;

use crate::queue::{MessageQueue, ReceivedMessage};
use crate::stages::{RelayContext, Stage};

#[derive(Clone, Debug)]
pub struct RelayWorkerConfig {
    /// Maximum concurrent stage invocations across all stages.
    pub max_workers: usize,
    /// Messages requested per receive call.
    pub receive_batch_size: usize,
    /// Long-poll wait per receive call.
    pub receive_wait: Duration,
    /// Pause after a failed receive before polling again.
    pub error_backoff: Duration,
}

impl Default for RelayWorkerConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            receive_batch_size: 10,
            receive_wait: Duration::from_secs(20),
            error_backoff: Duration::from_secs(5),
        }
    }
}

impl From<&RelayConfig> for RelayWorkerConfig {
    fn from(config: &RelayConfig) -> Self {
        Self {
            max_workers: config.max_workers,
            receive_batch_size: config.queue_batch_size,
            receive_wait: Duration::from_secs(config.queue_wait_seconds),
            ..Self::default()
        }
    }
}

pub struct RelayWorker {
    shutdown_tx: watch::Sender<bool>,
    loops: Vec<JoinHandle<()>>,
}

impl RelayWorker {
    /// Spawn a poll loop for every stage.
    pub fn start(context: Arc<RelayContext>, config: RelayWorkerConfig) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let semaphore = Arc::new(Semaphore::new(config.max_workers.max(1)));

        tracing::info!(
            max_workers = config.max_workers,
            receive_batch_size = config.receive_batch_size,
            receive_wait_secs = config.receive_wait.as_secs(),
            "Relay worker pool started"
        );

        let loops = Stage::ALL
            .iter()
            .map(|&stage| {
                tokio::spawn(Self::poll_loop(
                    stage,
                    context.clone(),
                    config.clone(),
                    semaphore.clone(),
                    shutdown_rx.clone(),
                ))
            })
            .collect();

        Self { shutdown_tx, loops }
    }

    async fn poll_loop(
        stage: Stage,
        context: Arc<RelayContext>,
        config: RelayWorkerConfig,
        semaphore: Arc<Semaphore>,
        mut shutdown_rx: watch::Receiver<bool>,
    ) {
        let queue = context.queues().inbound(stage).clone();
        tracing::debug!(stage = %stage, queue = %queue.name(), "Poll loop started");

        loop {
            // Hold a permit before receiving so messages we cannot process yet
            // stay visible to other consumers.
            let permit = tokio::select! {
                _ = shutdown_rx.changed() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };

            let received = tokio::select! {
                _ = shutdown_rx.changed() => break,
                received = queue.receive(config.receive_batch_size, config.receive_wait) => received,
            };

            let messages = match received {
                Ok(messages) => messages,
                Err(e) => {
                    drop(permit);
                    tracing::error!(stage = %stage, queue = %queue.name(), error = %e, "Failed to receive messages");
                    tokio::select! {
                        _ = shutdown_rx.changed() => break,
                        _ = tokio::time::sleep(config.error_backoff) => {}
                    }
                    continue;
                }
            };

            if messages.is_empty() {
                tracing::trace!(stage = %stage, "No messages available");
                continue;
            }

            let mut first_permit = Some(permit);
            for message in messages {
                let permit = match first_permit.take() {
                    Some(permit) => permit,
                    None => match semaphore.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => return,
                    },
                };

                let context = context.clone();
                let queue = queue.clone();
                tokio::spawn(async move {
                    let _permit = permit;
                    Self::process_message(stage, &context, queue.as_ref(), message).await;
                });
            }
        }

        tracing::debug!(stage = %stage, "Poll loop stopped");
    }

    /// Run one message through its stage and ack it on success.
    ///
    /// Returns whether the stage succeeded.
    #[tracing::instrument(
        skip(context, queue, message),
        fields(stage = %stage, queue = %queue.name(), message_id = %message.id)
    )]
    pub async fn process_message(
        stage: Stage,
        context: &RelayContext,
        queue: &dyn MessageQueue,
        message: ReceivedMessage,
    ) -> bool {
        let start = Instant::now();

        match context.dispatch(stage, &message.body).await {
            Ok(outcome) => {
                if let Err(e) = queue.ack(&message).await {
                    // Work is done; the redelivered message is processed again.
                    tracing::error!(error = %e, "Failed to acknowledge message");
                }
                tracing::info!(
                    emitted = outcome.emitted,
                    duration_ms = start.elapsed().as_secs_f64() * 1000.0,
                    "Message relayed"
                );
                true
            }
            Err(e) => {
                log_stage_failure(&e, start.elapsed());
                false
            }
        }
    }

    /// Stop the poll loops and wait for them to exit.
    pub async fn shutdown(self) {
        tracing::info!("Initiating relay worker shutdown");
        let _ = self.shutdown_tx.send(true);
        for handle in self.loops {
            if let Err(e) = handle.await {
                tracing::error!(error = %e, "Poll loop panicked");
            }
        }
        tracing::info!("Relay worker pool stopped");
    }
}

fn log_stage_failure(error: &RelayError, elapsed: Duration) {
    let duration_ms = elapsed.as_secs_f64() * 1000.0;
    match error.log_level() {
        LogLevel::Warn => tracing::warn!(
            error = %error,
            error_code = error.error_code(),
            recoverable = error.is_recoverable(),
            duration_ms = duration_ms,
            "Stage failed; message left for redelivery"
        ),
        LogLevel::Error => tracing::error!(
            error = %error,
            error_code = error.error_code(),
            recoverable = error.is_recoverable(),
            duration_ms = duration_ms,
            "Stage failed; message left for redelivery"
        ),
    }
}
