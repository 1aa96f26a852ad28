//! Relay Worker Library
//!
//! The relay stages, the queues they read and write, and the worker that polls
//! the inbound queues and runs each message through its stage.

pub mod dispatch;
pub mod queue;
pub mod stages;
pub mod telemetry;
pub mod worker;

pub use dispatch::{relay_batch, split_batch_lines};
pub use queue::{
    create_queue_set, in_memory_queue_set, send_json, InMemoryQueue, MessageQueue, QueueSet,
    ReceivedMessage,
};
#[cfg(feature = "sqs")]
pub use queue::SqsQueue;
pub use stages::{RelayContext, Stage, StageOutcome};
pub use telemetry::init_telemetry;
pub use worker::{RelayWorker, RelayWorkerConfig};
