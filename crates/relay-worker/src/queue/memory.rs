//! In-process queue for tests and local runs.
//!
//! Received messages stay invisible until acked, like an SQS visibility
//! timeout that never expires; `requeue_unacked` makes them visible again.

use async_trait::async_trait;
use relay_core::RelayResult;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};

use super::{MessageQueue, ReceivedMessage};

#[derive(Default)]
struct QueueState {
    ready: VecDeque<(String, String)>,
    in_flight: HashMap<String, (String, String)>,
}

#[derive(Clone)]
pub struct InMemoryQueue {
    name: String,
    state: Arc<Mutex<QueueState>>,
    notify: Arc<Notify>,
    next_id: Arc<AtomicU64>,
    sends: Arc<AtomicUsize>,
}

impl InMemoryQueue {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            state: Arc::new(Mutex::new(QueueState::default())),
            notify: Arc::new(Notify::new()),
            next_id: Arc::new(AtomicU64::new(1)),
            sends: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Bodies of messages waiting to be received, oldest first.
    pub async fn pending(&self) -> Vec<String> {
        self.state
            .lock()
            .await
            .ready
            .iter()
            .map(|(_, body)| body.clone())
            .collect()
    }

    /// Number of messages received but not yet acked.
    pub async fn in_flight(&self) -> usize {
        self.state.lock().await.in_flight.len()
    }

    /// Total successful `send` calls.
    pub fn send_count(&self) -> usize {
        self.sends.load(Ordering::SeqCst)
    }

    /// Make every unacked delivery visible again, as the queue service does
    /// when a visibility timeout expires. Returns how many were requeued.
    pub async fn requeue_unacked(&self) -> usize {
        let mut state = self.state.lock().await;
        let mut returned: Vec<(String, String)> = state.in_flight.drain().map(|(_, m)| m).collect();
        // Keep original send order; ids are monotonically increasing.
        returned.sort_by_key(|(id, _)| id.parse::<u64>().unwrap_or(u64::MAX));
        let count = returned.len();
        for message in returned.into_iter().rev() {
            state.ready.push_front(message);
        }
        drop(state);
        if count > 0 {
            self.notify.notify_one();
        }
        count
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: String) -> RelayResult<()> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        self.state.lock().await.ready.push_back((id, body));
        self.sends.fetch_add(1, Ordering::SeqCst);
        self.notify.notify_one();
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> RelayResult<Vec<ReceivedMessage>> {
        let deadline = tokio::time::Instant::now() + wait;
        loop {
            {
                let mut state = self.state.lock().await;
                if !state.ready.is_empty() {
                    let take = max_messages.max(1).min(state.ready.len());
                    let drained: Vec<(String, String)> = state.ready.drain(..take).collect();
                    let mut received = Vec::with_capacity(take);
                    for (id, body) in drained {
                        let receipt = format!("{}-{}", self.name, id);
                        state
                            .in_flight
                            .insert(receipt.clone(), (id.clone(), body.clone()));
                        received.push(ReceivedMessage { id, body, receipt });
                    }
                    // Wake another receiver if messages remain.
                    if !state.ready.is_empty() {
                        self.notify.notify_one();
                    }
                    return Ok(received);
                }
            }

            if tokio::time::timeout_at(deadline, self.notify.notified())
                .await
                .is_err()
            {
                return Ok(Vec::new());
            }
        }
    }

    async fn ack(&self, message: &ReceivedMessage) -> RelayResult<()> {
        if self
            .state
            .lock()
            .await
            .in_flight
            .remove(&message.receipt)
            .is_none()
        {
            tracing::debug!(queue = %self.name, receipt = %message.receipt, "Ack for unknown receipt ignored");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn received_messages_are_hidden_until_acked() {
        let queue = InMemoryQueue::new("update");
        queue.send("a".to_string()).await.unwrap();
        queue.send("b".to_string()).await.unwrap();

        let received = queue.receive(1, Duration::ZERO).await.unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "a");
        assert_eq!(queue.pending().await, vec!["b".to_string()]);
        assert_eq!(queue.in_flight().await, 1);

        queue.ack(&received[0]).await.unwrap();
        assert_eq!(queue.in_flight().await, 0);
    }

    #[tokio::test]
    async fn unacked_messages_can_be_requeued_in_order() {
        let queue = InMemoryQueue::new("update");
        for body in ["a", "b", "c"] {
            queue.send(body.to_string()).await.unwrap();
        }
        let received = queue.receive(2, Duration::ZERO).await.unwrap();
        assert_eq!(received.len(), 2);

        assert_eq!(queue.requeue_unacked().await, 2);
        assert_eq!(
            queue.pending().await,
            vec!["a".to_string(), "b".to_string(), "c".to_string()]
        );
    }

    #[tokio::test]
    async fn empty_receive_times_out() {
        let queue = InMemoryQueue::new("update");
        let received = queue.receive(10, Duration::from_millis(10)).await.unwrap();
        assert!(received.is_empty());
    }

    #[tokio::test]
    async fn waiting_receive_wakes_on_send() {
        let queue = InMemoryQueue::new("update");
        let receiver = queue.clone();
        let handle =
            tokio::spawn(async move { receiver.receive(10, Duration::from_secs(5)).await });

        tokio::time::sleep(Duration::from_millis(20)).await;
        queue.send("late".to_string()).await.unwrap();

        let received = handle.await.unwrap().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].body, "late");
        assert_eq!(queue.send_count(), 1);
    }
}
