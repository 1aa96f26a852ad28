//! Amazon SQS queue backend.

use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_sqs::Client as SqsClient;
use relay_core::{RelayError, RelayResult};
use std::time::Duration;

use super::{MessageQueue, ReceivedMessage};

/// SQS caps a single receive at 10 messages and 20 seconds of long polling.
const SQS_MAX_MESSAGES: usize = 10;
const SQS_MAX_WAIT_SECS: u64 = 20;

#[derive(Clone)]
pub struct SqsQueue {
    client: SqsClient,
    name: String,
    url: String,
}

impl SqsQueue {
    pub fn new(client: SqsClient, name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            client,
            name: name.into(),
            url: url.into(),
        }
    }

    /// Build a client from the default AWS credential chain.
    pub async fn client_for_region(region: Option<&str>) -> SqsClient {
        let mut loader = aws_config::defaults(BehaviorVersion::latest());
        if let Some(region) = region {
            loader = loader.region(aws_config::Region::new(region.to_string()));
        }
        let config = loader.load().await;
        SqsClient::new(&config)
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    fn receive_failed(&self, reason: impl ToString) -> RelayError {
        RelayError::QueueReceiveFailed {
            queue: self.name.clone(),
            reason: reason.to_string(),
        }
    }
}

#[async_trait]
impl MessageQueue for SqsQueue {
    fn name(&self) -> &str {
        &self.name
    }

    async fn send(&self, body: String) -> RelayResult<()> {
        self.client
            .send_message()
            .queue_url(&self.url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| RelayError::QueueSendFailed {
                queue: self.name.clone(),
                reason: e.to_string(),
            })?;
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait: Duration,
    ) -> RelayResult<Vec<ReceivedMessage>> {
        let output = self
            .client
            .receive_message()
            .queue_url(&self.url)
            .max_number_of_messages(max_messages.clamp(1, SQS_MAX_MESSAGES) as i32)
            .wait_time_seconds(wait.as_secs().min(SQS_MAX_WAIT_SECS) as i32)
            .send()
            .await
            .map_err(|e| self.receive_failed(e))?;

        let messages = output
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|message| {
                let receipt = message.receipt_handle?;
                Some(ReceivedMessage {
                    id: message.message_id.unwrap_or_default(),
                    body: message.body.unwrap_or_default(),
                    receipt,
                })
            })
            .collect();
        Ok(messages)
    }

    async fn ack(&self, message: &ReceivedMessage) -> RelayResult<()> {
        self.client
            .delete_message()
            .queue_url(&self.url)
            .receipt_handle(&message.receipt)
            .send()
            .await
            .map_err(|e| self.receive_failed(e))?;
        Ok(())
    }
}
