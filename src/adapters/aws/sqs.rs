use crate::ports::queue::{JobQueue, QueueError, QueueMessage};
use async_trait::async_trait;
use aws_sdk_sqs::types::MessageSystemAttributeName;
use aws_sdk_sqs::Client;

/// SQS-backed job queue. Receives do not acknowledge: a message stays
/// invisible for the queue's visibility timeout and is redelivered unless
/// `delete` is called with its receipt handle.
#[derive(Clone)]
pub struct SqsQueue {
    client: Client,
    queue_url: String,
}

impl SqsQueue {
    pub fn new(client: Client, queue_url: String) -> Self {
        Self { client, queue_url }
    }
}

#[async_trait]
impl JobQueue for SqsQueue {
    async fn send(&self, body: &str) -> Result<(), QueueError> {
        self.client
            .send_message()
            .queue_url(&self.queue_url)
            .message_body(body)
            .send()
            .await
            .map_err(|e| QueueError::Backend(Box::new(e.into_service_error())))?;
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let resp = self
            .client
            .receive_message()
            .queue_url(&self.queue_url)
            .max_number_of_messages(max_messages as i32)
            .wait_time_seconds(wait_seconds as i32)
            .message_system_attribute_names(MessageSystemAttributeName::ApproximateReceiveCount)
            .send()
            .await
            .map_err(|e| QueueError::Backend(Box::new(e.into_service_error())))?;

        let messages = resp
            .messages
            .unwrap_or_default()
            .into_iter()
            .filter_map(|msg| {
                let receipt_handle = msg.receipt_handle()?.to_string();
                let receive_count = msg
                    .attributes()
                    .and_then(|attrs| attrs.get(&MessageSystemAttributeName::ApproximateReceiveCount))
                    .and_then(|count| count.parse().ok())
                    .unwrap_or(1);
                Some(QueueMessage {
                    body: msg.body().unwrap_or_default().to_string(),
                    receipt_handle,
                    receive_count,
                })
            })
            .collect();

        Ok(messages)
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        self.client
            .delete_message()
            .queue_url(&self.queue_url)
            .receipt_handle(receipt_handle)
            .send()
            .await
            .map_err(|e| QueueError::Backend(Box::new(e.into_service_error())))?;
        Ok(())
    }
}
