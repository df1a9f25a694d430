use crate::ports::queue::{JobQueue, QueueError, QueueMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

struct StoredMessage {
    id: u64,
    body: String,
    receive_count: u32,
    visible_at: Instant,
    /// Handle of the latest delivery; only it may acknowledge.
    current_receipt: Option<String>,
}

/// In-process queue with per-message visibility timeouts, used by the
/// single-host deployment and the test suites. Semantics match the SQS
/// contract: at-least-once, FIFO-ish, redelivery on expired visibility.
pub struct MemoryQueue {
    messages: Mutex<VecDeque<StoredMessage>>,
    visibility: Duration,
    next_id: AtomicU64,
}

impl MemoryQueue {
    pub fn new(visibility: Duration) -> Self {
        Self {
            messages: Mutex::new(VecDeque::new()),
            visibility,
            next_id: AtomicU64::new(1),
        }
    }

    async fn poll_once(&self, max_messages: usize) -> Vec<QueueMessage> {
        let now = Instant::now();
        let mut messages = self.messages.lock().await;
        let mut delivered = Vec::new();

        for msg in messages.iter_mut() {
            if delivered.len() >= max_messages {
                break;
            }
            if msg.visible_at > now {
                continue;
            }
            msg.receive_count += 1;
            msg.visible_at = now + self.visibility;
            let receipt = format!("{}:{}", msg.id, msg.receive_count);
            msg.current_receipt = Some(receipt.clone());
            delivered.push(QueueMessage {
                body: msg.body.clone(),
                receipt_handle: receipt,
                receive_count: msg.receive_count,
            });
        }
        delivered
    }
}

impl Default for MemoryQueue {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl JobQueue for MemoryQueue {
    async fn send(&self, body: &str) -> Result<(), QueueError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        self.messages.lock().await.push_back(StoredMessage {
            id,
            body: body.to_string(),
            receive_count: 0,
            visible_at: Instant::now(),
            current_receipt: None,
        });
        Ok(())
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        let deadline = Instant::now() + Duration::from_secs(wait_seconds);

        loop {
            let delivered = self.poll_once(max_messages).await;
            if !delivered.is_empty() || Instant::now() >= deadline {
                return Ok(delivered);
            }
            tokio::time::sleep(Duration::from_millis(25)).await;
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        let mut messages = self.messages.lock().await;
        // A receipt from a superseded delivery no longer matches and the
        // delete is a no-op, so redelivered work cannot be acknowledged by
        // a stale handle.
        messages.retain(|msg| msg.current_receipt.as_deref() != Some(receipt_handle));
        Ok(())
    }
}
