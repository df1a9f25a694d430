use async_trait::async_trait;
use std::fmt;

/// A received message plus the handle needed to acknowledge it.
///
/// `receive_count` starts at 1 on first delivery; the worker uses it to
/// decide when a repeatedly failing job becomes terminal.
#[derive(Debug, Clone)]
pub struct QueueMessage {
    pub body: String,
    pub receipt_handle: String,
    pub receive_count: u32,
}

#[derive(Debug)]
pub enum QueueError {
    Serialization(serde_json::Error),
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QueueError::Serialization(e) => write!(f, "serialization error: {}", e),
            QueueError::Backend(e) => write!(f, "queue backend error: {}", e),
        }
    }
}

impl std::error::Error for QueueError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QueueError::Serialization(e) => Some(e),
            QueueError::Backend(e) => Some(e.as_ref()),
        }
    }
}

impl From<serde_json::Error> for QueueError {
    fn from(err: serde_json::Error) -> Self {
        QueueError::Serialization(err)
    }
}

/// At-least-once job handoff between ingest admission and workers.
///
/// Messages not deleted before their visibility timeout expires are
/// redelivered. No ordering is guaranteed across distinct videos.
#[async_trait]
pub trait JobQueue: Send + Sync {
    /// Durable enqueue of an opaque body.
    async fn send(&self, body: &str) -> Result<(), QueueError>;

    /// Long-poll receive of up to `max_messages`, waiting at most
    /// `wait_seconds` for the first one.
    async fn receive(
        &self,
        max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<QueueMessage>, QueueError>;

    /// Acknowledge a message so it is never redelivered.
    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError>;
}

#[async_trait]
impl<T: JobQueue + ?Sized> JobQueue for std::sync::Arc<T> {
    async fn send(&self, body: &str) -> Result<(), QueueError> {
        (**self).send(body).await
    }

    async fn receive(
        &self,
        max_messages: usize,
        wait_seconds: u64,
    ) -> Result<Vec<QueueMessage>, QueueError> {
        (**self).receive(max_messages, wait_seconds).await
    }

    async fn delete(&self, receipt_handle: &str) -> Result<(), QueueError> {
        (**self).delete(receipt_handle).await
    }
}
