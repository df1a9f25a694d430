use crate::domain::jobs::ProcessingJob;
use crate::domain::video::VideoStatus;
use crate::ports::metadata::{MetadataError, MetadataStore};
use crate::ports::queue::{JobQueue, QueueError};
use chrono::Utc;
use std::fmt;
use tracing::info;

#[derive(Debug)]
pub enum AdmissionError {
    /// The video id is already registered or mid-processing.
    AlreadyExists(String),
    Metadata(MetadataError),
    Queue(QueueError),
    Serialization(serde_json::Error),
}

impl fmt::Display for AdmissionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AdmissionError::AlreadyExists(id) => {
                write!(f, "video already exists or is being processed: {}", id)
            }
            AdmissionError::Metadata(e) => write!(f, "admission metadata failure: {}", e),
            AdmissionError::Queue(e) => write!(f, "admission enqueue failure: {}", e),
            AdmissionError::Serialization(e) => write!(f, "admission serialization failure: {}", e),
        }
    }
}

impl std::error::Error for AdmissionError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            AdmissionError::Metadata(e) => Some(e),
            AdmissionError::Queue(e) => Some(e),
            AdmissionError::Serialization(e) => Some(e),
            AdmissionError::AlreadyExists(_) => None,
        }
    }
}

/// Ingest admission: registers a new video as `processing` and hands the
/// work to the queue. Performs no transcoding itself.
///
/// The metadata create runs first so a successful admission always implies
/// both the record and the job exist; a failed enqueue leaves a
/// `processing` record behind for later deletion or repair, never a job
/// without a record.
pub struct AdmissionService<M, Q> {
    metadata: M,
    queue: Q,
}

impl<M, Q> AdmissionService<M, Q>
where
    M: MetadataStore,
    Q: JobQueue,
{
    pub fn new(metadata: M, queue: Q) -> Self {
        Self { metadata, queue }
    }

    pub async fn admit(&self, video_id: &str, filename: &str) -> Result<(), AdmissionError> {
        match self
            .metadata
            .create_with_status(video_id, Utc::now(), VideoStatus::Processing)
            .await
        {
            Ok(()) => {}
            Err(MetadataError::Conflict(id)) => return Err(AdmissionError::AlreadyExists(id)),
            Err(e) => return Err(AdmissionError::Metadata(e)),
        }

        let body = ProcessingJob::new(video_id, filename)
            .to_json()
            .map_err(AdmissionError::Serialization)?;
        self.queue
            .send(&body)
            .await
            .map_err(AdmissionError::Queue)?;

        info!(video_id = %video_id, filename = %filename, "job enqueued");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::local::MemoryQueue;
    use crate::adapters::sql::SqliteMetadata;
    use std::sync::Arc;
    use std::time::Duration;

    async fn service() -> AdmissionService<Arc<SqliteMetadata>, Arc<MemoryQueue>> {
        let metadata = Arc::new(SqliteMetadata::open_in_memory().await.unwrap());
        let queue = Arc::new(MemoryQueue::new(Duration::from_secs(30)));
        AdmissionService::new(metadata, queue)
    }

    #[tokio::test]
    async fn admission_creates_processing_record_and_enqueues() {
        let service = service().await;
        service.admit("demo", "demo.mp4").await.unwrap();

        let record = service.metadata.read("demo").await.unwrap().unwrap();
        assert_eq!(record.status, VideoStatus::Processing);

        let batch = service.queue.receive(1, 0).await.unwrap();
        assert_eq!(batch.len(), 1);
        let job = ProcessingJob::from_json(&batch[0].body).unwrap();
        assert_eq!(job, ProcessingJob::new("demo", "demo.mp4"));
    }

    #[tokio::test]
    async fn conflicting_admission_does_not_enqueue() {
        let service = service().await;
        service.admit("demo", "demo.mp4").await.unwrap();
        // Drain the first job so the queue is provably empty afterwards.
        let batch = service.queue.receive(1, 0).await.unwrap();
        service.queue.delete(&batch[0].receipt_handle).await.unwrap();

        let err = service.admit("demo", "demo2.mp4").await.unwrap_err();
        assert!(matches!(err, AdmissionError::AlreadyExists(id) if id == "demo"));
        assert!(service.queue.receive(1, 0).await.unwrap().is_empty());
    }
}
