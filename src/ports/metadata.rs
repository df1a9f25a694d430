use crate::domain::video::{VideoRecord, VideoStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::fmt;

#[derive(Debug)]
pub enum MetadataError {
    /// A record with this id already exists. Non-retryable.
    Conflict(String),
    NotFound(String),
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for MetadataError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MetadataError::Conflict(id) => write!(f, "video id already exists: {}", id),
            MetadataError::NotFound(id) => write!(f, "video not found: {}", id),
            MetadataError::Backend(e) => write!(f, "metadata backend error: {}", e),
        }
    }
}

impl std::error::Error for MetadataError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            MetadataError::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<sqlx::Error> for MetadataError {
    fn from(err: sqlx::Error) -> Self {
        MetadataError::Backend(Box::new(err))
    }
}

/// Keyed catalog of video records. Holds no payloads; backends (embedded
/// SQL, remote SQL, remote key-value) are interchangeable behind this
/// contract.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Insert a record that is immediately playable (synchronous ingest).
    async fn create(&self, id: &str, uploaded_at: DateTime<Utc>) -> Result<(), MetadataError> {
        self.create_with_status(id, uploaded_at, VideoStatus::Ready)
            .await
    }

    async fn create_with_status(
        &self,
        id: &str,
        uploaded_at: DateTime<Utc>,
        status: VideoStatus,
    ) -> Result<(), MetadataError>;

    /// Overwrite the status field. Idempotent.
    async fn update_status(&self, id: &str, status: VideoStatus) -> Result<(), MetadataError>;

    /// `None` when the id is absent; absence is not an error here.
    async fn read(&self, id: &str) -> Result<Option<VideoRecord>, MetadataError>;

    /// All records, most recently uploaded first.
    async fn list(&self) -> Result<Vec<VideoRecord>, MetadataError>;

    async fn delete(&self, id: &str) -> Result<(), MetadataError>;
}

#[async_trait]
impl<T: MetadataStore + ?Sized> MetadataStore for std::sync::Arc<T> {
    async fn create_with_status(
        &self,
        id: &str,
        uploaded_at: DateTime<Utc>,
        status: VideoStatus,
    ) -> Result<(), MetadataError> {
        (**self).create_with_status(id, uploaded_at, status).await
    }

    async fn update_status(&self, id: &str, status: VideoStatus) -> Result<(), MetadataError> {
        (**self).update_status(id, status).await
    }

    async fn read(&self, id: &str) -> Result<Option<VideoRecord>, MetadataError> {
        (**self).read(id).await
    }

    async fn list(&self) -> Result<Vec<VideoRecord>, MetadataError> {
        (**self).list().await
    }

    async fn delete(&self, id: &str) -> Result<(), MetadataError> {
        (**self).delete(id).await
    }
}
