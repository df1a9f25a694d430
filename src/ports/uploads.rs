use async_trait::async_trait;
use std::fmt;
use std::path::Path;

#[derive(Debug)]
pub enum UploadError {
    NotFound(String),
    Io(std::io::Error),
    Backend(Box<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for UploadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UploadError::NotFound(key) => write!(f, "upload not found: {}", key),
            UploadError::Io(e) => write!(f, "io error: {}", e),
            UploadError::Backend(e) => write!(f, "upload backend error: {}", e),
        }
    }
}

impl std::error::Error for UploadError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            UploadError::Io(e) => Some(e),
            UploadError::Backend(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

impl From<std::io::Error> for UploadError {
    fn from(err: std::io::Error) -> Self {
        UploadError::Io(err)
    }
}

/// Store for raw uploaded blobs, kept separate from published artifacts.
/// Keys are `uploads/<videoId>/<filename>` in the S3 backend and the
/// equivalent directory layout on the filesystem.
#[async_trait]
pub trait UploadStore: Send + Sync {
    /// Fetch the raw blob to a local path for processing.
    async fn download(
        &self,
        video_id: &str,
        filename: &str,
        dest: &Path,
    ) -> Result<(), UploadError>;

    /// Persist a freshly received blob from a local path.
    async fn store(&self, video_id: &str, filename: &str, src: &Path) -> Result<(), UploadError>;

    /// Remove every raw blob for `video_id`. Used by admin delete.
    async fn delete_prefix(&self, video_id: &str) -> Result<(), UploadError>;
}

#[async_trait]
impl<T: UploadStore + ?Sized> UploadStore for std::sync::Arc<T> {
    async fn download(
        &self,
        video_id: &str,
        filename: &str,
        dest: &Path,
    ) -> Result<(), UploadError> {
        (**self).download(video_id, filename, dest).await
    }

    async fn store(&self, video_id: &str, filename: &str, src: &Path) -> Result<(), UploadError> {
        (**self).store(video_id, filename, src).await
    }

    async fn delete_prefix(&self, video_id: &str) -> Result<(), UploadError> {
        (**self).delete_prefix(video_id).await
    }
}
