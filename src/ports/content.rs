use async_trait::async_trait;
use std::fmt;

/// Errors from a content backend (single store or the cluster router).
#[derive(Debug)]
pub enum ContentError {
    /// The routing ring has no members; nothing can be read or written.
    NoNodes,
    /// The addressed `(videoId, filename)` object does not exist.
    NotFound,
    /// Admin add of an address that is already a ring member.
    AlreadyMember(String),
    /// Admin remove of an address that is not a ring member.
    UnknownNode(String),
    /// A node RPC failed (deadline, connection refused, server error).
    Rpc(tonic::Status),
    Io(std::io::Error),
    /// Best-effort bulk operation completed with some per-item failures.
    Partial(Vec<String>),
    Backend(String),
}

impl fmt::Display for ContentError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ContentError::NoNodes => write!(f, "no storage nodes in the ring"),
            ContentError::NotFound => write!(f, "content not found"),
            ContentError::AlreadyMember(addr) => {
                write!(f, "node already in the ring: {}", addr)
            }
            ContentError::UnknownNode(addr) => write!(f, "node not in the ring: {}", addr),
            ContentError::Rpc(status) => write!(f, "node rpc failed: {}", status),
            ContentError::Io(e) => write!(f, "io error: {}", e),
            ContentError::Partial(failures) => {
                write!(f, "partial failure: {}", failures.join("; "))
            }
            ContentError::Backend(msg) => write!(f, "content backend error: {}", msg),
        }
    }
}

impl std::error::Error for ContentError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ContentError::Rpc(status) => Some(status),
            ContentError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<tonic::Status> for ContentError {
    fn from(status: tonic::Status) -> Self {
        if status.code() == tonic::Code::NotFound {
            ContentError::NotFound
        } else {
            ContentError::Rpc(status)
        }
    }
}

impl From<std::io::Error> for ContentError {
    fn from(err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            ContentError::NotFound
        } else {
            ContentError::Io(err)
        }
    }
}

/// Byte store for published artifacts, keyed by `(videoId, filename)`.
///
/// Objects are created and deleted, never mutated; an overwrite is a create
/// that replaces the previous bytes atomically from a reader's perspective.
#[async_trait]
pub trait VideoContent: Send + Sync {
    async fn read(&self, video_id: &str, filename: &str) -> Result<Vec<u8>, ContentError>;

    async fn write(&self, video_id: &str, filename: &str, data: &[u8])
        -> Result<(), ContentError>;

    /// Remove every artifact stored for `video_id`.
    async fn delete_all(&self, video_id: &str) -> Result<(), ContentError>;
}

#[async_trait]
impl<T: VideoContent + ?Sized> VideoContent for std::sync::Arc<T> {
    async fn read(&self, video_id: &str, filename: &str) -> Result<Vec<u8>, ContentError> {
        (**self).read(video_id, filename).await
    }

    async fn write(
        &self,
        video_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(), ContentError> {
        (**self).write(video_id, filename, data).await
    }

    async fn delete_all(&self, video_id: &str) -> Result<(), ContentError> {
        (**self).delete_all(video_id).await
    }
}
