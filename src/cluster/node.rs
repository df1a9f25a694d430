use crate::pb::video_content_server::{VideoContent as VideoContentRpc, VideoContentServer};
use crate::pb::{
    DeleteFileRequest, DeleteFileResponse, ReadFileRequest, ReadFileResponse, WriteFileRequest,
    WriteFileResponse,
};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};
use tracing::{debug, info, warn};

/// Writing this filename deletes the entire grouping for the video id.
pub const DELETE_ALL_SENTINEL: &str = ".DELETE_ALL";

/// Node-side cap, sized for whole segments rather than fragmenting them.
pub const MAX_NODE_MESSAGE_BYTES: usize = 256 * 1024 * 1024;

/// A storage node: a remote byte store keyed by `(videoId, filename)` over
/// a local base directory. It holds no cluster state and is unaware of the
/// ring; the router decides what lands here.
#[derive(Debug, Clone)]
pub struct StorageNode {
    base_dir: PathBuf,
}

impl StorageNode {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn video_dir(&self, video_id: &str) -> Result<PathBuf, Status> {
        validate_component(video_id)?;
        Ok(self.base_dir.join(video_id))
    }

    fn artifact_path(&self, video_id: &str, filename: &str) -> Result<PathBuf, Status> {
        validate_component(filename)?;
        Ok(self.video_dir(video_id)?.join(filename))
    }
}

/// Keys are flat; a component that is empty or escapes the base directory
/// is a malformed request, not an IO error.
fn validate_component(component: &str) -> Result<(), Status> {
    if component.is_empty()
        || component == ".."
        || component.contains('/')
        || component.contains('\\')
    {
        return Err(Status::invalid_argument(format!(
            "invalid path component: {:?}",
            component
        )));
    }
    Ok(())
}

#[tonic::async_trait]
impl VideoContentRpc for StorageNode {
    async fn write_file(
        &self,
        request: Request<WriteFileRequest>,
    ) -> Result<Response<WriteFileResponse>, Status> {
        let req = request.into_inner();

        if req.filename == DELETE_ALL_SENTINEL {
            let dir = self.video_dir(&req.video_id)?;
            match tokio::fs::remove_dir_all(&dir).await {
                Ok(()) => info!(video_id = %req.video_id, "deleted video directory"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => {
                    return Err(Status::internal(format!(
                        "failed to delete video directory: {}",
                        e
                    )))
                }
            }
            return Ok(Response::new(WriteFileResponse { success: true }));
        }

        let dir = self.video_dir(&req.video_id)?;
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| Status::internal(format!("failed to create directory: {}", e)))?;

        // Write-then-rename so a concurrent reader sees either the old
        // bytes or the new, never a torn write.
        let path = self.artifact_path(&req.video_id, &req.filename)?;
        let tmp = dir.join(format!(".{}.tmp", req.filename));
        tokio::fs::write(&tmp, &req.data)
            .await
            .map_err(|e| Status::internal(format!("failed to write file: {}", e)))?;
        tokio::fs::rename(&tmp, &path)
            .await
            .map_err(|e| Status::internal(format!("failed to commit file: {}", e)))?;

        debug!(
            video_id = %req.video_id,
            filename = %req.filename,
            bytes = req.data.len(),
            "stored artifact"
        );
        Ok(Response::new(WriteFileResponse { success: true }))
    }

    async fn read_file(
        &self,
        request: Request<ReadFileRequest>,
    ) -> Result<Response<ReadFileResponse>, Status> {
        let req = request.into_inner();
        let path = self.artifact_path(&req.video_id, &req.filename)?;

        match tokio::fs::read(&path).await {
            Ok(data) => Ok(Response::new(ReadFileResponse { data })),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(Status::not_found(format!(
                "{}/{} not found",
                req.video_id, req.filename
            ))),
            Err(e) => Err(Status::internal(format!("failed to read file: {}", e))),
        }
    }

    async fn delete_file(
        &self,
        request: Request<DeleteFileRequest>,
    ) -> Result<Response<DeleteFileResponse>, Status> {
        let req = request.into_inner();
        let path = self.artifact_path(&req.video_id, &req.filename)?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {}
            // Already gone is fine: migration cleanup retries are harmless.
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => {
                warn!(
                    video_id = %req.video_id,
                    filename = %req.filename,
                    error = %e,
                    "failed to delete artifact"
                );
                return Err(Status::internal(format!("failed to delete file: {}", e)));
            }
        }
        Ok(Response::new(DeleteFileResponse { success: true }))
    }
}

/// Serve a node on an already-bound listener until the process exits.
pub async fn serve(
    listener: TcpListener,
    base_dir: impl AsRef<Path>,
) -> Result<(), tonic::transport::Error> {
    let node = StorageNode::new(base_dir.as_ref());
    Server::builder()
        .add_service(
            VideoContentServer::new(node)
                .max_decoding_message_size(MAX_NODE_MESSAGE_BYTES)
                .max_encoding_message_size(MAX_NODE_MESSAGE_BYTES),
        )
        .serve_with_incoming(TcpListenerStream::new(listener))
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_req(video_id: &str, filename: &str, data: &[u8]) -> Request<WriteFileRequest> {
        Request::new(WriteFileRequest {
            video_id: video_id.to_string(),
            filename: filename.to_string(),
            data: data.to_vec(),
        })
    }

    fn read_req(video_id: &str, filename: &str) -> Request<ReadFileRequest> {
        Request::new(ReadFileRequest {
            video_id: video_id.to_string(),
            filename: filename.to_string(),
        })
    }

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        node.write_file(write_req("v1", "manifest.mpd", b"X"))
            .await
            .unwrap();
        let resp = node.read_file(read_req("v1", "manifest.mpd")).await.unwrap();
        assert_eq!(resp.into_inner().data, b"X");
    }

    #[tokio::test]
    async fn overwrite_replaces_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        node.write_file(write_req("v1", "chunk-0-00001.m4s", b"old"))
            .await
            .unwrap();
        node.write_file(write_req("v1", "chunk-0-00001.m4s", b"new"))
            .await
            .unwrap();
        let resp = node
            .read_file(read_req("v1", "chunk-0-00001.m4s"))
            .await
            .unwrap();
        assert_eq!(resp.into_inner().data, b"new");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        let err = node.read_file(read_req("v1", "absent.m4s")).await.unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn delete_all_sentinel_removes_whole_video() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        node.write_file(write_req("v1", "manifest.mpd", b"m"))
            .await
            .unwrap();
        node.write_file(write_req("v1", "init-0.m4s", b"i"))
            .await
            .unwrap();
        node.write_file(write_req("v1", DELETE_ALL_SENTINEL, b""))
            .await
            .unwrap();

        let err = node
            .read_file(read_req("v1", "manifest.mpd"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::NotFound);
    }

    #[tokio::test]
    async fn delete_all_of_unknown_video_succeeds() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        let resp = node
            .write_file(write_req("nope", DELETE_ALL_SENTINEL, b""))
            .await
            .unwrap();
        assert!(resp.into_inner().success);
    }

    #[tokio::test]
    async fn delete_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        node.write_file(write_req("v1", "thumbnail.jpg", b"t"))
            .await
            .unwrap();
        for _ in 0..2 {
            let resp = node
                .delete_file(Request::new(DeleteFileRequest {
                    video_id: "v1".to_string(),
                    filename: "thumbnail.jpg".to_string(),
                }))
                .await
                .unwrap();
            assert!(resp.into_inner().success);
        }
    }

    #[tokio::test]
    async fn path_escapes_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let node = StorageNode::new(dir.path());

        let err = node
            .write_file(write_req("../evil", "manifest.mpd", b"x"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);

        let err = node
            .read_file(read_req("v1", "a/b.m4s"))
            .await
            .unwrap_err();
        assert_eq!(err.code(), tonic::Code::InvalidArgument);
    }
}
