use crate::ports::content::{ContentError, VideoContent};
use crate::ports::uploads::{UploadError, UploadStore};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::path::Path;

/// Raw-blob store on the local filesystem, laid out
/// `<base>/<videoId>/<filename>` to mirror the S3 `uploads/` prefix.
#[derive(Clone)]
pub struct FsUploads {
    base_dir: PathBuf,
}

impl FsUploads {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    fn blob_path(&self, video_id: &str, filename: &str) -> PathBuf {
        self.base_dir.join(video_id).join(filename)
    }
}

#[async_trait]
impl UploadStore for FsUploads {
    async fn download(
        &self,
        video_id: &str,
        filename: &str,
        dest: &Path,
    ) -> Result<(), UploadError> {
        let src = self.blob_path(video_id, filename);
        match tokio::fs::copy(&src, dest).await {
            Ok(_) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(UploadError::NotFound(
                format!("{}/{}", video_id, filename),
            )),
            Err(e) => Err(e.into()),
        }
    }

    async fn store(&self, video_id: &str, filename: &str, src: &Path) -> Result<(), UploadError> {
        let dest = self.blob_path(video_id, filename);
        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::copy(src, &dest).await?;
        Ok(())
    }

    async fn delete_prefix(&self, video_id: &str) -> Result<(), UploadError> {
        match tokio::fs::remove_dir_all(self.base_dir.join(video_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Single-store content backend on the local filesystem, interchangeable
/// with the cluster router behind the `VideoContent` contract.
#[derive(Clone)]
pub struct FsContent {
    base_dir: PathBuf,
}

impl FsContent {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }
}

#[async_trait]
impl VideoContent for FsContent {
    async fn read(&self, video_id: &str, filename: &str) -> Result<Vec<u8>, ContentError> {
        let path = self.base_dir.join(video_id).join(filename);
        Ok(tokio::fs::read(&path).await?)
    }

    async fn write(
        &self,
        video_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(), ContentError> {
        let dir = self.base_dir.join(video_id);
        tokio::fs::create_dir_all(&dir).await?;
        tokio::fs::write(dir.join(filename), data).await?;
        Ok(())
    }

    async fn delete_all(&self, video_id: &str) -> Result<(), ContentError> {
        match tokio::fs::remove_dir_all(self.base_dir.join(video_id)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn uploads_round_trip_through_base_dir() {
        let base = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let uploads = FsUploads::new(base.path());

        let src = scratch.path().join("demo.mp4");
        tokio::fs::write(&src, b"raw-bytes").await.unwrap();
        uploads.store("demo", "demo.mp4", &src).await.unwrap();

        let dest = scratch.path().join("fetched.mp4");
        uploads.download("demo", "demo.mp4", &dest).await.unwrap();
        assert_eq!(tokio::fs::read(&dest).await.unwrap(), b"raw-bytes");
    }

    #[tokio::test]
    async fn download_of_absent_blob_is_not_found() {
        let base = tempfile::tempdir().unwrap();
        let uploads = FsUploads::new(base.path());

        let err = uploads
            .download("demo", "demo.mp4", Path::new("/tmp/never-written"))
            .await
            .unwrap_err();
        assert!(matches!(err, UploadError::NotFound(_)));
    }

    #[tokio::test]
    async fn delete_prefix_removes_all_blobs_and_is_idempotent() {
        let base = tempfile::tempdir().unwrap();
        let scratch = tempfile::tempdir().unwrap();
        let uploads = FsUploads::new(base.path());

        let src = scratch.path().join("demo.mp4");
        tokio::fs::write(&src, b"raw").await.unwrap();
        uploads.store("demo", "demo.mp4", &src).await.unwrap();

        uploads.delete_prefix("demo").await.unwrap();
        uploads.delete_prefix("demo").await.unwrap();
        assert!(!base.path().join("demo").exists());
    }

    #[tokio::test]
    async fn content_write_read_delete_all() {
        let base = tempfile::tempdir().unwrap();
        let content = FsContent::new(base.path());

        content.write("v1", "manifest.mpd", b"mpd").await.unwrap();
        assert_eq!(content.read("v1", "manifest.mpd").await.unwrap(), b"mpd");

        content.delete_all("v1").await.unwrap();
        let err = content.read("v1", "manifest.mpd").await.unwrap_err();
        assert!(matches!(err, ContentError::NotFound));
    }
}
