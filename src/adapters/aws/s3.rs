use crate::domain::mime::content_type_for;
use crate::ports::content::{ContentError, VideoContent};
use crate::ports::uploads::{UploadError, UploadStore};
use async_trait::async_trait;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use std::path::Path;
use tracing::{info, warn};

fn upload_key(video_id: &str, filename: &str) -> String {
    format!("uploads/{}/{}", video_id, filename)
}

/// Raw-blob store on S3, keyed under the `uploads/` prefix to keep raw
/// material apart from published artifacts.
#[derive(Clone)]
pub struct S3Uploads {
    client: Client,
    bucket: String,
}

impl S3Uploads {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl UploadStore for S3Uploads {
    async fn download(
        &self,
        video_id: &str,
        filename: &str,
        dest: &Path,
    ) -> Result<(), UploadError> {
        let key = upload_key(video_id, filename);
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(UploadError::NotFound(key));
                }
                return Err(UploadError::Backend(Box::new(service_err)));
            }
        };

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| UploadError::Backend(Box::new(e)))?;
        tokio::fs::write(dest, body.into_bytes()).await?;
        Ok(())
    }

    async fn store(&self, video_id: &str, filename: &str, src: &Path) -> Result<(), UploadError> {
        let body = ByteStream::from_path(src)
            .await
            .map_err(|e| UploadError::Backend(Box::new(e)))?;

        let content_type = match filename.rsplit('.').next() {
            Some("mp4") => "video/mp4",
            Some("webm") => "video/webm",
            _ => "application/octet-stream",
        };

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(upload_key(video_id, filename))
            .content_type(content_type)
            .body(body)
            .send()
            .await
            .map_err(|e| UploadError::Backend(Box::new(e.into_service_error())))?;
        Ok(())
    }

    async fn delete_prefix(&self, video_id: &str) -> Result<(), UploadError> {
        let prefix = format!("uploads/{}/", video_id);
        let listing = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .send()
            .await
            .map_err(|e| UploadError::Backend(Box::new(e.into_service_error())))?;

        for object in listing.contents() {
            let Some(key) = object.key() else { continue };
            if let Err(e) = self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                warn!(key = %key, error = %e, "failed to delete raw upload");
            } else {
                info!(key = %key, "deleted raw upload");
            }
        }
        Ok(())
    }
}

/// Single-store content backend on S3, interchangeable with the cluster
/// router behind the `VideoContent` contract.
#[derive(Clone)]
pub struct S3Content {
    client: Client,
    bucket: String,
}

impl S3Content {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl VideoContent for S3Content {
    async fn read(&self, video_id: &str, filename: &str) -> Result<Vec<u8>, ContentError> {
        let key = format!("{}/{}", video_id, filename);
        let resp = match self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(err) => {
                let service_err = err.into_service_error();
                if service_err.is_no_such_key() {
                    return Err(ContentError::NotFound);
                }
                return Err(ContentError::Backend(service_err.to_string()));
            }
        };

        let body = resp
            .body
            .collect()
            .await
            .map_err(|e| ContentError::Backend(e.to_string()))?;
        Ok(body.into_bytes().to_vec())
    }

    async fn write(
        &self,
        video_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(), ContentError> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(format!("{}/{}", video_id, filename))
            .content_type(content_type_for(filename))
            .body(ByteStream::from(data.to_vec()))
            .send()
            .await
            .map_err(|e| ContentError::Backend(e.into_service_error().to_string()))?;
        Ok(())
    }

    async fn delete_all(&self, video_id: &str) -> Result<(), ContentError> {
        let prefix = format!("{}/", video_id);
        let listing = self
            .client
            .list_objects_v2()
            .bucket(&self.bucket)
            .prefix(&prefix)
            .send()
            .await
            .map_err(|e| ContentError::Backend(e.into_service_error().to_string()))?;

        let mut failures = Vec::new();
        for object in listing.contents() {
            let Some(key) = object.key() else { continue };
            if let Err(e) = self
                .client
                .delete_object()
                .bucket(&self.bucket)
                .key(key)
                .send()
                .await
            {
                warn!(key = %key, error = %e, "failed to delete artifact");
                failures.push(format!("{}: {}", key, e));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContentError::Partial(failures))
        }
    }
}
