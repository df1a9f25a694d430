//! JSON API and content-plane HTTP surface served by the web binary:
//! admission, catalog listing, artifact bytes, and multipart upload. No
//! HTML here; the front-end is a separate client of this API.

use crate::application::admission::{AdmissionError, AdmissionService};
use crate::domain::mime::content_type_for;
use crate::ports::content::{ContentError, VideoContent};
use crate::ports::metadata::{MetadataError, MetadataStore};
use crate::ports::queue::JobQueue;
use crate::ports::uploads::UploadStore;
use axum::body::Bytes;
use axum::extract::{DefaultBodyLimit, Multipart, Path as UrlPath, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{BoxError, Json, Router};
use futures::{Stream, TryStreamExt};
use serde::{Deserialize, Serialize};
use std::io;
use std::path::Path;
use std::sync::Arc;
use tokio::fs::File;
use tokio::io::{AsyncWriteExt, BufWriter};
use tokio_util::io::StreamReader;
use tower_http::cors::{Any, CorsLayer};
use tracing::{error, warn};

pub struct AppState {
    pub metadata: Arc<dyn MetadataStore>,
    pub content: Arc<dyn VideoContent>,
    pub queue: Arc<dyn JobQueue>,
    pub uploads: Arc<dyn UploadStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/videos", get(list_videos))
        .route("/api/videos/:id", get(video_detail))
        .route("/api/process", post(process_video))
        .route("/api/upload", post(upload_video))
        .route("/api/delete/:id", delete(delete_video).post(delete_video))
        .route("/content/:video_id/:filename", get(video_content))
        .route("/thumbnail/:video_id", get(thumbnail))
        .layer(DefaultBodyLimit::disable())
        .layer(cors)
        .with_state(state)
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiVideo {
    id: String,
    uploaded_at: String,
    status: String,
    manifest_url: String,
    thumbnail_url: String,
}

impl ApiVideo {
    fn from_record(record: &crate::domain::video::VideoRecord) -> Self {
        Self {
            id: record.id.clone(),
            uploaded_at: record.uploaded_at.to_rfc3339(),
            status: record.status.as_str().to_string(),
            manifest_url: format!("/content/{}/manifest.mpd", record.id),
            thumbnail_url: format!("/thumbnail/{}", record.id),
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ApiVideoList {
    data: Vec<ApiVideo>,
    total: usize,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProcessRequest {
    video_id: String,
    filename: String,
}

#[derive(Serialize)]
struct ApiErrorBody {
    error: String,
    message: String,
}

type ApiError = (StatusCode, Json<ApiErrorBody>);
type ApiResult<T> = Result<T, ApiError>;

fn json_error(status: StatusCode, message: impl Into<String>) -> ApiError {
    (
        status,
        Json(ApiErrorBody {
            error: status
                .canonical_reason()
                .unwrap_or("error")
                .to_string(),
            message: message.into(),
        }),
    )
}

async fn list_videos(State(state): State<Arc<AppState>>) -> ApiResult<Json<ApiVideoList>> {
    let records = state.metadata.list().await.map_err(|e| {
        error!(error = %e, "failed to list videos");
        json_error(StatusCode::INTERNAL_SERVER_ERROR, "failed to list videos")
    })?;

    let data: Vec<ApiVideo> = records.iter().map(ApiVideo::from_record).collect();
    let total = data.len();
    Ok(Json(ApiVideoList { data, total }))
}

async fn video_detail(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Json<ApiVideo>> {
    let record = state.metadata.read(&id).await.map_err(|e| {
        error!(video_id = %id, error = %e, "failed to read video metadata");
        json_error(
            StatusCode::INTERNAL_SERVER_ERROR,
            "failed to read video metadata",
        )
    })?;

    match record {
        Some(record) => Ok(Json(ApiVideo::from_record(&record))),
        None => Err(json_error(StatusCode::NOT_FOUND, "video not found")),
    }
}

async fn process_video(
    State(state): State<Arc<AppState>>,
    Json(body): Json<ProcessRequest>,
) -> ApiResult<Response> {
    if body.video_id.is_empty() || body.filename.is_empty() {
        return Err(json_error(
            StatusCode::BAD_REQUEST,
            "videoId and filename are required",
        ));
    }

    let admission = AdmissionService::new(state.metadata.clone(), state.queue.clone());
    match admission.admit(&body.video_id, &body.filename).await {
        Ok(()) => Ok((
            StatusCode::ACCEPTED,
            Json(serde_json::json!({
                "status": "enqueued",
                "videoId": body.video_id,
            })),
        )
            .into_response()),
        Err(AdmissionError::AlreadyExists(id)) => Err(json_error(
            StatusCode::CONFLICT,
            format!("video '{}' already exists or is being processed", id),
        )),
        Err(e) => {
            error!(video_id = %body.video_id, error = %e, "admission failed");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to start processing",
            ))
        }
    }
}

async fn upload_video(
    State(state): State<Arc<AppState>>,
    mut multipart: Multipart,
) -> ApiResult<Response> {
    while let Some(field) = multipart.next_field().await.map_err(|e| {
        json_error(StatusCode::BAD_REQUEST, format!("invalid form data: {}", e))
    })? {
        let Some(file_name) = field.file_name().map(str::to_owned) else {
            continue;
        };
        if !file_name.ends_with(".mp4") {
            return Err(json_error(
                StatusCode::BAD_REQUEST,
                "invalid file type, only MP4 files are allowed",
            ));
        }
        let video_id = file_name.trim_end_matches(".mp4").to_string();
        if video_id.is_empty() {
            return Err(json_error(StatusCode::BAD_REQUEST, "empty video id"));
        }

        match state.metadata.read(&video_id).await {
            Ok(Some(_)) => {
                return Err(json_error(
                    StatusCode::CONFLICT,
                    format!("video ID '{}' already exists", video_id),
                ))
            }
            Ok(None) => {}
            Err(e) => {
                error!(video_id = %video_id, error = %e, "metadata check failed");
                return Err(json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to check existing video",
                ));
            }
        }

        let scratch = tempfile::tempdir().map_err(|e| {
            error!(error = %e, "failed to create temp directory");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to save uploaded file",
            )
        })?;
        let local = scratch.path().join(&file_name);
        stream_to_file(&local, field).await.map_err(|e| {
            error!(video_id = %video_id, error = %e, "failed to save upload");
            json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to save uploaded file",
            )
        })?;

        state
            .uploads
            .store(&video_id, &file_name, &local)
            .await
            .map_err(|e| {
                error!(video_id = %video_id, error = %e, "failed to store raw upload");
                json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to store uploaded file",
                )
            })?;

        let admission = AdmissionService::new(state.metadata.clone(), state.queue.clone());
        return match admission.admit(&video_id, &file_name).await {
            Ok(()) => Ok((
                StatusCode::ACCEPTED,
                Json(serde_json::json!({
                    "status": "processing",
                    "videoId": video_id,
                })),
            )
                .into_response()),
            Err(AdmissionError::AlreadyExists(id)) => Err(json_error(
                StatusCode::CONFLICT,
                format!("video '{}' already exists or is being processed", id),
            )),
            Err(e) => {
                error!(video_id = %video_id, error = %e, "admission failed");
                Err(json_error(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "failed to start processing",
                ))
            }
        };
    }

    Err(json_error(StatusCode::BAD_REQUEST, "missing file field"))
}

async fn delete_video(
    State(state): State<Arc<AppState>>,
    UrlPath(id): UrlPath<String>,
) -> ApiResult<Response> {
    match state.metadata.read(&id).await {
        Ok(Some(_)) => {}
        Ok(None) => return Err(json_error(StatusCode::NOT_FOUND, "video not found")),
        Err(e) => {
            error!(video_id = %id, error = %e, "failed to read video metadata");
            return Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read video metadata",
            ));
        }
    }

    // Artifact and raw-blob deletion are best-effort; the catalog row is
    // authoritative and goes last.
    if let Err(e) = state.content.delete_all(&id).await {
        warn!(video_id = %id, error = %e, "failed to delete video content");
    }
    if let Err(e) = state.uploads.delete_prefix(&id).await {
        warn!(video_id = %id, error = %e, "failed to delete raw upload");
    }

    match state.metadata.delete(&id).await {
        Ok(()) => Ok(Json(serde_json::json!({
            "success": true,
            "message": "video deleted",
            "id": id,
        }))
        .into_response()),
        Err(MetadataError::NotFound(_)) => {
            Err(json_error(StatusCode::NOT_FOUND, "video not found"))
        }
        Err(e) => {
            error!(video_id = %id, error = %e, "failed to delete video metadata");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to delete video metadata",
            ))
        }
    }
}

async fn video_content(
    State(state): State<Arc<AppState>>,
    UrlPath((video_id, filename)): UrlPath<(String, String)>,
) -> ApiResult<Response> {
    match state.content.read(&video_id, &filename).await {
        Ok(data) => Ok((
            [(header::CONTENT_TYPE, content_type_for(&filename))],
            data,
        )
            .into_response()),
        Err(ContentError::NotFound) => {
            Err(json_error(StatusCode::NOT_FOUND, "content not found"))
        }
        Err(ContentError::NoNodes) => Err(json_error(
            StatusCode::SERVICE_UNAVAILABLE,
            "no storage nodes available",
        )),
        Err(e) => {
            error!(video_id = %video_id, filename = %filename, error = %e, "content read failed");
            Err(json_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to read video content",
            ))
        }
    }
}

async fn thumbnail(
    State(state): State<Arc<AppState>>,
    UrlPath(video_id): UrlPath<String>,
) -> ApiResult<Response> {
    match state.content.read(&video_id, "thumbnail.jpg").await {
        Ok(data) => Ok((
            [
                (header::CONTENT_TYPE, "image/jpeg"),
                (header::CACHE_CONTROL, "public, max-age=86400"),
            ],
            data,
        )
            .into_response()),
        Err(ContentError::NotFound) => {
            Err(json_error(StatusCode::NOT_FOUND, "thumbnail not found"))
        }
        Err(e) => {
            warn!(video_id = %video_id, error = %e, "thumbnail read failed");
            Err(json_error(StatusCode::NOT_FOUND, "thumbnail not found"))
        }
    }
}

// Save a multipart field (or any byte stream) to a file.
async fn stream_to_file<S, E>(path: &Path, stream: S) -> io::Result<()>
where
    S: Stream<Item = Result<Bytes, E>>,
    E: Into<BoxError>,
{
    let body_with_io_error =
        stream.map_err(|err| io::Error::new(io::ErrorKind::Other, err));
    let body_reader = StreamReader::new(body_with_io_error);
    futures::pin_mut!(body_reader);

    let mut file = BufWriter::new(File::create(path).await?);
    tokio::io::copy(&mut body_reader, &mut file).await?;
    file.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn stream_to_file_writes_all_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.mp4");

        let chunks = stream::iter(vec![
            Ok::<Bytes, io::Error>(Bytes::from_static(b"hello ")),
            Ok::<Bytes, io::Error>(Bytes::from_static(b"world")),
        ]);
        stream_to_file(&path, chunks).await.unwrap();

        assert_eq!(tokio::fs::read(&path).await.unwrap(), b"hello world");
    }

    #[tokio::test]
    async fn stream_to_file_propagates_stream_errors() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.mp4");

        let chunks = stream::iter(vec![Err::<Bytes, _>(io::Error::new(
            io::ErrorKind::Other,
            "boom",
        ))]);
        assert!(stream_to_file(&path, chunks).await.is_err());
    }
}
