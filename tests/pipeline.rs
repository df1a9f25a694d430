//! Ingest pipeline scenarios: admission, worker processing, poison
//! handling, redelivery convergence, and terminal failure — over the
//! in-process queue, an in-memory SQLite catalog, filesystem uploads, and
//! a stub transcoder that produces the DASH layout.

use async_trait::async_trait;
use ringtube::adapters::local::{FsUploads, MemoryQueue};
use ringtube::adapters::sql::SqliteMetadata;
use ringtube::application::{AdmissionService, WorkerService};
use ringtube::domain::video::VideoStatus;
use ringtube::ports::content::{ContentError, VideoContent};
use ringtube::ports::metadata::MetadataStore;
use ringtube::ports::queue::JobQueue;
use ringtube::ports::transcoder::{TranscodeError, Transcoder};
use ringtube::ports::uploads::UploadStore;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Content store double keeping artifacts in a map, like a single node
/// would on disk.
#[derive(Default)]
struct InMemoryContent {
    objects: Mutex<HashMap<(String, String), Vec<u8>>>,
    /// Writes that should fail before the store starts accepting.
    fail_writes: AtomicUsize,
}

impl InMemoryContent {
    fn failing_first(n: usize) -> Self {
        Self {
            objects: Mutex::new(HashMap::new()),
            fail_writes: AtomicUsize::new(n),
        }
    }
}

#[async_trait]
impl VideoContent for InMemoryContent {
    async fn read(&self, video_id: &str, filename: &str) -> Result<Vec<u8>, ContentError> {
        self.objects
            .lock()
            .unwrap()
            .get(&(video_id.to_string(), filename.to_string()))
            .cloned()
            .ok_or(ContentError::NotFound)
    }

    async fn write(
        &self,
        video_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(), ContentError> {
        if self
            .fail_writes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(ContentError::Backend("injected write failure".to_string()));
        }
        self.objects
            .lock()
            .unwrap()
            .insert((video_id.to_string(), filename.to_string()), data.to_vec());
        Ok(())
    }

    async fn delete_all(&self, video_id: &str) -> Result<(), ContentError> {
        self.objects
            .lock()
            .unwrap()
            .retain(|(v, _), _| v != video_id);
        Ok(())
    }
}

/// Transcoder double producing the artifact layout the real ffmpeg
/// invocation would leave in the working directory.
struct StubTranscoder;

#[async_trait]
impl Transcoder for StubTranscoder {
    async fn transcode(&self, _input: &Path, workdir: &Path) -> Result<(), TranscodeError> {
        std::fs::write(workdir.join("manifest.mpd"), b"<MPD/>").unwrap();
        std::fs::write(workdir.join("init-0.m4s"), b"init-seg").unwrap();
        std::fs::write(workdir.join("chunk-0-00001.m4s"), b"chunk-seg").unwrap();
        Ok(())
    }

    async fn thumbnail(&self, _input: &Path, workdir: &Path) -> Result<(), TranscodeError> {
        std::fs::write(workdir.join("thumbnail.jpg"), b"jpeg").unwrap();
        Ok(())
    }
}

struct Pipeline {
    _uploads_dir: TempDir,
    uploads: Arc<FsUploads>,
    content: Arc<InMemoryContent>,
    metadata: Arc<SqliteMetadata>,
    queue: Arc<MemoryQueue>,
}

impl Pipeline {
    async fn new(visibility: Duration, content: InMemoryContent) -> Self {
        let uploads_dir = tempfile::tempdir().unwrap();
        Self {
            uploads: Arc::new(FsUploads::new(uploads_dir.path())),
            _uploads_dir: uploads_dir,
            content: Arc::new(content),
            metadata: Arc::new(SqliteMetadata::open_in_memory().await.unwrap()),
            queue: Arc::new(MemoryQueue::new(visibility)),
        }
    }

    fn worker(
        &self,
    ) -> WorkerService<
        Arc<FsUploads>,
        Arc<InMemoryContent>,
        Arc<SqliteMetadata>,
        Arc<MemoryQueue>,
        StubTranscoder,
    > {
        WorkerService::new(
            self.uploads.clone(),
            self.content.clone(),
            self.metadata.clone(),
            self.queue.clone(),
            StubTranscoder,
        )
    }

    fn admission(&self) -> AdmissionService<Arc<SqliteMetadata>, Arc<MemoryQueue>> {
        AdmissionService::new(self.metadata.clone(), self.queue.clone())
    }

    async fn seed_upload(&self, video_id: &str, filename: &str) {
        let scratch = tempfile::tempdir().unwrap();
        let src = scratch.path().join(filename);
        std::fs::write(&src, b"raw-mp4-bytes").unwrap();
        self.uploads.store(video_id, filename, &src).await.unwrap();
    }

    async fn status(&self, video_id: &str) -> VideoStatus {
        self.metadata.read(video_id).await.unwrap().unwrap().status
    }
}

#[tokio::test]
async fn ingest_happy_path_ends_ready_with_artifacts() {
    let pipeline = Pipeline::new(Duration::from_secs(30), InMemoryContent::default()).await;
    pipeline.seed_upload("demo", "demo.mp4").await;

    pipeline.admission().admit("demo", "demo.mp4").await.unwrap();
    assert_eq!(pipeline.status("demo").await, VideoStatus::Processing);

    let worker = pipeline.worker();
    let batch = pipeline.queue.receive(1, 0).await.unwrap();
    assert_eq!(batch.len(), 1);
    worker.handle_message(&batch[0]).await;

    assert_eq!(pipeline.status("demo").await, VideoStatus::Ready);
    let manifest = pipeline.content.read("demo", "manifest.mpd").await.unwrap();
    assert!(!manifest.is_empty());
    assert!(pipeline
        .content
        .read("demo", "chunk-0-00001.m4s")
        .await
        .is_ok());
    assert!(pipeline.content.read("demo", "thumbnail.jpg").await.is_ok());
    // The raw source was not published as an artifact.
    assert!(pipeline.content.read("demo", "demo.mp4").await.is_err());
    // The job was acknowledged.
    assert!(pipeline.queue.receive(1, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn poison_message_is_dropped_without_touching_metadata() {
    let pipeline = Pipeline::new(Duration::from_millis(50), InMemoryContent::default()).await;
    pipeline.queue.send("not-json").await.unwrap();

    let worker = pipeline.worker();
    let batch = pipeline.queue.receive(1, 0).await.unwrap();
    worker.handle_message(&batch[0]).await;

    tokio::time::sleep(Duration::from_millis(80)).await;
    assert!(pipeline.queue.receive(1, 0).await.unwrap().is_empty());
    assert!(pipeline.metadata.list().await.unwrap().is_empty());
}

#[tokio::test]
async fn fetch_failure_leaves_message_for_redelivery() {
    let pipeline = Pipeline::new(Duration::from_millis(50), InMemoryContent::default()).await;
    // Admitted, but the raw blob never arrived in the uploads namespace.
    pipeline.admission().admit("demo", "demo.mp4").await.unwrap();

    let worker = pipeline.worker();
    let batch = pipeline.queue.receive(1, 0).await.unwrap();
    worker.handle_message(&batch[0]).await;

    assert_eq!(pipeline.status("demo").await, VideoStatus::Processing);
    tokio::time::sleep(Duration::from_millis(80)).await;
    let redelivered = pipeline.queue.receive(1, 0).await.unwrap();
    assert_eq!(redelivered.len(), 1);
    assert_eq!(redelivered[0].receive_count, 2);
}

#[tokio::test]
async fn redelivered_job_converges_after_partial_failure() {
    // The first artifact write fails, so the first delivery publishes
    // nothing durable and stays on the queue.
    let pipeline =
        Pipeline::new(Duration::from_millis(50), InMemoryContent::failing_first(1)).await;
    pipeline.seed_upload("demo", "demo.mp4").await;
    pipeline.admission().admit("demo", "demo.mp4").await.unwrap();

    let worker = pipeline.worker();
    let first = pipeline.queue.receive(1, 0).await.unwrap();
    worker.handle_message(&first[0]).await;
    assert_eq!(pipeline.status("demo").await, VideoStatus::Processing);

    tokio::time::sleep(Duration::from_millis(80)).await;
    let second = pipeline.queue.receive(1, 0).await.unwrap();
    assert_eq!(second.len(), 1);
    worker.handle_message(&second[0]).await;

    assert_eq!(pipeline.status("demo").await, VideoStatus::Ready);
    assert!(pipeline.content.read("demo", "manifest.mpd").await.is_ok());
    assert!(pipeline.queue.receive(1, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn duplicate_delivery_after_success_is_idempotent() {
    let pipeline = Pipeline::new(Duration::from_secs(30), InMemoryContent::default()).await;
    pipeline.seed_upload("demo", "demo.mp4").await;
    pipeline.admission().admit("demo", "demo.mp4").await.unwrap();

    let worker = pipeline.worker();
    let batch = pipeline.queue.receive(1, 0).await.unwrap();
    worker.handle_message(&batch[0]).await;

    // The queue is at-least-once; the same body can arrive again.
    pipeline
        .queue
        .send(r#"{"videoId":"demo","filename":"demo.mp4"}"#)
        .await
        .unwrap();
    let duplicate = pipeline.queue.receive(1, 0).await.unwrap();
    worker.handle_message(&duplicate[0]).await;

    assert_eq!(pipeline.status("demo").await, VideoStatus::Ready);
    assert_eq!(
        pipeline.content.read("demo", "manifest.mpd").await.unwrap(),
        b"<MPD/>"
    );
}

#[tokio::test]
async fn exhausted_job_turns_terminal_with_error_status() {
    let pipeline = Pipeline::new(Duration::from_millis(30), InMemoryContent::default()).await;
    // No raw blob: every delivery fails at the fetch step.
    pipeline.admission().admit("demo", "demo.mp4").await.unwrap();

    let worker = pipeline.worker();
    for _ in 0..3 {
        let batch = pipeline.queue.receive(1, 2).await.unwrap();
        assert_eq!(batch.len(), 1);
        worker.handle_message(&batch[0]).await;
    }

    assert_eq!(pipeline.status("demo").await, VideoStatus::Error);
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert!(pipeline.queue.receive(1, 0).await.unwrap().is_empty());
}
