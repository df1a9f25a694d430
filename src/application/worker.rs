use crate::domain::jobs::ProcessingJob;
use crate::domain::mime::content_type_for;
use crate::domain::video::VideoStatus;
use crate::ports::content::{ContentError, VideoContent};
use crate::ports::metadata::MetadataStore;
use crate::ports::queue::{JobQueue, QueueMessage};
use crate::ports::transcoder::{TranscodeError, Transcoder};
use crate::ports::uploads::{UploadError, UploadStore};
use std::fmt;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Long-poll window for a single receive.
pub const RECEIVE_WAIT_SECONDS: u64 = 20;

/// Receives after which a still-failing job is declared terminal.
pub const DEFAULT_MAX_RECEIVES: u32 = 3;

#[derive(Debug)]
pub enum ProcessError {
    Upload(UploadError),
    Transcode(TranscodeError),
    Publish(ContentError),
    Io(std::io::Error),
}

impl fmt::Display for ProcessError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProcessError::Upload(e) => write!(f, "raw blob fetch failed: {}", e),
            ProcessError::Transcode(e) => write!(f, "transcode failed: {}", e),
            ProcessError::Publish(e) => write!(f, "artifact publish failed: {}", e),
            ProcessError::Io(e) => write!(f, "io error: {}", e),
        }
    }
}

impl std::error::Error for ProcessError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ProcessError::Upload(e) => Some(e),
            ProcessError::Transcode(e) => Some(e),
            ProcessError::Publish(e) => Some(e),
            ProcessError::Io(e) => Some(e),
        }
    }
}

impl From<std::io::Error> for ProcessError {
    fn from(err: std::io::Error) -> Self {
        ProcessError::Io(err)
    }
}

/// Queue consumer that turns one raw upload into published DASH artifacts
/// and a `ready` record. One job at a time per worker; scale is by process
/// count.
///
/// The queue's redelivery is the retry mechanism: a failed job is simply
/// not acknowledged. Every step is idempotent under redelivery — artifact
/// writes overwrite, the status update overwrites — so a job that ran
/// partway converges on the next delivery.
pub struct WorkerService<U, C, M, Q, T> {
    uploads: U,
    content: C,
    metadata: M,
    queue: Q,
    transcoder: T,
    max_receives: u32,
}

impl<U, C, M, Q, T> WorkerService<U, C, M, Q, T>
where
    U: UploadStore,
    C: VideoContent,
    M: MetadataStore,
    Q: JobQueue,
    T: Transcoder,
{
    pub fn new(uploads: U, content: C, metadata: M, queue: Q, transcoder: T) -> Self {
        Self {
            uploads,
            content,
            metadata,
            queue,
            transcoder,
            max_receives: DEFAULT_MAX_RECEIVES,
        }
    }

    pub fn with_max_receives(mut self, max_receives: u32) -> Self {
        self.max_receives = max_receives;
        self
    }

    /// Poll-and-process forever. Queue errors back off briefly instead of
    /// spinning.
    pub async fn run(&self) {
        info!("worker started, polling for jobs");
        loop {
            let messages = match self.queue.receive(1, RECEIVE_WAIT_SECONDS).await {
                Ok(messages) => messages,
                Err(e) => {
                    error!(error = %e, "queue receive failed");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            for message in messages {
                self.handle_message(&message).await;
            }
        }
    }

    /// Process one delivery to its conclusion: ack on success or poison,
    /// abandon for redelivery on transient failure, ack with an `error`
    /// status once the job has exhausted its receives.
    pub async fn handle_message(&self, message: &QueueMessage) {
        let job = match ProcessingJob::from_json(&message.body) {
            Ok(job) => job,
            Err(e) => {
                warn!(error = %e, "dropping malformed job message");
                self.ack(&message.receipt_handle).await;
                return;
            }
        };

        info!(video_id = %job.video_id, filename = %job.filename, "processing job");
        match self.process(&job).await {
            Ok(()) => {
                info!(video_id = %job.video_id, "job completed");
                self.ack(&message.receipt_handle).await;
            }
            Err(e) if message.receive_count >= self.max_receives => {
                error!(
                    video_id = %job.video_id,
                    receive_count = message.receive_count,
                    error = %e,
                    "job failed terminally"
                );
                if let Err(err) = self
                    .metadata
                    .update_status(&job.video_id, VideoStatus::Error)
                    .await
                {
                    warn!(video_id = %job.video_id, error = %err, "failed to record error status");
                }
                self.ack(&message.receipt_handle).await;
            }
            Err(e) => {
                // Leave the message unacknowledged; the visibility timeout
                // will redeliver it.
                warn!(
                    video_id = %job.video_id,
                    receive_count = message.receive_count,
                    error = %e,
                    "job failed, leaving for redelivery"
                );
            }
        }
    }

    async fn process(&self, job: &ProcessingJob) -> Result<(), ProcessError> {
        // The tempdir guard removes the working directory on every exit
        // path, including errors.
        let workdir = tempfile::tempdir()?;
        let input = workdir.path().join(&job.filename);

        self.uploads
            .download(&job.video_id, &job.filename, &input)
            .await
            .map_err(ProcessError::Upload)?;

        self.transcoder
            .transcode(&input, workdir.path())
            .await
            .map_err(ProcessError::Transcode)?;

        // Playback works without a thumbnail; a failure here must not fail
        // the job.
        if let Err(e) = self.transcoder.thumbnail(&input, workdir.path()).await {
            warn!(video_id = %job.video_id, error = %e, "thumbnail generation failed");
        }

        self.publish_artifacts(job, workdir.path()).await?;

        // Artifacts first, then the status flip: a reader observing `ready`
        // can always fetch the manifest. The reverse order could not
        // promise that.
        if let Err(e) = self
            .metadata
            .update_status(&job.video_id, VideoStatus::Ready)
            .await
        {
            warn!(
                video_id = %job.video_id,
                error = %e,
                "artifacts published but status update failed; reconcilable drift"
            );
        }

        Ok(())
    }

    async fn publish_artifacts(
        &self,
        job: &ProcessingJob,
        workdir: &std::path::Path,
    ) -> Result<(), ProcessError> {
        let mut entries = tokio::fs::read_dir(workdir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.metadata().await?.is_dir() {
                continue;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            // The raw source is not an artifact.
            if name == job.filename || name.ends_with(".mp4") {
                continue;
            }

            let data = tokio::fs::read(entry.path()).await?;
            debug!(
                video_id = %job.video_id,
                filename = %name,
                bytes = data.len(),
                content_type = content_type_for(&name),
                "publishing artifact"
            );
            self.content
                .write(&job.video_id, &name, &data)
                .await
                .map_err(ProcessError::Publish)?;
        }
        Ok(())
    }

    async fn ack(&self, receipt_handle: &str) {
        if let Err(e) = self.queue.delete(receipt_handle).await {
            warn!(error = %e, "failed to delete queue message");
        }
    }
}
