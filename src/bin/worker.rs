//! Standalone processing worker: consumes jobs from SQS, transcodes raw
//! uploads with ffmpeg, publishes artifacts through the configured content
//! backend, and flips metadata to `ready`. Scale horizontally by running
//! more of these.

use ringtube::adapters::ffmpeg::FfmpegTranscoder;
use ringtube::application::WorkerService;
use ringtube::config::WorkerConfig;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = WorkerConfig::from_env()?;
    info!(?config, "starting worker");

    let queue = config.queue.connect().await?;
    let metadata = config.metadata.connect().await?;
    let (content, _cluster) = config.content.connect().await?;
    let uploads = config.uploads.connect().await?;

    let worker = WorkerService::new(uploads, content, metadata, queue, FfmpegTranscoder::new())
        .with_max_receives(config.max_receives);
    worker.run().await;

    Ok(())
}
