//! Web binary: serves the JSON/content HTTP API, and when fronting the
//! cluster also hosts the admin gRPC plane. With an in-process queue it
//! runs the worker in the same process (monolith mode).
//!
//! Environment:
//! - ADDR / PORT / ADMIN_PORT: bind addresses
//! - METADATA_TYPE + METADATA_OPTIONS: sqlite | postgres | dynamodb
//! - CONTENT_TYPE + CONTENT_OPTIONS: fs | s3 | nw (comma-separated nodes)
//! - SQS_QUEUE_URL: use SQS; unset means in-process queue + worker
//! - S3_UPLOADS_BUCKET or UPLOAD_DIR: raw upload namespace

use anyhow::Context;
use ringtube::adapters::ffmpeg::FfmpegTranscoder;
use ringtube::application::WorkerService;
use ringtube::cluster::router::AdminService;
use ringtube::config::{QueueBackend, WebConfig};
use ringtube::http::{router, AppState};
use ringtube::pb::video_content_admin_server::VideoContentAdminServer;
use std::sync::Arc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let config = WebConfig::from_env()?;
    info!(?config, "starting web server");

    let metadata = config.metadata.connect().await?;
    let (content, cluster_router) = config.content.connect().await?;
    let queue = config.queue.connect().await?;
    let uploads = config.uploads.connect().await?;

    // The admin plane only exists when the content backend is the cluster.
    if let Some(cluster) = cluster_router {
        let admin_addr = format!("{}:{}", config.addr, config.admin_port)
            .parse()
            .context("invalid admin address")?;
        let admin = AdminService::new(cluster);
        tokio::spawn(async move {
            info!(addr = %admin_addr, "admin grpc server listening");
            if let Err(e) = tonic::transport::Server::builder()
                .add_service(VideoContentAdminServer::new(admin))
                .serve(admin_addr)
                .await
            {
                error!(error = %e, "admin server exited");
            }
        });
    }

    // An in-process queue is only reachable from this process, so the
    // worker must live here too.
    if matches!(config.queue, QueueBackend::Memory) {
        let worker = WorkerService::new(
            uploads.clone(),
            content.clone(),
            metadata.clone(),
            queue.clone(),
            FfmpegTranscoder::new(),
        );
        tokio::spawn(async move { worker.run().await });
        info!("in-process worker started (memory queue)");
    }

    let state = Arc::new(AppState {
        metadata,
        content,
        queue,
        uploads,
    });

    let listen = format!("{}:{}", config.addr, config.port);
    let listener = tokio::net::TcpListener::bind(&listen)
        .await
        .with_context(|| format!("failed to bind {}", listen))?;
    info!(addr = %listen, "web server listening");
    axum::serve(listener, router(state)).await?;

    Ok(())
}
