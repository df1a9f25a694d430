//! Environment-driven configuration for the web and worker binaries, plus
//! the backend selection that makes metadata, content, queue, and upload
//! stores interchangeable at startup.

use crate::adapters::aws::{DynamoMetadata, S3Content, S3Uploads, SqsQueue};
use crate::adapters::local::{FsContent, FsUploads, MemoryQueue};
use crate::adapters::sql::{PostgresMetadata, SqliteMetadata};
use crate::cluster::ContentRouter;
use crate::ports::content::VideoContent;
use crate::ports::metadata::MetadataStore;
use crate::ports::queue::JobQueue;
use crate::ports::uploads::UploadStore;
use anyhow::{bail, Context};
use std::env;
use std::path::PathBuf;
use std::sync::Arc;

async fn aws_sdk_config() -> aws_config::SdkConfig {
    aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await
}

#[derive(Clone, Debug)]
pub enum MetadataBackend {
    /// Embedded SQLite database file.
    Sqlite(PathBuf),
    /// Remote PostgreSQL, by connection string.
    Postgres(String),
    /// Remote DynamoDB, by table name.
    DynamoDb(String),
}

impl MetadataBackend {
    pub fn parse(kind: &str, options: &str) -> anyhow::Result<Self> {
        match kind {
            "sqlite" => Ok(Self::Sqlite(PathBuf::from(options))),
            "postgres" => Ok(Self::Postgres(options.to_string())),
            "dynamodb" => Ok(Self::DynamoDb(options.to_string())),
            other => bail!("unsupported metadata backend: {}", other),
        }
    }

    pub async fn connect(&self) -> anyhow::Result<Arc<dyn MetadataStore>> {
        Ok(match self {
            Self::Sqlite(path) => Arc::new(SqliteMetadata::open(path).await?),
            Self::Postgres(conn) => Arc::new(PostgresMetadata::connect(conn).await?),
            Self::DynamoDb(table) => {
                let config = aws_sdk_config().await;
                Arc::new(DynamoMetadata::new(
                    aws_sdk_dynamodb::Client::new(&config),
                    table.clone(),
                ))
            }
        })
    }
}

#[derive(Clone, Debug)]
pub enum ContentBackend {
    /// Single local directory.
    Fs(PathBuf),
    /// Single S3 bucket.
    S3(String),
    /// The consistent-hash cluster over the given node addresses.
    Network(Vec<String>),
}

impl ContentBackend {
    pub fn parse(kind: &str, options: &str) -> anyhow::Result<Self> {
        match kind {
            "fs" => Ok(Self::Fs(PathBuf::from(options))),
            "s3" => Ok(Self::S3(options.to_string())),
            "nw" => {
                let addrs: Vec<String> = options
                    .split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect();
                if addrs.is_empty() {
                    bail!("network content backend requires at least one node address");
                }
                Ok(Self::Network(addrs))
            }
            other => bail!("unsupported content backend: {}", other),
        }
    }

    /// Build the content store. For the cluster backend the concrete
    /// router is also returned so the caller can host the admin service.
    pub async fn connect(
        &self,
    ) -> anyhow::Result<(Arc<dyn VideoContent>, Option<Arc<ContentRouter>>)> {
        Ok(match self {
            Self::Fs(dir) => (Arc::new(FsContent::new(dir.clone())), None),
            Self::S3(bucket) => {
                let config = aws_sdk_config().await;
                (
                    Arc::new(S3Content::new(
                        aws_sdk_s3::Client::new(&config),
                        bucket.clone(),
                    )),
                    None,
                )
            }
            Self::Network(addrs) => {
                let router = Arc::new(ContentRouter::connect(addrs)?);
                let content: Arc<dyn VideoContent> = router.clone();
                (content, Some(router))
            }
        })
    }
}

#[derive(Clone, Debug)]
pub enum QueueBackend {
    Sqs(String),
    /// In-process queue; only meaningful when admission and the worker
    /// share the process (monolith mode).
    Memory,
}

impl QueueBackend {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn JobQueue>> {
        Ok(match self {
            Self::Sqs(queue_url) => {
                let config = aws_sdk_config().await;
                Arc::new(SqsQueue::new(
                    aws_sdk_sqs::Client::new(&config),
                    queue_url.clone(),
                ))
            }
            Self::Memory => Arc::new(MemoryQueue::default()),
        })
    }
}

#[derive(Clone, Debug)]
pub enum UploadsBackend {
    Fs(PathBuf),
    S3(String),
}

impl UploadsBackend {
    pub async fn connect(&self) -> anyhow::Result<Arc<dyn UploadStore>> {
        Ok(match self {
            Self::Fs(dir) => Arc::new(FsUploads::new(dir.clone())),
            Self::S3(bucket) => {
                let config = aws_sdk_config().await;
                Arc::new(S3Uploads::new(
                    aws_sdk_s3::Client::new(&config),
                    bucket.clone(),
                ))
            }
        })
    }
}

/// Configuration for the web binary (HTTP API + admin gRPC).
#[derive(Clone, Debug)]
pub struct WebConfig {
    pub addr: String,
    pub port: u16,
    pub admin_port: u16,
    pub metadata: MetadataBackend,
    pub content: ContentBackend,
    pub queue: QueueBackend,
    pub uploads: UploadsBackend,
}

impl WebConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        Ok(Self {
            addr: env::var("ADDR").unwrap_or_else(|_| String::from("127.0.0.1")),
            port: env::var("PORT")
                .unwrap_or_else(|_| String::from("8080"))
                .parse()
                .context("invalid PORT")?,
            admin_port: env::var("ADMIN_PORT")
                .unwrap_or_else(|_| String::from("8081"))
                .parse()
                .context("invalid ADMIN_PORT")?,
            metadata: MetadataBackend::parse(
                &env::var("METADATA_TYPE").unwrap_or_else(|_| String::from("sqlite")),
                &env::var("METADATA_OPTIONS").unwrap_or_else(|_| String::from("ringtube.db")),
            )?,
            content: ContentBackend::parse(
                &env::var("CONTENT_TYPE").unwrap_or_else(|_| String::from("fs")),
                &env::var("CONTENT_OPTIONS").unwrap_or_else(|_| String::from("./content")),
            )?,
            queue: queue_from_env(),
            uploads: uploads_from_env(),
        })
    }
}

/// Configuration for a standalone worker process.
#[derive(Clone, Debug)]
pub struct WorkerConfig {
    pub queue: QueueBackend,
    pub metadata: MetadataBackend,
    pub content: ContentBackend,
    pub uploads: UploadsBackend,
    pub max_receives: u32,
}

impl WorkerConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenv::dotenv().ok();

        // A standalone worker cannot share an in-process queue with
        // admission, so SQS is mandatory here.
        let queue_url = env::var("SQS_QUEUE_URL")
            .context("SQS_QUEUE_URL must be set for a standalone worker")?;

        Ok(Self {
            queue: QueueBackend::Sqs(queue_url),
            metadata: MetadataBackend::parse(
                &env::var("METADATA_TYPE").unwrap_or_else(|_| String::from("sqlite")),
                &env::var("METADATA_OPTIONS").unwrap_or_else(|_| String::from("ringtube.db")),
            )?,
            content: ContentBackend::parse(
                &env::var("CONTENT_TYPE").unwrap_or_else(|_| String::from("fs")),
                &env::var("CONTENT_OPTIONS").unwrap_or_else(|_| String::from("./content")),
            )?,
            uploads: uploads_from_env(),
            max_receives: env::var("WORKER_MAX_RECEIVES")
                .unwrap_or_else(|_| String::from("3"))
                .parse()
                .context("invalid WORKER_MAX_RECEIVES")?,
        })
    }
}

fn queue_from_env() -> QueueBackend {
    match env::var("SQS_QUEUE_URL") {
        Ok(url) if !url.is_empty() => QueueBackend::Sqs(url),
        _ => QueueBackend::Memory,
    }
}

fn uploads_from_env() -> UploadsBackend {
    match env::var("S3_UPLOADS_BUCKET") {
        Ok(bucket) if !bucket.is_empty() => UploadsBackend::S3(bucket),
        _ => UploadsBackend::Fs(PathBuf::from(
            env::var("UPLOAD_DIR").unwrap_or_else(|_| String::from("./uploads")),
        )),
    }
}
