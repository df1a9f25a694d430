//! Storage node binary: serves the content data plane over a local base
//! directory. Nodes hold no cluster state; add them to a router with
//! `ringctl add`.

use anyhow::Context;
use clap::Parser;
use ringtube::cluster::node;
use std::path::PathBuf;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "ringtube-storage", about = "Storage node for the ringtube content cluster")]
struct Args {
    /// Host address to bind
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind
    #[arg(long, default_value_t = 8090)]
    port: u16,

    /// Directory holding this node's objects
    base_dir: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let args = Args::parse();
    tokio::fs::create_dir_all(&args.base_dir)
        .await
        .with_context(|| format!("failed to create base dir {}", args.base_dir.display()))?;

    let listener = TcpListener::bind((args.host.as_str(), args.port))
        .await
        .with_context(|| format!("failed to bind {}:{}", args.host, args.port))?;

    info!(
        host = %args.host,
        port = args.port,
        base_dir = %args.base_dir.display(),
        "storage node listening"
    );
    node::serve(listener, &args.base_dir).await?;

    Ok(())
}
