//! Cluster admin CLI: add or remove storage nodes (triggering key
//! migration) and list current membership. Exits non-zero on any RPC
//! failure.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use ringtube::pb::video_content_admin_client::VideoContentAdminClient;
use ringtube::pb::{AddNodeRequest, ListNodesRequest, RemoveNodeRequest};
use tonic::transport::Channel;

#[derive(Parser)]
#[command(name = "ringctl")]
#[command(about = "Manage the ringtube storage cluster", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a node to the cluster and migrate affected keys to it
    Add {
        /// Admin address of the router, host:port
        server_addr: String,
        /// Address of the node to add
        node_addr: String,
    },
    /// Remove a node from the cluster, migrating its keys away first
    Remove {
        /// Admin address of the router, host:port
        server_addr: String,
        /// Address of the node to remove
        node_addr: String,
    },
    /// List all nodes in the cluster
    List {
        /// Admin address of the router, host:port
        server_addr: String,
    },
}

async fn connect(server_addr: &str) -> Result<VideoContentAdminClient<Channel>> {
    VideoContentAdminClient::connect(format!("http://{}", server_addr))
        .await
        .with_context(|| format!("failed to connect to {}", server_addr))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Add {
            server_addr,
            node_addr,
        } => {
            let mut client = connect(&server_addr).await?;
            let resp = client
                .add_node(AddNodeRequest {
                    node_address: node_addr.clone(),
                })
                .await
                .context("AddNode RPC failed")?;
            println!("Added node: {}", node_addr);
            println!("Files migrated: {}", resp.into_inner().migrated_file_count);
        }
        Commands::Remove {
            server_addr,
            node_addr,
        } => {
            let mut client = connect(&server_addr).await?;
            let resp = client
                .remove_node(RemoveNodeRequest {
                    node_address: node_addr.clone(),
                })
                .await
                .context("RemoveNode RPC failed")?;
            println!("Removed node: {}", node_addr);
            println!("Files migrated: {}", resp.into_inner().migrated_file_count);
        }
        Commands::List { server_addr } => {
            let mut client = connect(&server_addr).await?;
            let resp = client
                .list_nodes(ListNodesRequest {})
                .await
                .context("ListNodes RPC failed")?;
            let nodes = resp.into_inner().nodes;
            println!("Cluster nodes:");
            if nodes.is_empty() {
                println!("  (none)");
            } else {
                for node in nodes {
                    println!("  - {}", node);
                }
            }
        }
    }

    Ok(())
}
