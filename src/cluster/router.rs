use crate::cluster::node::DELETE_ALL_SENTINEL;
use crate::cluster::ring::{file_key, HashRing, RingError};
use crate::pb::video_content_admin_server::VideoContentAdmin;
use crate::pb::video_content_client::VideoContentClient;
use crate::pb::{
    AddNodeRequest, AddNodeResponse, DeleteFileRequest, ListNodesRequest, ListNodesResponse,
    ReadFileRequest, RemoveNodeRequest, RemoveNodeResponse, WriteFileRequest,
};
use crate::ports::content::{ContentError, VideoContent};
use async_trait::async_trait;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tonic::transport::{Channel, Endpoint};
use tonic::{Request, Response, Status};
use tracing::{info, warn};

/// Client-side cap; must be at least as large as the largest expected
/// segment. The node side accepts far more (see `node::MAX_NODE_MESSAGE_BYTES`).
pub const MAX_CLIENT_MESSAGE_BYTES: usize = 32 * 1024 * 1024;

/// Deadline for every data-plane and migration RPC.
pub const RPC_TIMEOUT: Duration = Duration::from_secs(5);

type NodeClient = VideoContentClient<Channel>;

struct RouterState {
    ring: HashRing,
    clients: HashMap<String, NodeClient>,
    /// Every `(videoId, filename)` successfully written and not deleted.
    /// Drives migration only; in-memory, repopulated by writes after a
    /// restart.
    registry: HashMap<String, BTreeSet<String>>,
}

/// Client of the storage cluster. Routes every read and write to the node
/// the ring makes responsible for the key, and rebalances affected keys
/// when membership changes.
///
/// One readers-writer lock guards the ring, the client map, and the file
/// registry: routing takes it shared, membership changes and bulk deletes
/// take it exclusive. An admin operation therefore stalls readers and
/// writers for its whole duration, bounded by one round trip per
/// registered key.
pub struct ContentRouter {
    state: RwLock<RouterState>,
}

impl ContentRouter {
    /// Build a router over the initial membership. Fails on an unreachable
    /// address string, a duplicate, or a ring-hash collision; these are
    /// configuration errors.
    pub fn connect(node_addrs: &[String]) -> Result<Self, ContentError> {
        let mut ring = HashRing::new();
        let mut clients = HashMap::with_capacity(node_addrs.len());

        for addr in node_addrs {
            ring.insert(addr).map_err(ring_to_content)?;
            clients.insert(addr.clone(), Self::open_client(addr)?);
        }

        Ok(Self {
            state: RwLock::new(RouterState {
                ring,
                clients,
                registry: HashMap::new(),
            }),
        })
    }

    /// Channels connect lazily so the router can start ahead of its nodes;
    /// the per-call deadline covers the eventual connection attempt.
    fn open_client(addr: &str) -> Result<NodeClient, ContentError> {
        let endpoint = Endpoint::from_shared(format!("http://{}", addr))
            .map_err(|e| ContentError::Backend(format!("invalid node address {}: {}", addr, e)))?
            .timeout(RPC_TIMEOUT)
            .connect_timeout(RPC_TIMEOUT);

        Ok(VideoContentClient::new(endpoint.connect_lazy())
            .max_decoding_message_size(MAX_CLIENT_MESSAGE_BYTES)
            .max_encoding_message_size(MAX_CLIENT_MESSAGE_BYTES))
    }

    /// Add a node to the ring and migrate every registered key whose owner
    /// changes. Returns the number of keys migrated. Per-key copy failures
    /// are logged and skipped; they never abort the operation and nothing
    /// is rolled back.
    pub async fn add_node(&self, address: &str) -> Result<i32, ContentError> {
        let mut state = self.state.write().await;

        if state.ring.contains(address) {
            return Err(ContentError::AlreadyMember(address.to_string()));
        }
        let client = Self::open_client(address)?;
        state.ring.insert(address).map_err(ring_to_content)?;
        state.clients.insert(address.to_string(), client);

        let snapshot: Vec<(String, String)> = state
            .registry
            .iter()
            .flat_map(|(video_id, filenames)| {
                filenames
                    .iter()
                    .map(move |f| (video_id.clone(), f.clone()))
            })
            .collect();

        let mut migrated = 0;
        for (video_id, filename) in snapshot {
            let key = file_key(&video_id, &filename);

            // Consistent hashing: a key moves only if its clockwise
            // successor is now the new node. The previous owner is what the
            // ring answers with the new address excluded.
            let new_owner = match state.ring.owner(&key) {
                Some(a) => a.to_string(),
                None => continue,
            };
            let old_owner = match state.ring.owner_excluding(&key, address) {
                Some(a) => a.to_string(),
                None => continue,
            };
            if new_owner == old_owner {
                continue;
            }

            if self
                .copy_key(&state, &old_owner, &new_owner, &video_id, &filename)
                .await
            {
                migrated += 1;
            }
        }

        info!(node = %address, migrated, "added node to the ring");
        Ok(migrated)
    }

    /// Remove a node and migrate every registered key it owned to that
    /// key's new owner, reading through the detached client handle.
    pub async fn remove_node(&self, address: &str) -> Result<i32, ContentError> {
        let mut state = self.state.write().await;

        if !state.ring.contains(address) {
            return Err(ContentError::UnknownNode(address.to_string()));
        }
        let departed = state
            .clients
            .remove(address)
            .ok_or_else(|| ContentError::UnknownNode(address.to_string()))?;

        // Ownership must be judged before the ring mutates.
        let to_migrate: Vec<(String, String)> = state
            .registry
            .iter()
            .flat_map(|(video_id, filenames)| {
                filenames
                    .iter()
                    .map(move |f| (video_id.clone(), f.clone()))
            })
            .filter(|(video_id, filename)| {
                state.ring.owner(&file_key(video_id, filename)) == Some(address)
            })
            .collect();

        state.ring.remove(address);

        let mut migrated = 0;
        for (video_id, filename) in to_migrate {
            let key = file_key(&video_id, &filename);
            let new_owner = match state.ring.owner(&key) {
                Some(a) => a.to_string(),
                None => {
                    warn!(
                        video_id = %video_id,
                        filename = %filename,
                        "no nodes left to receive key; data stays on the departed node"
                    );
                    continue;
                }
            };

            let mut src = departed.clone();
            let data = match src
                .read_file(ReadFileRequest {
                    video_id: video_id.clone(),
                    filename: filename.clone(),
                })
                .await
            {
                Ok(resp) => resp.into_inner().data,
                Err(status) => {
                    warn!(key = %key, error = %status, "migration read failed; skipping key");
                    continue;
                }
            };

            let mut dst = match state.clients.get(&new_owner) {
                Some(c) => c.clone(),
                None => continue,
            };
            if let Err(status) = dst
                .write_file(WriteFileRequest {
                    video_id: video_id.clone(),
                    filename: filename.clone(),
                    data,
                })
                .await
            {
                warn!(key = %key, error = %status, "migration write failed; skipping key");
                continue;
            }
            migrated += 1;

            if let Err(status) = src
                .delete_file(DeleteFileRequest {
                    video_id: video_id.clone(),
                    filename: filename.clone(),
                })
                .await
            {
                warn!(key = %key, error = %status, "stale copy cleanup failed on departed node");
            }
        }

        info!(node = %address, migrated, "removed node from the ring");
        Ok(migrated)
    }

    /// Snapshot of the membership, sorted for deterministic output.
    pub async fn list_nodes(&self) -> Vec<String> {
        self.state.read().await.ring.addresses()
    }

    /// Registered filenames for a video, mostly useful to tests and
    /// operators.
    pub async fn registered(&self, video_id: &str) -> Vec<String> {
        self.state
            .read()
            .await
            .registry
            .get(video_id)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    /// Copy one key from `old_owner` to `new_owner`, then best-effort
    /// delete the stale copy. Returns whether the copy landed.
    async fn copy_key(
        &self,
        state: &RouterState,
        old_owner: &str,
        new_owner: &str,
        video_id: &str,
        filename: &str,
    ) -> bool {
        let key = file_key(video_id, filename);

        let mut src = match state.clients.get(old_owner) {
            Some(c) => c.clone(),
            None => return false,
        };
        let mut dst = match state.clients.get(new_owner) {
            Some(c) => c.clone(),
            None => return false,
        };

        let data = match src
            .read_file(ReadFileRequest {
                video_id: video_id.to_string(),
                filename: filename.to_string(),
            })
            .await
        {
            Ok(resp) => resp.into_inner().data,
            Err(status) => {
                warn!(key = %key, error = %status, "migration read failed; skipping key");
                return false;
            }
        };

        if let Err(status) = dst
            .write_file(WriteFileRequest {
                video_id: video_id.to_string(),
                filename: filename.to_string(),
                data,
            })
            .await
        {
            warn!(key = %key, error = %status, "migration write failed; skipping key");
            return false;
        }

        // The new write is durable; the old copy is garbage now. Losing
        // this delete leaves a recoverable stale object, nothing worse.
        if let Err(status) = src
            .delete_file(DeleteFileRequest {
                video_id: video_id.to_string(),
                filename: filename.to_string(),
            })
            .await
        {
            warn!(key = %key, error = %status, "stale copy cleanup failed");
        }

        true
    }
}

#[async_trait]
impl VideoContent for ContentRouter {
    async fn read(&self, video_id: &str, filename: &str) -> Result<Vec<u8>, ContentError> {
        let state = self.state.read().await;
        let key = file_key(video_id, filename);
        let owner = state.ring.owner(&key).ok_or(ContentError::NoNodes)?;
        let mut client = state
            .clients
            .get(owner)
            .cloned()
            .ok_or(ContentError::NoNodes)?;

        let resp = client
            .read_file(ReadFileRequest {
                video_id: video_id.to_string(),
                filename: filename.to_string(),
            })
            .await?;
        Ok(resp.into_inner().data)
    }

    async fn write(
        &self,
        video_id: &str,
        filename: &str,
        data: &[u8],
    ) -> Result<(), ContentError> {
        {
            let state = self.state.read().await;
            let key = file_key(video_id, filename);
            let owner = state.ring.owner(&key).ok_or(ContentError::NoNodes)?;
            let mut client = state
                .clients
                .get(owner)
                .cloned()
                .ok_or(ContentError::NoNodes)?;

            client
                .write_file(WriteFileRequest {
                    video_id: video_id.to_string(),
                    filename: filename.to_string(),
                    data: data.to_vec(),
                })
                .await?;
        }

        // Record only successful writes; a failed write must not enter the
        // migration set.
        let mut state = self.state.write().await;
        state
            .registry
            .entry(video_id.to_string())
            .or_default()
            .insert(filename.to_string());
        Ok(())
    }

    async fn delete_all(&self, video_id: &str) -> Result<(), ContentError> {
        let mut state = self.state.write().await;

        if !state.registry.contains_key(video_id) {
            return Ok(());
        }
        if state.ring.is_empty() {
            return Err(ContentError::NoNodes);
        }
        let filenames = match state.registry.remove(video_id) {
            Some(f) => f,
            None => return Ok(()),
        };

        // The sentinel removes the whole grouping on a node, so one write
        // per distinct owning node covers every registered filename.
        let owners: BTreeSet<String> = filenames
            .iter()
            .filter_map(|f| {
                state
                    .ring
                    .owner(&file_key(video_id, f))
                    .map(str::to_string)
            })
            .collect();

        let mut failures = Vec::new();
        for owner in owners {
            let mut client = match state.clients.get(&owner) {
                Some(c) => c.clone(),
                None => continue,
            };
            if let Err(status) = client
                .write_file(WriteFileRequest {
                    video_id: video_id.to_string(),
                    filename: DELETE_ALL_SENTINEL.to_string(),
                    data: Vec::new(),
                })
                .await
            {
                warn!(video_id = %video_id, node = %owner, error = %status, "delete failed on node");
                failures.push(format!("{}: {}", owner, status));
            }
        }

        if failures.is_empty() {
            Ok(())
        } else {
            Err(ContentError::Partial(failures))
        }
    }
}

/// The router doubles as the admin gRPC service hosted by the web binary.
pub struct AdminService {
    router: Arc<ContentRouter>,
}

impl AdminService {
    pub fn new(router: Arc<ContentRouter>) -> Self {
        Self { router }
    }
}

#[tonic::async_trait]
impl VideoContentAdmin for AdminService {
    async fn add_node(
        &self,
        request: Request<AddNodeRequest>,
    ) -> Result<Response<AddNodeResponse>, Status> {
        let addr = request.into_inner().node_address;
        let migrated = self
            .router
            .add_node(&addr)
            .await
            .map_err(content_to_status)?;
        Ok(Response::new(AddNodeResponse {
            migrated_file_count: migrated,
        }))
    }

    async fn remove_node(
        &self,
        request: Request<RemoveNodeRequest>,
    ) -> Result<Response<RemoveNodeResponse>, Status> {
        let addr = request.into_inner().node_address;
        let migrated = self
            .router
            .remove_node(&addr)
            .await
            .map_err(content_to_status)?;
        Ok(Response::new(RemoveNodeResponse {
            migrated_file_count: migrated,
        }))
    }

    async fn list_nodes(
        &self,
        _request: Request<ListNodesRequest>,
    ) -> Result<Response<ListNodesResponse>, Status> {
        Ok(Response::new(ListNodesResponse {
            nodes: self.router.list_nodes().await,
        }))
    }
}

fn ring_to_content(err: RingError) -> ContentError {
    match err {
        RingError::AlreadyMember(addr) => ContentError::AlreadyMember(addr),
        RingError::HashCollision { .. } => ContentError::Backend(err.to_string()),
    }
}

fn content_to_status(err: ContentError) -> Status {
    match err {
        ContentError::AlreadyMember(addr) => {
            Status::already_exists(format!("node already in the ring: {}", addr))
        }
        ContentError::UnknownNode(addr) => {
            Status::not_found(format!("node not in the ring: {}", addr))
        }
        other => Status::internal(other.to_string()),
    }
}
