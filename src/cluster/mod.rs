//! The content cluster: a consistent-hash ring of storage nodes and the
//! client-side router that places every `(videoId, filename)` object on
//! exactly one node.

pub mod node;
pub mod ring;
pub mod router;

pub use node::StorageNode;
pub use ring::HashRing;
pub use router::ContentRouter;
