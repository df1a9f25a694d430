//! ringtube — DASH video hosting on a consistent-hash content cluster.
//!
//! Layout:
//! - `domain/`: pure types (video records, job messages, content types)
//! - `ports/`: trait contracts between the core and its collaborators
//! - `adapters/`: AWS, SQL, and local implementations of the ports
//! - `cluster/`: storage node, hash ring, and the content router
//! - `application/`: ingest admission and the processing worker
//! - `http`: the JSON and content API served by the web binary
//! - `pb`: generated gRPC types for the node and admin planes

pub mod adapters;
pub mod application;
pub mod cluster;
pub mod config;
pub mod domain;
pub mod http;
pub mod pb;
pub mod ports;
