//! Generated wire types for the content data plane (storage nodes) and the
//! admin plane (router membership), compiled from `proto/content.proto` by
//! the build script.

tonic::include_proto!("content");
