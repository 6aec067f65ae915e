//! Server configuration types and defaults.

use std::net::SocketAddr;

use crate::rng::default_shard_count;

/// Parameters for the listener and the workloads.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// The socket address to bind the server to
    pub bind_address: SocketAddr,

    /// Whether to open one SO_REUSEPORT listener per CPU core
    pub use_reuse_port: bool,

    /// Number of rows in the world table. Random ids are drawn from `1..=world_count`.
    pub world_count: usize,

    /// Upper clamp for the `queries` parameter
    pub max_queries: usize,

    /// Rows loaded into the world cache at startup
    pub cache_size: usize,

    /// Backend reads kept in flight per multi-query request
    pub query_fanout: usize,

    pub rng_shards: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([127, 0, 0, 1], 8080)),
            use_reuse_port: false,
            world_count: 10_000,
            max_queries: 500,
            cache_size: 10_000,
            query_fanout: 16,
            rng_shards: default_shard_count(),
        }
    }
}
