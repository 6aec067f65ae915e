//! # Bench Server
//!
//! Request handlers for a fixed set of benchmark workloads, built to keep
//! the hot path free of per-request allocation while staying correct under
//! heavy concurrency.
//!
//! ## Workloads
//!
//! | Path             | Work                                                   |
//! |------------------|--------------------------------------------------------|
//! | `/json`          | serialize a constant message                           |
//! | `/db`            | one random point read                                  |
//! | `/queries`       | N independent random point reads                       |
//! | `/cached-worlds` | N random reads from the startup snapshot               |
//! | `/fortunes`      | read all fortunes, add one, stable sort, render HTML   |
//! | `/updates`       | N reads, new random numbers, one id-sorted write batch |
//! | `/plaintext`     | constant text                                          |
//!
//! N comes from the `queries` parameter and is clamped to `[1, max_queries]`.
//!
//! ## Resource model
//!
//! * [`pool`] holds lock-free free-lists for the per-request records and the
//!   JSON encoder. Checkouts are RAII guards, so every exit path returns the
//!   instance.
//! * [`rng`] spreads random draws over independently seeded shards.
//! * [`cache`] is loaded once at startup and never written again. A load
//!   failure aborts startup.
//! * [`batch`] sorts write batches by id before they reach the backend, so
//!   overlapping batches always lock rows in the same order.
//!
//! ## Backends
//!
//! Handlers only see the [`Backend`] trait. [`MemoryBackend`] keeps the
//! tables in process; `PgBackend` is available with the `postgres` feature.
//!
//! ## Transport
//!
//! Handlers write into a [`reply::Reply`] and know nothing about HTTP.
//! [`server`] mounts them on an axum router and serves it with hyper.

pub use backend::{Backend, BackendError, MemoryBackend};
#[cfg(feature = "postgres")]
pub use backend::PgBackend;
pub use cache::{CacheError, WorldCache};
pub use config::ServerConfig;
pub use error::ServerError;
pub use handlers::Handlers;
pub use server::BenchServer;

pub mod backend;
pub mod batch;
pub mod cache;
pub mod config;
pub mod encoder;
pub mod error;
pub mod handlers;
pub mod model;
pub mod params;
pub mod pool;
pub mod render;
pub mod reply;
pub mod rng;
pub mod server;

/// Builds handlers over `backend`, loading the world cache first.
pub async fn create_server(
    config: ServerConfig,
    backend: std::sync::Arc<dyn Backend>,
) -> Result<BenchServer, ServerError> {
    let handlers = Handlers::build(backend, &config).await?;
    Ok(BenchServer::new(config, std::sync::Arc::new(handlers)))
}
