//! Storage backends the handlers read from and write to.
//!
//! The handlers only ever see the [`Backend`] trait. [`MemoryBackend`] keeps
//! the tables in process and is what tests and the default configuration
//! use; `PgBackend` talks to a real Postgres when the `postgres` feature is
//! enabled.

mod memory;
#[cfg(feature = "postgres")]
mod postgres;

pub use memory::{MemoryBackend, DEFAULT_FORTUNES};
#[cfg(feature = "postgres")]
pub use postgres::PgBackend;

use async_trait::async_trait;
use thiserror::Error;

use crate::batch::UpdateBatch;
use crate::model::{Fortune, World};

#[derive(Debug, Error)]
pub enum BackendError {
    #[error("World {0} not found")]
    WorldNotFound(i32),

    #[error("Backend unavailable: {0}")]
    Unavailable(String),

    #[cfg(feature = "postgres")]
    #[error("Postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),
}

#[async_trait]
pub trait Backend: Send + Sync {
    /// Point read of one world by id.
    async fn fetch_world(&self, id: i32) -> Result<World, BackendError>;

    /// Up to `limit` worlds in whatever order the store yields them.
    async fn fetch_worlds(&self, limit: usize) -> Result<Vec<World>, BackendError>;

    /// Appends every row of the fortune table to `out`.
    async fn fetch_fortunes(&self, out: &mut Vec<Fortune>) -> Result<(), BackendError>;

    /// Applies every update in the batch as one logical request, in the
    /// batch's order. Either every update lands or none does.
    async fn submit_updates(&self, batch: &UpdateBatch<'_>) -> Result<(), BackendError>;
}
