//! Error types for the benchmark server.

use thiserror::Error;

use crate::backend::BackendError;
use crate::cache::CacheError;

/// Errors that can stop the server from starting or running.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Socket setup or accept failures
    #[error("Network error: {0}")]
    Network(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The world cache could not be populated at startup
    #[error(transparent)]
    Cache(#[from] CacheError),
}
