//! Read-only snapshot of the world table, loaded once at startup.

use thiserror::Error;
use tracing::info;

use crate::backend::{Backend, BackendError};
use crate::model::World;
use crate::rng::ShardedRng;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Cache query failed: {0}")]
    Query(#[from] BackendError),

    #[error("Cache expected {expected} rows but the backend returned {actual}")]
    ShortRead { expected: usize, actual: usize },
}

/// Fixed-length array of worlds in the order the backend returned them.
///
/// Slot `i` is not guaranteed to hold world `i + 1`; callers pick slots by
/// random index, never by id.
#[derive(Debug)]
pub struct WorldCache {
    worlds: Box<[World]>,
}

impl WorldCache {
    /// Reads exactly `count` rows in one query. Anything short of a full
    /// snapshot is an error: a half-filled cache must never serve traffic.
    pub async fn load(backend: &dyn Backend, count: usize) -> Result<Self, CacheError> {
        let mut rows = backend.fetch_worlds(count).await?;
        if rows.len() < count {
            return Err(CacheError::ShortRead {
                expected: count,
                actual: rows.len(),
            });
        }
        rows.truncate(count);

        info!("🗄️ World cache loaded with {} entries", rows.len());
        Ok(Self::from_worlds(rows))
    }

    pub fn from_worlds(worlds: Vec<World>) -> Self {
        Self {
            worlds: worlds.into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.worlds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.worlds.is_empty()
    }

    /// Copy of the world in slot `index`. `index` must be below [`len`](Self::len).
    #[inline]
    pub fn lookup(&self, index: usize) -> World {
        self.worlds[index]
    }

    /// A uniformly chosen entry, or the default world if the cache is empty.
    #[inline]
    pub fn random(&self, rng: &ShardedRng) -> World {
        self.worlds
            .get(rng.next(self.worlds.len()))
            .copied()
            .unwrap_or_default()
    }
}
