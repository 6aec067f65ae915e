//! The seven benchmark workloads.
//!
//! Every handler runs one pass: clamp the count, check out pooled objects,
//! read from the backend or the cache, sort where the workload needs it,
//! encode into the reply body, and let the pool guards drop. Backend
//! failures are logged and swallowed; the affected rows are encoded with
//! default values.

use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tracing::{debug, error};

use crate::backend::Backend;
use crate::batch::UpdateBatch;
use crate::cache::{CacheError, WorldCache};
use crate::config::ServerConfig;
use crate::reply::Reply;
use crate::model::{Fortune, World};
use crate::params::queries_param;
use crate::pool::Pools;
use crate::render::{render_fortunes, CONTENT_TYPE_HTML};
use crate::rng::ShardedRng;

pub const HELLO_WORLD: &str = "Hello, World!";
pub const CONTENT_TYPE_JSON: &str = "application/json";
pub const EXTRA_FORTUNE: &str = "Additional fortune added at request time.";

pub struct Handlers {
    backend: Arc<dyn Backend>,
    pools: Pools,
    cache: WorldCache,
    rng: ShardedRng,
    world_count: usize,
    max_queries: usize,
    query_fanout: usize,
}

impl Handlers {
    /// Loads the world cache from `backend` and wires up the handlers.
    /// A cache that cannot be fully loaded is fatal.
    pub async fn build(
        backend: Arc<dyn Backend>,
        config: &ServerConfig,
    ) -> Result<Self, CacheError> {
        let cache = WorldCache::load(backend.as_ref(), config.cache_size).await?;
        Ok(Self::new(backend, cache, config))
    }

    pub fn new(backend: Arc<dyn Backend>, cache: WorldCache, config: &ServerConfig) -> Self {
        Self {
            backend,
            pools: Pools::new(config.max_queries),
            cache,
            rng: ShardedRng::new(config.rng_shards),
            world_count: config.world_count,
            max_queries: config.max_queries,
            query_fanout: config.query_fanout.max(1),
        }
    }

    pub fn pools(&self) -> &Pools {
        &self.pools
    }

    pub fn cache(&self) -> &WorldCache {
        &self.cache
    }

    pub fn json(&self, reply: &mut Reply) {
        let mut message = self.pools.message.acquire();
        message.message = HELLO_WORLD;

        reply.set_content_type(CONTENT_TYPE_JSON);
        self.encode(&*message, reply);
    }

    pub async fn db(&self, reply: &mut Reply) {
        let mut world = self.pools.world.acquire();
        *world = self
            .read_world(self.rng.random_world_id(self.world_count))
            .await;

        reply.set_content_type(CONTENT_TYPE_JSON);
        self.encode(&*world, reply);
    }

    pub async fn queries(&self, raw_count: Option<&str>, reply: &mut Reply) {
        let count = queries_param(raw_count, self.max_queries);
        let mut worlds = self.pools.worlds.acquire();
        worlds.set_len(count);
        self.fill_random_worlds(worlds.as_mut_slice()).await;

        reply.set_content_type(CONTENT_TYPE_JSON);
        self.encode(&*worlds, reply);
    }

    pub fn cached_worlds(&self, raw_count: Option<&str>, reply: &mut Reply) {
        let count = queries_param(raw_count, self.max_queries);
        let mut worlds = self.pools.worlds.acquire();
        worlds.set_len(count);
        for slot in worlds.as_mut_slice() {
            *slot = self.cache.random(&self.rng);
        }

        reply.set_content_type(CONTENT_TYPE_JSON);
        self.encode(&*worlds, reply);
    }

    pub async fn fortunes(&self, reply: &mut Reply) {
        let mut fortunes = self.pools.fortunes.acquire();
        if let Err(err) = self.backend.fetch_fortunes(&mut fortunes).await {
            debug!("Fortune read failed: {err}");
        }
        fortunes.push(Fortune::new(0, EXTRA_FORTUNE));
        // Stable, so equal messages keep arrival order.
        fortunes.sort_by(|a, b| a.message.cmp(&b.message));

        reply.set_content_type(CONTENT_TYPE_HTML);
        render_fortunes(&fortunes, reply.body_mut());
    }

    pub async fn updates(&self, raw_count: Option<&str>, reply: &mut Reply) {
        let count = queries_param(raw_count, self.max_queries);
        let mut worlds = self.pools.worlds.acquire();
        worlds.set_len(count);
        self.fill_random_worlds(worlds.as_mut_slice()).await;
        for world in worlds.as_mut_slice() {
            world.random_number = self.rng.random_world_id(self.world_count);
        }

        // Ascending ids keep concurrent batches from locking rows in
        // opposite orders.
        let batch = UpdateBatch::sorted(worlds.as_mut_slice());
        if let Err(err) = self.backend.submit_updates(&batch).await {
            debug!(updates = batch.len(), "Update batch failed: {err}");
        }

        reply.set_content_type(CONTENT_TYPE_JSON);
        self.encode(&*worlds, reply);
    }

    pub fn plaintext(&self, reply: &mut Reply) {
        reply.body_mut().extend_from_slice(HELLO_WORLD.as_bytes());
    }

    async fn read_world(&self, id: i32) -> World {
        match self.backend.fetch_world(id).await {
            Ok(world) => world,
            Err(err) => {
                debug!(id, "World read failed: {err}");
                World::default()
            }
        }
    }

    /// Overwrites each slot with a randomly chosen row. Up to `query_fanout`
    /// reads are in flight at once; results land in issuance order.
    async fn fill_random_worlds(&self, slots: &mut [World]) {
        let reads = stream::iter(0..slots.len())
            .map(|_| self.read_world(self.rng.random_world_id(self.world_count)))
            .buffered(self.query_fanout);
        let mut reads = std::pin::pin!(reads);

        for slot in slots.iter_mut() {
            match reads.next().await {
                Some(world) => *slot = world,
                None => break,
            }
        }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T, reply: &mut Reply) {
        let mut encoder = self.pools.acquire_encoder(reply.body_mut());
        if let Err(err) = encoder.encode(value) {
            error!("Failed to encode response body: {err}");
        }
    }
}
