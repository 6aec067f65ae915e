//! Reusable-object arenas for the per-request DTOs and the JSON encoder.
//!
//! Each pool is an unbounded lock-free free-list. `acquire` pops an idle
//! instance or builds a new one, so it never blocks and never fails; the
//! returned [`Pooled`] guard resets the instance and pushes it back when it
//! is dropped, which covers early returns and unwinding as well as the
//! normal path.
//!
//! ```ignore
//! let pools = Pools::new(500);
//!
//! let mut worlds = pools.worlds.acquire();
//! worlds.set_len(20);
//! // ... fill and encode ...
//! // dropped here: back on the free-list
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam::queue::SegQueue;

use crate::encoder::{EncoderGuard, JsonEncoder};
use crate::model::{FortuneList, Message, World, WorldList};

/// Returns an instance to a state that is safe to hand to the next holder.
pub trait Reusable: Send {
    fn reset(&mut self);
}

impl<T: Send> Reusable for Vec<T> {
    fn reset(&mut self) {
        self.clear();
    }
}

/// Point-in-time counters for a pool.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    /// Instances built by the factory because the free-list was empty.
    pub created: u64,
    /// Acquisitions served from the free-list.
    pub reused: u64,
    /// Instances pushed back onto the free-list.
    pub released: u64,
}

/// Unbounded pool of reusable `T` instances.
pub struct ObjectPool<T: Reusable> {
    idle: SegQueue<T>,
    factory: Box<dyn Fn() -> T + Send + Sync>,
    created: AtomicU64,
    reused: AtomicU64,
    released: AtomicU64,
}

impl<T: Reusable> ObjectPool<T> {
    pub fn new<F>(factory: F) -> Self
    where
        F: Fn() -> T + Send + Sync + 'static,
    {
        Self {
            idle: SegQueue::new(),
            factory: Box::new(factory),
            created: AtomicU64::new(0),
            reused: AtomicU64::new(0),
            released: AtomicU64::new(0),
        }
    }

    /// Checks out an idle instance, constructing one if none is available.
    pub fn acquire(&self) -> Pooled<'_, T> {
        let value = match self.idle.pop() {
            Some(value) => {
                self.reused.fetch_add(1, Ordering::Relaxed);
                value
            }
            None => {
                self.created.fetch_add(1, Ordering::Relaxed);
                (self.factory)()
            }
        };
        Pooled {
            pool: self,
            value: Some(value),
        }
    }

    /// Number of instances currently sitting on the free-list.
    pub fn idle_count(&self) -> usize {
        self.idle.len()
    }

    pub fn stats(&self) -> PoolStats {
        PoolStats {
            created: self.created.load(Ordering::Relaxed),
            reused: self.reused.load(Ordering::Relaxed),
            released: self.released.load(Ordering::Relaxed),
        }
    }

    fn release(&self, mut value: T) {
        value.reset();
        self.idle.push(value);
        self.released.fetch_add(1, Ordering::Relaxed);
    }
}

impl<T: Reusable> fmt::Debug for ObjectPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ObjectPool")
            .field("idle", &self.idle.len())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Exclusive handle to a pooled instance. Returns it to the pool on drop.
pub struct Pooled<'a, T: Reusable> {
    pool: &'a ObjectPool<T>,
    value: Option<T>,
}

impl<T: Reusable> Pooled<'_, T> {
    fn value(&self) -> &T {
        self.value.as_ref().expect("pooled value already released")
    }
}

impl<T: Reusable> Deref for Pooled<'_, T> {
    type Target = T;

    fn deref(&self) -> &T {
        self.value()
    }
}

impl<T: Reusable> DerefMut for Pooled<'_, T> {
    fn deref_mut(&mut self) -> &mut T {
        self.value.as_mut().expect("pooled value already released")
    }
}

impl<T: Reusable> Drop for Pooled<'_, T> {
    fn drop(&mut self) {
        if let Some(value) = self.value.take() {
            self.pool.release(value);
        }
    }
}

impl<T: Reusable + fmt::Debug> fmt::Debug for Pooled<'_, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self.value(), f)
    }
}

/// The process-wide set of pools used by the request handlers.
pub struct Pools {
    pub world: ObjectPool<World>,
    pub worlds: ObjectPool<WorldList>,
    pub message: ObjectPool<Message>,
    pub fortunes: ObjectPool<FortuneList>,
    pub encoder: ObjectPool<JsonEncoder>,
}

impl Pools {
    /// Builds the pools. World lists are created with `max_queries` slots so
    /// any clamped request count fits without reallocating.
    pub fn new(max_queries: usize) -> Self {
        Self {
            world: ObjectPool::new(World::default),
            worlds: ObjectPool::new(move || WorldList::with_capacity(max_queries)),
            message: ObjectPool::new(Message::default),
            fortunes: ObjectPool::new(|| Vec::with_capacity(16)),
            encoder: ObjectPool::new(JsonEncoder::new),
        }
    }

    /// Checks out an encoder that flushes into `target` when dropped.
    pub fn acquire_encoder<'w>(&self, target: &'w mut Vec<u8>) -> EncoderGuard<'_, 'w> {
        EncoderGuard::new(self.encoder.acquire(), target)
    }
}
