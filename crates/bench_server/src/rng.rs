//! Sharded random index generator.
//!
//! Every shard is an independent `SmallRng` seeded from OS entropy. A thread
//! is pinned to one shard the first time it draws, so callers on different
//! threads land on different locks and almost never wait on each other.

use std::cell::Cell;
use std::sync::atomic::{AtomicUsize, Ordering};

use crossbeam::utils::CachePadded;
use parking_lot::Mutex;
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

static NEXT_SLOT: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    static THREAD_SLOT: Cell<Option<usize>> = const { Cell::new(None) };
}

fn thread_slot() -> usize {
    THREAD_SLOT.with(|slot| match slot.get() {
        Some(index) => index,
        None => {
            let index = NEXT_SLOT.fetch_add(1, Ordering::Relaxed);
            slot.set(Some(index));
            index
        }
    })
}

pub struct ShardedRng {
    shards: Box<[CachePadded<Mutex<SmallRng>>]>,
}

impl ShardedRng {
    pub fn new(shards: usize) -> Self {
        let shards = (0..shards.max(1))
            .map(|_| CachePadded::new(Mutex::new(SmallRng::from_entropy())))
            .collect();
        Self { shards }
    }

    /// Two shards per logical CPU.
    pub fn with_default_shards() -> Self {
        Self::new(default_shard_count())
    }

    pub fn shard_count(&self) -> usize {
        self.shards.len()
    }

    /// Uniform integer in `[0, bound)`. Returns 0 when `bound` is 0 or 1.
    #[inline]
    pub fn next(&self, bound: usize) -> usize {
        if bound <= 1 {
            return 0;
        }
        let shard = &self.shards[thread_slot() % self.shards.len()];
        shard.lock().gen_range(0..bound)
    }

    /// Random dense row id in `[1, bound]`.
    #[inline]
    pub fn random_world_id(&self, bound: usize) -> i32 {
        (self.next(bound) + 1) as i32
    }
}

impl std::fmt::Debug for ShardedRng {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShardedRng")
            .field("shards", &self.shards.len())
            .finish()
    }
}

pub fn default_shard_count() -> usize {
    num_cpus::get() * 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn stays_within_bound() {
        let rng = ShardedRng::new(4);
        for _ in 0..10_000 {
            assert!(rng.next(17) < 17);
        }
    }

    #[test]
    fn degenerate_bounds_return_zero() {
        let rng = ShardedRng::new(1);
        assert_eq!(rng.next(0), 0);
        assert_eq!(rng.next(1), 0);
    }

    #[test]
    fn world_ids_are_one_based() {
        let rng = ShardedRng::new(2);
        for _ in 0..10_000 {
            let id = rng.random_world_id(10);
            assert!((1..=10).contains(&id), "id {id} out of range");
        }
    }

    #[test]
    fn zero_shards_is_rounded_up() {
        assert_eq!(ShardedRng::new(0).shard_count(), 1);
    }

    #[test]
    fn roughly_uniform() {
        const BUCKETS: usize = 10;
        const DRAWS: usize = 100_000;

        let rng = ShardedRng::new(1);
        let mut counts = [0usize; BUCKETS];
        for _ in 0..DRAWS {
            counts[rng.next(BUCKETS)] += 1;
        }

        let expected = DRAWS / BUCKETS;
        for (bucket, &count) in counts.iter().enumerate() {
            let drift = count.abs_diff(expected);
            assert!(
                drift < expected / 10,
                "bucket {bucket} got {count}, expected about {expected}"
            );
        }
    }

    #[test]
    fn shared_across_threads() {
        let rng = Arc::new(ShardedRng::new(4));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let rng = Arc::clone(&rng);
                thread::spawn(move || (0..5_000).map(|_| rng.next(100)).max().unwrap_or(0))
            })
            .collect();
        for handle in handles {
            assert!(handle.join().unwrap() < 100);
        }
    }
}
