use async_trait::async_trait;
use rand::Rng;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use super::{Backend, BackendError};
use crate::batch::UpdateBatch;
use crate::model::{Fortune, World};

/// The standard contents of the fortune table.
pub const DEFAULT_FORTUNES: [(i32, &str); 12] = [
    (1, "fortune: No such file or directory"),
    (2, "A computer scientist is someone who fixes things that aren't broken."),
    (3, "After enough decimal places, nobody gives a damn."),
    (4, "A bad random number generator: 1, 1, 1, 1, 1, 4.33e+67, 1, 1, 1"),
    (5, "A computer program does what you tell it to do, not what you want it to do."),
    (6, "Emacs is a nice operating system, but I prefer UNIX. — Tom Christaensen"),
    (7, "Any program that runs right is obsolete."),
    (8, "A list is only as strong as its weakest link. — Donald Knuth"),
    (9, "Feature: A bug with seniority."),
    (10, "Computers make very fast, very accurate mistakes."),
    (11, "<script>alert(\"This should not be displayed in a browser alert box.\");</script>"),
    (12, "フレームワークのベンチマーク"),
];

/// In-process world and fortune tables.
///
/// Each world row sits behind its own async mutex. A batch update takes the
/// row locks one by one in batch order, writes only once it holds all of
/// them and releases them together, the same way a database transaction
/// holds row locks until commit. A batch naming a missing row writes
/// nothing. Two batches that lock overlapping rows in opposite orders
/// can therefore deadlock here just as they would against a real store.
pub struct MemoryBackend {
    worlds: Box<[Mutex<i32>]>,
    fortunes: Vec<Fortune>,
}

impl MemoryBackend {
    /// `world_count` rows with random numbers in `[1, world_count]` and the
    /// default fortune table.
    pub fn new(world_count: usize) -> Self {
        let mut rng = rand::thread_rng();
        let upper = world_count.max(1) as i32;
        let numbers = (0..world_count).map(|_| rng.gen_range(1..=upper)).collect();
        Self::with_tables(numbers, default_fortunes())
    }

    /// Row `i` of `random_numbers` becomes world id `i + 1`.
    pub fn with_tables(random_numbers: Vec<i32>, fortunes: Vec<Fortune>) -> Self {
        Self {
            worlds: random_numbers.into_iter().map(Mutex::new).collect(),
            fortunes,
        }
    }

    pub fn world_count(&self) -> usize {
        self.worlds.len()
    }

    fn row(&self, id: i32) -> Result<&Mutex<i32>, BackendError> {
        usize::try_from(id)
            .ok()
            .and_then(|id| id.checked_sub(1))
            .and_then(|index| self.worlds.get(index))
            .ok_or(BackendError::WorldNotFound(id))
    }
}

fn default_fortunes() -> Vec<Fortune> {
    DEFAULT_FORTUNES
        .iter()
        .map(|&(id, message)| Fortune::new(id, message))
        .collect()
}

#[async_trait]
impl Backend for MemoryBackend {
    async fn fetch_world(&self, id: i32) -> Result<World, BackendError> {
        let random_number = *self.row(id)?.lock().await;
        Ok(World { id, random_number })
    }

    async fn fetch_worlds(&self, limit: usize) -> Result<Vec<World>, BackendError> {
        let mut worlds = Vec::with_capacity(limit.min(self.worlds.len()));
        for (index, row) in self.worlds.iter().take(limit).enumerate() {
            worlds.push(World {
                id: index as i32 + 1,
                random_number: *row.lock().await,
            });
        }
        Ok(worlds)
    }

    async fn fetch_fortunes(&self, out: &mut Vec<Fortune>) -> Result<(), BackendError> {
        out.extend(self.fortunes.iter().cloned());
        Ok(())
    }

    async fn submit_updates(&self, batch: &UpdateBatch<'_>) -> Result<(), BackendError> {
        let mut held: Vec<(i32, MutexGuard<'_, i32>, i32)> = Vec::with_capacity(batch.len());

        for (random_number, id) in batch.updates() {
            // Sorted batches put repeats of an id next to each other.
            if let Some((last_id, _, pending)) = held.last_mut() {
                if *last_id == id {
                    *pending = random_number;
                    continue;
                }
            }

            let guard = self.row(id)?.lock().await;
            held.push((id, guard, random_number));

            // Let other requests run while this one holds its locks.
            tokio::task::yield_now().await;
        }

        // Every row is locked and exists; nothing was written before here.
        for (_, guard, random_number) in held.iter_mut() {
            **guard = *random_number;
        }

        debug!(rows = held.len(), updates = batch.len(), "applied update batch");
        Ok(())
    }
}
