//! Row-shaped records served by the benchmark workloads.
//!
//! All of these types are checked out of an [`ObjectPool`](crate::pool::ObjectPool)
//! on the hot path, so each one implements [`Reusable`] to describe what
//! "neutral" means for it.

use std::borrow::Cow;

use serde::{Serialize, Serializer};

use crate::pool::Reusable;

/// A single row of the `World` table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct World {
    pub id: i32,
    #[serde(rename = "randomNumber")]
    pub random_number: i32,
}

impl Reusable for World {
    fn reset(&mut self) {
        *self = World::default();
    }
}

/// Payload of the serialization-only workload.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Message {
    pub message: &'static str,
}

impl Reusable for Message {
    fn reset(&mut self) {
        self.message = "";
    }
}

/// A row of the `Fortune` table.
///
/// The message is a `Cow` so the request-time entry can borrow a static
/// string instead of allocating one per request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fortune {
    pub id: i32,
    pub message: Cow<'static, str>,
}

impl Fortune {
    pub fn new(id: i32, message: impl Into<Cow<'static, str>>) -> Self {
        Self {
            id,
            message: message.into(),
        }
    }
}

/// Pooled buffer the fortunes workload reads into.
pub type FortuneList = Vec<Fortune>;

/// A reusable list of worlds with a fixed number of slots.
///
/// The slot storage is allocated once at construction and never shrinks or
/// grows. `len` is the only source of truth for how many leading slots are
/// valid: shrinking the list does not touch the trailing slots, and growing
/// it exposes whatever the previous holder left there until the caller
/// overwrites them.
#[derive(Debug, Clone)]
pub struct WorldList {
    slots: Vec<World>,
    len: usize,
}

impl WorldList {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            slots: vec![World::default(); capacity.max(1)],
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Sets the logical length without touching slot contents.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds [`capacity`](Self::capacity).
    pub fn set_len(&mut self, len: usize) {
        assert!(
            len <= self.slots.len(),
            "world list length {len} exceeds capacity {}",
            self.slots.len()
        );
        self.len = len;
    }

    pub fn as_slice(&self) -> &[World] {
        &self.slots[..self.len]
    }

    pub fn as_mut_slice(&mut self) -> &mut [World] {
        &mut self.slots[..self.len]
    }
}

impl Reusable for WorldList {
    fn reset(&mut self) {
        // Slots are left as-is; the next holder sets its own length.
        self.len = 0;
    }
}

impl Serialize for WorldList {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.as_slice().serialize(serializer)
    }
}
