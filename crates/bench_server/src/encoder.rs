//! Pooled JSON encoder.
//!
//! An encoder owns a scratch buffer that keeps its capacity across requests.
//! The lifecycle of one checkout is: bind to a target buffer, encode one
//! value into scratch, drain scratch into the target, clear scratch, return
//! to the pool. The last three steps happen when the [`EncoderGuard`] drops.

use serde::Serialize;

use crate::pool::{Pooled, Reusable};

const SCRATCH_CAPACITY: usize = 4096;

pub struct JsonEncoder {
    scratch: Vec<u8>,
}

impl JsonEncoder {
    pub fn new() -> Self {
        Self {
            scratch: Vec::with_capacity(SCRATCH_CAPACITY),
        }
    }

    /// Bytes encoded but not yet flushed.
    pub fn buffered(&self) -> usize {
        self.scratch.len()
    }

    fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        let start = self.scratch.len();
        match serde_json::to_writer(&mut self.scratch, value) {
            Ok(()) => Ok(()),
            Err(err) => {
                self.scratch.truncate(start);
                Err(err)
            }
        }
    }
}

impl Default for JsonEncoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Reusable for JsonEncoder {
    fn reset(&mut self) {
        self.scratch.clear();
    }
}

/// A checked-out encoder bound to one output buffer.
pub struct EncoderGuard<'p, 'w> {
    encoder: Pooled<'p, JsonEncoder>,
    target: &'w mut Vec<u8>,
}

impl<'p, 'w> EncoderGuard<'p, 'w> {
    pub(crate) fn new(encoder: Pooled<'p, JsonEncoder>, target: &'w mut Vec<u8>) -> Self {
        Self { encoder, target }
    }

    /// Serializes `value` into the scratch buffer. On error nothing from
    /// this call is left buffered.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> serde_json::Result<()> {
        self.encoder.encode(value)
    }

    /// Drains buffered bytes into the target.
    pub fn flush(&mut self) {
        self.target.extend_from_slice(&self.encoder.scratch);
        self.encoder.scratch.clear();
    }
}

impl Drop for EncoderGuard<'_, '_> {
    fn drop(&mut self) {
        self.flush();
    }
}
