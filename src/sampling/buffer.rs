//! Bounded trace accumulator with atomic swap-and-clear.
//!
//! Partitions buffered traces into normal (keyed by structural type id)
//! and abnormal. Producers never block on batch processing: the swap
//! critical section only exchanges pointers.

use crate::core::{Trace, TypeId};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use std::sync::Arc;

/// Normal traces grouped by structural type id.
pub type NormalPartition = FxHashMap<TypeId, Vec<Arc<Trace>>>;

/// Bounded, concurrent trace buffer.
pub struct SharedBuffer {
    limit: u64,
    inner: Mutex<BufferInner>,
}

#[derive(Default)]
struct BufferInner {
    type_map: NormalPartition,
    abnormal: Vec<Arc<Trace>>,
    count: u64,
}

impl SharedBuffer {
    /// Creates a buffer that reports full at `limit` traces.
    pub fn new(limit: u64) -> Self {
        SharedBuffer {
            limit,
            inner: Mutex::new(BufferInner::default()),
        }
    }

    /// Appends a trace to the matching partition.
    ///
    /// The buffer never drops: adds past the limit still land, fullness
    /// only signals the caller to schedule a batch.
    pub fn add(&self, type_id: TypeId, trace: Arc<Trace>, is_abnormal: bool) {
        let mut inner = self.inner.lock();
        if is_abnormal {
            inner.abnormal.push(trace);
        } else {
            inner.type_map.entry(type_id).or_default().push(trace);
        }
        inner.count += 1;
    }

    /// Returns true once the buffered count reached the limit.
    pub fn is_full(&self) -> bool {
        self.inner.lock().count >= self.limit
    }

    /// Returns true when no traces are buffered.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().count == 0
    }

    /// Returns the current buffered trace count.
    pub fn count(&self) -> u64 {
        self.inner.lock().count
    }

    /// Takes both partitions and the count, leaving the buffer empty.
    ///
    /// Every concurrent `add` lands entirely before or entirely after the
    /// swap; the next batch starts filling immediately.
    pub fn swap_and_clear(&self) -> (NormalPartition, Vec<Arc<Trace>>, u64) {
        let mut inner = self.inner.lock();
        let drained = std::mem::take(&mut *inner);
        (drained.type_map, drained.abnormal, drained.count)
    }
}
