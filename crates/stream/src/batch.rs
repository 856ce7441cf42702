//! Column-wise staging for rows headed into one ts-table, recycled through
//! a pool to keep the write path off the allocator.

use common::knobs::ELEMENT_BATCH_POOL_CAPACITY;
use parking_lot::Mutex;

use crate::{
    tag::EncodedTagFamily,
    types::{
        SeriesId,
        TimestampNanos,
    },
};

/// Parallel arrays staging every element bound for one ts-table. All four
/// arrays are positionally aligned; `push`es must keep them that way.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ElementBatch {
    pub timestamps: Vec<TimestampNanos>,
    pub element_ids: Vec<u64>,
    pub series_ids: Vec<SeriesId>,
    pub tag_families: Vec<Vec<EncodedTagFamily>>,
}

impl ElementBatch {
    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    pub fn is_aligned(&self) -> bool {
        self.element_ids.len() == self.timestamps.len()
            && self.series_ids.len() == self.timestamps.len()
            && self.tag_families.len() == self.timestamps.len()
    }

    fn reset(&mut self) {
        self.timestamps.clear();
        self.element_ids.clear();
        self.series_ids.clear();
        self.tag_families.clear();
    }
}

/// Free list of batches. Acquired batches are always empty; a batch must
/// not be touched after release.
pub struct BatchPool {
    capacity: usize,
    free: Mutex<Vec<Box<ElementBatch>>>,
}

impl BatchPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            free: Mutex::new(Vec::new()),
        }
    }

    pub fn acquire(&self) -> Box<ElementBatch> {
        self.free.lock().pop().unwrap_or_default()
    }

    pub fn release(&self, mut batch: Box<ElementBatch>) {
        batch.reset();
        let mut free = self.free.lock();
        if free.len() < self.capacity {
            free.push(batch);
        }
    }

    pub fn free_count(&self) -> usize {
        self.free.lock().len()
    }
}

impl Default for BatchPool {
    fn default() -> Self {
        Self::new(*ELEMENT_BATCH_POOL_CAPACITY)
    }
}
