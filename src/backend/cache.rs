use std::collections::VecDeque;

use super::record::SharedRecord;

pub const DEFAULT_CAPACITY: usize = 5;
pub const MIN_CAPACITY: usize = 1;
pub const MAX_CAPACITY: usize = 20;

/// Bounded FIFO of fetched records waiting to be shown.
///
/// Only the coordinator touches this. Fetch units hand their records over
/// through [`offer`](Self::offer), which never grows the queue past capacity.
#[derive(Debug)]
pub struct PrefetchCache {
    records: VecDeque<SharedRecord>,
    capacity: usize,
}

impl PrefetchCache {
    pub fn new(capacity: usize) -> Self {
        let capacity = clamp_capacity(capacity);
        Self {
            records: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Appends `record` at the back. Returns false and drops the record when full.
    pub fn offer(&mut self, record: SharedRecord) -> bool {
        if self.records.len() >= self.capacity {
            return false;
        }
        self.records.push_back(record);
        true
    }

    /// Pops the oldest record.
    pub fn take(&mut self) -> Option<SharedRecord> {
        self.records.pop_front()
    }

    pub fn clear(&mut self) {
        self.records.clear();
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Changes the bound. Records beyond the new bound are dropped from the back.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = clamp_capacity(capacity);
        self.records.truncate(self.capacity);
    }
}

pub fn clamp_capacity(capacity: usize) -> usize {
    capacity.clamp(MIN_CAPACITY, MAX_CAPACITY)
}

impl Default for PrefetchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}
