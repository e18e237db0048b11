use std::sync::Arc;

use tracing::debug;

use super::array::{HugeDoubleArray, HugeLongArray};
use super::long_long_map::{expand_at_count, min_buffer_size, Probe, DEFAULT_EXPECTED_ELEMENTS};
use super::mixer::mix_pair;
use crate::mem::{size_of_instance, AllocationTracker, MemoryEstimation, MemoryEstimations};
use crate::types::{HugeError, Result};

/// One occupied slot of a [`HugeLongLongDoubleMap`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEntry {
    /// Slot index in the backing table.
    pub index: usize,
    /// First key component.
    pub first: i64,
    /// Second key component.
    pub second: i64,
    /// Stored value.
    pub value: f64,
}

struct Buffers {
    first: HugeLongArray,
    second: HugeLongArray,
    values: HugeDoubleArray,
}

impl Buffers {
    fn allocate(size: usize, tracker: &dyn AllocationTracker) -> Result<Self> {
        let mut first = HugeLongArray::try_new(size, tracker)?;
        let mut second = match HugeLongArray::try_new(size, tracker) {
            Ok(second) => second,
            Err(err) => {
                tracker.remove(first.release());
                return Err(err);
            }
        };
        match HugeDoubleArray::try_new(size, tracker) {
            Ok(values) => Ok(Self {
                first,
                second,
                values,
            }),
            Err(err) => {
                tracker.remove(first.release() + second.release());
                Err(err)
            }
        }
    }

    fn size(&self) -> usize {
        self.first.size()
    }

    fn size_of(&self) -> usize {
        self.first.size_of() + self.second.size_of() + self.values.size_of()
    }

    fn release(&mut self) -> usize {
        self.first.release() + self.second.release() + self.values.release()
    }

    /// Linear probe for the biased pair, wrapping once around the table.
    fn find_slot(&self, first: i64, second: i64, start: usize) -> Probe {
        let size = self.size();
        let mask = size - 1;
        for step in 0..size {
            let slot = (start + step) & mask;
            let existing = self.first.get(slot);
            if existing == 0 {
                return Probe::Vacant(slot);
            }
            if existing == first && self.second.get(slot) == second {
                return Probe::Found(slot);
            }
        }
        Probe::Full
    }

    fn store(&mut self, slot: usize, first: i64, second: i64, value: f64) {
        self.first.set(slot, first);
        self.second.set(slot, second);
        self.values.set(slot, value);
    }

    fn entries(&self) -> impl Iterator<Item = PairEntry> + '_ {
        self.first
            .iter()
            .zip(self.second.iter())
            .zip(self.values.iter())
            .enumerate()
            .filter(|(_, ((first, _), _))| **first != 0)
            .map(|(index, ((first, second), value))| PairEntry {
                index,
                first: first.wrapping_sub(1),
                second: second.wrapping_sub(1),
                value: *value,
            })
    }
}

/// Open-addressing map from a pair of `i64` keys to an `f64`.
///
/// Both key components are stored biased by one; a pair whose first component is `-1`
/// cannot be stored. Hashing mixes both components with a seed drawn per map so that
/// inputs crafted against one instance do not cluster in another.
pub struct HugeLongLongDoubleMap {
    buffers: Buffers,
    assigned: usize,
    resize_at: usize,
    seed: u64,
    tracker: Arc<dyn AllocationTracker>,
}

impl HugeLongLongDoubleMap {
    /// A map sized for a handful of entries.
    pub fn new(tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        Self::with_expected_elements(DEFAULT_EXPECTED_ELEMENTS, tracker)
    }

    /// A map sized to hold `expected` entries before its first resize.
    pub fn with_expected_elements(
        expected: usize,
        tracker: Arc<dyn AllocationTracker>,
    ) -> Result<Self> {
        let size = min_buffer_size(expected);
        Ok(Self {
            buffers: Buffers::allocate(size, tracker.as_ref())?,
            assigned: 0,
            resize_at: expand_at_count(size),
            seed: rand::random(),
            tracker,
        })
    }

    /// Estimation sized by relationship count, one entry per relationship.
    pub fn memory_estimation() -> Arc<dyn MemoryEstimation> {
        MemoryEstimations::builder("huge long long double map")
            .fixed("instance", size_of_instance::<Self>())
            .per_relationship("keys", |rels| {
                2 * HugeLongArray::memory_estimation(min_buffer_size(rels))
            })
            .per_relationship("values", |rels| {
                HugeDoubleArray::memory_estimation(min_buffer_size(rels))
            })
            .build()
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.assigned
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Bytes held by the backing arrays.
    pub fn size_of(&self) -> usize {
        self.buffers.size_of()
    }

    /// Adds `value` to the entry for `(first, second)`, inserting it if absent.
    pub fn add_to(&mut self, first: i64, second: i64, value: f64) -> Result<()> {
        self.upsert(first, second, value, |current| current + value)
    }

    /// Stores `value` under `(first, second)`.
    pub fn put(&mut self, first: i64, second: i64, value: f64) -> Result<()> {
        self.upsert(first, second, value, |_| value)
    }

    /// The value for `(first, second)`, or `default` if absent. Never inserts.
    pub fn get_or_default(&self, first: i64, second: i64, default: f64) -> f64 {
        match self.probe(first, second) {
            Some(Probe::Found(slot)) => self.buffers.values.get(slot),
            _ => default,
        }
    }

    /// Whether `(first, second)` has an entry.
    pub fn contains_key(&self, first: i64, second: i64) -> bool {
        matches!(self.probe(first, second), Some(Probe::Found(_)))
    }

    /// Removes every entry, keeping the current table size.
    pub fn clear(&mut self) {
        self.assigned = 0;
        self.buffers.first.fill(0);
        self.buffers.second.fill(0);
        self.buffers.values.fill(0.0);
    }

    /// Drops the backing arrays, reports the freed bytes to the tracker and returns them.
    pub fn release(&mut self) -> usize {
        let freed = self.buffers.release();
        self.tracker.remove(freed);
        self.assigned = 0;
        freed
    }

    /// Iterates over the occupied slots in table order.
    pub fn entries(&self) -> impl Iterator<Item = PairEntry> + '_ {
        self.buffers.entries()
    }

    fn probe(&self, first: i64, second: i64) -> Option<Probe> {
        if first == -1 {
            return None;
        }
        let (b1, b2) = (first.wrapping_add(1), second.wrapping_add(1));
        let start = (mix_pair(b1, b2, self.seed) as usize) & (self.buffers.size() - 1);
        Some(self.buffers.find_slot(b1, b2, start))
    }

    fn upsert<F>(&mut self, first: i64, second: i64, initial: f64, merge: F) -> Result<()>
    where
        F: FnOnce(f64) -> f64,
    {
        let probe = self
            .probe(first, second)
            .ok_or(HugeError::InvalidArgument("first key -1 is reserved"))?;
        let (b1, b2) = (first.wrapping_add(1), second.wrapping_add(1));
        match probe {
            Probe::Found(slot) => {
                let current = self.buffers.values.get(slot);
                self.buffers.values.set(slot, merge(current));
            }
            Probe::Vacant(slot) => {
                if self.assigned == self.resize_at {
                    self.grow(slot, b1, b2, initial)?;
                } else {
                    self.buffers.store(slot, b1, b2, initial);
                }
                self.assigned += 1;
            }
            Probe::Full => unreachable!("table grows before it fills"),
        }
        Ok(())
    }

    fn grow(&mut self, slot: usize, b1: i64, b2: i64, value: f64) -> Result<()> {
        let old_size = self.buffers.size();
        let new_size = old_size
            .checked_mul(2)
            .ok_or(HugeError::InvalidArgument("hash table size overflow"))?;
        let fresh = Buffers::allocate(new_size, self.tracker.as_ref())?;
        debug!(from = old_size, to = new_size, entries = self.assigned, "huge.pair_map.resize");

        let mut old = std::mem::replace(&mut self.buffers, fresh);
        self.resize_at = expand_at_count(new_size);
        old.store(slot, b1, b2, value);
        let mask = new_size - 1;
        for entry in old.entries() {
            let (e1, e2) = (entry.first.wrapping_add(1), entry.second.wrapping_add(1));
            let start = (mix_pair(e1, e2, self.seed) as usize) & mask;
            match self.buffers.find_slot(e1, e2, start) {
                Probe::Vacant(target) => self.buffers.store(target, e1, e2, entry.value),
                probe => unreachable!("rehash found {probe:?} for a unique key"),
            }
        }
        self.tracker.remove(old.release());
        Ok(())
    }
}

impl std::fmt::Debug for HugeLongLongDoubleMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HugeLongLongDoubleMap")
            .field("size", &self.assigned)
            .field("capacity", &self.buffers.size())
            .finish()
    }
}
