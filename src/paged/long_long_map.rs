//! Open-addressing `i64 -> i64` map over huge arrays.
//!
//! Keys are stored biased by one so that a zero in the key array marks an empty slot.
//! Probing is linear and wraps from the end of the table back to the start. The table
//! doubles once it holds three quarters of its capacity.

use std::fmt;
use std::sync::Arc;

use tracing::debug;

use super::array::HugeLongArray;
use super::cursor::HugeCursor;
use super::mixer::{mix_phi, next_power_of_two};
use crate::mem::{size_of_instance, AllocationTracker, MemoryEstimation, MemoryEstimations};
use crate::types::{HugeError, Result};

pub(crate) const DEFAULT_EXPECTED_ELEMENTS: usize = 4;
pub(crate) const LOAD_FACTOR: f64 = 0.75;
pub(crate) const MIN_HASH_ARRAY_LENGTH: usize = 4;

/// Key that cannot be stored: its biased form collides with the empty marker.
pub const RESERVED_KEY: i64 = -1;

/// Outcome of probing for a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Probe {
    /// The key occupies this slot.
    Found(usize),
    /// The key is absent; this is the first empty slot on its probe path.
    Vacant(usize),
    /// Every slot was visited without finding the key or an empty slot.
    Full,
}

/// Table length for `elements` entries at the load factor: a power of two of at least 4.
pub(crate) fn min_buffer_size(elements: usize) -> usize {
    let mut length = (elements as f64 / LOAD_FACTOR).ceil() as usize;
    if length == elements {
        length += 1;
    }
    next_power_of_two(length).max(MIN_HASH_ARRAY_LENGTH)
}

/// Number of entries at which a table of `array_size` slots grows.
pub(crate) fn expand_at_count(array_size: usize) -> usize {
    debug_assert!(array_size.is_power_of_two());
    array_size.min((array_size as f64 * LOAD_FACTOR).ceil() as usize)
}

fn scan(keys: &HugeLongArray, key: i64, start: usize, end: usize) -> Probe {
    let mut cursor = keys.new_cursor();
    cursor.set_range(start, end);
    while cursor.next() {
        let first = cursor.base() + cursor.offset();
        for (pos, &existing) in cursor.slice().iter().enumerate() {
            if existing == key {
                return Probe::Found(first + pos);
            }
            if existing == 0 {
                return Probe::Vacant(first + pos);
            }
        }
    }
    Probe::Full
}

/// Probes `keys` for the biased `key` starting at `start`, wrapping once.
pub(crate) fn find_slot(keys: &HugeLongArray, key: i64, start: usize) -> Probe {
    match scan(keys, key, start, keys.size()) {
        Probe::Full => scan(keys, key, 0, start),
        probe => probe,
    }
}

/// One occupied slot of a [`HugeLongLongMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LongLongEntry {
    /// Slot index in the backing table.
    pub index: usize,
    /// The key as inserted.
    pub key: i64,
    /// The stored value.
    pub value: i64,
}

/// A growable `i64 -> i64` hash map backed by [`HugeLongArray`]s.
///
/// Not thread-safe: callers serialize writers themselves.
pub struct HugeLongLongMap {
    keys: HugeLongArray,
    values: HugeLongArray,
    assigned: usize,
    mask: usize,
    resize_at: usize,
    tracker: Arc<dyn AllocationTracker>,
}

impl HugeLongLongMap {
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
        let (keys, values) = allocate_buffers(size, tracker.as_ref())?;
        Ok(Self {
            keys,
            values,
            assigned: 0,
            mask: size - 1,
            resize_at: expand_at_count(size),
            tracker,
        })
    }

    /// Estimation sized by node count.
    pub fn memory_estimation() -> Arc<dyn MemoryEstimation> {
        MemoryEstimations::builder("huge long long map")
            .fixed("instance", size_of_instance::<Self>())
            .per_node("keys", |nodes| {
                HugeLongArray::memory_estimation(min_buffer_size(nodes))
            })
            .per_node("values", |nodes| {
                HugeLongArray::memory_estimation(min_buffer_size(nodes))
            })
            .build()
    }

    /// Bytes held by the backing arrays.
    pub fn size_of(&self) -> usize {
        self.keys.size_of() + self.values.size_of()
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.assigned
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        self.assigned == 0
    }

    /// Number of slots in the backing table.
    pub fn capacity(&self) -> usize {
        self.mask + 1
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn put(&mut self, key: i64, value: i64) -> Result<()> {
        self.upsert(key, value, |slot, values| values.set(slot, value))
    }

    /// Adds `value` to the entry for `key`, inserting `value` if the key is absent.
    pub fn add_to(&mut self, key: i64, value: i64) -> Result<()> {
        self.upsert(key, value, |slot, values| values.add_to(slot, value))
    }

    /// The value for `key`, or `default` if absent. Never inserts.
    pub fn get_or_default(&self, key: i64, default: i64) -> i64 {
        if key == RESERVED_KEY {
            return default;
        }
        match self.probe(key.wrapping_add(1)) {
            Probe::Found(slot) => self.values.get(slot),
            _ => default,
        }
    }

    /// Whether `key` has an entry.
    pub fn contains_key(&self, key: i64) -> bool {
        key != RESERVED_KEY && matches!(self.probe(key.wrapping_add(1)), Probe::Found(_))
    }

    /// Removes every entry, keeping the current table size.
    pub fn clear(&mut self) {
        self.assigned = 0;
        self.keys.fill(0);
        self.values.fill(0);
    }

    /// Drops the backing arrays, reports the freed bytes to the tracker and returns them.
    ///
    /// The map is unusable afterwards; a second call returns `0`.
    pub fn release(&mut self) -> usize {
        let freed = self.keys.release() + self.values.release();
        self.tracker.remove(freed);
        self.assigned = 0;
        freed
    }

    /// Iterates over the occupied slots in table order.
    pub fn entries(&self) -> Entries<'_> {
        Entries::new(&self.keys, &self.values)
    }

    fn probe(&self, biased: i64) -> Probe {
        let start = (mix_phi(biased) as usize) & self.mask;
        find_slot(&self.keys, biased, start)
    }

    fn upsert<F>(&mut self, key: i64, value: i64, on_found: F) -> Result<()>
    where
        F: FnOnce(usize, &mut HugeLongArray),
    {
        if key == RESERVED_KEY {
            return Err(HugeError::InvalidArgument("key -1 is reserved"));
        }
        let biased = key.wrapping_add(1);
        match self.probe(biased) {
            Probe::Found(slot) => {
                on_found(slot, &mut self.values);
                Ok(())
            }
            Probe::Vacant(slot) => {
                if self.assigned == self.resize_at {
                    self.allocate_then_insert_then_rehash(slot, biased, value)?;
                } else {
                    self.keys.set(slot, biased);
                    self.values.set(slot, value);
                }
                self.assigned += 1;
                Ok(())
            }
            Probe::Full => unreachable!("table grows before it fills"),
        }
    }

    /// Grows the table. Nothing is mutated until the new buffers exist, so an allocation
    /// failure leaves the map as it was.
    fn allocate_then_insert_then_rehash(
        &mut self,
        slot: usize,
        pending_key: i64,
        pending_value: i64,
    ) -> Result<()> {
        let old_size = self.mask + 1;
        let new_size = old_size
            .checked_mul(2)
            .ok_or(HugeError::InvalidArgument("hash table size overflow"))?;
        let (new_keys, new_values) = allocate_buffers(new_size, self.tracker.as_ref())?;
        debug!(from = old_size, to = new_size, entries = self.assigned, "huge.map.resize");

        let mut old_keys = std::mem::replace(&mut self.keys, new_keys);
        let mut old_values = std::mem::replace(&mut self.values, new_values);
        self.mask = new_size - 1;
        self.resize_at = expand_at_count(new_size);

        old_keys.set(slot, pending_key);
        old_values.set(slot, pending_value);
        for entry in Entries::new(&old_keys, &old_values) {
            let biased = entry.key.wrapping_add(1);
            match self.probe(biased) {
                Probe::Vacant(target) => {
                    self.keys.set(target, biased);
                    self.values.set(target, entry.value);
                }
                probe => unreachable!("rehash found {probe:?} for a unique key"),
            }
        }

        let freed = old_keys.release() + old_values.release();
        self.tracker.remove(freed);
        Ok(())
    }
}

fn allocate_buffers(
    size: usize,
    tracker: &dyn AllocationTracker,
) -> Result<(HugeLongArray, HugeLongArray)> {
    debug_assert!(size.is_power_of_two());
    let keys = HugeLongArray::try_new(size, tracker)?;
    match HugeLongArray::try_new(size, tracker) {
        Ok(values) => Ok((keys, values)),
        Err(err) => {
            let mut keys = keys;
            tracker.remove(keys.release());
            Err(err)
        }
    }
}

impl fmt::Display for HugeLongLongMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (i, entry) in self.entries().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}=>{}", entry.key, entry.value)?;
        }
        f.write_str("]")
    }
}

impl fmt::Debug for HugeLongLongMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeLongLongMap")
            .field("size", &self.assigned)
            .field("capacity", &(self.mask + 1))
            .finish()
    }
}

/// Iterator over the occupied slots of a [`HugeLongLongMap`].
///
/// Holds its own pair of cursors; [`close`](Self::close) drops them early and ends the
/// iteration.
pub struct Entries<'a> {
    keys: HugeCursor<'a, i64>,
    values: HugeCursor<'a, i64>,
    ks: &'a [i64],
    vs: &'a [i64],
    base: usize,
    pos: usize,
    end: usize,
}

impl<'a> Entries<'a> {
    fn new(keys: &'a HugeLongArray, values: &'a HugeLongArray) -> Self {
        Self {
            keys: keys.full_cursor(),
            values: values.full_cursor(),
            ks: &[],
            vs: &[],
            base: 0,
            pos: 0,
            end: 0,
        }
    }

    /// Ends the iteration and drops the page references.
    pub fn close(&mut self) {
        self.keys.close();
        self.values.close();
        self.ks = &[];
        self.vs = &[];
        self.pos = 0;
        self.end = 0;
    }

    fn next_page(&mut self) -> bool {
        let values_has_next = self.values.next();
        if !self.keys.next() {
            debug_assert!(!values_has_next);
            return false;
        }
        debug_assert!(values_has_next);
        self.ks = self.keys.array();
        self.vs = self.values.array();
        self.base = self.keys.base();
        self.pos = self.keys.offset();
        self.end = self.keys.limit();
        true
    }
}

impl Iterator for Entries<'_> {
    type Item = LongLongEntry;

    fn next(&mut self) -> Option<LongLongEntry> {
        loop {
            while self.pos < self.end {
                let pos = self.pos;
                self.pos += 1;
                let key = self.ks[pos];
                if key != 0 {
                    return Some(LongLongEntry {
                        index: self.base + pos,
                        key: key.wrapping_sub(1),
                        value: self.vs[pos],
                    });
                }
            }
            if !self.next_page() {
                return None;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mem::{atomic_tracker, empty_tracker};
    use proptest::prelude::*;
    use std::collections::HashMap;

    #[test]
    fn buffer_sizing_matches_load_factor() {
        assert_eq!(min_buffer_size(0), 4);
        assert_eq!(min_buffer_size(3), 4);
        assert_eq!(min_buffer_size(4), 8);
        assert_eq!(min_buffer_size(100), 256);
        assert_eq!(expand_at_count(4), 3);
        assert_eq!(expand_at_count(1024), 768);
    }

    #[test]
    fn put_get_and_add_to() {
        let mut map = HugeLongLongMap::new(empty_tracker()).unwrap();
        assert!(map.is_empty());
        map.put(0, 10).unwrap();
        map.put(-7, 3).unwrap();
        map.add_to(0, 5).unwrap();
        map.add_to(42, 1).unwrap();
        assert_eq!(map.get_or_default(0, -100), 15);
        assert_eq!(map.get_or_default(-7, -100), 3);
        assert_eq!(map.get_or_default(42, -100), 1);
        assert_eq!(map.get_or_default(43, -100), -100);
        assert!(map.contains_key(-7) && !map.contains_key(8));
        assert_eq!(map.size(), 3);
    }

    #[test]
    fn reserved_key_is_rejected() {
        let mut map = HugeLongLongMap::new(empty_tracker()).unwrap();
        assert!(matches!(
            map.put(RESERVED_KEY, 1),
            Err(HugeError::InvalidArgument(_))
        ));
        assert!(!map.contains_key(RESERVED_KEY));
        assert_eq!(map.get_or_default(RESERVED_KEY, 9), 9);
    }

    #[test]
    fn resize_keeps_entries_and_tracker_balanced() {
        let tracker = atomic_tracker();
        let mut map = HugeLongLongMap::new(tracker.clone()).unwrap();
        for key in 0..10_000 {
            map.add_to(key * 31, key).unwrap();
        }
        assert!(map.capacity() >= 10_000);
        for key in 0..10_000 {
            assert_eq!(map.get_or_default(key * 31, -1), key);
        }
        assert_eq!(tracker.tracked(), map.size_of());
        let freed = map.release();
        assert!(freed > 0);
        assert_eq!(tracker.tracked(), 0);
        assert_eq!(map.release(), 0);
    }

    #[test]
    fn entries_skip_empty_slots_and_close_early() {
        let mut map = HugeLongLongMap::with_expected_elements(16, empty_tracker()).unwrap();
        for key in [5, 9, 100] {
            map.put(key, key * 2).unwrap();
        }
        let mut seen: Vec<(i64, i64)> = map.entries().map(|e| (e.key, e.value)).collect();
        seen.sort_unstable();
        assert_eq!(seen, vec![(5, 10), (9, 18), (100, 200)]);

        let mut entries = map.entries();
        assert!(entries.next().is_some());
        entries.close();
        assert!(entries.next().is_none());
    }

    #[test]
    fn clear_empties_in_place() {
        let mut map = HugeLongLongMap::new(empty_tracker()).unwrap();
        map.put(1, 1).unwrap();
        map.clear();
        assert!(map.is_empty());
        assert!(!map.contains_key(1));
        assert_eq!(map.to_string(), "[]");
        map.put(2, 3).unwrap();
        assert_eq!(map.to_string(), "[2=>3]");
    }

    proptest! {
        #[test]
        fn behaves_like_std_hash_map(ops in proptest::collection::vec((-50i64..50, -5i64..5, any::<bool>()), 0..300)) {
            let mut map = HugeLongLongMap::new(empty_tracker()).unwrap();
            let mut model: HashMap<i64, i64> = HashMap::new();
            for (key, value, accumulate) in ops {
                if key == RESERVED_KEY {
                    continue;
                }
                if accumulate {
                    map.add_to(key, value).unwrap();
                    *model.entry(key).or_insert(0) += value;
                } else {
                    map.put(key, value).unwrap();
                    model.insert(key, value);
                }
            }
            prop_assert_eq!(map.size(), model.len());
            for (key, value) in &model {
                prop_assert_eq!(map.get_or_default(*key, i64::MIN), *value);
            }
        }
    }
}
