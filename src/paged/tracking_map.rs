use std::sync::Arc;

use tracing::trace;

use super::long_long_map::{expand_at_count, min_buffer_size, Probe};
use super::mixer::mix_phi;
use crate::mem::{size_of_instance, size_of_slice, AllocationTracker};
use crate::types::{HugeError, Result};

/// Small open-addressing `i32 -> f64` map that reports its buffer growth to a tracker.
///
/// Used as the per-page map of [`PagedLongDoubleMap`](super::PagedLongDoubleMap). Keys are
/// stored biased by one, so `-1` cannot be a key.
pub struct TrackingIntDoubleHashMap {
    keys: Vec<i32>,
    values: Vec<f64>,
    assigned: usize,
    resize_at: usize,
    tracker: Arc<dyn AllocationTracker>,
}

fn bytes_for(size: usize) -> usize {
    size_of_slice::<i32>(size) + size_of_slice::<f64>(size)
}

fn try_zeroed<T: Clone + Default>(size: usize) -> Result<Vec<T>> {
    let mut buffer = Vec::new();
    buffer
        .try_reserve_exact(size)
        .map_err(|_| HugeError::AllocationFailed {
            bytes: size_of_slice::<T>(size),
        })?;
    buffer.resize(size, T::default());
    Ok(buffer)
}

impl TrackingIntDoubleHashMap {
    /// An empty map with the minimum table size.
    pub fn new(tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        let size = min_buffer_size(0);
        let keys = try_zeroed(size)?;
        let values = try_zeroed(size)?;
        tracker.add(bytes_for(size));
        Ok(Self {
            keys,
            values,
            assigned: 0,
            resize_at: expand_at_count(size),
            tracker,
        })
    }

    /// Bytes a map holding `entries` entries will own.
    pub fn memory_estimation(entries: usize) -> usize {
        size_of_instance::<Self>() + bytes_for(min_buffer_size(entries))
    }

    /// Number of entries.
    pub fn size(&self) -> usize {
        self.assigned
    }

    /// Bytes held by the key and value buffers.
    pub fn size_of(&self) -> usize {
        bytes_for(self.keys.len())
    }

    /// The value for `key`, or `default` if absent.
    pub fn get_or_default(&self, key: i32, default: f64) -> f64 {
        match self.probe(key) {
            Some(Probe::Found(slot)) => self.values[slot],
            _ => default,
        }
    }

    /// Whether `key` has an entry.
    pub fn contains_key(&self, key: i32) -> bool {
        matches!(self.probe(key), Some(Probe::Found(_)))
    }

    /// Stores `value` under `key`.
    pub fn put(&mut self, key: i32, value: f64) -> Result<()> {
        self.upsert(key, value, |_| value)
    }

    /// Adds `value` to the entry for `key`, inserting it if absent.
    pub fn add_to(&mut self, key: i32, value: f64) -> Result<()> {
        self.upsert(key, value, |current| current + value)
    }

    /// Frees the buffers, reports them to the tracker and returns the freed bytes.
    pub fn release(&mut self) -> usize {
        let freed = self.size_of();
        self.keys = Vec::new();
        self.values = Vec::new();
        self.assigned = 0;
        self.tracker.remove(freed);
        freed
    }

    /// Iterates over `(key, value)` pairs in table order.
    pub fn iter(&self) -> impl Iterator<Item = (i32, f64)> + '_ {
        self.keys
            .iter()
            .zip(self.values.iter())
            .filter(|(key, _)| **key != 0)
            .map(|(key, value)| (key.wrapping_sub(1), *value))
    }

    fn probe(&self, key: i32) -> Option<Probe> {
        if key == -1 || self.keys.is_empty() {
            return None;
        }
        let biased = key.wrapping_add(1);
        Some(find_slot(&self.keys, biased))
    }

    fn upsert<F>(&mut self, key: i32, initial: f64, merge: F) -> Result<()>
    where
        F: FnOnce(f64) -> f64,
    {
        assert!(!self.keys.is_empty(), "tracking map has been released");
        let probe = self
            .probe(key)
            .ok_or(HugeError::InvalidArgument("key -1 is reserved"))?;
        match probe {
            Probe::Found(slot) => self.values[slot] = merge(self.values[slot]),
            Probe::Vacant(slot) => {
                if self.assigned == self.resize_at {
                    self.grow(slot, key.wrapping_add(1), initial)?;
                } else {
                    self.keys[slot] = key.wrapping_add(1);
                    self.values[slot] = initial;
                }
                self.assigned += 1;
            }
            Probe::Full => unreachable!("table grows before it fills"),
        }
        Ok(())
    }

    fn grow(&mut self, slot: usize, pending_key: i32, pending_value: f64) -> Result<()> {
        let old_size = self.keys.len();
        let new_size = old_size * 2;
        let mut keys = try_zeroed::<i32>(new_size)?;
        let mut values = try_zeroed::<f64>(new_size)?;
        self.tracker.add(bytes_for(new_size));
        trace!(from = old_size, to = new_size, "huge.tracking_map.resize");

        self.keys[slot] = pending_key;
        self.values[slot] = pending_value;
        for (&key, &value) in self.keys.iter().zip(self.values.iter()) {
            if key == 0 {
                continue;
            }
            match find_slot(&keys, key) {
                Probe::Vacant(target) => {
                    keys[target] = key;
                    values[target] = value;
                }
                probe => unreachable!("rehash found {probe:?} for a unique key"),
            }
        }
        self.keys = keys;
        self.values = values;
        self.resize_at = expand_at_count(new_size);
        self.tracker.remove(bytes_for(old_size));
        Ok(())
    }
}

fn find_slot(keys: &[i32], biased: i32) -> Probe {
    let mask = keys.len() - 1;
    let start = (mix_phi(i64::from(biased)) as usize) & mask;
    for step in 0..keys.len() {
        let slot = (start + step) & mask;
        match keys[slot] {
            0 => return Probe::Vacant(slot),
            existing if existing == biased => return Probe::Found(slot),
            _ => {}
        }
    }
    Probe::Full
}

impl std::fmt::Debug for TrackingIntDoubleHashMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrackingIntDoubleHashMap")
            .field("size", &self.assigned)
            .field("capacity", &self.keys.len())
            .finish()
    }
}
