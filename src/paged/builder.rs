use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use super::array::{try_alloc_pages, HugeArray};
use super::page_util::{index_in_page, num_pages, page_index, PAGE_SIZE};
use crate::mem::{size_of_slice, AllocationTracker};
use crate::types::{HugeError, Result};

/// Builder of `i64` huge arrays.
pub type HugeLongArrayBuilder = HugeArrayBuilder<i64>;

/// Pre-sized huge array that many threads append to concurrently.
///
/// Callers reserve disjoint index ranges with [`allocate`](Self::allocate) and write into
/// them through the returned [`BulkAdder`]. Reservation is a single atomic bump; pages are
/// locked individually while a batch is copied in, so adders on different pages never
/// contend. [`build`](Self::build) turns the allocated prefix into a [`HugeArray`].
pub struct HugeArrayBuilder<T> {
    pages: Box<[Mutex<Box<[T]>>]>,
    capacity: usize,
    allocation_index: AtomicUsize,
    memory_used: usize,
    tracker: Arc<dyn AllocationTracker>,
}

fn builder_bytes<T>(capacity: usize) -> usize {
    let pages = num_pages(capacity);
    size_of_slice::<Mutex<Box<[T]>>>(pages) + size_of_slice::<T>(pages * PAGE_SIZE)
}

impl<T> HugeArrayBuilder<T> {
    /// Bytes a builder with room for `capacity` elements will own.
    pub fn memory_estimation(capacity: usize) -> usize {
        builder_bytes::<T>(capacity)
    }
}

impl<T: Default> HugeArrayBuilder<T> {
    /// A builder with room for `capacity` elements, all initially `T::default()`.
    pub fn new(capacity: usize, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        let pages = try_alloc_pages::<T, _>(num_pages(capacity) * PAGE_SIZE, T::default)?;
        let memory_used = builder_bytes::<T>(capacity);
        tracker.add(memory_used);
        Ok(Self {
            pages: pages.into_iter().map(Mutex::new).collect(),
            capacity,
            allocation_index: AtomicUsize::new(0),
            memory_used,
            tracker,
        })
    }

    /// Reserves the next `batch` indices.
    ///
    /// Fails with [`HugeError::CapacityExceeded`] when fewer than `batch` indices remain; the
    /// builder is left unchanged in that case.
    pub fn allocate(&self, batch: usize) -> Result<BulkAdder<'_, T>> {
        let start = self
            .allocation_index
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |current| {
                current
                    .checked_add(batch)
                    .filter(|end| *end <= self.capacity)
            })
            .map_err(|current| HugeError::CapacityExceeded {
                size: current.saturating_add(batch),
                capacity: self.capacity,
            })?;
        Ok(BulkAdder {
            builder: self,
            start,
            end: start + batch,
            position: start,
        })
    }

    /// Number of indices reserved so far.
    pub fn allocated(&self) -> usize {
        self.allocation_index.load(Ordering::Acquire)
    }

    /// Total number of indices the builder can hand out.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Bytes held by the builder.
    pub fn size_of(&self) -> usize {
        self.memory_used
    }

    /// Converts the reserved prefix `[0, allocated())` into a huge array.
    ///
    /// Reserved indices that were never written hold `T::default()`. Bytes beyond the
    /// returned array's footprint are reported back to the tracker, and a builder dropped
    /// without building returns all of its bytes.
    pub fn build(mut self) -> Result<HugeArray<T>> {
        let size = self.allocated();
        let pages: Vec<Box<[T]>> = std::mem::take(&mut self.pages)
            .into_vec()
            .into_iter()
            .map(Mutex::into_inner)
            .collect();
        let array = HugeArray::from_pages(pages, size)?;
        self.tracker
            .remove(self.memory_used.saturating_sub(array.size_of()));
        self.memory_used = 0;
        Ok(array)
    }
}

impl<T> Drop for HugeArrayBuilder<T> {
    fn drop(&mut self) {
        if self.memory_used > 0 {
            self.tracker.remove(self.memory_used);
        }
    }
}

impl<T> std::fmt::Debug for HugeArrayBuilder<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HugeArrayBuilder")
            .field("capacity", &self.capacity)
            .field("allocated", &self.allocation_index.load(Ordering::Relaxed))
            .finish()
    }
}

/// Writer for one reserved index range of a [`HugeArrayBuilder`].
pub struct BulkAdder<'a, T> {
    builder: &'a HugeArrayBuilder<T>,
    start: usize,
    end: usize,
    position: usize,
}

impl<T> BulkAdder<'_, T> {
    /// First index of the reserved range.
    pub fn start(&self) -> usize {
        self.start
    }

    /// Number of indices reserved.
    pub fn len(&self) -> usize {
        self.end - self.start
    }

    /// Whether the reservation is empty.
    pub fn is_empty(&self) -> bool {
        self.end == self.start
    }

    /// Number of indices not yet written.
    pub fn remaining(&self) -> usize {
        self.end - self.position
    }

    /// Appends `values` after the ones already written.
    ///
    /// # Panics
    /// Panics if `values` does not fit into the remaining reservation.
    pub fn add(&mut self, values: &[T])
    where
        T: Clone,
    {
        assert!(
            values.len() <= self.remaining(),
            "batch of {} values exceeds the {} remaining reserved slots",
            values.len(),
            self.remaining()
        );
        let mut written = 0;
        while written < values.len() {
            let index = self.position + written;
            let offset = index_in_page(index);
            let n = (PAGE_SIZE - offset).min(values.len() - written);
            let mut page = self.builder.pages[page_index(index)].lock();
            page[offset..offset + n].clone_from_slice(&values[written..written + n]);
            written += n;
        }
        self.position += written;
    }
}

impl<T> std::fmt::Debug for BulkAdder<'_, T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BulkAdder")
            .field("start", &self.start)
            .field("end", &self.end)
            .field("position", &self.position)
            .finish()
    }
}
