//! Huge arrays whose pages are allocated on first write.
//!
//! A [`HugeSparseLongArray`] is produced by one of two builders. [`Builder`] has a fixed
//! page directory sized at creation; [`GrowingBuilder`] extends its directory on demand.
//! Both may be written from many threads at once and both are consumed by `build`, so a
//! built array can never diverge from its builder.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;
use tracing::trace;

use super::array::try_alloc_page;
use super::page_util::{capacity_for, index_in_page, num_pages, page_index, PAGE_SIZE};
use crate::mem::{
    size_of_instance, size_of_page_directory, size_of_slice, AllocationTracker, MemoryRange,
};

const PAGE_BYTES: usize = size_of_slice::<i64>(PAGE_SIZE);

/// Default value of slots that were never written.
pub const NOT_FOUND: i64 = -1;

/// Read-only sparse array of 64-bit integers.
#[derive(Debug)]
pub struct HugeSparseLongArray {
    pages: Option<Box<[Option<Box<[i64]>>]>>,
    capacity: usize,
    default_value: i64,
    memory_used: usize,
}

impl HugeSparseLongArray {
    /// A builder with room for at least `size` indices.
    pub fn builder(
        size: usize,
        default_value: i64,
        tracker: Arc<dyn AllocationTracker>,
    ) -> Builder {
        Builder::new(size, default_value, tracker)
    }

    /// A builder whose capacity grows with the highest index written.
    pub fn growing_builder(
        default_value: i64,
        tracker: Arc<dyn AllocationTracker>,
    ) -> GrowingBuilder {
        GrowingBuilder::new(default_value, tracker)
    }

    /// Footprint of an array addressing `max_id` indices of which `max_entries` are set.
    ///
    /// The minimum assumes entries are packed densely into pages; the maximum assumes
    /// every entry lands on its own page.
    pub fn memory_estimation(max_id: usize, max_entries: usize) -> MemoryRange {
        assert!(
            max_entries <= max_id,
            "max_entries {max_entries} exceeds max_id {max_id}"
        );
        let best_case_pages = num_pages(max_entries);
        let worst_case_pages = num_pages(max_id.min(max_entries.saturating_mul(PAGE_SIZE)));
        let fixed = size_of_instance::<Self>() + size_of_page_directory::<i64>(num_pages(max_id));
        MemoryRange::of(fixed)
            + MemoryRange::of_range(best_case_pages * PAGE_BYTES, worst_case_pages * PAGE_BYTES)
    }

    /// Highest addressable index plus one.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Value returned for slots that were never written.
    pub fn default_value(&self) -> i64 {
        self.default_value
    }

    /// The value at `index`, or the default when its page was never written.
    ///
    /// Indices beyond the capacity read as the default.
    pub fn get(&self, index: usize) -> i64 {
        let Some(pages) = self.pages.as_ref() else {
            panic!("sparse array has been released");
        };
        match pages.get(page_index(index)) {
            Some(Some(page)) => page[index_in_page(index)],
            _ => self.default_value,
        }
    }

    /// Whether the slot at `index` holds something other than the default.
    pub fn contains(&self, index: usize) -> bool {
        self.get(index) != self.default_value
    }

    /// Accounted bytes; zero once released.
    pub fn size_of(&self) -> usize {
        if self.pages.is_some() {
            self.memory_used
        } else {
            0
        }
    }

    /// Drops every page and returns the accounted bytes; `0` on repeat calls.
    pub fn release(&mut self) -> usize {
        match self.pages.take() {
            Some(_) => self.memory_used,
            None => 0,
        }
    }

    fn from_pages(pages: Box<[Option<Box<[i64]>>]>, default_value: i64) -> Self {
        let allocated = pages.iter().filter(|p| p.is_some()).count();
        let memory_used = size_of_page_directory::<i64>(pages.len()) + allocated * PAGE_BYTES;
        Self {
            capacity: capacity_for(pages.len()),
            pages: Some(pages),
            default_value,
            memory_used,
        }
    }
}

fn new_page(default_value: i64, tracker: &dyn AllocationTracker, page: usize) -> Box<[AtomicI64]> {
    trace!(page, "paged.sparse.page_alloc");
    let allocated = try_alloc_page(PAGE_SIZE, || AtomicI64::new(default_value))
        .unwrap_or_else(|err| panic!("sparse page allocation: {err}"));
    tracker.add(PAGE_BYTES);
    allocated
}

fn set_if_absent_in(slot: &AtomicI64, default_value: i64, value: i64) -> bool {
    slot.compare_exchange(default_value, value, Ordering::AcqRel, Ordering::Acquire)
        .is_ok()
}

fn add_to_in(slot: &AtomicI64, delta: i64) {
    slot.fetch_add(delta, Ordering::AcqRel);
}

fn freeze(page: Box<[AtomicI64]>) -> Box<[i64]> {
    page.into_vec()
        .into_iter()
        .map(AtomicI64::into_inner)
        .collect()
}

/// Concurrent builder with a fixed page directory.
pub struct Builder {
    pages: Box<[OnceLock<Box<[AtomicI64]>>]>,
    capacity: usize,
    default_value: i64,
    tracker: Arc<dyn AllocationTracker>,
}

impl Builder {
    fn new(size: usize, default_value: i64, tracker: Arc<dyn AllocationTracker>) -> Self {
        let count = num_pages(size);
        tracker.add(size_of_page_directory::<i64>(count));
        Self {
            pages: (0..count).map(|_| OnceLock::new()).collect(),
            capacity: capacity_for(count),
            default_value,
            tracker,
        }
    }

    /// Number of addressable indices, rounded up to whole pages.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn slot(&self, index: usize) -> &AtomicI64 {
        assert!(
            index < self.capacity,
            "index {index} out of bounds for sparse builder of capacity {}",
            self.capacity
        );
        let page_idx = page_index(index);
        let page = self.pages[page_idx]
            .get_or_init(|| new_page(self.default_value, self.tracker.as_ref(), page_idx));
        &page[index_in_page(index)]
    }

    /// Stores `value` at `index`.
    pub fn set(&self, index: usize, value: i64) {
        self.slot(index).store(value, Ordering::Release);
    }

    /// Stores `value` iff the slot still holds the default; returns whether it did.
    pub fn set_if_absent(&self, index: usize, value: i64) -> bool {
        set_if_absent_in(self.slot(index), self.default_value, value)
    }

    /// Adds `delta` to the slot at `index`.
    pub fn add_to(&self, index: usize, delta: i64) {
        add_to_in(self.slot(index), delta);
    }

    /// Freezes the written pages into a read-only array.
    pub fn build(mut self) -> HugeSparseLongArray {
        let pages: Box<[Option<Box<[i64]>>]> = std::mem::take(&mut self.pages)
            .into_vec()
            .into_iter()
            .map(|cell| cell.into_inner().map(freeze))
            .collect();
        HugeSparseLongArray::from_pages(pages, self.default_value)
    }
}

impl Drop for Builder {
    fn drop(&mut self) {
        let allocated = self.pages.iter().filter(|cell| cell.get().is_some()).count();
        let bytes = size_of_page_directory::<i64>(self.pages.len()) + allocated * PAGE_BYTES;
        if bytes > 0 {
            self.tracker.remove(bytes);
        }
    }
}

/// Concurrent builder whose page directory grows to fit any index written.
pub struct GrowingBuilder {
    pages: RwLock<Vec<Option<Box<[AtomicI64]>>>>,
    default_value: i64,
    tracker: Arc<dyn AllocationTracker>,
}

impl GrowingBuilder {
    fn new(default_value: i64, tracker: Arc<dyn AllocationTracker>) -> Self {
        Self {
            pages: RwLock::new(Vec::new()),
            default_value,
            tracker,
        }
    }

    /// Current number of addressable indices.
    pub fn capacity(&self) -> usize {
        capacity_for(self.pages.read().len())
    }

    fn with_slot<R>(&self, index: usize, f: impl FnOnce(&AtomicI64) -> R) -> R {
        let page_idx = page_index(index);
        let offset = index_in_page(index);
        {
            let pages = self.pages.read();
            if let Some(Some(page)) = pages.get(page_idx) {
                return f(&page[offset]);
            }
        }
        let mut pages = self.pages.write();
        if page_idx >= pages.len() {
            let old_len = pages.len();
            let new_len = (page_idx + 1).max(old_len + (old_len >> 3));
            pages.resize_with(new_len, || None);
            trace!(from = old_len, to = new_len, "paged.sparse.grow");
            self.tracker.add(
                size_of_page_directory::<i64>(new_len) - size_of_page_directory::<i64>(old_len),
            );
        }
        let page = pages[page_idx]
            .get_or_insert_with(|| new_page(self.default_value, self.tracker.as_ref(), page_idx));
        f(&page[offset])
    }

    /// Stores `value` at `index`, growing the directory if needed.
    pub fn set(&self, index: usize, value: i64) {
        self.with_slot(index, |slot| slot.store(value, Ordering::Release));
    }

    /// Stores `value` iff the slot still holds the default; returns whether it did.
    pub fn set_if_absent(&self, index: usize, value: i64) -> bool {
        let default_value = self.default_value;
        self.with_slot(index, |slot| set_if_absent_in(slot, default_value, value))
    }

    /// Adds `delta` to the slot at `index`.
    pub fn add_to(&self, index: usize, delta: i64) {
        self.with_slot(index, |slot| add_to_in(slot, delta));
    }

    /// Freezes the written pages into a read-only array.
    pub fn build(mut self) -> HugeSparseLongArray {
        let pages: Box<[Option<Box<[i64]>>]> = std::mem::take(self.pages.get_mut())
            .into_iter()
            .map(|page| page.map(freeze))
            .collect();
        HugeSparseLongArray::from_pages(pages, self.default_value)
    }
}

impl Drop for GrowingBuilder {
    fn drop(&mut self) {
        let pages = self.pages.get_mut();
        let allocated = pages.iter().filter(|page| page.is_some()).count();
        let bytes = size_of_page_directory::<i64>(pages.len()) + allocated * PAGE_BYTES;
        if bytes > 0 {
            self.tracker.remove(bytes);
        }
    }
}
