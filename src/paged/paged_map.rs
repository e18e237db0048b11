use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tracing::trace;

use super::page_util::{index_in_page, num_pages, page_base, page_index, PAGE_SIZE};
use super::tracking_map::TrackingIntDoubleHashMap;
use crate::mem::{
    size_of_instance, size_of_slice, AllocationTracker, MemoryEstimation, MemoryEstimations,
    MemoryRange,
};
use crate::types::Result;

type Page = Arc<Mutex<TrackingIntDoubleHashMap>>;

/// Sparse `usize -> f64` map split into one small hash map per page of keys.
///
/// Pages are created on first write. Each page has its own lock, so writers to different
/// pages never contend; the directory lock is only taken exclusively to add pages.
pub struct PagedLongDoubleMap {
    pages: RwLock<Vec<Option<Page>>>,
    tracker: Arc<dyn AllocationTracker>,
}

impl PagedLongDoubleMap {
    /// An empty map with a directory sized for keys below `expected_keys`.
    pub fn new(expected_keys: usize, tracker: Arc<dyn AllocationTracker>) -> Self {
        let count = num_pages(expected_keys);
        tracker.add(size_of_slice::<Option<Page>>(count));
        Self {
            pages: RwLock::new(vec![None; count]),
            tracker,
        }
    }

    /// Estimation for a map holding one entry per node.
    pub fn memory_estimation() -> Arc<dyn MemoryEstimation> {
        MemoryEstimations::builder("paged long double map")
            .fixed("instance", size_of_instance::<Self>())
            .range("pages", |dims, _| {
                let pages = num_pages(dims.node_count);
                let directory = size_of_slice::<Option<Page>>(pages);
                let min_map = TrackingIntDoubleHashMap::memory_estimation(0);
                let max_map = TrackingIntDoubleHashMap::memory_estimation(
                    dims.node_count.min(PAGE_SIZE),
                );
                MemoryRange::of(directory)
                    + MemoryRange::of_range(min_map, max_map).times(pages)
            })
            .build()
    }

    /// The value for `key`, or `default` if absent.
    pub fn get_or_default(&self, key: usize, default: f64) -> f64 {
        match self.page(page_index(key)) {
            Some(page) => page.lock().get_or_default(in_page_key(key), default),
            None => default,
        }
    }

    /// Whether `key` has an entry.
    pub fn contains_key(&self, key: usize) -> bool {
        self.page(page_index(key))
            .is_some_and(|page| page.lock().contains_key(in_page_key(key)))
    }

    /// Stores `value` under `key`. Safe to call from many threads.
    pub fn put(&self, key: usize, value: f64) -> Result<()> {
        self.page_or_create(page_index(key))?
            .lock()
            .put(in_page_key(key), value)
    }

    /// Adds `value` to the entry for `key`, inserting it if absent. Safe to call from many
    /// threads.
    pub fn add_to(&self, key: usize, value: f64) -> Result<()> {
        self.page_or_create(page_index(key))?
            .lock()
            .add_to(in_page_key(key), value)
    }

    /// Number of entries across all pages.
    pub fn size(&self) -> usize {
        self.pages
            .read()
            .iter()
            .flatten()
            .map(|page| page.lock().size())
            .sum()
    }

    /// Bytes held by the directory and every page map.
    pub fn size_of(&self) -> usize {
        let pages = self.pages.read();
        size_of_slice::<Option<Page>>(pages.len())
            + pages
                .iter()
                .flatten()
                .map(|page| page.lock().size_of())
                .sum::<usize>()
    }

    /// Visits every entry in ascending page order. Entries within a page are unordered.
    ///
    /// Each page is copied out under its lock and `f` runs with no lock held, so `f` may
    /// write to the map. Pages created during the walk are not visited, and writes to a page
    /// after it was copied are not observed.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(usize, f64),
    {
        let pages: Vec<(usize, Page)> = self
            .pages
            .read()
            .iter()
            .enumerate()
            .filter_map(|(idx, page)| page.as_ref().map(|page| (idx, Arc::clone(page))))
            .collect();
        for (idx, page) in pages {
            let base = page_base(idx);
            let entries: Vec<(i32, f64)> = page.lock().iter().collect();
            for (key, value) in entries {
                f(base + key as usize, value);
            }
        }
    }

    /// Frees every page and the directory, reporting the bytes to the tracker.
    pub fn release(&mut self) -> usize {
        let pages = std::mem::take(self.pages.get_mut());
        let directory = size_of_slice::<Option<Page>>(pages.len());
        self.tracker.remove(directory);
        let maps: usize = pages
            .into_iter()
            .flatten()
            .map(|page| page.lock().release())
            .sum();
        directory + maps
    }

    fn page(&self, idx: usize) -> Option<Page> {
        self.pages.read().get(idx).cloned().flatten()
    }

    fn page_or_create(&self, idx: usize) -> Result<Page> {
        if let Some(page) = self.page(idx) {
            return Ok(page);
        }
        let mut pages = self.pages.write();
        if idx >= pages.len() {
            let old_len = pages.len();
            let new_len = idx + 1;
            pages.resize(new_len, None);
            self.tracker.add(
                size_of_slice::<Option<Page>>(new_len)
                    - size_of_slice::<Option<Page>>(old_len),
            );
            trace!(from = old_len, to = new_len, "huge.paged_map.grow");
        }
        if let Some(page) = &pages[idx] {
            return Ok(Arc::clone(page));
        }
        let page = Arc::new(Mutex::new(TrackingIntDoubleHashMap::new(Arc::clone(
            &self.tracker,
        ))?));
        pages[idx] = Some(Arc::clone(&page));
        Ok(page)
    }
}

fn in_page_key(key: usize) -> i32 {
    index_in_page(key) as i32
}

impl std::fmt::Debug for PagedLongDoubleMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedLongDoubleMap")
            .field("pages", &self.pages.read().len())
            .finish()
    }
}
