//! Callbacks that populate pages as a container is constructed.

use rayon::prelude::*;
use tracing::trace;

use super::page_util::{page_base, PAGE_SIZE};
use crate::config::ParallelOptions;

/// Populates freshly allocated pages.
///
/// `fill_page` receives the page and the global index of its first element, so generators
/// always observe global indices regardless of how the container is paged.
pub trait PageFiller<T>: Sync {
    /// Fills one page whose first element has global index `base`.
    fn fill_page(&self, page: &mut [T], base: usize);

    /// Whether this filler leaves pages untouched.
    fn is_pass_through(&self) -> bool {
        false
    }

    /// Fills every page of a paged container, in page order.
    fn fill_pages(&self, pages: &mut [Box<[T]>])
    where
        T: Send,
    {
        for (idx, page) in pages.iter_mut().enumerate() {
            self.fill_page(page, page_base(idx));
        }
    }
}

/// Leaves pages at their default value.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassThrough;

impl<T> PageFiller<T> for PassThrough {
    #[inline]
    fn fill_page(&self, _page: &mut [T], _base: usize) {}

    fn is_pass_through(&self) -> bool {
        true
    }

    fn fill_pages(&self, _pages: &mut [Box<[T]>])
    where
        T: Send,
    {
    }
}

/// Sets every element to `gen(global_index)`.
pub struct Generator<F>(pub F);

impl<T, F> PageFiller<T> for Generator<F>
where
    F: Fn(usize) -> T + Sync,
{
    fn fill_page(&self, page: &mut [T], base: usize) {
        for (offset, slot) in page.iter_mut().enumerate() {
            *slot = (self.0)(base + offset);
        }
    }
}

/// Sets every element to its own global index.
#[derive(Debug, Default, Clone, Copy)]
pub struct Identity;

impl PageFiller<i64> for Identity {
    fn fill_page(&self, page: &mut [i64], base: usize) {
        for (offset, slot) in page.iter_mut().enumerate() {
            *slot = (base + offset) as i64;
        }
    }
}

/// Runs another filler over pages on Rayon's pool.
pub struct Parallel<P> {
    inner: P,
    options: ParallelOptions,
}

impl<P> Parallel<P> {
    /// Wraps `inner` so that paged containers are filled with up to
    /// `options.concurrency` workers.
    pub fn new(inner: P, options: ParallelOptions) -> Self {
        Self { inner, options }
    }
}

impl<T, P> PageFiller<T> for Parallel<P>
where
    P: PageFiller<T>,
{
    fn fill_page(&self, page: &mut [T], base: usize) {
        self.inner.fill_page(page, base);
    }

    fn is_pass_through(&self) -> bool {
        self.inner.is_pass_through()
    }

    fn fill_pages(&self, pages: &mut [Box<[T]>])
    where
        T: Send,
    {
        if self.inner.is_pass_through() {
            return;
        }
        if !self.options.is_parallel() || pages.len() < 2 {
            self.inner.fill_pages(pages);
            return;
        }
        self.options.configure_global_pool();
        let min_len = self.options.min_pages_per_task(PAGE_SIZE);
        trace!(
            pages = pages.len(),
            concurrency = self.options.concurrency,
            min_len,
            "paged.filler.parallel_fill"
        );
        pages
            .par_iter_mut()
            .enumerate()
            .with_min_len(min_len)
            .for_each(|(idx, page)| self.inner.fill_page(page, page_base(idx)));
    }
}
