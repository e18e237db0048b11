//! Fixed-size arrays that transparently switch to paged storage when they grow large.
//!
//! [`HugeArray::new`] keeps up to [`max_single_len`] elements in one flat allocation and
//! splits anything larger into pages of [`PAGE_SIZE`] elements. Both layouts behave
//! identically; only allocation patterns differ.

use std::fmt;

use tracing::trace;

use super::cursor::HugeCursor;
use super::filler::PageFiller;
use super::page_util::{
    index_in_page, last_page_size, max_single_len, num_pages, page_base, page_index, PAGE_SIZE,
};
use super::slice::HugeSliceMut;
use crate::mem::{size_of_instance, size_of_page_directory, size_of_slice, AllocationTracker};
use crate::types::{HugeError, Result};

/// Array of 64-bit integers.
pub type HugeLongArray = HugeArray<i64>;
/// Array of 64-bit floats.
pub type HugeDoubleArray = HugeArray<f64>;
/// Array of 32-bit integers.
pub type HugeIntArray = HugeArray<i32>;
/// Array of bytes.
pub type HugeByteArray = HugeArray<i8>;

enum Storage<T> {
    Single(Box<[T]>),
    Paged(Vec<Box<[T]>>),
    Released,
}

/// A fixed-capacity, index-addressable array of `T`.
///
/// The size is decided at construction and never changes. Indexing outside `[0, size())`
/// panics, as does any access after [`release`](Self::release).
pub struct HugeArray<T> {
    storage: Storage<T>,
    size: usize,
    memory_used: usize,
}

#[cold]
#[inline(never)]
fn released() -> ! {
    panic!("array has been released")
}

pub(crate) fn try_alloc_page<T, F>(len: usize, init: F) -> Result<Box<[T]>>
where
    F: FnMut() -> T,
{
    let mut page = Vec::new();
    page.try_reserve_exact(len)
        .map_err(|_| HugeError::AllocationFailed {
            bytes: size_of_slice::<T>(len),
        })?;
    page.resize_with(len, init);
    Ok(page.into_boxed_slice())
}

pub(crate) fn try_alloc_pages<T, F>(size: usize, mut init: F) -> Result<Vec<Box<[T]>>>
where
    F: FnMut() -> T,
{
    let count = num_pages(size);
    let mut pages = Vec::new();
    pages
        .try_reserve_exact(count)
        .map_err(|_| HugeError::AllocationFailed {
            bytes: size_of_page_directory::<T>(count),
        })?;
    for page in 0..count {
        let len = if page + 1 == count {
            last_page_size(size)
        } else {
            PAGE_SIZE
        };
        pages.push(try_alloc_page(len, &mut init)?);
    }
    Ok(pages)
}

pub(crate) const fn single_bytes<T>(size: usize) -> usize {
    size_of_slice::<T>(size)
}

pub(crate) const fn paged_bytes<T>(size: usize) -> usize {
    size_of_page_directory::<T>(num_pages(size)) + size_of_slice::<T>(size)
}

/// Bytes of backing storage for `size` elements under the layout the factories pick.
pub(crate) const fn storage_bytes<T>(size: usize) -> usize {
    if size <= max_single_len::<T>() {
        single_bytes::<T>(size)
    } else {
        paged_bytes::<T>(size)
    }
}

impl<T> HugeArray<T> {
    /// Number of elements.
    #[inline]
    pub fn size(&self) -> usize {
        self.size
    }

    /// Whether the array holds no elements.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    /// Bytes owned by the backing storage; zero once released.
    pub fn size_of(&self) -> usize {
        match self.storage {
            Storage::Released => 0,
            _ => self.memory_used,
        }
    }

    /// Whether elements live in a single flat allocation.
    pub fn is_single_page(&self) -> bool {
        matches!(self.storage, Storage::Single(_))
    }

    /// Bytes an array of `size` elements will own, including its inline header.
    pub const fn memory_estimation(size: usize) -> usize {
        size_of_instance::<HugeArray<T>>() + storage_bytes::<T>(size)
    }

    /// Drops the backing storage and returns the bytes that were accounted for it.
    ///
    /// The caller is responsible for passing the result to its tracker's `remove`.
    /// Releasing twice returns `0`.
    pub fn release(&mut self) -> usize {
        match std::mem::replace(&mut self.storage, Storage::Released) {
            Storage::Released => 0,
            _ => self.memory_used,
        }
    }

    /// Reference to the element at `index`.
    ///
    /// # Panics
    /// Panics if `index >= size()` or the array has been released.
    #[inline]
    pub fn get_ref(&self, index: usize) -> &T {
        self.check_index(index);
        match &self.storage {
            Storage::Single(page) => &page[index],
            Storage::Paged(pages) => &pages[page_index(index)][index_in_page(index)],
            Storage::Released => released(),
        }
    }

    /// Mutable reference to the element at `index`.
    ///
    /// # Panics
    /// Panics if `index >= size()` or the array has been released.
    #[inline]
    pub fn get_mut(&mut self, index: usize) -> &mut T {
        self.check_index(index);
        match &mut self.storage {
            Storage::Single(page) => &mut page[index],
            Storage::Paged(pages) => &mut pages[page_index(index)][index_in_page(index)],
            Storage::Released => released(),
        }
    }

    /// Stores `value` at `index`.
    ///
    /// # Panics
    /// Panics if `index >= size()` or the array has been released.
    #[inline]
    pub fn set(&mut self, index: usize, value: T) {
        *self.get_mut(index) = value;
    }

    /// Sets every element to `gen(index)`, visiting indices in ascending order.
    pub fn set_all<F>(&mut self, mut gen: F)
    where
        F: FnMut(usize) -> T,
    {
        for (page_idx, page) in self.pages_mut().iter_mut().enumerate() {
            let base = page_base(page_idx);
            for (offset, slot) in page.iter_mut().enumerate() {
                *slot = gen(base + offset);
            }
        }
    }

    /// A cursor over this array; call `set_full_range` or `set_range` before stepping.
    pub fn new_cursor(&self) -> HugeCursor<'_, T> {
        match &self.storage {
            Storage::Single(page) => HugeCursor::single(page),
            Storage::Paged(pages) => HugeCursor::paged(pages, self.size),
            Storage::Released => released(),
        }
    }

    /// A cursor already positioned over the whole array.
    pub fn full_cursor(&self) -> HugeCursor<'_, T> {
        let mut cursor = self.new_cursor();
        cursor.set_full_range();
        cursor
    }

    /// A splittable mutable view over all elements.
    pub fn as_slice_mut(&mut self) -> HugeSliceMut<'_, T> {
        HugeSliceMut::from_chunks(
            self.pages_mut()
                .iter_mut()
                .map(|page| &mut page[..])
                .collect(),
        )
    }

    /// Iterates over all elements in index order.
    pub fn iter(&self) -> impl Iterator<Item = &T> + '_ {
        self.pages().iter().flat_map(|page| page.iter())
    }

    /// Takes the backing pages, reporting whether they used the single-page layout.
    pub(crate) fn into_parts(self) -> (Vec<Box<[T]>>, bool) {
        match self.storage {
            Storage::Single(page) => (vec![page], true),
            Storage::Paged(pages) => (pages, false),
            Storage::Released => released(),
        }
    }

    pub(crate) fn pages(&self) -> &[Box<[T]>] {
        match &self.storage {
            Storage::Single(page) => std::slice::from_ref(page),
            Storage::Paged(pages) => pages,
            Storage::Released => released(),
        }
    }

    pub(crate) fn pages_mut(&mut self) -> &mut [Box<[T]>] {
        match &mut self.storage {
            Storage::Single(page) => std::slice::from_mut(page),
            Storage::Paged(pages) => pages,
            Storage::Released => released(),
        }
    }

    #[inline(always)]
    fn check_index(&self, index: usize) {
        assert!(
            index < self.size,
            "index {index} out of bounds for array of size {}",
            self.size
        );
    }

    fn locate(&self, index: usize) -> (usize, usize) {
        match self.storage {
            Storage::Single(_) => (0, index),
            Storage::Paged(_) => (page_index(index), index_in_page(index)),
            Storage::Released => released(),
        }
    }
}

impl<T: Default> HugeArray<T> {
    /// Allocates an array of `size` default elements and reports it to `tracker`.
    ///
    /// # Panics
    /// Panics if the allocation fails; see [`try_new`](Self::try_new).
    pub fn new(size: usize, tracker: &dyn AllocationTracker) -> Self {
        Self::try_new(size, tracker).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Allocates an array of `size` default elements, failing instead of aborting when
    /// memory is exhausted. Nothing is reported to `tracker` on failure.
    pub fn try_new(size: usize, tracker: &dyn AllocationTracker) -> Result<Self> {
        let array = if size <= max_single_len::<T>() {
            Self::try_single(size)?
        } else {
            Self::try_paged(size)?
        };
        tracker.add(array.memory_used);
        Ok(array)
    }

    pub(crate) fn try_single(size: usize) -> Result<Self> {
        Ok(Self {
            storage: Storage::Single(try_alloc_page(size, T::default)?),
            size,
            memory_used: single_bytes::<T>(size),
        })
    }

    pub(crate) fn try_paged(size: usize) -> Result<Self> {
        trace!(size, pages = num_pages(size), "paged.array.alloc_paged");
        Ok(Self {
            storage: Storage::Paged(try_alloc_pages(size, T::default)?),
            size,
            memory_used: paged_bytes::<T>(size),
        })
    }

    /// Wraps pages produced elsewhere, e.g. by a builder.
    ///
    /// Every page but the last must hold exactly [`PAGE_SIZE`] elements. Pages beyond what
    /// `size` needs are dropped and the last needed page is trimmed to the remainder. A
    /// result that fits in one page uses the single layout.
    pub fn from_pages(mut pages: Vec<Box<[T]>>, size: usize) -> Result<Self> {
        let needed = num_pages(size);
        let capacity: usize = pages.iter().take(needed).map(|p| p.len()).sum();
        if pages.len() < needed || capacity < size {
            return Err(HugeError::CapacityExceeded {
                size,
                capacity: pages.iter().map(|p| p.len()).sum(),
            });
        }
        if pages
            .iter()
            .take(needed.saturating_sub(1))
            .any(|p| p.len() != PAGE_SIZE)
        {
            return Err(HugeError::InvalidArgument(
                "every page but the last must be full",
            ));
        }
        pages.truncate(needed);
        if let Some(last) = pages.last_mut() {
            let len = last_page_size(size);
            if last.len() != len {
                let mut trimmed = std::mem::take(last).into_vec();
                trimmed.truncate(len);
                *last = trimmed.into_boxed_slice();
            }
        }
        if needed <= 1 {
            return Ok(Self {
                storage: Storage::Single(pages.pop().unwrap_or_default()),
                size,
                memory_used: single_bytes::<T>(size),
            });
        }
        Ok(Self {
            storage: Storage::Paged(pages),
            size,
            memory_used: paged_bytes::<T>(size),
        })
    }
}

impl<T: Clone + Default> HugeArray<T> {
    /// Builds an array holding a copy of `values`.
    pub fn of(values: &[T]) -> Self {
        Self {
            storage: Storage::Single(values.to_vec().into_boxed_slice()),
            size: values.len(),
            memory_used: single_bytes::<T>(values.len()),
        }
    }

    /// Sets every element to `value`.
    pub fn fill(&mut self, value: T) {
        for page in self.pages_mut() {
            page.fill(value.clone());
        }
    }

    /// Copies the first `length` elements into `dest` and resets the rest of `dest`.
    ///
    /// `length` is clamped to both sizes. Every slot of `dest` at or beyond the copied
    /// length is overwritten with the default value.
    pub fn copy_to(&self, dest: &mut HugeArray<T>, length: usize) {
        let length = length.min(self.size).min(dest.size);
        let mut written = 0;
        if length > 0 {
            let mut cursor = self.new_cursor();
            cursor.set_range(0, length);
            while cursor.next() {
                let chunk = cursor.slice();
                dest.write_slice(written, chunk);
                written += chunk.len();
            }
        }
        dest.fill_range(written, dest.size, T::default());
    }

    /// A new array of `new_length` elements holding a prefix copy of this one.
    pub fn copy_of(&self, new_length: usize, tracker: &dyn AllocationTracker) -> HugeArray<T> {
        let mut copy = HugeArray::new(new_length, tracker);
        self.copy_to(&mut copy, new_length);
        copy
    }

    /// Copies all elements into a `Vec`.
    ///
    /// Fails with [`HugeError::TooLarge`] if the array exceeds the single-array limit.
    pub fn to_vec(&self) -> Result<Vec<T>> {
        let max = max_single_len::<T>();
        if self.size > max {
            return Err(HugeError::TooLarge {
                size: self.size,
                max,
            });
        }
        Ok(self.iter().cloned().collect())
    }

    fn write_slice(&mut self, start: usize, src: &[T]) {
        let mut written = 0;
        while written < src.len() {
            let (page, offset) = self.locate(start + written);
            let target = &mut self.pages_mut()[page];
            let n = (target.len() - offset).min(src.len() - written);
            target[offset..offset + n].clone_from_slice(&src[written..written + n]);
            written += n;
        }
    }

    fn fill_range(&mut self, start: usize, end: usize, value: T) {
        let mut index = start;
        while index < end {
            let (page, offset) = self.locate(index);
            let target = &mut self.pages_mut()[page];
            let n = (target.len() - offset).min(end - index);
            target[offset..offset + n].fill(value.clone());
            index += n;
        }
    }
}

impl<T: Default + Send> HugeArray<T> {
    /// Allocates an array and populates every page with `filler`.
    pub fn with_filler<P>(size: usize, filler: &P, tracker: &dyn AllocationTracker) -> Self
    where
        P: PageFiller<T> + ?Sized,
    {
        let mut array = Self::new(size, tracker);
        if !filler.is_pass_through() {
            match &mut array.storage {
                Storage::Single(page) => filler.fill_page(page, 0),
                Storage::Paged(pages) => filler.fill_pages(pages),
                Storage::Released => released(),
            }
        }
        array
    }
}

impl<T: Copy> HugeArray<T> {
    /// The element at `index`.
    ///
    /// # Panics
    /// Panics if `index >= size()` or the array has been released.
    #[inline]
    pub fn get(&self, index: usize) -> T {
        *self.get_ref(index)
    }
}

impl HugeArray<i64> {
    /// Bitwise-ors `value` into the element at `index`.
    pub fn or(&mut self, index: usize, value: i64) {
        *self.get_mut(index) |= value;
    }

    /// Bitwise-ands `value` into the element at `index`, returning the new value.
    pub fn and(&mut self, index: usize, value: i64) -> i64 {
        let slot = self.get_mut(index);
        *slot &= value;
        *slot
    }

    /// Adds `delta` to the element at `index`, wrapping on overflow.
    pub fn add_to(&mut self, index: usize, delta: i64) {
        let slot = self.get_mut(index);
        *slot = slot.wrapping_add(delta);
    }

    /// Index of the last element `<= value` in an ascending array.
    ///
    /// Returns `None` if `value` is smaller than every element or the array is empty.
    pub fn binary_search(&self, value: i64) -> Option<usize> {
        let mut low = 0usize;
        let mut high = self.size;
        while low < high {
            let mid = low + (high - low) / 2;
            if self.get(mid) <= value {
                low = mid + 1;
            } else {
                high = mid;
            }
        }
        low.checked_sub(1)
    }
}

impl HugeArray<f64> {
    /// Adds `delta` to the element at `index`.
    pub fn add_to(&mut self, index: usize, delta: f64) {
        *self.get_mut(index) += delta;
    }
}

impl<T> fmt::Debug for HugeArray<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let layout = match self.storage {
            Storage::Single(_) => "single",
            Storage::Paged(_) => "paged",
            Storage::Released => "released",
        };
        f.debug_struct("HugeArray")
            .field("size", &self.size)
            .field("layout", &layout)
            .field("memory_used", &self.memory_used)
            .finish()
    }
}
