//! Lock-free huge arrays.
//!
//! Every slot is an atomic integer allocated directly in its final layout; the
//! single-versus-paged choice follows the same threshold as [`HugeArray`](super::HugeArray).
//! Doubles are stored as their raw bit patterns, so compare-and-set on
//! [`HugeAtomicDoubleArray`] compares bits rather than IEEE-754 values: `-0.0` and `0.0`
//! differ, and two NaNs with the same payload are equal.

use std::fmt;
use std::sync::atomic::{AtomicI64, AtomicI8, Ordering};

use tracing::trace;

use super::array::{paged_bytes, single_bytes, storage_bytes, try_alloc_page, try_alloc_pages};
use super::cursor::HugeCursor;
use super::filler::PageFiller;
use super::page_util::{index_in_page, max_single_len, num_pages, page_index, PAGE_SIZE};
use crate::mem::{size_of_instance, AllocationTracker};
use crate::types::Result;

#[cold]
#[inline(never)]
fn released() -> ! {
    panic!("atomic array has been released")
}

/// Atomic slots in either layout, shared by the typed arrays below.
struct AtomicPages<A> {
    pages: Option<Vec<Box<[A]>>>,
    single: bool,
    size: usize,
    memory_used: usize,
}

impl<A> AtomicPages<A> {
    fn allocate<F>(size: usize, force_paged: bool, init: F) -> Result<Self>
    where
        F: FnMut() -> A,
    {
        let single = !force_paged && size <= max_single_len::<A>();
        let (pages, memory_used) = if single {
            (vec![try_alloc_page(size, init)?], single_bytes::<A>(size))
        } else {
            trace!(size, pages = num_pages(size), "paged.atomic.alloc_paged");
            (try_alloc_pages(size, init)?, paged_bytes::<A>(size))
        };
        Ok(Self {
            pages: Some(pages),
            single,
            size,
            memory_used,
        })
    }

    fn size_of(&self) -> usize {
        if self.pages.is_some() {
            self.memory_used
        } else {
            0
        }
    }

    fn release(&mut self) -> usize {
        match self.pages.take() {
            Some(_) => self.memory_used,
            None => 0,
        }
    }

    #[inline]
    fn slot(&self, index: usize) -> &A {
        assert!(
            index < self.size,
            "index {index} out of bounds for atomic array of size {}",
            self.size
        );
        let pages = self.pages();
        if self.single {
            &pages[0][index]
        } else {
            &pages[page_index(index)][index_in_page(index)]
        }
    }

    fn pages(&self) -> &[Box<[A]>] {
        match &self.pages {
            Some(pages) => pages,
            None => released(),
        }
    }

    fn pages_mut(&mut self) -> &mut [Box<[A]>] {
        match &mut self.pages {
            Some(pages) => pages,
            None => released(),
        }
    }

    fn cursor(&self) -> HugeCursor<'_, A> {
        let pages = self.pages();
        if self.single {
            HugeCursor::single(&pages[0])
        } else {
            HugeCursor::paged(pages, self.size)
        }
    }
}

/// Runs `filler` over freshly allocated atomic pages, one [`PAGE_SIZE`] chunk at a time,
/// so the plain values never exist for more than one chunk.
fn fill_in_place<T, A, P, S>(pages: &mut [Box<[A]>], filler: &P, store: S)
where
    T: Clone + Default,
    P: PageFiller<T> + ?Sized,
    S: Fn(&mut A, T),
{
    if filler.is_pass_through() {
        return;
    }
    let mut buffer: Vec<T> = Vec::with_capacity(PAGE_SIZE);
    let mut base = 0;
    for page in pages.iter_mut() {
        for chunk in page.chunks_mut(PAGE_SIZE) {
            buffer.clear();
            buffer.resize(chunk.len(), T::default());
            filler.fill_page(&mut buffer, base);
            for (slot, value) in chunk.iter_mut().zip(buffer.drain(..)) {
                store(slot, value);
            }
            base += chunk.len();
        }
    }
}

/// A fixed-size array of 64-bit integers supporting concurrent atomic updates.
pub struct HugeAtomicLongArray {
    inner: AtomicPages<AtomicI64>,
}

impl HugeAtomicLongArray {
    /// Allocates `size` zeroed slots.
    ///
    /// # Panics
    /// Panics if the allocation fails; see [`try_new`](Self::try_new).
    pub fn new(size: usize, tracker: &dyn AllocationTracker) -> Self {
        Self::try_new(size, tracker).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Allocates `size` zeroed slots, failing instead of aborting when memory is exhausted.
    pub fn try_new(size: usize, tracker: &dyn AllocationTracker) -> Result<Self> {
        Self::allocate(size, false, tracker)
    }

    pub(crate) fn allocate(
        size: usize,
        force_paged: bool,
        tracker: &dyn AllocationTracker,
    ) -> Result<Self> {
        let inner = AtomicPages::allocate(size, force_paged, || AtomicI64::new(0))?;
        tracker.add(inner.memory_used);
        Ok(Self { inner })
    }

    /// Allocates `size` slots populated by `filler`.
    pub fn with_filler<P>(size: usize, filler: &P, tracker: &dyn AllocationTracker) -> Self
    where
        P: PageFiller<i64> + ?Sized,
    {
        let mut array = Self::new(size, tracker);
        array.fill_with(filler);
        array
    }

    fn fill_with<P>(&mut self, filler: &P)
    where
        P: PageFiller<i64> + ?Sized,
    {
        fill_in_place(self.inner.pages_mut(), filler, |slot: &mut AtomicI64, value: i64| {
            *slot.get_mut() = value;
        });
    }

    /// Bytes an array of `size` slots will own, including its inline header.
    pub const fn memory_estimation(size: usize) -> usize {
        size_of_instance::<Self>() + storage_bytes::<AtomicI64>(size)
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Whether the slots live in a single flat allocation.
    pub fn is_single_page(&self) -> bool {
        self.inner.single
    }

    /// Accounted bytes; zero once released.
    pub fn size_of(&self) -> usize {
        self.inner.size_of()
    }

    /// Drops the pages and returns the accounted bytes; `0` on repeat calls.
    pub fn release(&mut self) -> usize {
        self.inner.release()
    }

    /// Atomically reads the value at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> i64 {
        self.inner.slot(index).load(Ordering::Acquire)
    }

    /// Atomically stores `value` at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: i64) {
        self.inner.slot(index).store(value, Ordering::Release);
    }

    /// Adds `delta` and returns the previous value.
    pub fn get_and_add(&self, index: usize, delta: i64) -> i64 {
        self.inner.slot(index).fetch_add(delta, Ordering::AcqRel)
    }

    /// Stores `value` and returns the previous value.
    pub fn get_and_replace(&self, index: usize, value: i64) -> i64 {
        self.inner.slot(index).swap(value, Ordering::AcqRel)
    }

    /// Replaces the value with `update` iff it currently equals `expect`.
    pub fn compare_and_set(&self, index: usize, expect: i64, update: i64) -> bool {
        self.compare_and_exchange(index, expect, update) == expect
    }

    /// Like [`compare_and_set`](Self::compare_and_set) but returns the witnessed value,
    /// which equals `expect` exactly when the exchange happened.
    pub fn compare_and_exchange(&self, index: usize, expect: i64, update: i64) -> i64 {
        match self.inner.slot(index).compare_exchange(
            expect,
            update,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Applies `f` to the value at `index` until the result is stored without interference.
    ///
    /// `f` may run more than once and must not have side effects.
    pub fn update<F>(&self, index: usize, f: F)
    where
        F: Fn(i64) -> i64,
    {
        let slot = self.inner.slot(index);
        let mut current = slot.load(Ordering::Acquire);
        loop {
            let next = f(current);
            match slot.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(witness) => current = witness,
            }
        }
    }

    /// Stores `value` in every slot. Not atomic as a whole.
    pub fn set_all(&self, value: i64) {
        for page in self.inner.pages() {
            for slot in page.iter() {
                slot.store(value, Ordering::Release);
            }
        }
    }

    /// Copies the first `length` values into `dest` and zeroes the rest of `dest`.
    ///
    /// Each slot is copied atomically but the copy as a whole is not a snapshot.
    pub fn copy_to(&self, dest: &HugeAtomicLongArray, length: usize) {
        let length = length.min(self.size()).min(dest.size());
        for index in 0..length {
            dest.set(index, self.get(index));
        }
        for index in length..dest.size() {
            dest.set(index, 0);
        }
    }

    /// Cursor over the atomic slots.
    pub fn new_cursor(&self) -> HugeCursor<'_, AtomicI64> {
        self.inner.cursor()
    }

    /// Plain copy of the current values.
    pub fn to_vec(&self) -> Vec<i64> {
        self.inner
            .pages()
            .iter()
            .flat_map(|page| page.iter().map(|slot| slot.load(Ordering::Acquire)))
            .collect()
    }
}

impl fmt::Debug for HugeAtomicLongArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeAtomicLongArray")
            .field("size", &self.inner.size)
            .field("single", &self.inner.single)
            .field("released", &self.inner.pages.is_none())
            .finish()
    }
}

/// A fixed-size array of doubles supporting concurrent atomic updates.
///
/// Values are stored as `f64::to_bits` in a [`HugeAtomicLongArray`].
#[derive(Debug)]
pub struct HugeAtomicDoubleArray {
    bits: HugeAtomicLongArray,
}

#[inline(always)]
fn encode(value: f64) -> i64 {
    value.to_bits() as i64
}

#[inline(always)]
fn decode(bits: i64) -> f64 {
    f64::from_bits(bits as u64)
}

impl HugeAtomicDoubleArray {
    /// Allocates `size` slots holding `0.0`.
    pub fn new(size: usize, tracker: &dyn AllocationTracker) -> Self {
        Self {
            bits: HugeAtomicLongArray::new(size, tracker),
        }
    }

    /// Allocates `size` slots holding `0.0`, failing instead of aborting when memory is
    /// exhausted.
    pub fn try_new(size: usize, tracker: &dyn AllocationTracker) -> Result<Self> {
        Self::allocate(size, false, tracker)
    }

    pub(crate) fn allocate(
        size: usize,
        force_paged: bool,
        tracker: &dyn AllocationTracker,
    ) -> Result<Self> {
        Ok(Self {
            bits: HugeAtomicLongArray::allocate(size, force_paged, tracker)?,
        })
    }

    /// Allocates `size` slots populated by `filler`.
    pub fn with_filler<P>(size: usize, filler: &P, tracker: &dyn AllocationTracker) -> Self
    where
        P: PageFiller<f64> + ?Sized,
    {
        let mut array = Self::new(size, tracker);
        fill_in_place(
            array.bits.inner.pages_mut(),
            filler,
            |slot: &mut AtomicI64, value: f64| *slot.get_mut() = encode(value),
        );
        array
    }

    /// Bytes an array of `size` slots will own, including its inline header.
    pub const fn memory_estimation(size: usize) -> usize {
        HugeAtomicLongArray::memory_estimation(size)
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.bits.size()
    }

    /// Whether the slots live in a single flat allocation.
    pub fn is_single_page(&self) -> bool {
        self.bits.is_single_page()
    }

    /// Accounted bytes; zero once released.
    pub fn size_of(&self) -> usize {
        self.bits.size_of()
    }

    /// Drops the pages and returns the accounted bytes; `0` on repeat calls.
    pub fn release(&mut self) -> usize {
        self.bits.release()
    }

    /// Atomically reads the value at `index`.
    pub fn get(&self, index: usize) -> f64 {
        decode(self.bits.get(index))
    }

    /// Atomically stores `value` at `index`.
    pub fn set(&self, index: usize, value: f64) {
        self.bits.set(index, encode(value));
    }

    /// Replaces the value with `update` iff its bits equal those of `expect`.
    pub fn compare_and_set(&self, index: usize, expect: f64, update: f64) -> bool {
        self.bits.compare_and_set(index, encode(expect), encode(update))
    }

    /// Bitwise compare-and-exchange returning the witnessed value.
    pub fn compare_and_exchange(&self, index: usize, expect: f64, update: f64) -> f64 {
        decode(
            self.bits
                .compare_and_exchange(index, encode(expect), encode(update)),
        )
    }

    /// Adds `delta` and returns the previous value.
    pub fn get_and_add(&self, index: usize, delta: f64) -> f64 {
        let mut current = self.bits.get(index);
        loop {
            let next = encode(decode(current) + delta);
            let witness = self.bits.compare_and_exchange(index, current, next);
            if witness == current {
                return decode(current);
            }
            current = witness;
        }
    }

    /// Applies `f` under a compare-and-set retry loop; `f` may run more than once.
    pub fn update<F>(&self, index: usize, f: F)
    where
        F: Fn(f64) -> f64,
    {
        self.bits.update(index, |bits| encode(f(decode(bits))));
    }

    /// Stores `value` in every slot. Not atomic as a whole.
    pub fn set_all(&self, value: f64) {
        self.bits.set_all(encode(value));
    }

    /// Copies the first `length` values into `dest` and zeroes the rest of `dest`.
    pub fn copy_to(&self, dest: &HugeAtomicDoubleArray, length: usize) {
        self.bits.copy_to(&dest.bits, length);
    }

    /// Plain copy of the current values.
    pub fn to_vec(&self) -> Vec<f64> {
        self.bits.to_vec().into_iter().map(decode).collect()
    }
}

/// A fixed-size array of bytes supporting concurrent atomic updates.
///
/// Arithmetic wraps on overflow.
pub struct HugeAtomicByteArray {
    inner: AtomicPages<AtomicI8>,
}

impl HugeAtomicByteArray {
    /// Allocates `size` zeroed slots.
    ///
    /// # Panics
    /// Panics if the allocation fails; see [`try_new`](Self::try_new).
    pub fn new(size: usize, tracker: &dyn AllocationTracker) -> Self {
        Self::try_new(size, tracker).unwrap_or_else(|err| panic!("{err}"))
    }

    /// Allocates `size` zeroed slots, failing instead of aborting when memory is exhausted.
    pub fn try_new(size: usize, tracker: &dyn AllocationTracker) -> Result<Self> {
        Self::allocate(size, false, tracker)
    }

    pub(crate) fn allocate(
        size: usize,
        force_paged: bool,
        tracker: &dyn AllocationTracker,
    ) -> Result<Self> {
        let inner = AtomicPages::allocate(size, force_paged, || AtomicI8::new(0))?;
        tracker.add(inner.memory_used);
        Ok(Self { inner })
    }

    /// Allocates `size` slots populated by `filler`.
    pub fn with_filler<P>(size: usize, filler: &P, tracker: &dyn AllocationTracker) -> Self
    where
        P: PageFiller<i8> + ?Sized,
    {
        let mut array = Self::new(size, tracker);
        fill_in_place(array.inner.pages_mut(), filler, |slot: &mut AtomicI8, value: i8| {
            *slot.get_mut() = value;
        });
        array
    }

    /// Bytes an array of `size` slots will own, including its inline header.
    pub const fn memory_estimation(size: usize) -> usize {
        size_of_instance::<Self>() + storage_bytes::<AtomicI8>(size)
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.inner.size
    }

    /// Whether the slots live in a single flat allocation.
    pub fn is_single_page(&self) -> bool {
        self.inner.single
    }

    /// Accounted bytes; zero once released.
    pub fn size_of(&self) -> usize {
        self.inner.size_of()
    }

    /// Drops the pages and returns the accounted bytes; `0` on repeat calls.
    pub fn release(&mut self) -> usize {
        self.inner.release()
    }

    /// Atomically reads the value at `index`.
    #[inline]
    pub fn get(&self, index: usize) -> i8 {
        self.inner.slot(index).load(Ordering::Acquire)
    }

    /// Atomically stores `value` at `index`.
    #[inline]
    pub fn set(&self, index: usize, value: i8) {
        self.inner.slot(index).store(value, Ordering::Release);
    }

    /// Adds `delta`, wrapping on overflow, and returns the previous value.
    pub fn get_and_add(&self, index: usize, delta: i8) -> i8 {
        self.inner.slot(index).fetch_add(delta, Ordering::AcqRel)
    }

    /// Replaces the value with `update` iff it currently equals `expect`.
    pub fn compare_and_set(&self, index: usize, expect: i8, update: i8) -> bool {
        self.compare_and_exchange(index, expect, update) == expect
    }

    /// Compare-and-exchange returning the witnessed value.
    pub fn compare_and_exchange(&self, index: usize, expect: i8, update: i8) -> i8 {
        match self.inner.slot(index).compare_exchange(
            expect,
            update,
            Ordering::AcqRel,
            Ordering::Acquire,
        ) {
            Ok(previous) | Err(previous) => previous,
        }
    }

    /// Applies `f` under a compare-and-set retry loop; `f` may run more than once.
    pub fn update<F>(&self, index: usize, f: F)
    where
        F: Fn(i8) -> i8,
    {
        let slot = self.inner.slot(index);
        let mut current = slot.load(Ordering::Acquire);
        loop {
            let next = f(current);
            match slot.compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire) {
                Ok(_) => return,
                Err(witness) => current = witness,
            }
        }
    }

    /// Stores `value` in every slot. Not atomic as a whole.
    pub fn set_all(&self, value: i8) {
        for page in self.inner.pages() {
            for slot in page.iter() {
                slot.store(value, Ordering::Release);
            }
        }
    }

    /// Cursor over the atomic slots.
    pub fn new_cursor(&self) -> HugeCursor<'_, AtomicI8> {
        self.inner.cursor()
    }

    /// Plain copy of the current values.
    pub fn to_vec(&self) -> Vec<i8> {
        self.inner
            .pages()
            .iter()
            .flat_map(|page| page.iter().map(|slot| slot.load(Ordering::Acquire)))
            .collect()
    }
}

impl fmt::Debug for HugeAtomicByteArray {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HugeAtomicByteArray")
            .field("size", &self.inner.size)
            .field("single", &self.inner.single)
            .field("released", &self.inner.pages.is_none())
            .finish()
    }
}
