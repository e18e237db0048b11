use super::array::{storage_bytes, HugeArray};
use super::cursor::HugeCursor;
use crate::mem::{size_of_instance, AllocationTracker};
use crate::types::Result;

/// A huge array of optional values of `T`.
///
/// Slots start out empty (`None`). Only the slot machinery is accounted by the tracker;
/// memory owned by the stored values is the caller's concern.
pub struct HugeObjectArray<T> {
    inner: HugeArray<Option<T>>,
}

impl<T> HugeObjectArray<T> {
    /// Allocates `size` empty slots.
    pub fn new(size: usize, tracker: &dyn AllocationTracker) -> Self {
        Self {
            inner: HugeArray::new(size, tracker),
        }
    }

    /// Fallible variant of [`new`](Self::new).
    pub fn try_new(size: usize, tracker: &dyn AllocationTracker) -> Result<Self> {
        Ok(Self {
            inner: HugeArray::try_new(size, tracker)?,
        })
    }

    /// The value at `index`, if one has been stored.
    pub fn get(&self, index: usize) -> Option<&T> {
        self.inner.get_ref(index).as_ref()
    }

    /// The value at `index`, or `default` when the slot is empty.
    pub fn get_or_default<'a>(&'a self, index: usize, default: &'a T) -> &'a T {
        self.get(index).unwrap_or(default)
    }

    /// Mutable access to the value at `index`.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.inner.get_mut(index).as_mut()
    }

    /// Stores `value` at `index`, dropping any previous value.
    pub fn set(&mut self, index: usize, value: T) {
        self.inner.set(index, Some(value));
    }

    /// Removes and returns the value at `index`.
    pub fn take(&mut self, index: usize) -> Option<T> {
        self.inner.get_mut(index).take()
    }

    /// Returns the value at `index`, first storing `supplier()` if the slot is empty.
    ///
    /// The supplier runs at most once and only when the slot is empty. A supplier returning
    /// `None` leaves the slot empty and makes this call return `None`.
    pub fn put_if_absent<F>(&mut self, index: usize, supplier: F) -> Option<&T>
    where
        F: FnOnce() -> Option<T>,
    {
        let slot = self.inner.get_mut(index);
        if slot.is_none() {
            *slot = supplier();
        }
        slot.as_ref()
    }

    /// Sets every slot to `gen(index)`.
    pub fn set_all<F>(&mut self, mut gen: F)
    where
        F: FnMut(usize) -> T,
    {
        self.inner.set_all(|i| Some(gen(i)));
    }

    /// Number of slots.
    pub fn size(&self) -> usize {
        self.inner.size()
    }

    /// Bytes accounted for the slot storage.
    pub fn size_of(&self) -> usize {
        self.inner.size_of()
    }

    /// Drops every slot and returns the accounted bytes; `0` on repeat calls.
    pub fn release(&mut self) -> usize {
        self.inner.release()
    }

    /// Cursor over the raw slots.
    pub fn new_cursor(&self) -> HugeCursor<'_, Option<T>> {
        self.inner.new_cursor()
    }

    /// Iterates over every slot in index order.
    pub fn iter(&self) -> impl Iterator<Item = Option<&T>> + '_ {
        self.inner.iter().map(Option::as_ref)
    }

    /// Bytes for `size` slots each referencing a value of `value_bytes`.
    ///
    /// Unlike [`size_of`](Self::size_of) this includes the referenced values, so it is an
    /// upper bound for planning rather than what the tracker will see.
    pub fn memory_estimation(size: usize, value_bytes: usize) -> usize {
        size_of_instance::<Self>()
            .saturating_add(storage_bytes::<Option<T>>(size))
            .saturating_add(size.saturating_mul(value_bytes))
    }
}

impl<T: Clone> HugeObjectArray<T> {
    /// Stores a clone of `value` in every slot.
    pub fn fill(&mut self, value: T) {
        self.inner.fill(Some(value));
    }

    /// Copies the first `length` slots into `dest`, emptying the rest of `dest`.
    pub fn copy_to(&self, dest: &mut HugeObjectArray<T>, length: usize) {
        self.inner.copy_to(&mut dest.inner, length);
    }

    /// Clones every slot into a `Vec`.
    ///
    /// Fails with [`HugeError::TooLarge`](crate::HugeError::TooLarge) if the array exceeds
    /// the single-array limit.
    pub fn to_vec(&self) -> Result<Vec<Option<T>>> {
        self.inner.to_vec()
    }

    /// A resized copy holding the first `new_length` slots.
    pub fn copy_of(&self, new_length: usize, tracker: &dyn AllocationTracker) -> Self {
        Self {
            inner: self.inner.copy_of(new_length, tracker),
        }
    }
}

impl<T> std::fmt::Debug for HugeObjectArray<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HugeObjectArray")
            .field("size", &self.size())
            .finish()
    }
}
