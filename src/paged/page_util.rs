//! Addressing arithmetic for paged containers.
//!
//! A global index `i` lives on page `i >> PAGE_SHIFT` at offset `i & PAGE_MASK`. Every page
//! holds [`PAGE_SIZE`] elements except the last, which holds the remainder.

use std::mem::size_of;

/// log2 of the number of elements per page.
pub const PAGE_SHIFT: u32 = 12;
/// Number of elements per page.
pub const PAGE_SIZE: usize = 1 << PAGE_SHIFT;
/// Mask extracting the in-page offset from a global index.
pub const PAGE_MASK: usize = PAGE_SIZE - 1;

/// Largest allocation, in bytes, a container keeps as one flat array.
pub const MAX_SINGLE_ARRAY_BYTES: usize = 1 << 31;

/// Largest element count of `T` stored with the single-page strategy.
pub const fn max_single_len<T>() -> usize {
    let width = size_of::<T>();
    if width == 0 {
        usize::MAX
    } else {
        MAX_SINGLE_ARRAY_BYTES / width
    }
}

/// Page holding global index `index`.
#[inline(always)]
pub const fn page_index(index: usize) -> usize {
    index >> PAGE_SHIFT
}

/// Offset of global index `index` within its page.
#[inline(always)]
pub const fn index_in_page(index: usize) -> usize {
    index & PAGE_MASK
}

/// Global index of the first element on `page`.
#[inline(always)]
pub const fn page_base(page: usize) -> usize {
    page << PAGE_SHIFT
}

/// Number of pages needed for `capacity` elements.
#[inline]
pub const fn num_pages(capacity: usize) -> usize {
    num_pages_for(capacity, PAGE_SHIFT)
}

/// Number of pages of `1 << shift` elements needed for `capacity` elements.
#[inline]
pub const fn num_pages_for(capacity: usize, shift: u32) -> usize {
    capacity.div_ceil(1 << shift)
}

/// Number of elements on the last page of a container with `capacity` elements.
///
/// A capacity that divides evenly into pages yields a full last page, never zero.
#[inline]
pub const fn last_page_size(capacity: usize) -> usize {
    last_page_size_for(capacity, PAGE_SHIFT)
}

/// [`last_page_size`] for pages of `1 << shift` elements.
#[inline]
pub const fn last_page_size_for(capacity: usize, shift: u32) -> usize {
    if capacity == 0 {
        0
    } else {
        1 + ((capacity - 1) & ((1 << shift) - 1))
    }
}

/// Number of elements `num_pages` full pages can hold.
#[inline]
pub const fn capacity_for(num_pages: usize) -> usize {
    num_pages << PAGE_SHIFT
}

/// Length of page `page` in a container with `capacity` elements.
#[inline]
pub const fn page_len(page: usize, capacity: usize) -> usize {
    let pages = num_pages(capacity);
    if page + 1 < pages {
        PAGE_SIZE
    } else if page + 1 == pages {
        last_page_size(capacity)
    } else {
        0
    }
}
