//! Byte-size arithmetic for the backing storage of huge containers.
//!
//! Sizes count the heap memory the containers own: element storage plus the page
//! directory for paged layouts. Inline struct fields are covered by [`size_of_instance`].

use std::mem::size_of;

const UNITS: [&str; 9] = [
    " Bytes", " KiB", " MiB", " GiB", " TiB", " PiB", " EiB", " ZiB", " YiB",
];

/// Bytes occupied by `len` contiguous elements of `T`.
#[inline]
pub const fn size_of_slice<T>(len: usize) -> usize {
    len.saturating_mul(size_of::<T>())
}

/// Bytes occupied by the inline representation of `T`.
#[inline]
pub const fn size_of_instance<T>() -> usize {
    size_of::<T>()
}

/// Bytes occupied by a page directory holding `num_pages` boxed pages of `T`.
#[inline]
pub const fn size_of_page_directory<T>(num_pages: usize) -> usize {
    size_of_slice::<Box<[T]>>(num_pages)
}

/// Bytes occupied by a bit set of `bits` bits stored as 64-bit words.
#[inline]
pub const fn size_of_bitset(bits: usize) -> usize {
    size_of_slice::<u64>(bits.div_ceil(64))
}

/// Formats `bytes` using binary units.
///
/// A value stays in the smaller unit until it exceeds 16 thousand of it, so that
/// `1150 KiB` and `1250 KiB` remain distinguishable instead of both rounding to `1 MiB`.
pub fn human_readable(bytes: usize) -> String {
    let mut value = bytes as u128;
    for unit in UNITS {
        if value >> 14 == 0 {
            return format!("{value}{unit}");
        }
        value >>= 10;
    }
    format!("{value}{}", UNITS[UNITS.len() - 1])
}
