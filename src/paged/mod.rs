//! Paged containers for data sets beyond a single allocation.
//!
//! Every container addresses its elements with a 64-bit index and transparently picks
//! between one contiguous allocation and a directory of fixed-size pages. The layout is
//! invisible to callers apart from performance.

/// Addressing arithmetic shared by every paged container.
///
/// Page size, masks, page counts and the per-type single-allocation threshold.
pub mod page_util;

/// Sparse `i64` arrays with lazily allocated pages.
///
/// Includes the fixed-capacity and the growing builder.
pub mod sparse;

/// Sparse-to-dense id mapping based on a rank bit set.
pub mod sparse_ids;

mod array;
mod atomic;
mod bitset;
mod builder;
mod cursor;
mod filler;
mod long_long_map;
mod mixer;
mod object_array;
mod paged_map;
mod pair_map;
mod slice;
mod sort;
mod tracking_map;
mod translator;

/// Plain huge arrays and their element-type aliases.
pub use array::{HugeArray, HugeByteArray, HugeDoubleArray, HugeIntArray, HugeLongArray};

/// Lock-free huge arrays.
pub use atomic::{HugeAtomicByteArray, HugeAtomicDoubleArray, HugeAtomicLongArray};
pub use bitset::HugeAtomicBitSet;

/// Concurrent append builders.
pub use builder::{BulkAdder, HugeArrayBuilder, HugeLongArrayBuilder};

pub use cursor::HugeCursor;
pub use filler::{Generator, Identity, PageFiller, Parallel, PassThrough};
pub use mixer::{mix_pair, mix_phi};
pub use object_array::HugeObjectArray;
pub use slice::HugeSliceMut;
pub use sort::{merge_sort, SEQUENTIAL_THRESHOLD};

/// Hash maps over paged storage.
pub use long_long_map::{Entries, HugeLongLongMap, LongLongEntry, RESERVED_KEY};
pub use paged_map::PagedLongDoubleMap;
pub use pair_map::{HugeLongLongDoubleMap, PairEntry};
pub use tracking_map::TrackingIntDoubleHashMap;

pub use sparse::HugeSparseLongArray;
pub use sparse_ids::SparseLongArray;

pub use translator::{
    AtomicLongArrayTranslator, DoubleArrayTranslator, LongArrayTranslator, PropertyTranslator,
};
