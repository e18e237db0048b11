//! Memory accounting: allocation tracking, byte arithmetic, and estimations.

mod estimation;
mod tracker;
mod usage;

pub use estimation::{
    GraphDimensions, MemoryEstimation, MemoryEstimations, MemoryRange, MemoryTree,
};
pub use tracker::{atomic_tracker, empty_tracker, AllocationTracker, AtomicTracker, EmptyTracker};
pub use usage::{
    human_readable, size_of_bitset, size_of_instance, size_of_page_directory, size_of_slice,
};
