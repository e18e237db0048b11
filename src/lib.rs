//! Paged containers for graph workloads that outgrow a single allocation.
//!
//! Arrays, atomic arrays, bit sets, hash maps, sparse arrays and union-find structures
//! address their elements with 64-bit indices and split their storage into fixed-size
//! pages once a single allocation would be too large. Every container reports its
//! footprint to an [`AllocationTracker`](mem::AllocationTracker) passed in at
//! construction.
//!
//! # Example
//!
//! ```rust
//! use huge_arrays::mem::{atomic_tracker, AllocationTracker};
//! use huge_arrays::paged::HugeLongArray;
//!
//! let tracker = atomic_tracker();
//! let mut array = HugeLongArray::new(10_000, tracker.as_ref());
//! array.set_all(|i| i as i64 * 2);
//! assert_eq!(array.get(4_321), 8_642);
//! assert_eq!(tracker.tracked(), array.size_of());
//! tracker.remove(array.release());
//! assert_eq!(tracker.tracked(), 0);
//! ```

#![warn(missing_docs)]

pub mod catalog;
pub mod config;
pub mod dss;
pub mod mem;
pub mod paged;
pub mod types;

pub use config::ParallelOptions;
pub use types::{HugeError, Result};
