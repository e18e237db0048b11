//! Error type shared by every container in the crate.

use thiserror::Error;

/// Errors raised by huge containers.
///
/// Index violations and use-after-release are programming errors and panic instead;
/// this enum only covers conditions a caller can reasonably react to.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HugeError {
    /// The container holds more elements than fit in one contiguous allocation.
    #[error("container of {size} elements is too large for a single array (max {max})")]
    TooLarge {
        /// Number of elements in the container.
        size: usize,
        /// Largest size that can be materialized as one array.
        max: usize,
    },
    /// Two structures that must share a capacity do not.
    #[error("different capacity: {left} vs {right}")]
    CapacityMismatch {
        /// Capacity of the receiving structure.
        left: usize,
        /// Capacity of the argument.
        right: usize,
    },
    /// A requested size exceeds what the backing pages can hold.
    #[error("size {size} exceeds capacity {capacity}")]
    CapacityExceeded {
        /// Requested size.
        size: usize,
        /// Available capacity.
        capacity: usize,
    },
    /// The allocator refused a fallible allocation.
    #[error("failed to allocate {bytes} bytes")]
    AllocationFailed {
        /// Number of bytes requested.
        bytes: usize,
    },
    /// An argument was outside its accepted domain.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),
}

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, HugeError>;
