use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tracing::warn;

use super::usage::human_readable;

/// Sink for allocation notifications from huge containers.
///
/// Containers call [`add`](AllocationTracker::add) for every byte range they allocate and
/// owners call [`remove`](AllocationTracker::remove) with the value returned from a
/// container's `release()`. Implementations must be safe to share across threads since
/// one tracker is commonly handed to many containers at once.
pub trait AllocationTracker: Send + Sync {
    /// Records `bytes` newly allocated bytes.
    fn add(&self, bytes: usize);

    /// Records `bytes` released bytes.
    fn remove(&self, bytes: usize);

    /// Returns the number of bytes currently tracked.
    fn tracked(&self) -> usize;

    /// Whether notifications are recorded at all.
    fn is_tracking(&self) -> bool {
        true
    }
}

/// A tracker that discards every notification.
///
/// Used by construction paths that opt out of accounting; all methods compile to nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyTracker;

impl AllocationTracker for EmptyTracker {
    #[inline]
    fn add(&self, _bytes: usize) {}

    #[inline]
    fn remove(&self, _bytes: usize) {}

    #[inline]
    fn tracked(&self) -> usize {
        0
    }

    #[inline]
    fn is_tracking(&self) -> bool {
        false
    }
}

/// A lock-free counting tracker.
#[derive(Debug, Default)]
pub struct AtomicTracker {
    bytes: AtomicUsize,
}

impl AtomicTracker {
    /// Creates a tracker starting at zero bytes.
    pub fn new() -> Self {
        Self::default()
    }

    /// Tracked bytes formatted with binary units.
    pub fn human_readable(&self) -> String {
        human_readable(self.tracked())
    }
}

impl AllocationTracker for AtomicTracker {
    fn add(&self, bytes: usize) {
        self.bytes.fetch_add(bytes, Ordering::Relaxed);
    }

    fn remove(&self, bytes: usize) {
        let result = self
            .bytes
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |current| {
                current.checked_sub(bytes)
            });
        if let Err(current) = result {
            warn!(
                tracked = current,
                removed = bytes,
                "mem.tracker.remove_underflow"
            );
            self.bytes.store(0, Ordering::Relaxed);
        }
    }

    fn tracked(&self) -> usize {
        self.bytes.load(Ordering::Relaxed)
    }
}

/// Returns a shared non-tracking tracker.
pub fn empty_tracker() -> Arc<dyn AllocationTracker> {
    Arc::new(EmptyTracker)
}

/// Returns a shared counting tracker.
pub fn atomic_tracker() -> Arc<AtomicTracker> {
    Arc::new(AtomicTracker::new())
}
