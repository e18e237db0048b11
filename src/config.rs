//! Parallelism settings for bulk operations.
//!
//! Only construction-time page filling, merge sort, and bulk builders run on more than
//! one thread. Everything else executes on the caller's thread.
//!
//! # Example
//!
//! ```rust
//! use huge_arrays::ParallelOptions;
//!
//! let opts = ParallelOptions::with_concurrency(4);
//! assert_eq!(opts.concurrency, 4);
//! assert!(opts.validate().is_ok());
//! ```

use std::sync::OnceLock;

use rayon::ThreadPoolBuilder;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::types::{HugeError, Result};

static GLOBAL_POOL: OnceLock<()> = OnceLock::new();

/// Options controlling how parallel bulk work is split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelOptions {
    /// Number of workers a bulk operation may occupy.
    pub concurrency: usize,

    /// Minimum number of elements handed to one worker before splitting pays off.
    pub min_batch_size: usize,

    /// Optional size of Rayon's global pool; `None` keeps Rayon's default.
    pub thread_pool_size: Option<usize>,
}

impl Default for ParallelOptions {
    fn default() -> Self {
        let concurrency = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self {
            concurrency,
            min_batch_size: 10_000,
            thread_pool_size: None,
        }
    }
}

impl ParallelOptions {
    /// Options that keep all work on the calling thread.
    pub fn sequential() -> Self {
        Self {
            concurrency: 1,
            ..Self::default()
        }
    }

    /// Default options with an explicit worker count.
    pub fn with_concurrency(concurrency: usize) -> Self {
        Self {
            concurrency,
            ..Self::default()
        }
    }

    /// Rejects settings no bulk operation can run with.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(HugeError::InvalidArgument("concurrency must be at least 1"));
        }
        if self.thread_pool_size == Some(0) {
            return Err(HugeError::InvalidArgument(
                "thread pool size must be at least 1",
            ));
        }
        Ok(())
    }

    /// Whether work should be split across threads at all.
    pub fn is_parallel(&self) -> bool {
        self.concurrency > 1
    }

    /// Sizes Rayon's global pool from these options.
    ///
    /// Only the first call in a process has an effect; later calls and failures to build
    /// the pool are logged and otherwise ignored.
    pub fn configure_global_pool(&self) {
        let desired = self.thread_pool_size;
        let _ = GLOBAL_POOL.get_or_init(|| {
            let mut builder = ThreadPoolBuilder::new()
                .thread_name(|idx| format!("huge-worker-{idx}"));
            if let Some(num_threads) = desired {
                builder = builder.num_threads(num_threads);
            }
            if let Err(err) = builder.build_global() {
                warn!(error = %err, "config.global_pool.build_failed");
            }
        });
    }

    /// Minimum number of pages one worker should fill before splitting.
    pub(crate) fn min_pages_per_task(&self, page_size: usize) -> usize {
        (self.min_batch_size / page_size.max(1)).max(1)
    }
}
