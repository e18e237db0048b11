//! Dense renumbering of sparse 64-bit ids.
//!
//! Ids are recorded in a bitmap of 64-bit words grouped into blocks of 64 words. A prefix
//! count per block lets [`SparseLongArray::to_mapped_node_id`] rank an id with at most 64
//! popcounts, and [`SparseLongArray::to_original_node_id`] select it back.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::mem::{size_of_slice, MemoryEstimation, MemoryEstimations, MemoryRange};

/// Words per block.
pub const BLOCK_SIZE: usize = 64;
const BLOCK_SHIFT: u32 = BLOCK_SIZE.trailing_zeros();
const WORD_BITS: usize = u64::BITS as usize;
const WORD_SHIFT: u32 = 6;
const WORD_MASK: u64 = 63;

/// Ids covered by one block.
pub const SUPER_BLOCK_SIZE: usize = BLOCK_SIZE * WORD_BITS;

/// Rounds `batch_size` up to a multiple of [`SUPER_BLOCK_SIZE`], so that batches handed to
/// different threads never share a block.
pub fn to_valid_batch_size(batch_size: usize) -> usize {
    batch_size.div_ceil(SUPER_BLOCK_SIZE) * SUPER_BLOCK_SIZE
}

/// Immutable bidirectional mapping between sparse original ids and dense mapped ids.
///
/// Mapped ids are assigned in ascending order of original id, starting at zero.
#[derive(Debug, Clone)]
pub struct SparseLongArray {
    id_count: u64,
    highest_original_id: u64,
    words: Box<[u64]>,
    block_offsets: Box<[u64]>,
}

impl SparseLongArray {
    /// A concurrent builder for ids in `[0, capacity)`.
    pub fn builder(capacity: u64) -> Builder {
        Builder::new(capacity)
    }

    /// Estimation keyed on the highest original id of the graph.
    pub fn memory_estimation() -> Arc<dyn MemoryEstimation> {
        MemoryEstimations::builder("sparse long array")
            .range("id array", |dims, _| {
                MemoryRange::of(size_of_slice::<u64>(word_count(
                    dims.highest_original_id() as u64 + 1,
                )))
            })
            .range("block offsets", |dims, _| {
                let words = word_count(dims.highest_original_id() as u64 + 1);
                MemoryRange::of(size_of_slice::<u64>((words >> BLOCK_SHIFT) + 1))
            })
            .build()
    }

    /// Number of ids present.
    pub fn id_count(&self) -> u64 {
        self.id_count
    }

    /// Largest original id the mapping can hold.
    pub fn highest_original_id(&self) -> u64 {
        self.highest_original_id
    }

    /// Whether `original_id` was recorded.
    pub fn contains(&self, original_id: u64) -> bool {
        let (word, mask) = locate(original_id);
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Dense id of `original_id`, or `None` if it was never recorded.
    pub fn to_mapped_node_id(&self, original_id: u64) -> Option<u64> {
        let (word, mask) = locate(original_id);
        let bits = *self.words.get(word)?;
        if bits & mask == 0 {
            return None;
        }
        let block = word >> BLOCK_SHIFT;
        let block_start = block << BLOCK_SHIFT;
        let preceding: u64 = self.words[block_start..word]
            .iter()
            .map(|w| u64::from(w.count_ones()))
            .sum();
        let shift = WORD_BITS as u64 - (original_id & WORD_MASK) - 1;
        let within = u64::from((bits << shift).count_ones());
        Some(self.block_offsets[block] + preceding + within - 1)
    }

    /// Original id assigned `mapped_id`, or `None` if `mapped_id >= id_count()`.
    pub fn to_original_node_id(&self, mapped_id: u64) -> Option<u64> {
        if mapped_id >= self.id_count {
            return None;
        }
        let block = self
            .block_offsets
            .partition_point(|&offset| offset <= mapped_id)
            .checked_sub(1)?;
        let block_start = block << BLOCK_SHIFT;
        let block_end = ((block + 1) << BLOCK_SHIFT).min(self.words.len());
        let mut seen = self.block_offsets[block];
        for word_idx in block_start..block_end {
            let word = self.words[word_idx];
            let in_word = u64::from(word.count_ones());
            if seen + in_word > mapped_id {
                let position = select(word, mapped_id - seen);
                return Some(((word_idx as u64) << WORD_SHIFT) + position);
            }
            seen += in_word;
        }
        None
    }

    /// Bytes held by this mapping.
    pub fn size_of(&self) -> usize {
        size_of_slice::<u64>(self.words.len()) + size_of_slice::<u64>(self.block_offsets.len())
    }
}

#[inline]
fn word_count(capacity: u64) -> usize {
    capacity.div_ceil(WORD_BITS as u64) as usize
}

#[inline]
fn locate(original_id: u64) -> (usize, u64) {
    ((original_id >> WORD_SHIFT) as usize, 1u64 << (original_id & WORD_MASK))
}

/// Position of the `rank`-th (zero based) set bit of `word`, found by halving.
fn select(mut word: u64, mut rank: u64) -> u64 {
    let mut position = 0;
    let mut width = 32;
    while width > 0 {
        let low_mask = (1u64 << width) - 1;
        let low = u64::from((word & low_mask).count_ones());
        if rank < low {
            word &= low_mask;
        } else {
            rank -= low;
            position += width;
            word >>= width;
        }
        width >>= 1;
    }
    position
}

/// Concurrent builder for [`SparseLongArray`].
///
/// `set` may be called from any number of threads; each call is a single atomic OR.
#[derive(Debug)]
pub struct Builder {
    capacity: u64,
    words: Box<[AtomicU64]>,
}

impl Builder {
    fn new(capacity: u64) -> Self {
        Self {
            capacity,
            words: (0..word_count(capacity)).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    /// Records `original_id`.
    ///
    /// # Panics
    /// Panics if `original_id >= capacity`.
    pub fn set(&self, original_id: u64) {
        assert!(
            original_id < self.capacity,
            "id {original_id} out of range for capacity {}",
            self.capacity
        );
        let (word, mask) = locate(original_id);
        self.words[word].fetch_or(mask, Ordering::Relaxed);
    }

    /// Records every id in `original_ids`.
    pub fn set_all(&self, original_ids: &[u64]) {
        for &id in original_ids {
            self.set(id);
        }
    }

    /// Computes block prefix counts and freezes the mapping.
    pub fn build(self) -> SparseLongArray {
        let words: Box<[u64]> = self
            .words
            .into_vec()
            .into_iter()
            .map(AtomicU64::into_inner)
            .collect();
        let mut block_offsets = Vec::with_capacity(words.len().div_ceil(BLOCK_SIZE));
        let mut count = 0u64;
        for block in words.chunks(BLOCK_SIZE) {
            block_offsets.push(count);
            count += block.iter().map(|w| u64::from(w.count_ones())).sum::<u64>();
        }
        SparseLongArray {
            id_count: count,
            highest_original_id: self.capacity.saturating_sub(1),
            words,
            block_offsets: block_offsets.into_boxed_slice(),
        }
    }
}
