use std::sync::atomic::AtomicI64;

use super::array::storage_bytes;
use super::atomic::HugeAtomicLongArray;
use crate::mem::{size_of_instance, AllocationTracker};

const NUM_BITS: usize = 64;
const SHIFT: u32 = 6;
const MASK: usize = NUM_BITS - 1;

/// Lock-free bit set over a [`HugeAtomicLongArray`].
///
/// Single-bit writes retry a compare-and-set on the enclosing word, so concurrent writers to
/// bits of the same word never lose each other's updates.
#[derive(Debug)]
pub struct HugeAtomicBitSet {
    words: HugeAtomicLongArray,
    num_bits: usize,
    remainder: usize,
}

#[inline(always)]
const fn word_and_mask(index: usize) -> (usize, i64) {
    (index >> SHIFT, 1i64 << (index & MASK))
}

impl HugeAtomicBitSet {
    /// A bit set of `num_bits` cleared bits.
    pub fn new(num_bits: usize, tracker: &dyn AllocationTracker) -> Self {
        let words = HugeAtomicLongArray::new(num_bits.div_ceil(NUM_BITS), tracker);
        Self::with_words(num_bits, words)
    }

    #[cfg(test)]
    pub(crate) fn paged(num_bits: usize, tracker: &dyn AllocationTracker) -> Self {
        let words = HugeAtomicLongArray::allocate(num_bits.div_ceil(NUM_BITS), true, tracker)
            .unwrap_or_else(|err| panic!("{err}"));
        Self::with_words(num_bits, words)
    }

    fn with_words(num_bits: usize, words: HugeAtomicLongArray) -> Self {
        Self {
            words,
            num_bits,
            remainder: num_bits & MASK,
        }
    }

    /// Bytes a bit set of `num_bits` bits will own.
    pub const fn memory_estimation(num_bits: usize) -> usize {
        size_of_instance::<Self>() + storage_bytes::<AtomicI64>(num_bits.div_ceil(NUM_BITS))
    }

    /// Number of addressable bits.
    pub fn size(&self) -> usize {
        self.num_bits
    }

    /// Accounted bytes.
    pub fn size_of(&self) -> usize {
        self.words.size_of()
    }

    /// Drops the words and returns the accounted bytes; `0` on repeat calls.
    pub fn release(&mut self) -> usize {
        self.words.release()
    }

    #[inline]
    fn check(&self, index: usize) {
        assert!(
            index < self.num_bits,
            "bit {index} out of bounds for bit set of {} bits",
            self.num_bits
        );
    }

    /// Whether bit `index` is set.
    pub fn get(&self, index: usize) -> bool {
        self.check(index);
        let (word, mask) = word_and_mask(index);
        self.words.get(word) & mask != 0
    }

    /// Sets bit `index`.
    pub fn set(&self, index: usize) {
        self.get_and_set(index);
    }

    /// Sets bit `index`, returning whether it was already set.
    pub fn get_and_set(&self, index: usize) -> bool {
        self.check(index);
        let (word, mask) = word_and_mask(index);
        let previous = self.apply(word, |w| w | mask);
        previous & mask != 0
    }

    /// Clears bit `index`.
    pub fn clear(&self, index: usize) {
        self.check(index);
        let (word, mask) = word_and_mask(index);
        self.apply(word, |w| w & !mask);
    }

    /// Toggles bit `index`.
    pub fn flip(&self, index: usize) {
        self.check(index);
        let (word, mask) = word_and_mask(index);
        self.apply(word, |w| w ^ mask);
    }

    /// Sets every bit in `[start, end)`.
    pub fn set_range(&self, start: usize, end: usize) {
        assert!(
            start <= end && end <= self.num_bits,
            "bit range [{start}, {end}) outside [0, {})",
            self.num_bits
        );
        if start == end {
            return;
        }
        let first = start >> SHIFT;
        let last = (end - 1) >> SHIFT;
        let start_mask = -1i64 << (start & MASK);
        let end_mask = (-1i64 as u64 >> (NUM_BITS - 1 - ((end - 1) & MASK))) as i64;
        if first == last {
            self.apply(first, |w| w | (start_mask & end_mask));
            return;
        }
        self.apply(first, |w| w | start_mask);
        for word in first + 1..last {
            self.words.set(word, -1);
        }
        self.apply(last, |w| w | end_mask);
    }

    /// Number of set bits. Not a snapshot under concurrent writes.
    pub fn cardinality(&self) -> usize {
        (0..self.words.size())
            .map(|word| self.words.get(word).count_ones() as usize)
            .sum()
    }

    /// Whether no bit is set.
    pub fn is_empty(&self) -> bool {
        (0..self.words.size()).all(|word| self.words.get(word) == 0)
    }

    /// Whether every bit is set.
    pub fn all_set(&self) -> bool {
        let words = self.words.size();
        let full = if self.remainder == 0 { words } else { words - 1 };
        if (0..full).any(|word| self.words.get(word) != -1) {
            return false;
        }
        if self.remainder != 0 {
            let mask = (1i64 << self.remainder) - 1;
            return self.words.get(words - 1) & mask == mask;
        }
        true
    }

    /// Clears every bit. Callers must ensure no concurrent access during the clear.
    pub fn clear_all(&self) {
        self.words.set_all(0);
    }

    fn apply(&self, word: usize, f: impl Fn(i64) -> i64) -> i64 {
        let mut current = self.words.get(word);
        loop {
            let witness = self.words.compare_and_exchange(word, current, f(current));
            if witness == current {
                return current;
            }
            current = witness;
        }
    }
}
