//! Parallel merge sort over huge arrays.
//!
//! The range is split at its midpoint until a piece holds fewer than
//! [`SEQUENTIAL_THRESHOLD`] elements, which are insertion sorted in place. Each split
//! waits for both halves before merging them, so merges run bottom-up along the task
//! tree. Splits of at least `min_batch_size` elements run their halves on Rayon's pool
//! through `rayon::join`; smaller splits recurse on the current worker.

use std::time::Instant;

use tracing::debug;

use super::array::HugeArray;
use super::slice::HugeSliceMut;
use crate::config::ParallelOptions;
use crate::mem::EmptyTracker;
use crate::types::Result;

/// Pieces shorter than this are insertion sorted.
pub const SEQUENTIAL_THRESHOLD: usize = 100;

/// Sorts `array` ascending. The sort is stable.
///
/// Allocates an untracked scratch array of the same size, which is the only way this can
/// fail.
pub fn merge_sort<T>(array: &mut HugeArray<T>, options: &ParallelOptions) -> Result<()>
where
    T: Copy + Default + PartialOrd + Send + Sync,
{
    options.validate()?;
    let size = array.size();
    if size < 2 {
        return Ok(());
    }
    let mut scratch = HugeArray::<T>::try_new(size, &EmptyTracker)?;
    let started = Instant::now();
    debug!(size, concurrency = options.concurrency, "huge.sort.start");

    let split_min = if options.is_parallel() {
        options.configure_global_pool();
        options.min_batch_size.max(SEQUENTIAL_THRESHOLD)
    } else {
        usize::MAX
    };
    sort_range(
        &mut array.as_slice_mut(),
        &mut scratch.as_slice_mut(),
        split_min,
    );

    debug!(
        size,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "huge.sort.finish"
    );
    Ok(())
}

fn sort_range<T>(
    data: &mut HugeSliceMut<'_, T>,
    scratch: &mut HugeSliceMut<'_, T>,
    split_min: usize,
) where
    T: Copy + PartialOrd + Send + Sync,
{
    let len = data.len();
    if len < SEQUENTIAL_THRESHOLD {
        insertion_sort(data);
        return;
    }
    let mid = (len - 1) / 2 + 1;
    {
        let (mut left, mut right) = data.split_at_mut(mid);
        let (mut left_scratch, mut right_scratch) = scratch.split_at_mut(mid);
        if len >= split_min {
            rayon::join(
                || sort_range(&mut left, &mut left_scratch, split_min),
                || sort_range(&mut right, &mut right_scratch, split_min),
            );
        } else {
            sort_range(&mut left, &mut left_scratch, split_min);
            sort_range(&mut right, &mut right_scratch, split_min);
        }
    }
    merge(data, scratch, mid);
}

fn insertion_sort<T: Copy + PartialOrd>(data: &mut HugeSliceMut<'_, T>) {
    for i in 1..data.len() {
        let value = *data.get(i);
        let mut j = i;
        while j > 0 && *data.get(j - 1) > value {
            let shifted = *data.get(j - 1);
            data.set(j, shifted);
            j -= 1;
        }
        data.set(j, value);
    }
}

/// Merges the sorted runs `[0, mid)` and `[mid, len)` of `data`, staging the left run in
/// `scratch`.
fn merge<T: Copy + PartialOrd>(
    data: &mut HugeSliceMut<'_, T>,
    scratch: &mut HugeSliceMut<'_, T>,
    mid: usize,
) {
    let end = data.len();
    data.copy_range_to(scratch, 0, mid);
    let (mut i, mut j, mut k) = (0, mid, 0);
    while i < mid && j < end {
        let left = *scratch.get(i);
        let right = *data.get(j);
        if left <= right {
            data.set(k, left);
            i += 1;
        } else {
            data.set(k, right);
            j += 1;
        }
        k += 1;
    }
    while i < mid {
        data.set(k, *scratch.get(i));
        i += 1;
        k += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::paged::page_util::PAGE_SIZE;
    use crate::paged::HugeLongArray;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    fn random_array(size: usize, seed: u64) -> HugeLongArray {
        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let mut array = HugeLongArray::try_paged(size).unwrap();
        array.set_all(|_| rng.gen_range(-1_000..1_000));
        array
    }

    fn assert_sorted_permutation(before: Vec<i64>, array: &HugeLongArray) {
        let after = array.to_vec().unwrap();
        assert!(after.windows(2).all(|w| w[0] <= w[1]));
        let mut expected = before;
        expected.sort_unstable();
        assert_eq!(after, expected);
    }

    #[test]
    fn sorts_below_and_above_threshold() {
        for size in [0, 1, 2, 50, 99, 100, 101, 1_000, 3 * PAGE_SIZE + 7] {
            let mut array = random_array(size, size as u64);
            let before = array.to_vec().unwrap();
            merge_sort(&mut array, &ParallelOptions::sequential()).unwrap();
            assert_sorted_permutation(before, &array);
        }
    }

    #[test]
    fn parallel_sort_matches_sequential() {
        let mut array = random_array(10 * PAGE_SIZE + 3, 42);
        let before = array.to_vec().unwrap();
        let options = ParallelOptions {
            concurrency: 4,
            min_batch_size: 1_000,
            thread_pool_size: None,
        };
        merge_sort(&mut array, &options).unwrap();
        assert_sorted_permutation(before, &array);
    }

    #[test]
    fn sort_is_stable() {
        let mut pairs = HugeArray::<(i32, u32)>::try_paged(PAGE_SIZE + 300).unwrap();
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        pairs.set_all(|i| (rng.gen_range(0..10), i as u32));
        merge_sort(&mut pairs, &ParallelOptions::sequential()).unwrap();
        let sorted: Vec<(i32, u32)> = pairs.iter().copied().collect();
        for w in sorted.windows(2) {
            assert!(w[0].0 < w[1].0 || (w[0].0 == w[1].0 && w[0].1 < w[1].1));
        }
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let mut array = random_array(10, 1);
        let options = ParallelOptions::with_concurrency(0);
        assert!(merge_sort(&mut array, &options).is_err());
    }
}
