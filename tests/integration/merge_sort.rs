#![allow(missing_docs)]

use huge_arrays::paged::page_util::PAGE_SIZE;
use huge_arrays::paged::{merge_sort, HugeDoubleArray, HugeLongArray, SEQUENTIAL_THRESHOLD};
use huge_arrays::{HugeError, ParallelOptions};
use proptest::prelude::*;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

fn shuffled(size: usize, seed: u64) -> Vec<i64> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..size).map(|_| rng.gen_range(-1_000..1_000)).collect()
}

fn parallel(min_batch_size: usize) -> ParallelOptions {
    ParallelOptions {
        concurrency: 4,
        min_batch_size,
        thread_pool_size: None,
    }
}

#[test]
fn sorts_arrays_spanning_many_pages() {
    let size = 6 * PAGE_SIZE + 123;
    let values = shuffled(size, 3);
    let mut array = HugeLongArray::of(&values);
    merge_sort(&mut array, &parallel(PAGE_SIZE)).unwrap();

    let mut expected = values;
    expected.sort();
    assert_eq!(array.to_vec().unwrap(), expected);
}

#[test]
fn threshold_sized_inputs_sort_either_way() {
    for size in [
        0,
        1,
        2,
        SEQUENTIAL_THRESHOLD - 1,
        SEQUENTIAL_THRESHOLD,
        SEQUENTIAL_THRESHOLD + 1,
    ] {
        let values = shuffled(size, size as u64);
        let mut expected = values.clone();
        expected.sort();
        for options in [ParallelOptions::sequential(), parallel(1)] {
            let mut array = HugeLongArray::of(&values);
            merge_sort(&mut array, &options).unwrap();
            assert_eq!(array.to_vec().unwrap(), expected, "size {size}");
        }
    }
}

#[test]
fn doubles_sort_with_negative_zero_and_duplicates() {
    let values = [3.5, -0.0, 1.0, -2.25, 1.0, 0.0, -2.25];
    let mut array = HugeDoubleArray::of(&values);
    merge_sort(&mut array, &ParallelOptions::sequential()).unwrap();
    let sorted = array.to_vec().unwrap();
    assert!(sorted.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(sorted.first(), Some(&-2.25));
    assert_eq!(sorted.last(), Some(&3.5));
}

#[test]
fn invalid_options_leave_the_array_untouched() {
    let values = shuffled(500, 9);
    let mut array = HugeLongArray::of(&values);
    let options = ParallelOptions {
        concurrency: 0,
        ..ParallelOptions::sequential()
    };
    let err = merge_sort(&mut array, &options).unwrap_err();
    assert!(matches!(err, HugeError::InvalidArgument(_)));
    assert_eq!(array.to_vec().unwrap(), values);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn output_is_a_sorted_permutation(
        values in prop::collection::vec(any::<i64>(), 0..2_000),
        min_batch in 1usize..600,
    ) {
        let mut array = HugeLongArray::of(&values);
        merge_sort(&mut array, &parallel(min_batch)).unwrap();
        let mut expected = values;
        expected.sort_unstable();
        prop_assert_eq!(array.to_vec().unwrap(), expected);
    }
}
