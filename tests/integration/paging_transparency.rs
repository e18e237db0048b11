#![allow(missing_docs)]

use huge_arrays::mem::EmptyTracker;
use huge_arrays::paged::page_util::{index_in_page, page_index, PAGE_SIZE};
use huge_arrays::paged::{
    Generator, HugeDoubleArray, HugeLongArray, HugeObjectArray, Identity, Parallel,
};
use huge_arrays::ParallelOptions;
use proptest::prelude::*;

fn reference(size: usize, seed: i64) -> Vec<i64> {
    (0..size as i64).map(|i| i.wrapping_mul(seed) ^ 0x5a5a).collect()
}

fn collect_by_cursor(array: &HugeLongArray, start: usize, end: usize) -> Vec<i64> {
    let mut cursor = array.new_cursor();
    cursor.set_range(start, end);
    let mut out = Vec::with_capacity(end - start);
    while cursor.next() {
        out.extend_from_slice(cursor.slice());
    }
    cursor.close();
    out
}

#[test]
fn addressing_round_trips_at_page_edges() {
    for i in [0, 1, PAGE_SIZE - 1, PAGE_SIZE, PAGE_SIZE + 1, 7 * PAGE_SIZE + 3] {
        assert_eq!(page_index(i) * PAGE_SIZE + index_in_page(i), i);
        assert!(index_in_page(i) < PAGE_SIZE);
    }
}

#[test]
fn cursor_segments_match_element_reads() {
    let size = 5 * PAGE_SIZE + 17;
    let expected = reference(size, 31);
    let mut array = HugeLongArray::new(size, &EmptyTracker);
    array.set_all(|i| expected[i]);
    for (start, end) in [
        (0, size),
        (PAGE_SIZE - 1, PAGE_SIZE + 1),
        (3, 3),
        (2 * PAGE_SIZE, 4 * PAGE_SIZE),
        (size - 1, size),
    ] {
        assert_eq!(collect_by_cursor(&array, start, end), expected[start..end]);
    }
}

#[test]
fn parallel_and_sequential_fillers_agree() {
    let size = 9 * PAGE_SIZE + 1;
    let options = ParallelOptions {
        concurrency: 4,
        min_batch_size: PAGE_SIZE,
        thread_pool_size: None,
    };
    let sequential = HugeLongArray::with_filler(size, &Identity, &EmptyTracker);
    let parallel =
        HugeLongArray::with_filler(size, &Parallel::new(Identity, options), &EmptyTracker);
    assert_eq!(sequential.to_vec().unwrap(), parallel.to_vec().unwrap());
    assert_eq!(parallel.get(size - 1), (size - 1) as i64);

    let doubles = HugeDoubleArray::with_filler(
        size,
        &Parallel::new(Generator(|i: usize| i as f64 / 2.0), options),
        &EmptyTracker,
    );
    assert_eq!(doubles.get(PAGE_SIZE + 1), (PAGE_SIZE + 1) as f64 / 2.0);
}

#[test]
fn object_arrays_keep_values_across_pages() {
    let size = 2 * PAGE_SIZE + 5;
    let mut labels: HugeObjectArray<String> = HugeObjectArray::new(size, &EmptyTracker);
    labels.set(PAGE_SIZE, "boundary".to_string());
    assert_eq!(labels.get(PAGE_SIZE).map(String::as_str), Some("boundary"));
    assert!(labels.get(PAGE_SIZE - 1).is_none());
    let created = labels
        .put_if_absent(size - 1, || Some("last".to_string()))
        .cloned();
    assert_eq!(created.as_deref(), Some("last"));
    let kept = labels.put_if_absent(size - 1, || Some("other".to_string())).cloned();
    assert_eq!(kept.as_deref(), Some("last"));
    assert_eq!(labels.iter().flatten().count(), 2);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn copy_to_matches_vec_model(
        src_len in 0usize..3 * PAGE_SIZE,
        dst_len in 0usize..3 * PAGE_SIZE,
        length in 0usize..4 * PAGE_SIZE,
    ) {
        let src_values = reference(src_len, 7);
        let src = HugeLongArray::of(&src_values);
        let mut dst = HugeLongArray::new(dst_len, &EmptyTracker);
        dst.fill(-9);
        src.copy_to(&mut dst, length);

        let copied = length.min(src_len).min(dst_len);
        let mut model = vec![0i64; dst_len];
        model[..copied].copy_from_slice(&src_values[..copied]);
        prop_assert_eq!(dst.to_vec().unwrap(), model);
    }
}
