#![allow(missing_docs)]

use std::collections::BTreeSet;

use huge_arrays::mem::{atomic_tracker, empty_tracker, AllocationTracker};
use huge_arrays::paged::page_util::PAGE_SIZE;
use huge_arrays::paged::sparse::NOT_FOUND;
use huge_arrays::paged::{HugeSparseLongArray, SparseLongArray};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rayon::prelude::*;

#[test]
fn sparse_writes_only_materialize_touched_pages() {
    let tracker = atomic_tracker();
    let capacity = 1_000 * PAGE_SIZE;
    let builder = HugeSparseLongArray::builder(capacity, NOT_FOUND, tracker.clone());
    let directory_only = tracker.tracked();
    builder.set(0, 10);
    builder.set(500 * PAGE_SIZE + 3, 20);
    builder.set(999 * PAGE_SIZE, 30);
    assert!(tracker.tracked() > directory_only);
    assert!(builder.capacity() >= capacity);

    let mut array = builder.build();
    assert_eq!(array.default_value(), NOT_FOUND);
    assert_eq!(array.get(0), 10);
    assert_eq!(array.get(500 * PAGE_SIZE + 3), 20);
    assert_eq!(array.get(999 * PAGE_SIZE), 30);
    assert_eq!(array.get(500 * PAGE_SIZE + 4), NOT_FOUND);
    assert_eq!(array.get(250 * PAGE_SIZE), NOT_FOUND);
    assert_eq!(array.get(10 * capacity), NOT_FOUND);
    assert!(!array.contains(1));

    assert_eq!(array.size_of(), tracker.tracked());
    tracker.remove(array.release());
    assert_eq!(tracker.tracked(), 0);
}

#[test]
fn set_if_absent_has_one_winner_per_index() {
    let size = 3 * PAGE_SIZE;
    let builder = HugeSparseLongArray::builder(size, NOT_FOUND, empty_tracker());
    let winners: usize = (0..8i64)
        .into_par_iter()
        .map(|worker| {
            (0..size)
                .filter(|&i| builder.set_if_absent(i, worker))
                .count()
        })
        .sum();
    assert_eq!(winners, size);
    let array = builder.build();
    assert!((0..size).all(|i| (0..8).contains(&array.get(i))));
}

#[test]
fn add_to_accumulates_from_the_default() {
    let builder = HugeSparseLongArray::builder(PAGE_SIZE, 100, empty_tracker());
    (0..1_000).into_par_iter().for_each(|_| builder.add_to(17, 1));
    let array = builder.build();
    assert_eq!(array.get(17), 1_100);
    assert_eq!(array.get(18), 100);
}

#[test]
fn growing_builder_accepts_ids_in_any_order() {
    let tracker = atomic_tracker();
    let builder = HugeSparseLongArray::growing_builder(NOT_FOUND, tracker.clone());
    let mut rng = ChaCha8Rng::seed_from_u64(5);
    let ids: Vec<usize> = (0..2_000).map(|_| rng.gen_range(0..200 * PAGE_SIZE)).collect();
    ids.par_iter().for_each(|&id| builder.set(id, id as i64));
    assert!(builder.capacity() > *ids.iter().max().unwrap_or(&0));

    let mut array = builder.build();
    for &id in &ids {
        assert_eq!(array.get(id), id as i64);
    }
    assert_eq!(array.size_of(), tracker.tracked());
    tracker.remove(array.release());
    assert_eq!(tracker.tracked(), 0);
}

#[test]
fn id_map_round_trips_sparse_original_ids() {
    let capacity = 1u64 << 22;
    let mut rng = ChaCha8Rng::seed_from_u64(17);
    let ids: BTreeSet<u64> = (0..5_000).map(|_| rng.gen_range(0..capacity)).collect();

    let builder = SparseLongArray::builder(capacity);
    let batch: Vec<u64> = ids.iter().copied().collect();
    batch.par_chunks(512).for_each(|chunk| builder.set_all(chunk));
    let map = builder.build();

    assert_eq!(map.id_count(), ids.len() as u64);
    for (mapped, &original) in ids.iter().enumerate() {
        assert_eq!(map.to_mapped_node_id(original), Some(mapped as u64));
        assert_eq!(map.to_original_node_id(mapped as u64), Some(original));
    }
    assert_eq!(map.to_original_node_id(ids.len() as u64), None);
    let absent = (0..capacity).find(|id| !ids.contains(id)).unwrap_or(capacity);
    assert_eq!(map.to_mapped_node_id(absent), None);
    assert!(!map.contains(absent));
}
