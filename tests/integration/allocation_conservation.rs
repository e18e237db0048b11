#![allow(missing_docs)]

use std::sync::Arc;

use huge_arrays::dss::{IncrementalDisjointSetStruct, RankedDisjointSetStruct};
use huge_arrays::mem::{atomic_tracker, empty_tracker, AllocationTracker, EmptyTracker};
use huge_arrays::paged::{
    HugeAtomicBitSet, HugeAtomicDoubleArray, HugeAtomicLongArray, HugeLongArray,
    HugeLongArrayBuilder, HugeLongLongDoubleMap, HugeLongLongMap, HugeObjectArray,
    HugeSparseLongArray, PagedLongDoubleMap,
};

#[test]
fn ten_million_longs_release_exactly_what_they_tracked() {
    let tracker = atomic_tracker();
    let mut array = HugeLongArray::new(10_000_000, tracker.as_ref());
    array.set_all(|i| i as i64);
    assert_eq!(array.get(9_999_999), 9_999_999);

    let before = tracker.tracked();
    let size_of = array.size_of();
    assert_eq!(before, size_of);
    let freed = array.release();
    assert_eq!(freed, size_of);
    tracker.remove(freed);
    assert_eq!(tracker.tracked(), before - freed);
    assert_eq!(array.release(), 0);
}

#[test]
fn mixed_lifecycle_returns_tracker_to_zero() {
    let tracker = atomic_tracker();
    let shared: Arc<dyn AllocationTracker> = tracker.clone();

    let mut longs = HugeLongArray::new(50_000, tracker.as_ref());
    let mut atomics = HugeAtomicLongArray::new(20_000, tracker.as_ref());
    let mut doubles = HugeAtomicDoubleArray::new(20_000, tracker.as_ref());
    let mut bits = HugeAtomicBitSet::new(100_003, tracker.as_ref());
    let mut objects: HugeObjectArray<Vec<u8>> = HugeObjectArray::new(1_000, tracker.as_ref());
    let mut ranked = RankedDisjointSetStruct::new(5_000, tracker.as_ref());

    let mut map = HugeLongLongMap::new(Arc::clone(&shared)).unwrap();
    let mut pairs = HugeLongLongDoubleMap::new(Arc::clone(&shared)).unwrap();
    let mut paged = PagedLongDoubleMap::new(10_000, Arc::clone(&shared));
    let mut incremental =
        IncrementalDisjointSetStruct::new(5_000, |n| Some((n / 10) as i64), Arc::clone(&shared))
            .unwrap();
    let sparse_builder = HugeSparseLongArray::builder(1 << 20, -1, Arc::clone(&shared));
    let array_builder = HugeLongArrayBuilder::new(30_000, Arc::clone(&shared)).unwrap();

    for key in 0..10_000i64 {
        map.add_to(key * 31, 1).unwrap();
        pairs.add_to(key, key + 1, 0.5).unwrap();
        paged.add_to((key * 7) as usize, 1.0).unwrap();
        sparse_builder.set((key * 101) as usize, key);
    }
    array_builder.allocate(12_345).unwrap().add(&vec![3; 12_345]);
    let mut sparse = sparse_builder.build();
    let mut built = array_builder.build().unwrap();
    assert!(tracker.tracked() > 0);

    for freed in [
        longs.release(),
        atomics.release(),
        doubles.release(),
        bits.release(),
        objects.release(),
        ranked.release(),
        sparse.release(),
        built.release(),
    ] {
        tracker.remove(freed);
    }
    map.release();
    pairs.release();
    paged.release();
    incremental.release();
    assert_eq!(tracker.tracked(), 0);
}

#[test]
fn untracked_construction_reports_nothing() {
    let tracker = empty_tracker();
    let mut map = HugeLongLongMap::with_expected_elements(1_000, Arc::clone(&tracker)).unwrap();
    map.put(1, 2).unwrap();
    assert_eq!(tracker.tracked(), 0);
    assert!(!tracker.is_tracking());

    let array = HugeLongArray::new(10, &EmptyTracker);
    assert!(array.size_of() > 0);
}
