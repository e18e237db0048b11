#![allow(missing_docs)]

use std::collections::HashMap;
use std::sync::Arc;

use huge_arrays::mem::{atomic_tracker, empty_tracker, AllocationTracker};
use huge_arrays::paged::page_util::PAGE_SIZE;
use huge_arrays::paged::{
    HugeLongLongDoubleMap, HugeLongLongMap, PagedLongDoubleMap, TrackingIntDoubleHashMap,
    RESERVED_KEY,
};
use huge_arrays::HugeError;
use proptest::prelude::*;
use rayon::prelude::*;

#[test]
fn add_to_accumulates_across_many_resizes() {
    let tracker = atomic_tracker();
    let mut map = HugeLongLongMap::new(tracker.clone()).unwrap();
    let initial_capacity = map.capacity();
    for round in 1..=3i64 {
        for key in 0..50_000i64 {
            map.add_to(key * 1_000_003, round).unwrap();
        }
    }
    assert!(map.capacity() > initial_capacity);
    assert_eq!(map.size(), 50_000);
    for key in (0..50_000i64).step_by(997) {
        assert_eq!(map.get_or_default(key * 1_000_003, 0), 6);
    }
    assert_eq!(tracker.tracked(), map.size_of());

    let total: i64 = map.entries().map(|entry| entry.value).sum();
    assert_eq!(total, 6 * 50_000);
    map.release();
    assert_eq!(tracker.tracked(), 0);
}

#[test]
fn reserved_key_never_enters_the_map() {
    let mut map = HugeLongLongMap::new(empty_tracker()).unwrap();
    let err = map.put(RESERVED_KEY, 1).unwrap_err();
    assert!(matches!(err, HugeError::InvalidArgument(_)));
    assert!(map.add_to(RESERVED_KEY, 1).is_err());
    assert!(!map.contains_key(RESERVED_KEY));
    assert_eq!(map.get_or_default(RESERVED_KEY, 42), 42);

    map.put(0, 7).unwrap();
    map.put(i64::MIN, 8).unwrap();
    map.put(i64::MAX, 9).unwrap();
    assert_eq!(map.get_or_default(0, -1), 7);
    assert_eq!(map.get_or_default(i64::MIN, -1), 8);
    assert_eq!(map.get_or_default(i64::MAX, -1), 9);
}

#[test]
fn pair_map_keys_are_ordered_pairs() {
    let tracker = atomic_tracker();
    let mut map = HugeLongLongDoubleMap::with_expected_elements(4, tracker.clone()).unwrap();
    for a in 0..200i64 {
        for b in 0..20i64 {
            map.add_to(a, b, (a + b) as f64).unwrap();
        }
    }
    map.add_to(5, 3, 1.0).unwrap();
    assert_eq!(map.size(), 4_000);
    assert_eq!(map.get_or_default(5, 3, 0.0), 9.0);
    assert_eq!(map.get_or_default(3, 5, 0.0), 8.0);
    assert_eq!(map.get_or_default(500, 0, -1.0), -1.0);
    let size_of = map.size_of();
    assert_eq!(tracker.tracked(), size_of);
    assert_eq!(map.release(), size_of);
    assert_eq!(tracker.tracked(), 0);
    assert_eq!(map.release(), 0);
}

#[test]
fn paged_map_tolerates_concurrent_writers() {
    let tracker = atomic_tracker();
    let map = PagedLongDoubleMap::new(PAGE_SIZE, tracker.clone());
    let keys = 20 * PAGE_SIZE;
    (0..keys).into_par_iter().for_each(|key| {
        map.add_to(key, 1.0).unwrap();
        map.add_to(keys - 1 - key, 1.0).unwrap();
    });
    assert_eq!(map.size(), keys);
    assert!((0..keys).step_by(131).all(|key| map.get_or_default(key, 0.0) == 2.0));
    assert!(!map.contains_key(keys));

    let mut sum = 0.0;
    map.for_each(|_, value| sum += value);
    assert_eq!(sum, 2.0 * keys as f64);
    assert_eq!(tracker.tracked(), map.size_of());

    let mut map = map;
    map.release();
    assert_eq!(tracker.tracked(), 0);
}

#[test]
fn tracking_map_reports_growth_as_it_happens() {
    let tracker = atomic_tracker();
    let shared: Arc<dyn AllocationTracker> = tracker.clone();
    let mut map = TrackingIntDoubleHashMap::new(Arc::clone(&shared)).unwrap();
    let mut seen = Vec::new();
    for key in 0..1_000 {
        map.put(key, f64::from(key)).unwrap();
        seen.push(tracker.tracked());
    }
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert!(seen.last() > seen.first());
    assert_eq!(map.get_or_default(999, -1.0), 999.0);
    map.release();
    assert_eq!(tracker.tracked(), 0);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn long_long_map_matches_model(
        ops in prop::collection::vec((0i64..512, -5i64..5, any::<bool>()), 0..800),
    ) {
        let mut map = HugeLongLongMap::with_expected_elements(1, empty_tracker()).unwrap();
        let mut model: HashMap<i64, i64> = HashMap::new();
        for (key, value, accumulate) in ops {
            if accumulate {
                map.add_to(key, value).unwrap();
                *model.entry(key).or_insert(0) += value;
            } else {
                map.put(key, value).unwrap();
                model.insert(key, value);
            }
        }
        prop_assert_eq!(map.size(), model.len());
        for (key, value) in &model {
            prop_assert_eq!(map.get_or_default(*key, i64::MIN), *value);
        }
        let mut listed: Vec<(i64, i64)> = map.entries().map(|e| (e.key, e.value)).collect();
        listed.sort_unstable();
        let mut expected: Vec<(i64, i64)> = model.into_iter().collect();
        expected.sort_unstable();
        prop_assert_eq!(listed, expected);
    }
}
