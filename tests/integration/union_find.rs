#![allow(missing_docs)]

use std::sync::Arc;

use huge_arrays::dss::{DisjointSetStruct, IncrementalDisjointSetStruct, RankedDisjointSetStruct};
use huge_arrays::mem::{atomic_tracker, empty_tracker, AllocationTracker, EmptyTracker};
use huge_arrays::HugeError;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Component labels computed by repeated relabelling, used as the reference.
fn naive_components(size: usize, edges: &[(usize, usize)]) -> Vec<usize> {
    let mut label: Vec<usize> = (0..size).collect();
    for &(a, b) in edges {
        let (keep, drop) = (label[a].min(label[b]), label[a].max(label[b]));
        for l in label.iter_mut() {
            if *l == drop {
                *l = keep;
            }
        }
    }
    label
}

fn random_edges(size: usize, count: usize, seed: u64) -> Vec<(usize, usize)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    (0..count)
        .map(|_| (rng.gen_range(0..size), rng.gen_range(0..size)))
        .collect()
}

fn assert_same_partition<D: DisjointSetStruct>(dss: &mut D, labels: &[usize]) {
    let mut distinct = labels.to_vec();
    distinct.sort_unstable();
    distinct.dedup();
    assert_eq!(dss.set_count(), distinct.len());
    for node in 1..labels.len() {
        let expected = labels[node] == labels[node - 1];
        assert_eq!(dss.connected(node, node - 1), expected, "nodes {node} and {}", node - 1);
        assert_eq!(dss.set_id_of(node), dss.set_id_of(labels[node]));
    }
}

#[test]
fn ranked_matches_reference_partition() {
    let size = 2_000;
    let edges = random_edges(size, 1_500, 7);
    let mut dss = RankedDisjointSetStruct::new(size, &EmptyTracker);
    for &(a, b) in &edges {
        dss.union(a, b);
    }
    assert_same_partition(&mut dss, &naive_components(size, &edges));
}

#[test]
fn incremental_matches_reference_partition() {
    let size = 2_000;
    let edges = random_edges(size, 1_500, 11);
    let mut dss = IncrementalDisjointSetStruct::unseeded(size, empty_tracker()).unwrap();
    for &(a, b) in &edges {
        dss.union(a, b);
    }
    assert_same_partition(&mut dss, &naive_components(size, &edges));
}

#[test]
fn repeated_finds_and_unions_are_idempotent() {
    let mut dss = RankedDisjointSetStruct::new(64, &EmptyTracker);
    for node in 1..32 {
        dss.union(node - 1, node);
    }
    let root = dss.find(31);
    assert_eq!(dss.find(31), root);
    assert_eq!(dss.find_no_opt(0), root);
    let before = dss.set_count();
    dss.union(0, 31);
    dss.union(31, 0);
    assert_eq!(dss.set_count(), before);
    assert_eq!(before, 64 - 31);
}

#[test]
fn seeded_communities_keep_their_ids() {
    let tracker = atomic_tracker();
    let shared: Arc<dyn AllocationTracker> = tracker.clone();
    let seed = |node: usize| match node {
        0..=9 => Some(42),
        10..=19 => Some(7),
        _ => None,
    };
    let mut dss = IncrementalDisjointSetStruct::new(30, seed, shared).unwrap();
    assert_eq!(dss.max_seed(), 42);
    assert_eq!(dss.set_count(), 2 + 10);
    assert!((0..10).all(|n| dss.set_id_of(n) == 42));
    assert!((10..20).all(|n| dss.set_id_of(n) == 7));
    assert_eq!(dss.set_id_of(25), 42 + 1 + 25);

    dss.union(25, 3);
    assert_eq!(dss.set_id_of(25), 42);
    dss.union(0, 15);
    assert_eq!(dss.set_id_of(25), 7);
    assert_eq!(dss.set_id_of(9), 7);

    let freed = dss.release();
    assert!(freed > 0);
    assert_eq!(tracker.tracked(), 0);
}

#[test]
fn merge_unites_partitions_across_implementations() {
    let size = 500;
    let left_edges = random_edges(size, 200, 1);
    let right_edges = random_edges(size, 200, 2);

    let mut ranked = RankedDisjointSetStruct::new(size, &EmptyTracker);
    for &(a, b) in &left_edges {
        ranked.union(a, b);
    }
    let mut incremental = IncrementalDisjointSetStruct::unseeded(size, empty_tracker()).unwrap();
    for &(a, b) in &right_edges {
        incremental.union(a, b);
    }
    ranked.merge(&incremental).unwrap();

    let all: Vec<_> = left_edges.iter().chain(&right_edges).copied().collect();
    assert_same_partition(&mut ranked, &naive_components(size, &all));

    let smaller = RankedDisjointSetStruct::new(size - 1, &EmptyTracker);
    let err = ranked.merge(&smaller).unwrap_err();
    assert!(matches!(err, HugeError::CapacityMismatch { .. }));
}
