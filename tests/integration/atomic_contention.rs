#![allow(missing_docs)]

use std::thread;

use huge_arrays::mem::EmptyTracker;
use huge_arrays::paged::page_util::PAGE_SIZE;
use huge_arrays::paged::{HugeAtomicBitSet, HugeAtomicDoubleArray, HugeAtomicLongArray};
use rayon::prelude::*;

const THREADS: usize = 8;
const ROUNDS: usize = 10_000;

#[test]
fn shared_slot_sees_every_increment() {
    let array = HugeAtomicLongArray::new(3 * PAGE_SIZE, &EmptyTracker);
    let hot = PAGE_SIZE + 7;
    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    array.get_and_add(hot, 1);
                }
            });
        }
    });
    assert_eq!(array.get(hot), (THREADS * ROUNDS) as i64);
    assert_eq!(array.get(hot - 1), 0);
    assert_eq!(array.get(hot + 1), 0);
}

#[test]
fn compare_and_set_elects_one_winner_per_slot() {
    let slots = 2 * PAGE_SIZE;
    let array = HugeAtomicLongArray::new(slots, &EmptyTracker);
    array.set_all(-1);
    let wins: usize = (0..THREADS)
        .into_par_iter()
        .map(|worker| {
            (0..slots)
                .filter(|&slot| array.compare_and_set(slot, -1, worker as i64))
                .count()
        })
        .sum();
    assert_eq!(wins, slots);
    assert!(array.to_vec().iter().all(|&owner| (0..THREADS as i64).contains(&owner)));
}

#[test]
fn update_retries_until_applied() {
    let array = HugeAtomicLongArray::new(1, &EmptyTracker);
    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ROUNDS / 10 {
                    array.update(0, |v| v + 2);
                }
            });
        }
    });
    assert_eq!(array.get(0), (THREADS * ROUNDS / 10 * 2) as i64);
}

#[test]
fn double_accumulation_is_exact_for_representable_sums() {
    let array = HugeAtomicDoubleArray::new(4, &EmptyTracker);
    thread::scope(|scope| {
        for _ in 0..THREADS {
            scope.spawn(|| {
                for _ in 0..ROUNDS {
                    array.get_and_add(2, 0.5);
                }
            });
        }
    });
    assert_eq!(array.get(2), (THREADS * ROUNDS) as f64 * 0.5);
    assert_eq!(array.get(3), 0.0);
}

#[test]
fn bitset_writers_sharing_words_lose_nothing() {
    let bits = 64 * 100 + 3;
    let set = HugeAtomicBitSet::new(bits, &EmptyTracker);
    (0..bits).into_par_iter().for_each(|bit| {
        if bit % 3 != 0 {
            set.set(bit);
        }
    });
    assert_eq!(set.cardinality(), bits - bits.div_ceil(3));

    let first_claims: usize = (0..THREADS)
        .into_par_iter()
        .map(|_| (0..bits).filter(|&bit| !set.get_and_set(bit)).count())
        .sum();
    assert_eq!(first_claims, bits.div_ceil(3));
    assert!(set.all_set());
}
