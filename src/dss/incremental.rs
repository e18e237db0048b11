use std::sync::Arc;

use super::{DisjointSetStruct, ROOT};
use crate::mem::{size_of_instance, AllocationTracker, MemoryEstimation, MemoryEstimations};
use crate::paged::{HugeLongArray, HugeLongLongMap};
use crate::types::{HugeError, Result};

/// Union-find warm-started from existing set ids.
///
/// Nodes that share a seed start out in the same set, and that set keeps the seed as its
/// id. Unseeded nodes get an id above every seed. A union keeps the root whose set id is
/// smaller, so seeded communities absorb fresh nodes and set ids stay stable across runs.
pub struct IncrementalDisjointSetStruct {
    parent: HugeLongArray,
    set_ids: HugeLongLongMap,
    max_seed: i64,
    tracker: Arc<dyn AllocationTracker>,
}

impl IncrementalDisjointSetStruct {
    /// `size` nodes grouped by `seed(node)`.
    ///
    /// Seeds must be non-negative; `None` leaves a node in its own set.
    pub fn new<F>(size: usize, seed: F, tracker: Arc<dyn AllocationTracker>) -> Result<Self>
    where
        F: Fn(usize) -> Option<i64>,
    {
        let mut parent = HugeLongArray::try_new(size, tracker.as_ref())?;
        parent.fill(ROOT);
        let mut set_ids = match HugeLongLongMap::new(Arc::clone(&tracker)) {
            Ok(map) => map,
            Err(err) => {
                tracker.remove(parent.release());
                return Err(err);
            }
        };
        let mut first_of_seed = match HugeLongLongMap::new(Arc::clone(&tracker)) {
            Ok(map) => map,
            Err(err) => {
                tracker.remove(parent.release());
                set_ids.release();
                return Err(err);
            }
        };
        let seeded = seed_sets(size, seed, &mut parent, &mut set_ids, &mut first_of_seed)
            .and_then(|max_seed| check_id_space(size, max_seed));
        first_of_seed.release();
        let max_seed = match seeded {
            Ok(max_seed) => max_seed,
            Err(err) => {
                tracker.remove(parent.release());
                set_ids.release();
                return Err(err);
            }
        };

        Ok(Self {
            parent,
            set_ids,
            max_seed,
            tracker,
        })
    }

    /// `size` unseeded singleton sets.
    pub fn unseeded(size: usize, tracker: Arc<dyn AllocationTracker>) -> Result<Self> {
        Self::new(size, |_| None, tracker)
    }

    /// Estimation sized by node count.
    pub fn memory_estimation() -> Arc<dyn MemoryEstimation> {
        MemoryEstimations::builder("incremental disjoint set struct")
            .fixed("instance", size_of_instance::<Self>())
            .per_node("parent", HugeLongArray::memory_estimation)
            .add(HugeLongLongMap::memory_estimation())
            .build()
    }

    /// Largest seed seen at construction, or `-1` without seeds.
    pub fn max_seed(&self) -> i64 {
        self.max_seed
    }

    /// Bytes held by the parent array and the seed map.
    pub fn size_of(&self) -> usize {
        self.parent.size_of() + self.set_ids.size_of()
    }

    /// Frees the parent array and the seed map, reporting both to the tracker, and returns
    /// the freed bytes.
    pub fn release(&mut self) -> usize {
        let parent = self.parent.release();
        self.tracker.remove(parent);
        parent + self.set_ids.release()
    }

    fn root_set_id(&self, root: usize) -> i64 {
        self.set_ids
            .get_or_default(root as i64, self.max_seed + 1 + root as i64)
    }
}

/// Points every seeded node at the first node carrying the same seed and records the seed
/// as the set id of that first node. Returns the largest seed, or `-1`.
fn seed_sets<F>(
    size: usize,
    seed: F,
    parent: &mut HugeLongArray,
    set_ids: &mut HugeLongLongMap,
    first_of_seed: &mut HugeLongLongMap,
) -> Result<i64>
where
    F: Fn(usize) -> Option<i64>,
{
    let mut max_seed = -1;
    for node in 0..size {
        let Some(id) = seed(node) else { continue };
        if id < 0 {
            return Err(HugeError::InvalidArgument("seeds must be non-negative"));
        }
        max_seed = max_seed.max(id);
        match first_of_seed.get_or_default(id, ROOT) {
            ROOT => {
                first_of_seed.put(id, node as i64)?;
                set_ids.put(node as i64, id)?;
            }
            root => parent.set(node, root),
        }
    }
    Ok(max_seed)
}

/// Unseeded roots take ids `max_seed + 1 + node`, which must stay representable.
fn check_id_space(size: usize, max_seed: i64) -> Result<i64> {
    i64::try_from(size)
        .ok()
        .and_then(|size| max_seed.checked_add(size))
        .map(|_| max_seed)
        .ok_or(HugeError::InvalidArgument(
            "seeds leave no room for the ids of unseeded sets",
        ))
}

impl DisjointSetStruct for IncrementalDisjointSetStruct {
    fn parent(&self) -> &HugeLongArray {
        &self.parent
    }

    fn parent_mut(&mut self) -> &mut HugeLongArray {
        &mut self.parent
    }

    fn union(&mut self, p: usize, q: usize) {
        let p_root = self.find(p);
        let q_root = self.find(q);
        if p_root == q_root {
            return;
        }
        if self.root_set_id(p_root) < self.root_set_id(q_root) {
            self.parent.set(q_root, p_root as i64);
        } else {
            self.parent.set(p_root, q_root as i64);
        }
    }

    fn set_id_of(&mut self, node: usize) -> i64 {
        let root = self.find(node);
        self.root_set_id(root)
    }
}

impl std::fmt::Debug for IncrementalDisjointSetStruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IncrementalDisjointSetStruct")
            .field("capacity", &self.parent.size())
            .field("seeded_sets", &self.set_ids.size())
            .field("max_seed", &self.max_seed)
            .finish()
    }
}
