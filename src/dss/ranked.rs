use std::sync::Arc;

use super::{DisjointSetStruct, ROOT};
use crate::mem::{size_of_instance, AllocationTracker, MemoryEstimation, MemoryEstimations};
use crate::paged::{HugeByteArray, HugeLongArray};

/// Union-find with union by rank.
///
/// Ranks bound the tree height, which never exceeds 64 for any addressable capacity, so
/// they are stored as bytes.
pub struct RankedDisjointSetStruct {
    parent: HugeLongArray,
    depth: HugeByteArray,
}

impl RankedDisjointSetStruct {
    /// `size` singleton sets.
    pub fn new(size: usize, tracker: &dyn AllocationTracker) -> Self {
        let mut parent = HugeLongArray::new(size, tracker);
        parent.fill(ROOT);
        Self {
            parent,
            depth: HugeByteArray::new(size, tracker),
        }
    }

    /// Estimation sized by node count.
    pub fn memory_estimation() -> Arc<dyn MemoryEstimation> {
        MemoryEstimations::builder("ranked disjoint set struct")
            .fixed("instance", size_of_instance::<Self>())
            .per_node("parent", HugeLongArray::memory_estimation)
            .per_node("depth", HugeByteArray::memory_estimation)
            .build()
    }

    /// Bytes held by the parent and depth arrays.
    pub fn size_of(&self) -> usize {
        self.parent.size_of() + self.depth.size_of()
    }

    /// Frees both arrays and returns the bytes to remove from the tracker.
    pub fn release(&mut self) -> usize {
        self.parent.release() + self.depth.release()
    }
}

impl DisjointSetStruct for RankedDisjointSetStruct {
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
        let p_depth = self.depth.get(p_root);
        let q_depth = self.depth.get(q_root);
        if p_depth < q_depth {
            self.parent.set(p_root, q_root as i64);
        } else if q_depth < p_depth {
            self.parent.set(q_root, p_root as i64);
        } else {
            self.parent.set(q_root, p_root as i64);
            self.depth.set(p_root, p_depth + 1);
        }
    }

    fn set_id_of(&mut self, node: usize) -> i64 {
        self.find(node) as i64
    }
}

impl std::fmt::Debug for RankedDisjointSetStruct {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RankedDisjointSetStruct")
            .field("capacity", &self.parent.size())
            .finish()
    }
}
