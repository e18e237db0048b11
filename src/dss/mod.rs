//! Union-find structures over huge parent arrays.
//!
//! Each node stores the index of its parent, or [`ROOT`] when it is the representative
//! of its set. The two implementations differ only in which root survives a union:
//! [`RankedDisjointSetStruct`] attaches the shallower tree under the deeper one, while
//! [`IncrementalDisjointSetStruct`] keeps the root with the numerically smaller set id.
//!
//! # Example
//!
//! ```rust
//! use huge_arrays::dss::{DisjointSetStruct, RankedDisjointSetStruct};
//! use huge_arrays::mem::EmptyTracker;
//!
//! let mut dss = RankedDisjointSetStruct::new(4, &EmptyTracker);
//! dss.union(0, 1);
//! dss.union(2, 3);
//! assert!(dss.connected(0, 1));
//! assert!(!dss.connected(1, 2));
//! assert_eq!(dss.set_count(), 2);
//! ```

mod incremental;
mod ranked;

pub use incremental::IncrementalDisjointSetStruct;
pub use ranked::RankedDisjointSetStruct;

use crate::paged::HugeLongArray;
use crate::types::{HugeError, Result};

/// Parent value marking a node as the root of its set.
pub const ROOT: i64 = -1;

/// Common operations of the disjoint-set structures.
///
/// Implementors provide access to their parent array and the union policy; lookups,
/// counting and merging are shared.
pub trait DisjointSetStruct {
    /// The parent array.
    fn parent(&self) -> &HugeLongArray;

    /// The parent array, mutably.
    fn parent_mut(&mut self) -> &mut HugeLongArray;

    /// Joins the sets containing `p` and `q`. A no-op when they already share a root.
    fn union(&mut self, p: usize, q: usize);

    /// Identifier of the set containing `node`.
    fn set_id_of(&mut self, node: usize) -> i64;

    /// Number of nodes.
    fn capacity(&self) -> usize {
        self.parent().size()
    }

    /// Root of `node`'s set. Every node visited on the way is re-pointed at the root.
    fn find(&mut self, node: usize) -> usize {
        let root = self.find_no_opt(node);
        let parent = self.parent_mut();
        let mut current = node;
        while current != root {
            let next = parent.get(current) as usize;
            parent.set(current, root as i64);
            current = next;
        }
        root
    }

    /// Root of `node`'s set, without modifying the structure.
    fn find_no_opt(&self, node: usize) -> usize {
        let parent = self.parent();
        let mut current = node;
        loop {
            let next = parent.get(current);
            if next == ROOT {
                return current;
            }
            current = next as usize;
        }
    }

    /// Whether `p` and `q` are in the same set.
    fn connected(&mut self, p: usize, q: usize) -> bool {
        self.find(p) == self.find(q)
    }

    /// Number of disjoint sets.
    fn set_count(&self) -> usize {
        self.parent().iter().filter(|&&p| p == ROOT).count()
    }

    /// Unions every node with its representative in `other`.
    ///
    /// Afterwards two nodes are connected here if they were connected in either
    /// structure. Fails without modifying anything when the capacities differ.
    fn merge<O>(&mut self, other: &O) -> Result<()>
    where
        O: DisjointSetStruct + ?Sized,
        Self: Sized,
    {
        if self.capacity() != other.capacity() {
            return Err(HugeError::CapacityMismatch {
                left: self.capacity(),
                right: other.capacity(),
            });
        }
        for node in 0..self.capacity() {
            if other.parent().get(node) != ROOT {
                let root = other.find_no_opt(node);
                self.union(node, root);
            }
        }
        Ok(())
    }
}
