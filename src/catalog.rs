//! Named memory estimations for every container, as listed by `huge-estimate`.

use std::sync::Arc;

use crate::dss::{IncrementalDisjointSetStruct, RankedDisjointSetStruct};
use crate::mem::{size_of_instance, MemoryEstimation, MemoryEstimations};
use crate::paged::{
    HugeArrayBuilder, HugeAtomicBitSet, HugeAtomicByteArray, HugeAtomicDoubleArray,
    HugeAtomicLongArray, HugeDoubleArray, HugeIntArray, HugeLongArray, HugeLongLongDoubleMap,
    HugeLongLongMap, HugeSparseLongArray, PagedLongDoubleMap, SparseLongArray,
};

/// A structure whose footprint can be estimated by name.
#[derive(Clone, Copy)]
pub struct CatalogEntry {
    /// Name accepted on the command line.
    pub name: &'static str,
    /// One-line description.
    pub summary: &'static str,
    estimation: fn() -> Arc<dyn MemoryEstimation>,
}

impl CatalogEntry {
    /// The estimation for this structure.
    pub fn estimation(&self) -> Arc<dyn MemoryEstimation> {
        (self.estimation)()
    }
}

impl std::fmt::Debug for CatalogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogEntry")
            .field("name", &self.name)
            .finish()
    }
}

const ENTRIES: &[CatalogEntry] = &[
    CatalogEntry {
        name: "long-array",
        summary: "one i64 per node",
        estimation: long_array,
    },
    CatalogEntry {
        name: "double-array",
        summary: "one f64 per node",
        estimation: double_array,
    },
    CatalogEntry {
        name: "int-array",
        summary: "one i32 per node",
        estimation: int_array,
    },
    CatalogEntry {
        name: "atomic-long-array",
        summary: "one atomic i64 per node",
        estimation: atomic_long_array,
    },
    CatalogEntry {
        name: "atomic-double-array",
        summary: "one atomic f64 per node",
        estimation: atomic_double_array,
    },
    CatalogEntry {
        name: "atomic-byte-array",
        summary: "one atomic i8 per node",
        estimation: atomic_byte_array,
    },
    CatalogEntry {
        name: "atomic-bitset",
        summary: "one bit per node",
        estimation: atomic_bitset,
    },
    CatalogEntry {
        name: "long-array-builder",
        summary: "concurrent appender for one i64 per node",
        estimation: long_array_builder,
    },
    CatalogEntry {
        name: "merge-sort",
        summary: "scratch space for sorting one i64 per node",
        estimation: merge_sort,
    },
    CatalogEntry {
        name: "long-long-map",
        summary: "i64 to i64 hash map, one entry per node",
        estimation: HugeLongLongMap::memory_estimation,
    },
    CatalogEntry {
        name: "long-long-double-map",
        summary: "(i64, i64) to f64 hash map, one entry per relationship",
        estimation: HugeLongLongDoubleMap::memory_estimation,
    },
    CatalogEntry {
        name: "paged-long-double-map",
        summary: "paged i64 to f64 map, one entry per node",
        estimation: PagedLongDoubleMap::memory_estimation,
    },
    CatalogEntry {
        name: "sparse-long-array",
        summary: "lazily paged i64 array addressed by original id",
        estimation: sparse_long_array,
    },
    CatalogEntry {
        name: "sparse-id-map",
        summary: "original id to dense id mapping",
        estimation: SparseLongArray::memory_estimation,
    },
    CatalogEntry {
        name: "ranked-dss",
        summary: "union-find with union by rank",
        estimation: RankedDisjointSetStruct::memory_estimation,
    },
    CatalogEntry {
        name: "incremental-dss",
        summary: "union-find seeded from existing set ids",
        estimation: IncrementalDisjointSetStruct::memory_estimation,
    },
];

/// Every named estimation, in listing order.
pub fn entries() -> &'static [CatalogEntry] {
    ENTRIES
}

/// The entry called `name`.
pub fn lookup(name: &str) -> Option<&'static CatalogEntry> {
    ENTRIES.iter().find(|entry| entry.name == name)
}

fn long_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge long array")
        .per_node("values", HugeLongArray::memory_estimation)
        .build()
}

fn double_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge double array")
        .per_node("values", HugeDoubleArray::memory_estimation)
        .build()
}

fn int_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge int array")
        .per_node("values", HugeIntArray::memory_estimation)
        .build()
}

fn atomic_long_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge atomic long array")
        .per_node("values", HugeAtomicLongArray::memory_estimation)
        .build()
}

fn atomic_double_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge atomic double array")
        .per_node("values", HugeAtomicDoubleArray::memory_estimation)
        .build()
}

fn atomic_byte_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge atomic byte array")
        .per_node("values", HugeAtomicByteArray::memory_estimation)
        .build()
}

fn atomic_bitset() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge atomic bit set")
        .per_node("bits", HugeAtomicBitSet::memory_estimation)
        .build()
}

fn long_array_builder() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge long array builder")
        .fixed("instance", size_of_instance::<HugeArrayBuilder<i64>>())
        .per_node("pages", HugeArrayBuilder::<i64>::memory_estimation)
        .build()
}

fn merge_sort() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge merge sort")
        .per_node("scratch", HugeLongArray::memory_estimation)
        .build()
}

fn sparse_long_array() -> Arc<dyn MemoryEstimation> {
    MemoryEstimations::builder("huge sparse long array")
        .range("pages", |dims, _| {
            let max_id = dims.highest_original_id().saturating_add(1);
            HugeSparseLongArray::memory_estimation(max_id, dims.node_count.min(max_id))
        })
        .build()
}

/// Sums the estimations of `names` into one tree, skipping unknown names.
pub fn combined(description: &str, names: &[&str]) -> Arc<dyn MemoryEstimation> {
    names
        .iter()
        .filter_map(|name| lookup(name))
        .fold(MemoryEstimations::builder(description), |builder, entry| {
            builder.add(entry.estimation())
        })
        .build()
}
