//! Capacity planning: byte ranges a container needs for a given graph shape.
//!
//! Estimations are computed ahead of time by callers deciding whether a workload fits in
//! memory. Containers never consult them at runtime.

use std::fmt::{self, Write as _};
use std::ops::Add;
use std::sync::Arc;

use serde::Serialize;

use super::usage::human_readable;

/// An inclusive `[min, max]` byte range.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct MemoryRange {
    /// Best-case footprint.
    pub min: usize,
    /// Worst-case footprint.
    pub max: usize,
}

impl MemoryRange {
    /// A range covering exactly `bytes`.
    pub const fn of(bytes: usize) -> Self {
        Self {
            min: bytes,
            max: bytes,
        }
    }

    /// A range from `min` to `max`.
    ///
    /// # Panics
    /// Panics if `min > max`.
    pub fn of_range(min: usize, max: usize) -> Self {
        assert!(min <= max, "range min {min} exceeds max {max}");
        Self { min, max }
    }

    /// The zero range.
    pub const fn empty() -> Self {
        Self::of(0)
    }

    /// Whether both bounds are zero.
    pub fn is_empty(&self) -> bool {
        self.min == 0 && self.max == 0
    }

    /// Scales both bounds by `count`.
    pub fn times(self, count: usize) -> Self {
        Self {
            min: self.min.saturating_mul(count),
            max: self.max.saturating_mul(count),
        }
    }

    /// The smallest range containing both `self` and `other`.
    pub fn union(self, other: Self) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

impl Add for MemoryRange {
    type Output = MemoryRange;

    fn add(self, rhs: Self) -> Self::Output {
        Self {
            min: self.min.saturating_add(rhs.min),
            max: self.max.saturating_add(rhs.max),
        }
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.min == self.max {
            write!(f, "{}", human_readable(self.min))
        } else {
            write!(
                f,
                "[{} ... {}]",
                human_readable(self.min),
                human_readable(self.max)
            )
        }
    }
}

/// Shape of the graph an estimation is computed for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GraphDimensions {
    /// Number of nodes.
    pub node_count: usize,
    /// Number of relationships.
    pub relationship_count: usize,
    /// Highest id before remapping to dense ids; defaults to `node_count - 1`.
    pub highest_original_id: Option<usize>,
}

impl GraphDimensions {
    /// Dimensions for a graph with `node_count` nodes and no relationships.
    pub fn of(node_count: usize) -> Self {
        Self {
            node_count,
            ..Self::default()
        }
    }

    /// Adds a relationship count.
    pub fn with_relationships(mut self, relationship_count: usize) -> Self {
        self.relationship_count = relationship_count;
        self
    }

    /// Adds the highest original id.
    pub fn with_highest_original_id(mut self, id: usize) -> Self {
        self.highest_original_id = Some(id);
        self
    }

    /// The highest original id, falling back to the dense id range.
    pub fn highest_original_id(&self) -> usize {
        self.highest_original_id
            .unwrap_or_else(|| self.node_count.saturating_sub(1))
    }
}

/// A computed estimation with its breakdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MemoryTree {
    /// What the node accounts for.
    pub description: String,
    /// Total range of this node including components.
    pub range: MemoryRange,
    /// Breakdown of the total.
    pub components: Vec<MemoryTree>,
}

impl MemoryTree {
    /// A leaf node.
    pub fn leaf(description: impl Into<String>, range: MemoryRange) -> Self {
        Self {
            description: description.into(),
            range,
            components: Vec::new(),
        }
    }

    /// Renders the tree as indented text, one line per node.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.render_into(&mut out, 0);
        out
    }

    /// Serializes the tree, including every component, as pretty-printed JSON.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    fn render_into(&self, out: &mut String, depth: usize) {
        let _ = writeln!(
            out,
            "{:indent$}{}: {}",
            "",
            self.description,
            self.range,
            indent = depth * 4
        );
        for component in &self.components {
            component.render_into(out, depth + 1);
        }
    }
}

/// Something whose memory footprint can be predicted from graph dimensions.
pub trait MemoryEstimation: Send + Sync {
    /// Short label for the estimated structure.
    fn description(&self) -> String;

    /// Computes the breakdown for `dimensions` when run with `concurrency` workers.
    fn estimate(&self, dimensions: &GraphDimensions, concurrency: usize) -> MemoryTree;
}

type RangeFn = dyn Fn(&GraphDimensions, usize) -> MemoryRange + Send + Sync;

enum Component {
    Range {
        description: String,
        compute: Box<RangeFn>,
    },
    Nested(Arc<dyn MemoryEstimation>),
}

/// Builder for composite estimations.
///
/// ```rust
/// use huge_arrays::mem::{GraphDimensions, MemoryEstimation, MemoryEstimations};
///
/// let estimation = MemoryEstimations::builder("scores")
///     .fixed("header", 64)
///     .per_node("values", |nodes| nodes * 8)
///     .build();
/// let tree = estimation.estimate(&GraphDimensions::of(100), 1);
/// assert_eq!(tree.range.min, 864);
/// ```
pub struct MemoryEstimations {
    description: String,
    components: Vec<Component>,
}

impl MemoryEstimations {
    /// Starts a composite estimation.
    pub fn builder(description: impl Into<String>) -> Self {
        Self {
            description: description.into(),
            components: Vec::new(),
        }
    }

    /// Adds a constant component.
    pub fn fixed(self, description: impl Into<String>, bytes: usize) -> Self {
        self.range(description, move |_, _| MemoryRange::of(bytes))
    }

    /// Adds a component depending only on the node count.
    pub fn per_node<F>(self, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(usize) -> usize + Send + Sync + 'static,
    {
        self.range(description, move |dims, _| MemoryRange::of(f(dims.node_count)))
    }

    /// Adds a component depending only on the relationship count.
    pub fn per_relationship<F>(self, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(usize) -> usize + Send + Sync + 'static,
    {
        self.range(description, move |dims, _| {
            MemoryRange::of(f(dims.relationship_count))
        })
    }

    /// Adds a component computed from the full dimensions and concurrency.
    pub fn range<F>(mut self, description: impl Into<String>, f: F) -> Self
    where
        F: Fn(&GraphDimensions, usize) -> MemoryRange + Send + Sync + 'static,
    {
        self.components.push(Component::Range {
            description: description.into(),
            compute: Box::new(f),
        });
        self
    }

    /// Adds a nested estimation.
    pub fn add(mut self, estimation: Arc<dyn MemoryEstimation>) -> Self {
        self.components.push(Component::Nested(estimation));
        self
    }

    /// Finishes the builder.
    pub fn build(self) -> Arc<dyn MemoryEstimation> {
        Arc::new(CompositeEstimation {
            description: self.description,
            components: self.components,
        })
    }
}

struct CompositeEstimation {
    description: String,
    components: Vec<Component>,
}

impl MemoryEstimation for CompositeEstimation {
    fn description(&self) -> String {
        self.description.clone()
    }

    fn estimate(&self, dimensions: &GraphDimensions, concurrency: usize) -> MemoryTree {
        let components: Vec<MemoryTree> = self
            .components
            .iter()
            .map(|component| match component {
                Component::Range {
                    description,
                    compute,
                } => MemoryTree::leaf(description.clone(), compute(dimensions, concurrency)),
                Component::Nested(nested) => nested.estimate(dimensions, concurrency),
            })
            .collect();
        let range = components
            .iter()
            .fold(MemoryRange::empty(), |acc, c| acc + c.range);
        MemoryTree {
            description: self.description.clone(),
            range,
            components,
        }
    }
}
