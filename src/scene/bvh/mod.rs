//! Binary bounding volume hierarchy over a slice of bounded items.
//!
//! The hierarchy does not own the items, it only stores index ranges into the slice it was
//! built from. Building reorders the slice in place, so the owner must keep the reordered
//! slice together with the BVH and rebuild both whenever the items change.

mod building;
mod printing;
mod traversal;

use std::ops::Range;

use index_vec::IndexVec;

use crate::geometry::{BoundingSphere, FloatType, HitRecord, WorldBox};

pub use printing::BvhStatistics;
pub use traversal::StackCache;

/// Nodes with at most this many items are not split any further.
pub const LEAF_MAX_ITEMS: usize = 8;

index_vec::define_index_type! {
    pub struct NodeIdx = u32;
}

index_vec::define_index_type! {
    /// Leaves are numbered in the order they were built.
    pub struct LeafIdx = u32;
}

#[derive(Clone, Debug)]
pub struct Bvh {
    /// Root is always the first node.
    nodes: IndexVec<NodeIdx, Node>,
    leaf_count: usize,
}

#[derive(Clone, Debug)]
struct Node {
    bounding_box: WorldBox,
    bounding_sphere: BoundingSphere,
    /// Range of the items covered by this node
    range: Range<usize>,
    kind: NodeKind,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum NodeKind {
    Inner { children: [NodeIdx; 2] },
    Leaf { index: LeafIdx },
}

/// Anything that can be reported as a hit from the traversal.
pub trait HitDistance {
    fn distance(&self) -> FloatType;
}

impl HitDistance for HitRecord {
    fn distance(&self) -> FloatType {
        self.t
    }
}

impl Bvh {
    fn root(&self) -> &Node {
        &self.nodes[NodeIdx::new(0)]
    }

    pub fn bounding_box(&self) -> WorldBox {
        self.root().bounding_box
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.root().bounding_sphere
    }

    /// Number of items the hierarchy was built over.
    pub fn item_count(&self) -> usize {
        self.root().range.end
    }

    pub fn leaf_count(&self) -> usize {
        self.leaf_count
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Item ranges of all leaves, ordered by leaf index.
    pub fn leaves(&self) -> impl Iterator<Item = (LeafIdx, Range<usize>)> + '_ {
        // Leaves are pushed in the same order as they are numbered.
        self.nodes.iter().filter_map(|node| match node.kind {
            NodeKind::Leaf { index } => Some((index, node.range.clone())),
            NodeKind::Inner { .. } => None,
        })
    }
}
