use std::fmt::Display;

use super::{Bvh, NodeIdx, NodeKind};
use crate::util::Stats;

#[derive(Clone, Debug, PartialEq)]
pub struct BvhStatistics {
    pub node_count: usize,
    pub leaf_count: usize,
    /// Depth of leaves, root has depth 1
    pub depth: Stats,
    pub leaf_size: Stats,
}

impl Bvh {
    pub fn statistics(&self) -> BvhStatistics {
        let mut leaf_size = Stats::default();
        leaf_size.add_samples(self.leaves().map(|(_, range)| range.len()));

        BvhStatistics {
            node_count: self.node_count(),
            leaf_count: self.leaf_count(),
            depth: self.depth_statistics_recursive(NodeIdx::new(0)),
            leaf_size,
        }
    }

    pub fn log_statistics(&self, name: &str) {
        let stats = self.statistics();
        log::info!("{name} BVH: {stats}");
    }

    /// Dumps the node tree on trace level.
    pub fn log_tree(&self) {
        if log::log_enabled!(log::Level::Trace) {
            self.log_recursive(0, NodeIdx::new(0));
        }
    }

    fn depth_statistics_recursive(&self, node: NodeIdx) -> Stats {
        match self.nodes[node].kind {
            NodeKind::Leaf { .. } => Stats::new_single(1),
            NodeKind::Inner { children: [left, right] } => self
                .depth_statistics_recursive(left)
                .merge(&self.depth_statistics_recursive(right))
                .offset(1),
        }
    }

    fn log_recursive(&self, indent: usize, node_index: NodeIdx) {
        let node = &self.nodes[node_index];
        let label = match node.kind {
            NodeKind::Leaf { index } => format!("L{}", index.index()),
            NodeKind::Inner { .. } => format!("I{}", node_index.index()),
        };
        log::trace!(
            "{}- {label} {:?}: {:?}-{:?}",
            "  ".repeat(indent),
            node.range,
            node.bounding_box.min,
            node.bounding_box.max,
        );

        if let NodeKind::Inner { children } = node.kind {
            for child in children {
                self.log_recursive(indent + 1, child);
            }
        }
    }
}

impl Display for BvhStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} nodes, {} leaves; depth {} - {}, avg {:.1}; leaf size {}",
            self.node_count,
            self.leaf_count,
            self.depth.min,
            self.depth.max,
            self.depth.avg,
            self.leaf_size
        )
    }
}
