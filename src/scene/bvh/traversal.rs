use std::ops::Range;

use assert2::debug_assert;

use super::{Bvh, HitDistance, LeafIdx, NodeIdx, NodeKind};
use crate::geometry::{FloatType, HitRecord, Ray, RayIntersectionExt as _};
use crate::scene::primitives::Primitive;

/// Scratch space for the traversal, kept between rays to avoid reallocating.
#[derive(Clone, Debug, Default)]
pub struct StackCache {
    /// Nodes waiting to be visited, with the distance where the ray enters them
    stack: Vec<(NodeIdx, FloatType)>,
}

impl StackCache {
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}

impl Bvh {
    /// Finds the nearest hit of the ray.
    ///
    /// `intersect_leaf` is called with the leaf index, the item range of the leaf and the
    /// distance of the best hit so far, and returns the nearest hit among the leaf's items.
    /// Nodes that the ray enters only after the best hit so far are skipped.
    pub fn intersect<H, F>(&self, ray: &Ray, stack: &mut StackCache, mut intersect_leaf: F) -> Option<H>
    where
        H: HitDistance,
        F: FnMut(LeafIdx, Range<usize>, FloatType) -> Option<H>,
    {
        let stack = &mut stack.stack;
        debug_assert!(stack.is_empty());

        let root = NodeIdx::new(0);
        let (root_t, _) = self.nodes[root].bounding_box.intersect(ray)?;
        stack.push((root, root_t));

        let mut best: Option<H> = None;
        let mut best_t = FloatType::INFINITY;

        while let Some((node_index, entry_t)) = stack.pop() {
            if entry_t > best_t {
                continue;
            }

            let node = &self.nodes[node_index];
            match node.kind {
                NodeKind::Leaf { index } => {
                    if let Some(hit) = intersect_leaf(index, node.range.clone(), best_t) {
                        let t = hit.distance();
                        if t < best_t {
                            best_t = t;
                            best = Some(hit);
                        }
                    }
                }
                NodeKind::Inner { children } => {
                    let [left, right] = children.map(|child| {
                        self.nodes[child]
                            .bounding_box
                            .intersect(ray)
                            .map(|(t, _)| (child, t))
                    });
                    match (left, right) {
                        (Some(left), Some(right)) => {
                            // Nearer child goes on top
                            if left.1 <= right.1 {
                                stack.push(right);
                                stack.push(left);
                            } else {
                                stack.push(left);
                                stack.push(right);
                            }
                        }
                        (Some(child), None) | (None, Some(child)) => stack.push(child),
                        (None, None) => {}
                    }
                }
            }
        }

        best
    }

    /// Nearest hit for a BVH built directly over a slice of primitives.
    pub fn intersect_primitives<P: Primitive>(
        &self,
        ray: &Ray,
        primitives: &[P],
        stack: &mut StackCache,
    ) -> Option<HitRecord> {
        let (t, index) = self.intersect(ray, stack, |_leaf, range, _best_t| {
            range
                .filter_map(|i| primitives[i].intersect(ray).map(|t| (t, i)))
                .min_by(|a, b| a.0.total_cmp(&b.0))
        })?;

        let point = ray.point_at(t);
        Some(HitRecord {
            t,
            point,
            normal: primitives[index].normal(&point),
        })
    }
}

impl HitDistance for (FloatType, usize) {
    fn distance(&self) -> FloatType {
        self.0
    }
}
