use ordered_float::OrderedFloat;

use super::{Bvh, LEAF_MAX_ITEMS, LeafIdx, Node, NodeIdx, NodeKind};
use crate::geometry::{BoundingSphere, FloatType, WorldBox, WorldPoint};
use crate::scene::primitives::Bounded;

impl Bvh {
    /// Builds the hierarchy, reordering `items` in place so that every node covers
    /// a contiguous range of the slice.
    ///
    /// Panics if `items` is empty.
    pub fn build<T: Bounded>(items: &mut [T]) -> Bvh {
        assert!(!items.is_empty(), "Can't build a BVH over an empty slice");

        let mut bvh = Bvh {
            nodes: Default::default(),
            leaf_count: 0,
        };
        bvh.nodes.reserve(2 * items.len().div_ceil(LEAF_MAX_ITEMS));
        bvh.build_recursive(items, 0);
        bvh
    }

    fn build_recursive<T: Bounded>(&mut self, items: &mut [T], offset: usize) -> NodeIdx {
        let bounding_box = enclosing_box(items);
        let bounding_sphere = enclosing_sphere(items);
        let range = offset..offset + items.len();

        if items.len() <= LEAF_MAX_ITEMS {
            let index = LeafIdx::from_usize(self.leaf_count);
            self.leaf_count += 1;
            return self.nodes.push(Node {
                bounding_box,
                bounding_sphere,
                range,
                kind: NodeKind::Leaf { index },
            });
        }

        // Children are filled in once they exist
        let node_index = self.nodes.push(Node {
            bounding_box,
            bounding_sphere,
            range,
            kind: NodeKind::Inner {
                children: [NodeIdx::new(0); 2],
            },
        });

        let axis = bounding_box.longest_axis();
        items.sort_unstable_by_key(|item| OrderedFloat(item.midpoint()[axis]));

        let split = items.len() / 2;
        let (left_items, right_items) = items.split_at_mut(split);
        let left = self.build_recursive(left_items, offset);
        let right = self.build_recursive(right_items, offset + split);

        self.nodes[node_index].kind = NodeKind::Inner {
            children: [left, right],
        };
        node_index
    }
}

fn enclosing_box<T: Bounded>(items: &[T]) -> WorldBox {
    items
        .iter()
        .map(Bounded::bounding_box)
        .reduce(|a, b| a.union(&b))
        .unwrap_or_else(|| unreachable!("Nodes are never empty"))
}

/// Sphere centered at the average item midpoint, large enough to contain all item spheres.
fn enclosing_sphere<T: Bounded>(items: &[T]) -> BoundingSphere {
    let sum = items
        .iter()
        .fold(WorldPoint::origin().coords, |acc, item| acc + item.midpoint().coords);
    let center = WorldPoint::from(sum / items.len() as FloatType);

    let radius = items
        .iter()
        .map(|item| {
            let sphere = item.bounding_sphere();
            (sphere.center - center).norm() + sphere.radius
        })
        .fold(0.0, FloatType::max);

    BoundingSphere::new(center, radius)
}
