//! Acceleration structure for a single triangle mesh.
//!
//! Triangles are reordered by the BVH build and every leaf gets its triangles copied into one
//! packed [`TrianglePack`], which is what the traversal tests against.

mod packed;

use index_vec::IndexVec;

use crate::geometry::{BoundingSphere, HitRecord, Ray, WorldBox};
use crate::scene::bvh::{Bvh, BvhStatistics, LEAF_MAX_ITEMS, LeafIdx, StackCache};
use crate::scene::primitives::Triangle;

pub use packed::{LANES, TrianglePack};

// A leaf must always fit into a single pack
const _: () = assert!(LANES >= LEAF_MAX_ITEMS);

#[derive(Clone, Debug)]
pub struct TriangleBvh {
    /// In BVH order
    triangles: Vec<Triangle>,
    bvh: Bvh,
    packs: IndexVec<LeafIdx, TrianglePack>,
}

impl TriangleBvh {
    /// Builds the acceleration structure, returns None if there are no triangles.
    pub fn new(mut triangles: Vec<Triangle>) -> Option<TriangleBvh> {
        if triangles.is_empty() {
            return None;
        }

        let bvh = Bvh::build(&mut triangles);
        let packs = bvh
            .leaves()
            .map(|(_, range)| TrianglePack::new(&triangles[range]))
            .collect();

        Some(TriangleBvh {
            triangles,
            bvh,
            packs,
        })
    }

    pub fn triangles(&self) -> &[Triangle] {
        &self.triangles
    }

    pub fn bounding_box(&self) -> WorldBox {
        self.bvh.bounding_box()
    }

    pub fn bounding_sphere(&self) -> BoundingSphere {
        self.bvh.bounding_sphere()
    }

    pub fn statistics(&self) -> BvhStatistics {
        self.bvh.statistics()
    }

    /// Nearest hit, testing whole leaves at once through their packs.
    pub fn intersect(&self, ray: &Ray, stack: &mut StackCache) -> Option<HitRecord> {
        let (t, index) = self.bvh.intersect(ray, stack, |leaf, range, _best_t| {
            self.packs[leaf]
                .intersect(ray)
                .map(|(lane, t)| (t, range.start + lane))
        })?;

        Some(HitRecord {
            t,
            point: ray.point_at(t),
            normal: self.triangles[index].face_normal(),
        })
    }

    /// Nearest hit, testing triangles one by one.
    pub fn intersect_scalar(&self, ray: &Ray, stack: &mut StackCache) -> Option<HitRecord> {
        self.bvh.intersect_primitives(ray, &self.triangles, stack)
    }
}
