use wide::{CmpGt as _, CmpLt as _, f32x8};

use crate::geometry::{FloatType, Ray, WorldVector};
use crate::scene::primitives::{DETERMINANT_EPSILON, Triangle, edges};
use crate::util::bit_iter;

pub const LANES: usize = 8;

type Vector8 = [f32x8; 3];

/// Up to eight triangles stored lane-wise for a vectorized Möller–Trumbore test.
///
/// Uses exactly the same operations in the same order as the scalar `Triangle::intersect`,
/// so both report bitwise identical distances.
#[derive(Clone, Debug)]
pub struct TrianglePack {
    p0: Vector8,
    e1: Vector8,
    e2: Vector8,
    /// Lanes that hold a triangle. Padding lanes are all zero and masked out.
    active: f32x8,
    count: usize,
}

impl TrianglePack {
    /// Panics if there are more triangles than lanes.
    pub fn new(triangles: &[Triangle]) -> TrianglePack {
        assert!(triangles.len() <= LANES, "Too many triangles for one pack");

        let mut p0 = [[0.0; LANES]; 3];
        let mut e1 = [[0.0; LANES]; 3];
        let mut e2 = [[0.0; LANES]; 3];

        for (lane, triangle) in triangles.iter().enumerate() {
            let vertices = triangle.vertices();
            let [edge1, edge2] = edges(vertices);
            for axis in 0..3 {
                p0[axis][lane] = vertices[0][axis];
                e1[axis][lane] = edge1[axis];
                e2[axis][lane] = edge2[axis];
            }
        }

        let lane_index = f32x8::new([0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0]);
        let active = lane_index.cmp_lt(f32x8::splat(triangles.len() as FloatType));

        TrianglePack {
            p0: p0.map(f32x8::new),
            e1: e1.map(f32x8::new),
            e2: e2.map(f32x8::new),
            active,
            count: triangles.len(),
        }
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Nearest hit among the lanes as `(lane, t)`. Ties go to the lower lane.
    pub fn intersect(&self, ray: &Ray) -> Option<(usize, FloatType)> {
        let direction = splat(ray.direction.as_ref());
        let origin = splat(&ray.origin.coords);

        let pvec = cross(&direction, &self.e2);
        let det = dot(&self.e1, &pvec);
        let inv_det = f32x8::ONE / det;

        let tvec = [
            origin[0] - self.p0[0],
            origin[1] - self.p0[1],
            origin[2] - self.p0[2],
        ];
        let u = dot(&tvec, &pvec) * inv_det;

        let qvec = cross(&tvec, &self.e1);
        let v = dot(&direction, &qvec) * inv_det;

        let t = dot(&self.e2, &qvec) * inv_det;

        let zero = f32x8::ZERO;
        let rejected = det.abs().cmp_lt(f32x8::splat(DETERMINANT_EPSILON))
            | u.cmp_lt(zero)
            | v.cmp_lt(zero)
            | (u + v).cmp_gt(f32x8::ONE);
        let accepted = self.active & !rejected & t.cmp_gt(zero);

        let t = t.to_array();
        let mut best: Option<(usize, FloatType)> = None;
        for lane in bit_iter(accepted.move_mask() as u64) {
            if best.is_none_or(|(_, best_t)| t[lane] < best_t) {
                best = Some((lane, t[lane]));
            }
        }
        best
    }
}

fn splat(v: &WorldVector) -> Vector8 {
    [f32x8::splat(v.x), f32x8::splat(v.y), f32x8::splat(v.z)]
}

#[inline(always)]
fn cross(a: &Vector8, b: &Vector8) -> Vector8 {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

#[inline(always)]
fn dot(a: &Vector8, b: &Vector8) -> f32x8 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}
