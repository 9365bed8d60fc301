use crate::geometry::{FloatType, Ray, WorldBox};

pub trait RayIntersectionExt {
    /// Calculate first and last ray intersection with the box.
    /// Returns None if the ray misses the box or if the box is completely behind the ray origin.
    fn intersect(&self, ray: &Ray) -> Option<(FloatType, FloatType)>;
}

impl RayIntersectionExt for WorldBox {
    /// Slab test using the reciprocal direction of the ray.
    /// Returned minimum distance may be negative if the ray starts inside the box.
    fn intersect(&self, ray: &Ray) -> Option<(FloatType, FloatType)> {
        // Componentwise distances along the ray to the box's min and max corners
        // The multiplication is NAN if the ray is starting inside the slab bounding plane
        // and is parallel to it. In this case we use +-infinity, so that the range becomes infinite
        let to_box_min = (self.min - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::NEG_INFINITY } else { x });
        let to_box_max = (self.max - ray.origin)
            .component_mul(&ray.inv_direction)
            .map(|x| if x.is_nan() { FloatType::INFINITY } else { x });

        // Correctly ordered (min_t <= max_t)
        let componentwise_min_t = to_box_min.zip_map(&to_box_max, FloatType::min);
        let componentwise_max_t = to_box_min.zip_map(&to_box_max, FloatType::max);

        let min_t = componentwise_min_t.max();
        let max_t = componentwise_max_t.min();

        if max_t < 0.0 || max_t < min_t {
            None
        } else {
            Some((min_t, max_t))
        }
    }
}

#[cfg(test)]
pub mod test {
    use assert2::{assert, let_assert};
    use test_case::{test_case, test_matrix};

    use super::*;

    use crate::geometry::{Ray, WorldBox, WorldPoint, WorldVector};

    fn unit_box() -> WorldBox {
        WorldBox::new([5.0, 5.0, 5.0].into(), [10.0, 10.0, 10.0].into())
    }

    /// Checks cases when the ray hits the box, including rays starting on faces, edges and corners.
    /// Rays that only touch the surface are left out, rounding decides those.
    #[test_matrix(
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [5.0, 7.0, 10.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-1.0, 0.0, 2.0],
        [-10.0, -1.0, 0.0]
    )]
    fn hit(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, origin_pos: f32) {
        if dx == 0.0 && dy == 0.0 && dz == 0.0 {
            return;
        }

        let b = unit_box();

        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        if !crosses_interior(&p, &d, &b) {
            return;
        }

        let temp_r = Ray::new(p, d);
        let origin = temp_r.point_at(origin_pos);
        let r = Ray::new(origin, d);

        let_assert!(
            Some((t1, t2)) = b.intersect(&r),
            "The ray passes through the box in front of its origin"
        );
        assert!(t1 <= t2 + 1e-3);

        let p1 = r.point_at(t1);
        let p2 = r.point_at(t2);

        assert!(point_is_on_box_surface(&p1, &b), "{p1:?} must be in {b:?}");
        assert!(point_is_on_box_surface(&p2, &b), "{p2:?} must be in {b:?}");
    }

    /// Just a manual example of ray grazing along an edge.
    #[test]
    fn hit_along_edge() {
        let r = Ray::new(
            WorldPoint::new(5.0, 5.0, 0.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        assert!(unit_box().intersect(&r) == Some((5.0, 10.0)))
    }

    #[test]
    fn box_behind_ray() {
        let r = Ray::new(
            WorldPoint::new(7.0, 7.0, 20.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        assert!(unit_box().intersect(&r) == None);
    }

    #[test]
    fn origin_inside_box() {
        let r = Ray::new(
            WorldPoint::new(7.0, 7.0, 7.0),
            WorldVector::new(0.0, 0.0, 1.0),
        );

        let_assert!(Some((t1, t2)) = unit_box().intersect(&r));
        assert!(t1 < 0.0);
        assert!((t2 - 3.0).abs() < 1e-6);
    }

    /// Rays that lie parallel to one axis and start outside the corresponding slab
    /// must miss, even if they move toward the box on other axes or remain unchanged.
    #[test_case( 0.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "low_x_parallel_miss")]
    #[test_case(12.0,  7.0,  7.0,   0.0, 1.0, 0.0 ; "high_x_parallel_miss")]
    #[test_case( 7.0,  0.0,  7.0,   1.0, 0.0, 0.0 ; "low_y_parallel_miss")]
    #[test_case( 7.0, 12.0,  7.0,   1.0, 0.0, 0.0 ; "high_y_parallel_miss")]
    #[test_case( 7.0,  7.0,  0.0,   1.0, 0.0, 0.0 ; "low_z_parallel_miss")]
    #[test_case( 7.0,  7.0, 12.0,   1.0, 0.0, 0.0 ; "high_z_parallel_miss")]
    #[test_case( 0.0,  5.0,  7.0,   1.0, 0.0, 1.0 ; "corner_miss")]
    #[test_case( 0.0,  0.0,  0.0,  -1.0, 1.0, 1.0 ; "corner_miss2")]
    fn only_misses(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32) {
        let r = Ray::new(WorldPoint::new(px, py, pz), WorldVector::new(dx, dy, dz));

        assert!(unit_box().intersect(&r) == None);
    }

    #[test_case( 7.0, 10.0,  5.0,  -1.0, -1.0, -1.0, false ; "edge_grazing")]
    #[test_case( 7.0, 10.0,  5.0,   1.0,  1.0,  1.0, false ; "edge_grazing_reversed")]
    #[test_case( 5.0,  5.0,  5.0,   1.0, -1.0,  0.0, false ; "corner_grazing")]
    #[test_case( 7.0,  5.0,  7.0,   1.0,  0.0,  0.0, false ; "along_face")]
    #[test_case( 5.0,  5.0,  7.0,   1.0,  1.0,  0.0, true ; "through_edge")]
    #[test_case( 5.0,  5.0,  7.0,  -1.0, -1.0,  1.0, true ; "through_edge_backwards")]
    #[test_case( 7.0,  7.0,  7.0,   0.0,  0.0,  1.0, true ; "from_inside")]
    fn interior_crossing(px: f32, py: f32, pz: f32, dx: f32, dy: f32, dz: f32, expected: bool) {
        let p = WorldPoint::new(px, py, pz);
        let d = WorldVector::new(dx, dy, dz);
        assert!(crosses_interior(&p, &d, &unit_box()) == expected);
    }

    /// Whether the line through `p` along `d` enters the inside of the box, instead of only
    /// touching its faces, edges or corners. `p` is inside the box or on its surface.
    fn crosses_interior(p: &WorldPoint, d: &WorldVector, b: &WorldBox) -> bool {
        // Direction components pointing into the box, for the faces `p` lies on
        let inward: Vec<f32> = (0..3)
            .filter_map(|axis| {
                if p[axis] == b.min[axis] {
                    Some(d[axis])
                } else if p[axis] == b.max[axis] {
                    Some(-d[axis])
                } else {
                    None
                }
            })
            .collect();

        inward.iter().all(|&x| x > 0.0) || inward.iter().all(|&x| x < 0.0)
    }

    fn point_is_on_box_surface(p: &WorldPoint, b: &WorldBox) -> bool {
        const TOLERANCE: f32 = 1e-3;

        let inside = (0..3)
            .all(|axis| p[axis] >= b.min[axis] - TOLERANCE && p[axis] <= b.max[axis] + TOLERANCE);
        let on_face = (0..3).any(|axis| {
            (p[axis] - b.min[axis]).abs() <= TOLERANCE || (p[axis] - b.max[axis]).abs() <= TOLERANCE
        });

        inside && on_face
    }
}
