use nalgebra::Unit;

use crate::geometry::{BoundingSphere, FloatType, Ray, WorldBox, WorldPoint, WorldVector};

/// Triangles with determinant smaller than this are considered parallel to the ray.
pub const DETERMINANT_EPSILON: FloatType = 1e-9;

/// Anything that can be placed into a BVH.
pub trait Bounded {
    fn bounding_box(&self) -> WorldBox;
    fn bounding_sphere(&self) -> BoundingSphere;
    /// Point used for sorting the items when building the hierarchy.
    fn midpoint(&self) -> WorldPoint;
}

pub trait Primitive: Bounded {
    /// Distance along the ray to the nearest intersection.
    /// Only intersections strictly in front of the ray origin are reported.
    fn intersect(&self, ray: &Ray) -> Option<FloatType>;

    /// Surface normal at a point on the primitive
    fn normal(&self, point: &WorldPoint) -> Unit<WorldVector>;
}

#[derive(Clone, Debug, PartialEq)]
pub struct Triangle {
    vertices: [WorldPoint; 3],
    normal: Unit<WorldVector>,
    bounding_box: WorldBox,
    midpoint: WorldPoint,
}

impl Triangle {
    pub fn new(a: WorldPoint, b: WorldPoint, c: WorldPoint) -> Triangle {
        let vertices = [a, b, c];
        let [e1, e2] = edges(&vertices);
        // Degenerate triangles never report a hit, any normal will do for them.
        let normal = Unit::try_new(e1.cross(&e2), 0.0).unwrap_or_else(WorldVector::z_axis);
        let bounding_box = WorldBox::from_points(&vertices)
            .unwrap_or_else(|| unreachable!("Triangle always has vertices"));
        let midpoint = WorldPoint::from((a.coords + b.coords + c.coords) / 3.0);

        Triangle {
            vertices,
            normal,
            bounding_box,
            midpoint,
        }
    }

    pub fn vertices(&self) -> &[WorldPoint; 3] {
        &self.vertices
    }

    pub fn face_normal(&self) -> Unit<WorldVector> {
        self.normal
    }
}

/// Edge vectors, coming from the first vertex
pub fn edges(vertices: &[WorldPoint; 3]) -> [WorldVector; 2] {
    [vertices[1] - vertices[0], vertices[2] - vertices[0]]
}

/// Cross product with a fixed evaluation order, shared with the packed triangle test.
#[inline(always)]
pub(crate) fn cross(a: &WorldVector, b: &WorldVector) -> WorldVector {
    WorldVector::new(
        a.y * b.z - a.z * b.y,
        a.z * b.x - a.x * b.z,
        a.x * b.y - a.y * b.x,
    )
}

/// Dot product with a fixed evaluation order, shared with the packed triangle test.
#[inline(always)]
pub(crate) fn dot(a: &WorldVector, b: &WorldVector) -> FloatType {
    a.x * b.x + a.y * b.y + a.z * b.z
}

impl Bounded for Triangle {
    fn bounding_box(&self) -> WorldBox {
        self.bounding_box
    }

    fn bounding_sphere(&self) -> BoundingSphere {
        let radius = self
            .vertices
            .iter()
            .map(|v| (v - self.midpoint).norm())
            .fold(0.0, FloatType::max);
        BoundingSphere::new(self.midpoint, radius)
    }

    fn midpoint(&self) -> WorldPoint {
        self.midpoint
    }
}

impl Primitive for Triangle {
    /// Two sided Möller–Trumbore intersection.
    fn intersect(&self, ray: &Ray) -> Option<FloatType> {
        let [e1, e2] = edges(&self.vertices);
        let direction = ray.direction.into_inner();

        let pvec = cross(&direction, &e2);
        let det = dot(&e1, &pvec);
        if det.abs() < DETERMINANT_EPSILON {
            return None;
        }
        let inv_det = 1.0 / det;

        let tvec = ray.origin - self.vertices[0];
        let u = dot(&tvec, &pvec) * inv_det;

        let qvec = cross(&tvec, &e1);
        let v = dot(&direction, &qvec) * inv_det;

        if u < 0.0 || v < 0.0 || u + v > 1.0 {
            return None;
        }

        let t = dot(&e2, &qvec) * inv_det;
        (t > 0.0).then_some(t)
    }

    fn normal(&self, _point: &WorldPoint) -> Unit<WorldVector> {
        self.normal
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Sphere {
    pub center: WorldPoint,
    pub radius: FloatType,
}

impl Sphere {
    pub fn new(center: WorldPoint, radius: FloatType) -> Sphere {
        Sphere { center, radius }
    }
}

impl Bounded for Sphere {
    fn bounding_box(&self) -> WorldBox {
        let r_vec = WorldVector::repeat(self.radius);
        WorldBox {
            min: self.center - r_vec,
            max: self.center + r_vec,
        }
    }

    fn bounding_sphere(&self) -> BoundingSphere {
        BoundingSphere::new(self.center, self.radius)
    }

    fn midpoint(&self) -> WorldPoint {
        self.center
    }
}

impl Primitive for Sphere {
    /// Returns the near root, or the far one if the ray starts inside the sphere.
    fn intersect(&self, ray: &Ray) -> Option<FloatType> {
        let oc = ray.origin - self.center;
        let b = oc.dot(ray.direction.as_ref());
        let c = oc.dot(&oc) - self.radius * self.radius;
        let discriminant = b * b - c;

        if discriminant < 0.0 {
            return None;
        }

        let sqrt_disc = discriminant.sqrt();
        let t1 = -b - sqrt_disc;
        let t2 = -b + sqrt_disc;
        if t1 > 0.0 {
            Some(t1)
        } else if t2 > 0.0 {
            Some(t2)
        } else {
            None
        }
    }

    fn normal(&self, point: &WorldPoint) -> Unit<WorldVector> {
        Unit::new_normalize(point - self.center)
    }
}
