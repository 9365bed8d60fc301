mod aabb;
mod ray_box_intersection;
mod transform;

pub use aabb::AABB;
pub use ray_box_intersection::RayIntersectionExt;
pub use transform::{Transform, TransformError};

use nalgebra::{Point2, Point3, Unit, Vector2, Vector3};

pub type FloatType = f32;

/// Tolerance for normalizing user provided vectors.
pub const EPSILON: FloatType = 1e-6;

pub type ScreenPoint = Point2<u32>;
pub type ScreenSize = Vector2<u32>;
pub type ScreenBlock = AABB<ScreenPoint>;

pub type WorldPoint = Point3<FloatType>;
pub type WorldVector = Vector3<FloatType>;
pub type WorldBox = AABB<WorldPoint>;

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Ray {
    pub origin: WorldPoint,
    /// Normalized direction of the ray
    pub direction: Unit<WorldVector>,

    /// Componentwise inverse of the ray direction
    /// Zeros in direction get turned into positive infinity regardless of the sign of the zero
    pub inv_direction: WorldVector,
}

impl Ray {
    pub fn new(origin: WorldPoint, direction: WorldVector) -> Ray {
        let direction = Unit::new_normalize(direction);
        let inv_direction = direction.map(|x| if x == 0.0 { FloatType::INFINITY } else { 1.0 / x });

        Ray {
            origin,
            direction,
            inv_direction,
        }
    }

    pub fn point_at(&self, t: FloatType) -> WorldPoint {
        self.origin + self.direction.as_ref() * t
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct HitRecord {
    /// Distance along the ray
    pub t: FloatType,
    pub point: WorldPoint,
    pub normal: Unit<WorldVector>,
}

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingSphere {
    pub center: WorldPoint,
    pub radius: FloatType,
}

impl BoundingSphere {
    pub fn new(center: WorldPoint, radius: FloatType) -> Self {
        BoundingSphere { center, radius }
    }
}
