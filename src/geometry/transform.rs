use nalgebra::{Matrix3, Matrix4, Unit, UnitQuaternion};
use thiserror::Error;

use crate::geometry::{
    BoundingSphere, EPSILON, FloatType, HitRecord, Ray, WorldBox, WorldPoint, WorldVector,
};

/// Local to world transform of an object.
///
/// Directions are only rotated, never scaled: the rotation is decomposed from the linear part
/// of the matrix with the scale removed. This is exact for rotations, translations and
/// uniform scale, but does not handle non-uniform scale or shear.
#[derive(Clone, Debug, PartialEq)]
pub struct Transform {
    matrix: Matrix4<FloatType>,
    inverse: Matrix4<FloatType>,
    rotation: UnitQuaternion<FloatType>,
    inverse_rotation: UnitQuaternion<FloatType>,
}

#[derive(Debug, Error, PartialEq)]
pub enum TransformError {
    #[error("Transform matrix is not invertible")]
    Singular,
}

impl Transform {
    pub fn new(matrix: Matrix4<FloatType>) -> Result<Self, TransformError> {
        let inverse = matrix.try_inverse().ok_or(TransformError::Singular)?;

        let mut linear: Matrix3<FloatType> = matrix.fixed_view::<3, 3>(0, 0).into_owned();
        for mut column in linear.column_iter_mut() {
            let norm = column.norm();
            if norm < EPSILON {
                return Err(TransformError::Singular);
            }
            column /= norm;
        }
        let rotation = UnitQuaternion::from_matrix(&linear);

        Ok(Transform {
            matrix,
            inverse,
            rotation,
            inverse_rotation: rotation.inverse(),
        })
    }

    pub fn identity() -> Self {
        Transform {
            matrix: Matrix4::identity(),
            inverse: Matrix4::identity(),
            rotation: UnitQuaternion::identity(),
            inverse_rotation: UnitQuaternion::identity(),
        }
    }

    pub fn from_translation(translation: WorldVector) -> Self {
        Transform {
            matrix: Matrix4::new_translation(&translation),
            inverse: Matrix4::new_translation(&-translation),
            rotation: UnitQuaternion::identity(),
            inverse_rotation: UnitQuaternion::identity(),
        }
    }

    pub fn matrix(&self) -> &Matrix4<FloatType> {
        &self.matrix
    }

    pub fn rotation(&self) -> &UnitQuaternion<FloatType> {
        &self.rotation
    }

    pub fn world_to_local_point(&self, p: &WorldPoint) -> WorldPoint {
        self.inverse.transform_point(p)
    }

    pub fn local_to_world_point(&self, p: &WorldPoint) -> WorldPoint {
        self.matrix.transform_point(p)
    }

    pub fn world_to_local_direction(&self, v: &WorldVector) -> WorldVector {
        self.inverse_rotation * v
    }

    pub fn local_to_world_direction(&self, v: &WorldVector) -> WorldVector {
        self.rotation * v
    }

    pub fn world_to_local_ray(&self, ray: &Ray) -> Ray {
        Ray::new(
            self.world_to_local_point(&ray.origin),
            self.world_to_local_direction(&ray.direction),
        )
    }

    /// Maps a hit found in local space back to the world.
    /// Distance is measured along the world ray, so that hits from differently scaled
    /// objects stay comparable.
    pub fn local_to_world_hit(&self, world_ray: &Ray, local_hit: &HitRecord) -> HitRecord {
        let point = self.local_to_world_point(&local_hit.point);
        let normal = Unit::new_normalize(self.local_to_world_direction(&local_hit.normal));
        HitRecord {
            t: (point - world_ray.origin).dot(world_ray.direction.as_ref()),
            point,
            normal,
        }
    }

    /// Box in world space enclosing the transformed local box.
    pub fn local_to_world_box(&self, local_box: &WorldBox) -> WorldBox {
        let corners = local_box.corners().map(|c| self.local_to_world_point(&c));
        WorldBox::from_points(&corners).unwrap_or_else(|| unreachable!("Box has eight corners"))
    }

    pub fn local_to_world_sphere(&self, local_sphere: &BoundingSphere) -> BoundingSphere {
        BoundingSphere {
            center: self.local_to_world_point(&local_sphere.center),
            radius: local_sphere.radius * self.max_scale(),
        }
    }

    /// Largest length of the images of the local unit axes.
    fn max_scale(&self) -> FloatType {
        self.matrix
            .fixed_view::<3, 3>(0, 0)
            .column_iter()
            .map(|c| c.norm())
            .fold(0.0, FloatType::max)
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::identity()
    }
}
