use assert2::assert;
use bon::bon;
use nalgebra::Unit;

use crate::geometry::{EPSILON, FloatType, Ray, ScreenPoint, ScreenSize, WorldPoint, WorldVector};

/// Pinhole camera with Z up.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Camera {
    position: WorldPoint,

    forward: Unit<WorldVector>,
    right: Unit<WorldVector>,
    up: WorldVector,

    /// Distance of the image plane for a horizontal half-width of one
    fov_scale: FloatType,
}

#[bon]
impl Camera {
    #[builder]
    pub fn new(
        position: WorldPoint,
        target: WorldPoint,
        /// Horizontal field of view
        #[builder(default = 50.0)]
        fov_degrees: FloatType,
    ) -> Self {
        assert!(
            (target - position).norm() > EPSILON,
            "Camera target must differ from its position"
        );
        assert!(fov_degrees > 0.0 && fov_degrees < 180.0);

        let mut camera = Camera {
            position,
            forward: WorldVector::x_axis(),
            right: WorldVector::y_axis(),
            up: WorldVector::z(),
            fov_scale: 1.0,
        };
        camera.set_fov(fov_degrees);
        camera.aim(&target);
        camera
    }
}

impl Camera {
    pub fn position(&self) -> WorldPoint {
        self.position
    }

    pub fn forward(&self) -> Unit<WorldVector> {
        self.forward
    }

    pub fn set_position(&mut self, position: WorldPoint) {
        self.position = position;
    }

    pub fn set_fov(&mut self, fov_degrees: FloatType) {
        self.fov_scale = 1.0 / (fov_degrees.to_radians() * 0.5).tan();
    }

    /// Turns the camera towards a point. Aiming at the camera position itself is ignored.
    pub fn aim(&mut self, target: &WorldPoint) {
        self.set_direction(&(target - self.position));
    }

    /// Sets the view direction. Zero vectors are ignored.
    pub fn set_direction(&mut self, direction: &WorldVector) {
        let Some(forward) = Unit::try_new(*direction, EPSILON) else {
            return;
        };

        // Looking straight up or down, any horizontal axis will do
        let right = if forward.z.abs() > 0.99999 {
            WorldVector::y_axis()
        } else {
            Unit::new_normalize(forward.cross(&WorldVector::z()))
        };

        self.forward = forward;
        self.right = right;
        self.up = right.cross(forward.as_ref());
    }

    /// Ray through the pixel, offset by `jitter` (both components in [0, 1)) from the pixel's
    /// top left corner.
    pub fn ray(&self, point: &ScreenPoint, resolution: &ScreenSize, jitter: [FloatType; 2]) -> Ray {
        let width = resolution.x as FloatType;
        let height = resolution.y as FloatType;
        let aspect = height / width;

        let xf = 2.0 * ((point.x as FloatType + jitter[0]) / width - 0.5);
        let yf = 2.0 * aspect * ((point.y as FloatType + jitter[1]) / height - 0.5);

        let direction = self.forward.as_ref() * self.fov_scale + self.right.as_ref() * xf - self.up * yf;
        Ray::new(self.position, direction)
    }

    /// Samples a new ray for the pixel with a random sub-pixel offset.
    pub fn sample_ray(&self, point: &ScreenPoint, resolution: &ScreenSize, rng: &mut impl rand::Rng) -> Ray {
        let jitter = [rng.random::<FloatType>(), rng.random::<FloatType>()];
        self.ray(point, resolution, jitter)
    }
}
