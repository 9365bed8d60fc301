use crate::film::Color;
use crate::geometry::{HitRecord, Ray};

/// Turns the result of a visibility query into a color sample.
pub trait Shader: Send + Sync {
    fn shade(&self, ray: &Ray, hit: Option<&HitRecord>) -> Color;
}

/// Gray level given by how directly the surface faces the ray. Misses are black.
#[derive(Copy, Clone, Debug, Default)]
pub struct FacingRatioShader;

impl Shader for FacingRatioShader {
    fn shade(&self, ray: &Ray, hit: Option<&HitRecord>) -> Color {
        match hit {
            Some(hit) => {
                let facing = ray.direction.dot(&hit.normal).abs();
                Color::new(facing, facing, facing)
            }
            None => Color::default(),
        }
    }
}
