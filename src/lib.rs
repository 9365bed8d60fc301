pub mod camera;
pub mod film;
pub mod geometry;
pub mod renderer;
pub mod scene;
pub mod screen_block;
pub mod shading;
mod util;

pub use camera::Camera;
pub use film::{Color, Film};
pub use renderer::{Advance, RenderSettings, RenderState, Renderer};
pub use scene::Scene;
