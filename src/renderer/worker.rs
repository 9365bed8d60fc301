use std::thread;

use rand::{SeedableRng as _, rngs::SmallRng};

use crate::{
    camera::Camera,
    film::Color,
    renderer::machinery::{Shared, Tile},
    scene::{Scene, TraversalCache},
    screen_block::ScreenBlockExt as _,
    shading::Shader,
};

pub struct Worker {
    id: usize,
    traversal_cache: TraversalCache,
    buffer: Vec<Color>,
}

impl Worker {
    pub fn new(id: usize) -> Self {
        Worker {
            id,
            traversal_cache: TraversalCache::default(),
            buffer: Vec::new(),
        }
    }

    /// Pulls tiles until the renderer stops this worker.
    pub fn run(mut self, shared: &Shared) {
        log::debug!("Worker {} started", self.id);
        while let Some(tile) = shared.next_tile(self.id) {
            let _guard = TileGuard { shared, worker_id: self.id };
            let samples = self.render_tile(&shared.scene, &shared.camera, shared.shader.as_ref(), &tile);
            shared.finish_tile(&tile, samples);
        }
        log::debug!("Worker {} stopped", self.id);
    }

    /// Renders one sample of every pixel in the tile, returned in row major order.
    /// The result only depends on the tile, never on which worker renders it.
    pub fn render_tile(&mut self, scene: &Scene, camera: &Camera, shader: &dyn Shader, tile: &Tile) -> &[Color] {
        let mut rng = SmallRng::seed_from_u64(tile.seed);
        self.buffer.clear();

        for point in tile.block.internal_points() {
            let ray = camera.sample_ray(&point, &tile.frame, &mut rng);
            let hit = scene.intersect(&ray, &mut self.traversal_cache);
            self.buffer.push(shader.shade(&ray, hit.as_ref()));
        }

        &self.buffer
    }
}

/// Releases the tile of a worker that panics before finishing it.
struct TileGuard<'a> {
    shared: &'a Shared,
    worker_id: usize,
}

impl Drop for TileGuard<'_> {
    fn drop(&mut self) {
        if thread::panicking() {
            self.shared.abandon_tile(self.worker_id);
        }
    }
}
