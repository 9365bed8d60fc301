use std::{
    collections::VecDeque,
    sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError},
    thread::{self, JoinHandle},
};

use assert2::assert;

use crate::{
    camera::Camera,
    film::{Color, Film},
    geometry::{FloatType, ScreenBlock, ScreenPoint, ScreenSize},
    renderer::{RenderSettings, RenderState, worker::Worker},
    scene::Scene,
    screen_block::ScreenBlockExt as _,
    shading::{FacingRatioShader, Shader},
};

/// Unit of work: one sample of every pixel in a block.
#[derive(Clone, Debug)]
pub struct Tile {
    pub block: ScreenBlock,
    /// Resolution of the whole frame
    pub frame: ScreenSize,
    /// Seed of the jitter of this tile in this pass
    pub seed: u64,
}

/// Outcome of [`Renderer::advance_to_next_sample`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Advance {
    /// Tiles of the current pass are still queued or being rendered
    Pending,
    /// Sample budget is met, rendering was paused
    Finished,
    /// Tiles of a new pass were queued, carries the number of the pass
    Started(u32),
}

struct Schedule {
    settings: RenderSettings,
    frame: ScreenSize,

    state: RenderState,
    worker_states: Vec<RenderState>,

    queue: VecDeque<Tile>,
    /// Number of passes queued since the last reset
    pass: u32,
    in_flight: usize,
    finished_tiles: usize,
    total_tiles: usize,
    /// A worker died while rendering a tile, the current pass can't complete until a reset
    worker_panicked: bool,
}

impl Schedule {
    fn is_pass_complete(&self) -> bool {
        self.queue.is_empty() && self.in_flight == 0 && !self.worker_panicked
    }

    fn is_budget_met(&self) -> bool {
        !self.settings.continuous && self.pass >= self.settings.sample_budget
    }

    fn set_state(&mut self, state: RenderState) {
        self.state = state;
        self.worker_states.fill(state);
    }

    /// Whether waiting for the current pass can ever end
    fn can_progress(&self) -> bool {
        if self.worker_panicked {
            return false;
        }
        self.in_flight > 0 || (self.state == RenderState::Rendering && !self.worker_states.is_empty())
    }
}

/// Everything the workers see.
pub struct Shared {
    pub scene: Scene,
    pub camera: Camera,
    pub shader: Box<dyn Shader>,

    film: Mutex<Film>,
    schedule: Mutex<Schedule>,
    /// Tiles were queued or worker states changed
    wake: Condvar,
    /// A tile finished or rendering paused
    idle: Condvar,
}

impl Shared {
    fn schedule(&self) -> MutexGuard<'_, Schedule> {
        self.schedule.lock().expect("Poisoned lock!")
    }

    fn film(&self) -> MutexGuard<'_, Film> {
        self.film.lock().expect("Poisoned lock!")
    }

    /// Blocks until there is a tile for the worker to render.
    /// Returns None once the worker is stopped.
    pub fn next_tile(&self, worker_id: usize) -> Option<Tile> {
        let mut schedule = self.schedule();
        loop {
            match schedule.worker_states[worker_id] {
                RenderState::Stopped => return None,
                RenderState::Rendering => {
                    if let Some(tile) = schedule.queue.pop_front() {
                        schedule.in_flight += 1;
                        return Some(tile);
                    }
                }
                RenderState::Paused => {}
            }
            schedule = self.wake.wait(schedule).expect("Poisoned lock!");
        }
    }

    /// Accumulates a rendered tile into the film.
    pub fn finish_tile(&self, tile: &Tile, samples: &[Color]) {
        self.film().splat_block(&tile.block, samples);

        let mut schedule = self.schedule();
        schedule.in_flight -= 1;
        schedule.finished_tiles += 1;
        if schedule.in_flight == 0 {
            self.idle.notify_all();
        }
    }

    /// Gives up the tile of a worker that is unwinding. The worker is gone for good and the pass
    /// it was rendering can't complete.
    pub fn abandon_tile(&self, worker_id: usize) {
        let mut schedule = self.schedule.lock().unwrap_or_else(PoisonError::into_inner);
        schedule.in_flight -= 1;
        schedule.worker_states[worker_id] = RenderState::Stopped;
        schedule.worker_panicked = true;
        drop(schedule);

        log::error!("Worker {worker_id} panicked while rendering a tile");
        self.idle.notify_all();
    }
}

/// Progressive renderer: a pool of worker threads sampling the scene tile by tile, pass by pass,
/// into an accumulating film.
///
/// Passes are driven from the outside: once [`Renderer::wait_for_pass`] reports a complete
/// pass, [`Renderer::advance_to_next_sample`] queues the next one or pauses when the sample
/// budget is met.
pub struct Renderer {
    shared: Arc<Shared>,
    threads: Vec<JoinHandle<()>>,
}

impl Renderer {
    pub fn new(scene: Scene, camera: Camera, resolution: ScreenSize, settings: RenderSettings) -> Renderer {
        assert!(settings.tile_size > 0, "Tile size must be positive");

        Renderer {
            shared: Arc::new(Shared {
                scene,
                camera,
                shader: Box::new(FacingRatioShader),
                film: Mutex::new(Film::new(resolution.x, resolution.y)),
                schedule: Mutex::new(Schedule {
                    settings,
                    frame: resolution,
                    state: RenderState::Stopped,
                    worker_states: Vec::new(),
                    queue: VecDeque::new(),
                    pass: 0,
                    in_flight: 0,
                    finished_tiles: 0,
                    total_tiles: 0,
                    worker_panicked: false,
                }),
                wake: Condvar::new(),
                idle: Condvar::new(),
            }),
            threads: Vec::new(),
        }
    }

    /// Sets all workers rendering, spawning new ones until there are `thread_count` of them.
    /// Workers are never removed here.
    ///
    /// Does nothing for zero threads, or when the sample budget is met and the last pass is
    /// complete. A scene that changed since its last setup is set up first.
    /// Fails after a worker panicked, until the next reset.
    pub fn start(&mut self, thread_count: usize) -> anyhow::Result<()> {
        if thread_count == 0 {
            return Ok(());
        }

        if let Some(shared) = Arc::get_mut(&mut self.shared) {
            if shared.scene.is_dirty() {
                shared.scene.setup();
            }
        }

        let pin_threads = {
            let mut schedule = self.shared.schedule();
            if schedule.worker_panicked {
                anyhow::bail!("A worker thread panicked, the renderer has to be reset");
            }
            if schedule.is_budget_met() && schedule.is_pass_complete() {
                log::debug!("Sample budget met, not starting");
                return Ok(());
            }
            schedule.set_state(RenderState::Rendering);
            schedule.settings.pin_threads
        };
        self.shared.wake.notify_all();

        let cores = if pin_threads {
            let cores = core_affinity::get_core_ids().filter(|cores| !cores.is_empty());
            if cores.is_none() {
                log::warn!("CPU list not available, worker threads will not be pinned");
            }
            cores
        } else {
            None
        };

        for worker_id in self.threads.len()..thread_count {
            self.shared.schedule().worker_states.push(RenderState::Rendering);

            let shared = Arc::clone(&self.shared);
            let core = cores.as_ref().map(|cores| cores[worker_id % cores.len()]);
            let spawned = thread::Builder::new()
                .name(format!("worker{worker_id}"))
                .spawn(move || {
                    if let Some(core) = core {
                        if !core_affinity::set_for_current(core) {
                            log::warn!("Failed to pin worker {worker_id} to core {}", core.id);
                        }
                    }
                    Worker::new(worker_id).run(&shared);
                });

            match spawned {
                Ok(handle) => self.threads.push(handle),
                Err(e) => {
                    self.shared.schedule().worker_states.pop();
                    return Err(e.into());
                }
            }
        }

        log::debug!("Rendering with {} workers", self.threads.len());
        Ok(())
    }

    /// Pauses all workers. Tiles that are being rendered still finish and get accumulated.
    pub fn pause(&self) {
        self.shared.schedule().set_state(RenderState::Paused);
        self.shared.wake.notify_all();
        self.shared.idle.notify_all();
        log::debug!("Render paused");
    }

    /// Stops and joins all workers, drops queued tiles and clears the film.
    pub fn reset(&mut self) {
        self.stop_workers();

        {
            let mut schedule = self.shared.schedule();
            schedule.worker_states.clear();
            schedule.queue.clear();
            schedule.pass = 0;
            schedule.in_flight = 0;
            schedule.finished_tiles = 0;
            schedule.total_tiles = 0;
            schedule.worker_panicked = false;
        }
        self.shared.film().clear();
        log::debug!("Render reset");
    }

    fn stop_workers(&mut self) {
        self.shared.schedule().set_state(RenderState::Stopped);
        self.shared.wake.notify_all();

        for handle in self.threads.drain(..) {
            if handle.join().is_err() {
                log::error!("Worker thread panicked");
            }
        }
        self.shared.idle.notify_all();
    }

    /// Queues tiles of the next pass once the current one is complete.
    /// Pauses instead if sampling is not continuous and the sample budget is met.
    pub fn advance_to_next_sample(&self) -> Advance {
        let mut schedule = self.shared.schedule();
        if !schedule.is_pass_complete() {
            return Advance::Pending;
        }

        if schedule.is_budget_met() {
            if schedule.state == RenderState::Rendering {
                schedule.set_state(RenderState::Paused);
                log::debug!("Sample budget of {} met, pausing", schedule.settings.sample_budget);
            }
            drop(schedule);
            self.shared.idle.notify_all();
            return Advance::Finished;
        }

        schedule.pass += 1;
        let pass = schedule.pass;
        let frame = schedule.frame;
        let seed = schedule.settings.seed;
        let tiles = ScreenBlock::new(ScreenPoint::origin(), ScreenPoint::from(frame))
            .tiles(schedule.settings.tile_size)
            .map(|block| Tile {
                seed: tile_seed(seed, pass, &block.min),
                block,
                frame,
            });
        schedule.queue.extend(tiles);
        schedule.total_tiles = schedule.queue.len();
        schedule.finished_tiles = 0;
        let total = schedule.total_tiles;
        drop(schedule);

        self.shared.wake.notify_all();
        log::debug!("Pass {pass} queued with {total} tiles");
        Advance::Started(pass)
    }

    /// Blocks until the current pass is complete or until it can't progress any more
    /// because the renderer is not rendering or a worker panicked. Returns whether the pass
    /// is complete.
    pub fn wait_for_pass(&self) -> bool {
        let schedule = self.shared.schedule();
        let schedule = self
            .shared
            .idle
            .wait_while(schedule, |schedule| {
                !schedule.is_pass_complete() && schedule.can_progress()
            })
            .expect("Poisoned lock!");
        schedule.is_pass_complete()
    }

    /// Changes the resolution. Resets the render.
    pub fn resize(&mut self, width: u32, height: u32) {
        self.reset();
        self.shared.schedule().frame = ScreenSize::new(width, height);
        self.shared.film().resize(width, height);
    }

    pub fn set_sample_budget(&self, sample_budget: u32) {
        self.shared.schedule().settings.sample_budget = sample_budget;
    }

    pub fn set_continuous(&self, continuous: bool) {
        self.shared.schedule().settings.continuous = continuous;
    }

    pub fn settings(&self) -> RenderSettings {
        self.shared.schedule().settings
    }

    pub fn scene(&self) -> &Scene {
        &self.shared.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.shared.camera
    }

    /// Scene access for modifications, only while there are no workers (after a reset).
    pub fn scene_mut(&mut self) -> Option<&mut Scene> {
        self.shared_mut().map(|shared| &mut shared.scene)
    }

    /// Replaces the camera, only while there are no workers. Returns whether it was replaced.
    pub fn set_camera(&mut self, camera: Camera) -> bool {
        self.shared_mut().map(|shared| shared.camera = camera).is_some()
    }

    /// Replaces the shader, only while there are no workers. Returns whether it was replaced.
    pub fn set_shader(&mut self, shader: impl Shader + 'static) -> bool {
        self.shared_mut().map(|shared| shared.shader = Box::new(shader)).is_some()
    }

    fn shared_mut(&mut self) -> Option<&mut Shared> {
        if self.threads.is_empty() {
            Arc::get_mut(&mut self.shared)
        } else {
            None
        }
    }

    pub fn state(&self) -> RenderState {
        self.shared.schedule().state
    }

    pub fn state_str(&self) -> &'static str {
        self.state().as_str()
    }

    pub fn thread_count(&self) -> usize {
        self.threads.len()
    }

    /// Number of complete passes since the last reset.
    pub fn samples_done(&self) -> u32 {
        let schedule = self.shared.schedule();
        if schedule.is_pass_complete() {
            schedule.pass
        } else {
            schedule.pass - 1
        }
    }

    /// Finished and total tiles of the current pass.
    pub fn pass_progress(&self) -> (usize, usize) {
        let schedule = self.shared.schedule();
        (schedule.finished_tiles, schedule.total_tiles)
    }

    pub fn film(&self) -> MutexGuard<'_, Film> {
        self.shared.film()
    }

    /// Exposure scaled RGBA bytes of the film, `width * height * 4` long.
    pub fn film_rgba(&self, exposure: FloatType) -> Vec<u8> {
        self.shared.film().to_rgba_bytes(exposure)
    }
}

impl Drop for Renderer {
    fn drop(&mut self) {
        self.stop_workers();
    }
}

fn tile_seed(seed: u64, pass: u32, origin: &ScreenPoint) -> u64 {
    let position = (u64::from(origin.x) << 32) | u64::from(origin.y);
    seed ^ u64::from(pass).wrapping_mul(0x9e37_79b9_7f4a_7c15) ^ position.wrapping_mul(0xbf58_476d_1ce4_e5b9)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::{HitRecord, Ray, WorldPoint};
    use crate::scene::object::Mesh;
    use crate::scene::primitives::test::unit_triangle;
    use crate::scene::triangle_bvh::test::grid;
    use assert2::{assert, let_assert};

    fn camera() -> Camera {
        Camera::builder()
            .position(WorldPoint::new(0.0, 0.0, -5.0))
            .target(WorldPoint::origin())
            .build()
    }

    fn grid_renderer(size: u32, settings: RenderSettings) -> Renderer {
        let mut scene = Scene::new();
        scene.add_mesh(Mesh::new("grid", grid(4)));
        let camera = Camera::builder()
            .position(WorldPoint::new(2.0, -3.0, 6.0))
            .target(WorldPoint::new(2.0, 2.0, 0.0))
            .build();
        Renderer::new(scene, camera, ScreenSize::new(size, size), settings)
    }

    struct PanickingShader;

    impl Shader for PanickingShader {
        fn shade(&self, _ray: &Ray, _hit: Option<&HitRecord>) -> Color {
            panic!("Shader failed");
        }
    }

    /// Keeps queueing passes until the sample budget is met.
    fn render_to_completion(renderer: &Renderer) {
        loop {
            assert!(renderer.wait_for_pass());
            match renderer.advance_to_next_sample() {
                Advance::Finished => break,
                Advance::Started(_) => {}
                Advance::Pending => panic!("Pass reported complete but still pending"),
            }
        }
    }

    #[test]
    fn single_pixel_single_sample() {
        let mut scene = Scene::new();
        scene.add_mesh(Mesh::new("triangle", vec![unit_triangle()]));
        let settings = RenderSettings::builder().sample_budget(1).build();
        let mut renderer = Renderer::new(scene, camera(), ScreenSize::new(1, 1), settings);

        let_assert!(Ok(()) = renderer.start(1));
        assert!(!renderer.scene().is_dirty());
        render_to_completion(&renderer);

        assert!(renderer.samples_done() == 1);
        assert!(renderer.state() == RenderState::Paused);
        let film = renderer.film();
        assert!(film.sample_count(0, 0) == 1);
        assert!(film.get(0, 0, 1.0) == film.sum(0, 0));
    }

    #[test]
    fn square_frame_pass_has_four_tiles() {
        let settings = RenderSettings::builder().tile_size(32).build();
        let renderer = grid_renderer(64, settings);

        assert!(renderer.advance_to_next_sample() == Advance::Started(1));
        assert!(renderer.pass_progress() == (0, 4));
        // Nobody renders the tiles
        assert!(renderer.advance_to_next_sample() == Advance::Pending);
        assert!(renderer.samples_done() == 0);
        assert!(!renderer.wait_for_pass());
    }

    #[test]
    fn reset_is_idempotent() {
        let mut renderer = grid_renderer(40, RenderSettings::builder().tile_size(8).build());
        let_assert!(Ok(()) = renderer.start(2));
        assert!(renderer.wait_for_pass());
        renderer.advance_to_next_sample();

        renderer.reset();
        renderer.reset();

        assert!(renderer.state() == RenderState::Stopped);
        assert!(renderer.thread_count() == 0);
        assert!(renderer.samples_done() == 0);
        assert!(renderer.pass_progress() == (0, 0));
        assert!(*renderer.film() == Film::new(40, 40));
    }

    #[test]
    fn pause_and_resume_matches_uninterrupted_render() {
        let settings = RenderSettings::builder().tile_size(8).sample_budget(3).seed(42).build();

        let mut uninterrupted = grid_renderer(48, settings);
        let_assert!(Ok(()) = uninterrupted.start(2));
        render_to_completion(&uninterrupted);

        let mut interrupted = grid_renderer(48, settings);
        let_assert!(Ok(()) = interrupted.start(2));
        loop {
            interrupted.pause();
            interrupted.wait_for_pass();
            let_assert!(Ok(()) = interrupted.start(3));
            assert!(interrupted.wait_for_pass());
            if interrupted.advance_to_next_sample() == Advance::Finished {
                break;
            }
        }

        assert!(interrupted.samples_done() == 3);
        assert!(uninterrupted.samples_done() == 3);
        assert!(*interrupted.film() == *uninterrupted.film());
    }

    #[test]
    fn different_seeds_differ() {
        let render = |seed| {
            let mut renderer = grid_renderer(16, RenderSettings::builder().sample_budget(1).seed(seed).build());
            let_assert!(Ok(()) = renderer.start(1));
            render_to_completion(&renderer);
            renderer.film_rgba(1.0)
        };
        assert!(render(1) == render(1));
        assert!(render(1) != render(2));
    }

    #[test]
    fn budget_stops_sampling() {
        let mut renderer = grid_renderer(16, RenderSettings::builder().sample_budget(2).build());
        let_assert!(Ok(()) = renderer.start(2));
        render_to_completion(&renderer);
        assert!(renderer.samples_done() == 2);
        assert!(renderer.film().sample_count(7, 7) == 2);

        // Starting again does nothing until the budget grows or sampling is continuous
        let_assert!(Ok(()) = renderer.start(2));
        assert!(renderer.state() == RenderState::Paused);
        assert!(renderer.advance_to_next_sample() == Advance::Finished);

        renderer.set_continuous(true);
        let_assert!(Ok(()) = renderer.start(2));
        assert!(renderer.state() == RenderState::Rendering);
        assert!(renderer.advance_to_next_sample() == Advance::Started(3));
        assert!(renderer.wait_for_pass());
        assert!(renderer.film().sample_count(7, 7) == 3);
    }

    #[test]
    fn start_with_zero_threads() {
        let mut renderer = grid_renderer(16, RenderSettings::default());
        let_assert!(Ok(()) = renderer.start(0));
        assert!(renderer.state() == RenderState::Stopped);
        assert!(renderer.thread_count() == 0);
        assert!(renderer.state_str() == "Stopped");
    }

    #[test]
    fn workers_are_only_added() {
        let mut renderer = grid_renderer(16, RenderSettings::default());
        let_assert!(Ok(()) = renderer.start(3));
        let_assert!(Ok(()) = renderer.start(1));
        assert!(renderer.thread_count() == 3);
        assert!(renderer.state_str() == "Running");
    }

    #[test]
    fn scene_is_locked_while_workers_exist() {
        let mut renderer = grid_renderer(16, RenderSettings::default());
        let_assert!(Ok(()) = renderer.start(1));
        assert!(renderer.scene_mut().is_none());
        assert!(!renderer.set_camera(camera()));
        assert!(!renderer.set_shader(FacingRatioShader));

        renderer.reset();
        let_assert!(Some(scene) = renderer.scene_mut());
        scene.add_mesh(Mesh::new("triangle", vec![unit_triangle()]));
        assert!(renderer.set_camera(camera()));
        assert!(renderer.scene().is_dirty());
    }

    #[test]
    fn resize_discards_samples() {
        let mut renderer = grid_renderer(16, RenderSettings::builder().sample_budget(1).build());
        let_assert!(Ok(()) = renderer.start(2));
        render_to_completion(&renderer);

        renderer.resize(20, 10);
        assert!(renderer.samples_done() == 0);
        assert!(renderer.film().size() == ScreenSize::new(20, 10));
        assert!(renderer.film_rgba(1.0).len() == 20 * 10 * 4);

        assert!(renderer.advance_to_next_sample() == Advance::Started(1));
        assert!(renderer.pass_progress() == (0, 1));
    }

    #[test]
    fn worker_panic_ends_the_pass() {
        let mut renderer = grid_renderer(16, RenderSettings::builder().tile_size(8).build());
        assert!(renderer.set_shader(PanickingShader));
        let_assert!(Ok(()) = renderer.start(1));
        assert!(renderer.advance_to_next_sample() == Advance::Started(1));

        assert!(!renderer.wait_for_pass());
        assert!(renderer.advance_to_next_sample() == Advance::Pending);
        assert!(renderer.samples_done() == 0);
        assert!(renderer.start(2).is_err());

        renderer.reset();
        assert!(renderer.thread_count() == 0);
        assert!(renderer.set_shader(FacingRatioShader));
        let_assert!(Ok(()) = renderer.start(2));
        assert!(renderer.advance_to_next_sample() == Advance::Started(1));
        assert!(renderer.wait_for_pass());
        assert!(renderer.film().sample_count(3, 3) == 1);
    }
}
