use indicatif::{ProgressBar, ProgressStyle};
use oxytracer::{
    Advance, Camera, RenderSettings, Renderer, Scene,
    geometry::{ScreenSize, Transform, WorldPoint, WorldVector},
    scene::{object::Mesh, primitives::Triangle},
};

/// Square pyramid with its base centered on the origin
fn pyramid(size: f32) -> Vec<Triangle> {
    let h = size * 0.5;
    let base = [
        WorldPoint::new(-h, -h, 0.0),
        WorldPoint::new(h, -h, 0.0),
        WorldPoint::new(h, h, 0.0),
        WorldPoint::new(-h, h, 0.0),
    ];
    let apex = WorldPoint::new(0.0, 0.0, size);

    let mut triangles = vec![
        Triangle::new(base[0], base[2], base[1]),
        Triangle::new(base[0], base[3], base[2]),
    ];
    for i in 0..4 {
        triangles.push(Triangle::new(base[i], base[(i + 1) % 4], apex));
    }
    triangles
}

/// One mesh and a 40x40 grid of its instances
fn demo_scene(mesh_path: Option<&str>) -> Scene {
    let mesh = match mesh_path {
        Some(path) => Mesh::from_file(path),
        None => Mesh::new("pyramid", pyramid(40.0)),
    };

    let mut scene = Scene::new();
    let mesh = scene.add_mesh(mesh);
    for y in (-2000..2000).step_by(100) {
        for x in (-2000..2000).step_by(100) {
            let offset = WorldVector::new(x as f32, y as f32, 0.0);
            scene.add_instance(mesh, Transform::from_translation(offset));
        }
    }
    scene.setup();
    scene
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let mut args = std::env::args().skip(1);
    let mesh_path = args.next();
    let output = args.next().unwrap_or_else(|| "render.png".to_owned());

    let scene = demo_scene(mesh_path.as_deref());
    let camera = Camera::builder()
        .position(WorldPoint::new(-350.0, -350.0, 250.0))
        .target(WorldPoint::new(0.0, 0.0, 16.0))
        .fov_degrees(50.0)
        .build();
    let settings = RenderSettings::builder().sample_budget(32).build();

    let mut renderer = Renderer::new(scene, camera, ScreenSize::new(1280, 720), settings);
    renderer.start(num_cpus::get())?;

    let bar = ProgressBar::new(settings.sample_budget.into());
    bar.set_style(ProgressStyle::with_template("{bar:40} {pos}/{len} samples, {elapsed}")?);
    loop {
        if !renderer.wait_for_pass() {
            anyhow::bail!("Rendering stopped before the sample budget was met");
        }
        bar.set_position(renderer.samples_done().into());
        if renderer.advance_to_next_sample() == Advance::Finished {
            break;
        }
    }
    bar.finish();

    renderer.film().to_image(1.0).save(&output)?;
    log::info!("Saved {output}");

    Ok(())
}
