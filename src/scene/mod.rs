pub mod bvh;
pub mod mesh_file;
pub mod obj;
pub mod object;
pub mod primitives;
pub mod stl;
pub mod triangle_bvh;

use index_vec::{IndexSlice, IndexVec};
use nalgebra::Matrix4;

use crate::geometry::{
    BoundingSphere, FloatType, HitRecord, Ray, Transform, TransformError, WorldBox, WorldPoint,
};
use bvh::{Bvh, StackCache};
use object::{Mesh, MeshInstance, Object};
use primitives::Bounded;

index_vec::define_index_type! {
    pub struct ObjectId = u32;
}

/// All objects to render, with a second level BVH over their world bounds.
///
/// The BVH is only valid after [`Scene::setup`]; adding objects or changing transforms
/// makes the scene dirty and a dirty scene reports no hits until it is set up again.
#[derive(Clone, Debug, Default)]
pub struct Scene {
    objects: IndexVec<ObjectId, Object>,
    /// Ready objects, in scene BVH order
    entries: Vec<SceneEntry>,
    bvh: Option<Bvh>,
    dirty: bool,
}

/// Per traversal scratch space, one for the scene level and one for the meshes.
#[derive(Clone, Debug, Default)]
pub struct TraversalCache {
    objects: StackCache,
    primitives: StackCache,
}

#[derive(Clone, Debug)]
struct SceneEntry {
    id: ObjectId,
    bounding_box: WorldBox,
    bounding_sphere: BoundingSphere,
}

impl Bounded for SceneEntry {
    fn bounding_box(&self) -> WorldBox {
        self.bounding_box
    }

    fn bounding_sphere(&self) -> BoundingSphere {
        self.bounding_sphere
    }

    fn midpoint(&self) -> WorldPoint {
        self.bounding_box.center()
    }
}

impl Scene {
    pub fn new() -> Scene {
        Scene::default()
    }

    pub fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.dirty = true;
        self.objects.push(object.into())
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> ObjectId {
        self.add_object(mesh)
    }

    pub fn add_instance(&mut self, mesh: ObjectId, transform: Transform) -> ObjectId {
        self.add_object(MeshInstance::new(mesh, transform))
    }

    pub fn objects(&self) -> &IndexSlice<ObjectId, [Object]> {
        &self.objects
    }

    pub fn object(&self, id: ObjectId) -> Option<&Object> {
        self.objects.get(id)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Replaces the local to world transform of an object.
    /// Singular matrices are rejected and the old transform is kept.
    ///
    /// Panics if the object doesn't exist.
    pub fn set_transform(
        &mut self,
        id: ObjectId,
        matrix: Matrix4<FloatType>,
    ) -> Result<(), TransformError> {
        let transform = Transform::new(matrix)?;
        self.objects[id].set_transform(transform);
        self.dirty = true;
        Ok(())
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of objects that take part in rendering after the last setup.
    pub fn ready_object_count(&self) -> usize {
        self.entries.len()
    }

    pub fn bounding_box(&self) -> Option<WorldBox> {
        self.bvh.as_ref().map(Bvh::bounding_box)
    }

    /// Builds acceleration structures of all objects and the scene BVH.
    /// Objects without usable geometry are left out.
    pub fn setup(&mut self) {
        for object in self.objects.iter_mut() {
            object.setup();
        }

        let objects = &self.objects;
        self.entries = objects
            .iter_enumerated()
            .filter_map(|(id, object)| {
                Some(SceneEntry {
                    id,
                    bounding_box: object.world_bounding_box(objects)?,
                    bounding_sphere: object.world_bounding_sphere(objects)?,
                })
            })
            .collect();

        let excluded = self.objects.len() - self.entries.len();
        if excluded > 0 {
            log::warn!("{excluded} objects without usable geometry excluded from the scene");
        }

        self.bvh = if self.entries.is_empty() {
            None
        } else {
            Some(Bvh::build(&mut self.entries))
        };
        self.dirty = false;

        log::info!("Scene set up with {} objects", self.entries.len());
        if let Some(bvh) = &self.bvh {
            bvh.log_statistics("Scene");
            bvh.log_tree();
        }
    }

    /// Nearest hit of a world space ray.
    pub fn intersect(&self, ray: &Ray, cache: &mut TraversalCache) -> Option<HitRecord> {
        if self.dirty {
            return None;
        }
        let bvh = self.bvh.as_ref()?;

        let TraversalCache {
            objects: object_stack,
            primitives,
        } = cache;

        bvh.intersect(ray, object_stack, |_leaf, range, _best_t| {
            self.entries[range]
                .iter()
                .filter_map(|entry| self.objects[entry.id].intersect(&self.objects, ray, primitives))
                .min_by(|a, b| a.t.total_cmp(&b.t))
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::geometry::test::{nonzero_world_vector, world_point};
    use crate::geometry::WorldVector;
    use crate::scene::triangle_bvh::test::grid;
    use assert2::{assert, let_assert};
    use proptest::prelude::*;
    use test_strategy::proptest;

    fn down_ray(x: f32, y: f32) -> Ray {
        Ray::new(WorldPoint::new(x, y, 10.0), WorldVector::new(0.0, 0.0, -1.0))
    }

    /// Grid mesh at the origin and `count`×`count` instances of it, spaced and raised.
    fn instanced_scene(count: usize) -> Scene {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh::new("grid", grid(2)));
        for i in 0..count {
            for j in 0..count {
                let offset = WorldVector::new(3.0 * i as f32, 3.0 * j as f32, (i + j) as f32 * 0.5);
                scene.add_instance(mesh, Transform::from_translation(offset));
            }
        }
        scene.setup();
        scene
    }

    fn brute_force(scene: &Scene, ray: &Ray) -> Option<HitRecord> {
        let mut stack = StackCache::default();
        scene
            .objects()
            .iter()
            .filter_map(|object| object.intersect(scene.objects(), ray, &mut stack))
            .min_by(|a, b| a.t.total_cmp(&b.t))
    }

    #[test]
    fn zero_objects_never_hit() {
        let mut scene = Scene::new();
        let mut cache = TraversalCache::default();
        assert!(scene.intersect(&down_ray(0.0, 0.0), &mut cache).is_none());
        scene.setup();
        assert!(scene.intersect(&down_ray(0.0, 0.0), &mut cache).is_none());
        assert!(scene.bounding_box().is_none());
    }

    #[test]
    fn dirty_scene_never_hits() {
        let mut scene = Scene::new();
        scene.add_mesh(Mesh::new("grid", grid(2)));
        let mut cache = TraversalCache::default();
        assert!(scene.is_dirty());
        assert!(scene.intersect(&down_ray(0.3, 0.6), &mut cache).is_none());

        scene.setup();
        assert!(!scene.is_dirty());
        let_assert!(Some(hit) = scene.intersect(&down_ray(0.3, 0.6), &mut cache));
        assert!((hit.t - 10.0).abs() < 1e-5);
    }

    #[test]
    fn nearest_instance_wins() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh::new("grid", grid(2)));
        scene.add_instance(mesh, Transform::from_translation(WorldVector::new(0.0, 0.0, 4.0)));
        scene.add_instance(mesh, Transform::from_translation(WorldVector::new(0.0, 0.0, 2.0)));
        scene.setup();
        assert!(scene.ready_object_count() == 3);

        let mut cache = TraversalCache::default();
        let_assert!(Some(hit) = scene.intersect(&down_ray(0.3, 0.6), &mut cache));
        assert!((hit.t - 6.0).abs() < 1e-5);
        assert!((hit.point.z - 4.0).abs() < 1e-5);
    }

    #[test]
    fn errored_mesh_and_its_instances_are_excluded() {
        let mut scene = Scene::new();
        let broken = scene.add_mesh(Mesh::new("empty", Vec::new()));
        scene.add_instance(broken, Transform::identity());
        let good = scene.add_mesh(Mesh::new("grid", grid(1)));
        scene.add_instance(good, Transform::from_translation(WorldVector::new(5.0, 0.0, 0.0)));
        // Instance pointing to an instance
        scene.add_instance(ObjectId::new(1), Transform::identity());
        scene.setup();

        assert!(scene.len() == 5);
        assert!(scene.ready_object_count() == 2);
        let_assert!(Some(bbox) = scene.bounding_box());
        assert!(bbox.max == WorldPoint::new(6.0, 1.0, 0.0));
    }

    #[test]
    fn set_transform_requires_setup() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh::new("grid", grid(1)));
        scene.setup();

        let_assert!(Ok(()) = scene.set_transform(mesh, Matrix4::new_translation(&WorldVector::new(0.0, 0.0, 5.0))));
        assert!(scene.is_dirty());

        let mut cache = TraversalCache::default();
        assert!(scene.intersect(&down_ray(0.3, 0.6), &mut cache).is_none());
        scene.setup();
        let_assert!(Some(hit) = scene.intersect(&down_ray(0.3, 0.6), &mut cache));
        assert!((hit.t - 5.0).abs() < 1e-5);
    }

    #[test]
    fn singular_transform_is_rejected() {
        let mut scene = Scene::new();
        let mesh = scene.add_mesh(Mesh::new("grid", grid(1)));
        scene.setup();

        let_assert!(Err(TransformError::Singular) = scene.set_transform(mesh, Matrix4::zeros()));
        assert!(!scene.is_dirty());
        let_assert!(Some(object) = scene.object(mesh));
        assert!(*object.transform() == Transform::identity());
    }

    #[proptest(ProptestConfig { cases: 64, ..ProptestConfig::default() })]
    fn matches_brute_force(
        #[strategy(world_point())] origin: WorldPoint,
        #[strategy(nonzero_world_vector())] direction: WorldVector,
    ) {
        let scene = instanced_scene(4);
        let mut cache = TraversalCache::default();

        let ray = Ray::new(origin, direction);
        let found = scene.intersect(&ray, &mut cache).map(|hit| hit.t);
        let expected = brute_force(&scene, &ray).map(|hit| hit.t);
        prop_assert_eq!(found, expected);
    }

    #[proptest(ProptestConfig { cases: 64, ..ProptestConfig::default() })]
    fn matches_brute_force_from_above(
        #[strategy(-2.0f32..14.0)] x: f32,
        #[strategy(-2.0f32..14.0)] y: f32,
    ) {
        let scene = instanced_scene(4);
        let mut cache = TraversalCache::default();

        let ray = down_ray(x, y);
        let found = scene.intersect(&ray, &mut cache).map(|hit| hit.t);
        let expected = brute_force(&scene, &ray).map(|hit| hit.t);
        prop_assert_eq!(found, expected);
    }
}
