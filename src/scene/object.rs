use std::path::Path;

use index_vec::IndexSlice;

use crate::geometry::{BoundingSphere, HitRecord, Ray, Transform, WorldBox};
use crate::scene::bvh::StackCache;
use crate::scene::mesh_file::{MeshLoadError, load_mesh_file};
use crate::scene::obj::load_obj;
use crate::scene::primitives::Triangle;
use crate::scene::stl::load_stl;
use crate::scene::triangle_bvh::TriangleBvh;
use crate::scene::ObjectId;

/// Renderable entity of the scene.
#[derive(Clone, Debug)]
pub enum Object {
    Mesh(Mesh),
    Instance(MeshInstance),
}

/// Geometry of a mesh through its lifecycle.
#[derive(Clone, Debug)]
pub enum MeshGeometry {
    /// Loaded, acceleration structure not built yet
    Pending(Vec<Triangle>),
    Ready(TriangleBvh),
    /// Loading failed or there was nothing to build, never rendered
    Errored,
}

#[derive(Clone, Debug)]
pub struct Mesh {
    name: String,
    geometry: MeshGeometry,
    transform: Transform,
}

/// Another placement of an existing mesh. The geometry stays owned by the mesh.
#[derive(Clone, Debug)]
pub struct MeshInstance {
    mesh: ObjectId,
    transform: Transform,
}

impl Mesh {
    pub fn new(name: impl Into<String>, triangles: Vec<Triangle>) -> Mesh {
        Mesh {
            name: name.into(),
            geometry: MeshGeometry::Pending(triangles),
            transform: Transform::identity(),
        }
    }

    /// Loads a mesh file, binary STL or Wavefront OBJ by the file extension.
    /// Load failures, including unknown extensions, are logged and produce an errored mesh
    /// that is excluded from rendering.
    pub fn from_file(path: impl AsRef<Path>) -> Mesh {
        let path = path.as_ref();
        Mesh::loaded(path, load_mesh_file(path))
    }

    /// Loads a binary STL file, see [`Mesh::from_file`].
    pub fn from_stl(path: impl AsRef<Path>) -> Mesh {
        let path = path.as_ref();
        Mesh::loaded(path, load_stl(path))
    }

    /// Loads a Wavefront OBJ file, see [`Mesh::from_file`].
    pub fn from_obj(path: impl AsRef<Path>) -> Mesh {
        let path = path.as_ref();
        Mesh::loaded(path, load_obj(path))
    }

    fn loaded(path: &Path, triangles: Result<Vec<Triangle>, MeshLoadError>) -> Mesh {
        let name = path.display().to_string();
        match triangles {
            Ok(triangles) => Mesh::new(name, triangles),
            Err(e) => {
                log::warn!("Failed to load mesh {name}: {e}");
                Mesh {
                    name,
                    geometry: MeshGeometry::Errored,
                    transform: Transform::identity(),
                }
            }
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn geometry(&self) -> &MeshGeometry {
        &self.geometry
    }

    pub fn is_errored(&self) -> bool {
        matches!(self.geometry, MeshGeometry::Errored)
    }

    /// Builds the acceleration structure of pending geometry. Ready and errored meshes
    /// are left alone.
    pub fn setup(&mut self) {
        let MeshGeometry::Pending(triangles) = &mut self.geometry else {
            return;
        };
        let triangles = std::mem::take(triangles);

        self.geometry = match TriangleBvh::new(triangles) {
            Some(bvh) => {
                log::info!(
                    "Mesh {}: {} triangles, {}",
                    self.name,
                    bvh.triangles().len(),
                    bvh.statistics()
                );
                MeshGeometry::Ready(bvh)
            }
            None => {
                log::warn!("Mesh {} has no triangles", self.name);
                MeshGeometry::Errored
            }
        };
    }

    fn ready_geometry(&self) -> Option<&TriangleBvh> {
        match &self.geometry {
            MeshGeometry::Ready(bvh) => Some(bvh),
            MeshGeometry::Pending(_) | MeshGeometry::Errored => None,
        }
    }
}

impl MeshInstance {
    pub fn new(mesh: ObjectId, transform: Transform) -> MeshInstance {
        MeshInstance { mesh, transform }
    }

    pub fn mesh(&self) -> ObjectId {
        self.mesh
    }
}

impl From<Mesh> for Object {
    fn from(value: Mesh) -> Self {
        Object::Mesh(value)
    }
}

impl From<MeshInstance> for Object {
    fn from(value: MeshInstance) -> Self {
        Object::Instance(value)
    }
}

impl Object {
    pub fn transform(&self) -> &Transform {
        match self {
            Object::Mesh(mesh) => &mesh.transform,
            Object::Instance(instance) => &instance.transform,
        }
    }

    pub fn set_transform(&mut self, transform: Transform) {
        match self {
            Object::Mesh(mesh) => mesh.transform = transform,
            Object::Instance(instance) => instance.transform = transform,
        }
    }

    pub fn setup(&mut self) {
        match self {
            Object::Mesh(mesh) => mesh.setup(),
            // Instances share the mesh's acceleration structure
            Object::Instance(_) => {}
        }
    }

    /// Local space geometry, resolving instances to their mesh.
    /// None if the geometry is not ready or the instance doesn't point to a mesh.
    pub fn geometry<'a>(&'a self, objects: &'a IndexSlice<ObjectId, [Object]>) -> Option<&'a TriangleBvh> {
        match self {
            Object::Mesh(mesh) => mesh.ready_geometry(),
            Object::Instance(instance) => match objects.get(instance.mesh)? {
                Object::Mesh(mesh) => mesh.ready_geometry(),
                Object::Instance(_) => None,
            },
        }
    }

    pub fn local_bounding_box(&self, objects: &IndexSlice<ObjectId, [Object]>) -> Option<WorldBox> {
        self.geometry(objects).map(TriangleBvh::bounding_box)
    }

    pub fn world_bounding_box(&self, objects: &IndexSlice<ObjectId, [Object]>) -> Option<WorldBox> {
        let local = self.local_bounding_box(objects)?;
        Some(self.transform().local_to_world_box(&local))
    }

    pub fn world_bounding_sphere(
        &self,
        objects: &IndexSlice<ObjectId, [Object]>,
    ) -> Option<BoundingSphere> {
        let local = self.geometry(objects)?.bounding_sphere();
        Some(self.transform().local_to_world_sphere(&local))
    }

    /// Nearest hit of a world space ray, reported in world space.
    pub fn intersect(
        &self,
        objects: &IndexSlice<ObjectId, [Object]>,
        ray: &Ray,
        stack: &mut StackCache,
    ) -> Option<HitRecord> {
        let geometry = self.geometry(objects)?;
        let transform = self.transform();

        let local_ray = transform.world_to_local_ray(ray);
        let local_hit = geometry.intersect(&local_ray, stack)?;
        let hit = transform.local_to_world_hit(ray, &local_hit);
        (hit.t > 0.0).then_some(hit)
    }
}
