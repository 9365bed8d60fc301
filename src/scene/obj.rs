use std::{fs, path::Path};

use crate::geometry::WorldPoint;
use crate::scene::mesh_file::MeshLoadError;
use crate::scene::primitives::Triangle;

pub fn load_obj(path: impl AsRef<Path>) -> Result<Vec<Triangle>, MeshLoadError> {
    let content = fs::read_to_string(path)?;
    parse_obj(content)
}

/// Triangles of all objects in the file. Polygons other than triangles are skipped.
pub fn parse_obj(content: String) -> Result<Vec<Triangle>, MeshLoadError> {
    let parsed = wavefront_obj::obj::parse(content)?;

    let mut triangles = Vec::new();
    let mut skipped = 0usize;

    for object in &parsed.objects {
        let vertex = |index: (usize, Option<usize>, Option<usize>)| {
            let v = &object.vertices[index.0];
            WorldPoint::new(v.x as f32, v.y as f32, v.z as f32)
        };

        for geometry in &object.geometry {
            for shape in &geometry.shapes {
                let wavefront_obj::obj::Primitive::Triangle(a, b, c) = shape.primitive else {
                    skipped += 1;
                    continue;
                };
                triangles.push(Triangle::new(vertex(a), vertex(b), vertex(c)));
            }
        }
    }

    if skipped > 0 {
        log::debug!("Skipped {skipped} non-triangle primitives");
    }

    if triangles.is_empty() {
        return Err(MeshLoadError::NoTriangles);
    }

    Ok(triangles)
}
