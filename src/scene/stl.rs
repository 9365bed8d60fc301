use std::{
    fs::File,
    io::{BufReader, Read, Seek},
    path::Path,
};

use crate::geometry::WorldPoint;
use crate::scene::mesh_file::MeshLoadError;
use crate::scene::primitives::Triangle;

pub fn load_stl(path: impl AsRef<Path>) -> Result<Vec<Triangle>, MeshLoadError> {
    let file = File::open(path)?;
    parse_stl(BufReader::new(file))
}

/// Triangles of a binary (or ASCII) STL stream. Stored facet normals are ignored, the
/// normal follows from the vertex order.
pub fn parse_stl(mut reader: impl Read + Seek) -> Result<Vec<Triangle>, MeshLoadError> {
    let facets = stl_io::create_stl_reader(&mut reader).map_err(MeshLoadError::StlError)?;

    let triangles = facets
        .map(|facet| {
            let facet = facet.map_err(MeshLoadError::StlError)?;
            let [a, b, c] = facet.vertices.map(|v| WorldPoint::new(v[0], v[1], v[2]));
            Ok(Triangle::new(a, b, c))
        })
        .collect::<Result<Vec<_>, MeshLoadError>>()?;

    if triangles.is_empty() {
        return Err(MeshLoadError::NoTriangles);
    }

    log::debug!("Loaded {} STL facets", triangles.len());
    Ok(triangles)
}
