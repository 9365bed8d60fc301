use std::path::Path;

use thiserror::Error;

use crate::scene::obj::load_obj;
use crate::scene::primitives::Triangle;
use crate::scene::stl::load_stl;

#[derive(Debug, Error)]
pub enum MeshLoadError {
    #[error("Failed to read file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse file: {0}")]
    ParseError(#[from] wavefront_obj::ParseError),

    #[error("Failed to parse STL data: {0}")]
    StlError(std::io::Error),

    #[error("Unsupported mesh file extension: {0:?}")]
    UnsupportedFormat(Option<String>),

    #[error("File contains no triangles")]
    NoTriangles,
}

/// Loads triangles of a mesh file, picking the format by the extension (`.stl` or `.obj`,
/// case insensitive).
pub fn load_mesh_file(path: impl AsRef<Path>) -> Result<Vec<Triangle>, MeshLoadError> {
    let path = path.as_ref();
    let extension = path.extension().map(|ext| ext.to_string_lossy().to_lowercase());
    match extension.as_deref() {
        Some("stl") => load_stl(path),
        Some("obj") => load_obj(path),
        _ => Err(MeshLoadError::UnsupportedFormat(extension)),
    }
}
