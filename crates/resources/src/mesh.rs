//! OBJ mesh loading.
//!
//! Every face corner becomes its own vertex: the index buffer produced here
//! is simply `0..N`. Texture V is flipped to match Vulkan's top-left origin
//! and every vertex is colored white so the texture shows unmodified.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use flightdeck_rhi::vertex::{Index, Vertex};
use glam::{Vec2, Vec3};
use tracing::{debug, info};

use crate::error::{ResourceError, ResourceResult};

const WHITE: Vec3 = Vec3::ONE;

/// CPU-side mesh ready for upload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertex array.
    pub vertices: Vec<Vertex>,
    /// Triangle list indices into `vertices`.
    pub indices: Vec<Index>,
}

impl MeshData {
    /// Creates a mesh from existing arrays.
    pub fn new(vertices: Vec<Vertex>, indices: Vec<Index>) -> Self {
        Self { vertices, indices }
    }

    /// Loads and flattens every model in an OBJ file.
    ///
    /// Material libraries referenced by the file are ignored.
    pub fn load_obj(path: impl AsRef<Path>) -> ResourceResult<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ResourceError::FileNotFound(path.to_path_buf()));
        }

        let mut reader = BufReader::new(File::open(path)?);
        let mesh = Self::parse(&mut reader, path)?;
        info!(
            "Loaded OBJ '{}': {} vertices, {} triangles",
            path.display(),
            mesh.vertices.len(),
            mesh.triangle_count()
        );
        Ok(mesh)
    }

    /// Parses OBJ text from any buffered reader.
    pub fn from_obj_reader<R: BufRead>(reader: &mut R) -> ResourceResult<Self> {
        Self::parse(reader, Path::new("<memory>"))
    }

    fn parse<R: BufRead>(reader: &mut R, source: &Path) -> ResourceResult<Self> {
        let options = tobj::LoadOptions {
            triangulate: true,
            single_index: true,
            ..Default::default()
        };
        let (models, _materials) =
            tobj::load_obj_buf(reader, &options, |_| Ok(Default::default())).map_err(|e| {
                ResourceError::ObjLoad {
                    path: source.to_path_buf(),
                    message: e.to_string(),
                }
            })?;

        let mut mesh = Self::default();
        for model in &models {
            debug!(
                "OBJ model '{}': {} indices",
                model.name,
                model.mesh.indices.len()
            );
            mesh.append_model(&model.mesh, source)?;
        }

        if mesh.indices.is_empty() {
            return Err(ResourceError::EmptyMesh(source.to_path_buf()));
        }
        Ok(mesh)
    }

    fn append_model(&mut self, model: &tobj::Mesh, source: &Path) -> ResourceResult<()> {
        let has_tex_coords = !model.texcoords.is_empty();

        for &index in &model.indices {
            let i = index as usize;
            let position = model
                .positions
                .get(3 * i..3 * i + 3)
                .ok_or_else(|| out_of_range(source, index))?;

            let tex_coord = if has_tex_coords {
                let uv = model
                    .texcoords
                    .get(2 * i..2 * i + 2)
                    .ok_or_else(|| out_of_range(source, index))?;
                Vec2::new(uv[0], 1.0 - uv[1])
            } else {
                Vec2::ZERO
            };

            let next = self.vertices.len() as Index;
            self.vertices.push(Vertex::new(
                Vec3::new(position[0], position[1], position[2]),
                WHITE,
                tex_coord,
            ));
            self.indices.push(next);
        }
        Ok(())
    }

    /// Number of triangles described by the index list.
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Returns true if there is nothing to draw.
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

fn out_of_range(source: &Path, index: u32) -> ResourceError {
    ResourceError::ObjLoad {
        path: PathBuf::from(source),
        message: format!("vertex index {index} out of range"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    const QUAD: &str = "\
v 0.0 0.0 0.0
v 1.0 0.0 0.0
v 1.0 1.0 0.0
v 0.0 1.0 0.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
f 1/1 2/2 3/3 4/4
";

    #[test]
    fn test_quad_is_triangulated_and_flattened() {
        let mesh = MeshData::from_obj_reader(&mut Cursor::new(QUAD)).unwrap();
        assert_eq!(mesh.indices.len(), 6);
        assert_eq!(mesh.vertices.len(), 6);
        assert_eq!(mesh.triangle_count(), 2);
        assert_eq!(mesh.indices, (0..6).collect::<Vec<u32>>());
    }

    #[test]
    fn test_texture_v_is_flipped() {
        let mesh = MeshData::from_obj_reader(&mut Cursor::new(QUAD)).unwrap();
        let first = mesh.vertices[0];
        assert_eq!(first.position, Vec3::ZERO);
        assert_eq!(first.tex_coord, Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_vertices_are_white() {
        let mesh = MeshData::from_obj_reader(&mut Cursor::new(QUAD)).unwrap();
        assert!(mesh.vertices.iter().all(|v| v.color == Vec3::ONE));
    }

    #[test]
    fn test_missing_tex_coords_default_to_zero() {
        let obj = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf 1 2 3\n";
        let mesh = MeshData::from_obj_reader(&mut Cursor::new(obj)).unwrap();
        assert_eq!(mesh.vertices.len(), 3);
        assert!(mesh.vertices.iter().all(|v| v.tex_coord == Vec2::ZERO));
        assert_eq!(mesh.vertices[1].position, Vec3::X);
    }

    #[test]
    fn test_empty_input_is_rejected() {
        let result = MeshData::from_obj_reader(&mut Cursor::new(""));
        assert!(result.is_err());
    }

    #[test]
    fn test_missing_file() {
        let result = MeshData::load_obj("does/not/exist.obj");
        assert!(matches!(result, Err(ResourceError::FileNotFound(_))));
    }
}
