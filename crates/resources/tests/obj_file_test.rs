//! Integration tests for loading assets from disk.

use std::io::Write;
use std::path::Path;

use flightdeck_resources::{MeshData, ResourceError};

const PYRAMID: &str = "\
# square base plus apex
mtllib pyramid.mtl
o pyramid
v -0.5 -0.5 0.0
v 0.5 -0.5 0.0
v 0.5 0.5 0.0
v -0.5 0.5 0.0
v 0.0 0.0 1.0
vt 0.0 0.0
vt 1.0 0.0
vt 1.0 1.0
vt 0.0 1.0
vt 0.5 0.5
f 1/1 4/4 3/3 2/2
f 1/1 2/2 5/5
f 2/2 3/3 5/5
f 3/3 4/4 5/5
f 4/4 1/1 5/5
";

#[test]
fn test_load_obj_from_file() {
    let mut file = tempfile::Builder::new().suffix(".obj").tempfile().unwrap();
    file.write_all(PYRAMID.as_bytes()).unwrap();

    let mesh = MeshData::load_obj(file.path()).expect("pyramid should load");

    // One quad (two triangles) plus four side triangles.
    assert_eq!(mesh.triangle_count(), 6);
    assert_eq!(mesh.vertices.len(), mesh.indices.len());
    assert!(
        mesh.indices
            .iter()
            .enumerate()
            .all(|(i, &index)| index as usize == i)
    );
}

#[test]
fn test_missing_material_library_is_ignored() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(PYRAMID.as_bytes()).unwrap();

    assert!(MeshData::load_obj(file.path()).is_ok());
}

#[test]
fn test_load_viking_room_if_present() {
    let model_path = Path::new("../../assets/models/viking_room.obj");

    // Skip test if file doesn't exist (CI environment may not have assets)
    if !model_path.exists() {
        println!("Skipping test: model file not found at {:?}", model_path);
        return;
    }

    let mesh = MeshData::load_obj(model_path).expect("Failed to load OBJ model");
    assert!(!mesh.is_empty());
    println!("Loaded {} triangles", mesh.triangle_count());
}

#[test]
fn test_missing_path_reports_not_found() {
    let err = MeshData::load_obj("nowhere/model.obj").unwrap_err();
    assert!(matches!(err, ResourceError::FileNotFound(_)));
}
