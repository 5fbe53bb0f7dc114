//! Command line tests for the remaining export targets

mod common;

use common::{de_export, path_str, triangle_scene, write_scene, MeshBuilder};
use de_common::{NavSpaceHeader, NavSpaceType, OcclusionMeshHeader};
use de_export::SceneSnapshot;
use tempfile::tempdir;

#[test]
fn test_rig_export() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "scene.json", &triangle_scene());
    let output = dir.path().join("scene.derig");

    let result = de_export(&["rig", path_str(&scene), "-o", path_str(&output)]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let text = std::fs::read_to_string(&output).unwrap();
    assert!(text.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<rig>\n"));
    assert!(text.contains("<bone name=\"root\">"));
    assert!(text.trim_end().ends_with("</rig>"));
}

#[test]
fn test_occlusion_export_default_output() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "wall.json", &triangle_scene());

    let result = de_export(&["occlusion", path_str(&scene), "--mesh", "Triangle"]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let bytes = std::fs::read(dir.path().join("wall.deoccmesh")).unwrap();
    let header = OcclusionMeshHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.version, 1);
}

#[test]
fn test_navspace_export() {
    let floor = MeshBuilder::new("Floor")
        .vertices(&[
            [0.0, 0.0, 0.0],
            [1.0, 0.0, 0.0],
            [1.0, 1.0, 0.0],
            [0.0, 1.0, 0.0],
        ])
        .polygon(&[0, 1, 2, 3], &[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]])
        .no_seams()
        .build(&[], &[]);
    let scene = SceneSnapshot {
        meshes: vec![floor],
        ..Default::default()
    };

    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "floor.json", &scene);
    let output = dir.path().join("floor.denavspace");
    let result = de_export(&["navspace", path_str(&scene), "-o", path_str(&output)]);
    assert!(result.status.success(), "{}", String::from_utf8_lossy(&result.stderr));

    let bytes = std::fs::read(&output).unwrap();
    let header = NavSpaceHeader::from_bytes(&bytes).unwrap();
    assert_eq!(header.space_type, NavSpaceType::Mesh);
    assert_eq!((header.vertex_count, header.corner_count, header.face_count), (4, 4, 1));
}

#[test]
fn test_unknown_mesh_fails() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "scene.json", &triangle_scene());
    let output = dir.path().join("missing.demodel");

    let result = de_export(&["model", path_str(&scene), "--mesh", "Missing", "-o", path_str(&output)]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("Missing"));
    assert!(!output.exists());
}

#[test]
fn test_unknown_command() {
    let result = de_export(&["texture", "scene.json"]);
    assert_eq!(result.status.code(), Some(2));
}
