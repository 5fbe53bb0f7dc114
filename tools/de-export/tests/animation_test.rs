//! Animation export tests through the de-export binary

mod common;

use common::{animated_scene, de_export, path_str, slide_action, write_scene};
use de_common::BoneTrackFlags;
use de_export::scene::MoveSetData;
use de_export::{AnimationFile, SceneSnapshot};
use glam::Vec3;
use std::path::Path;
use tempfile::tempdir;

fn export(scene: &Path, output: &Path, extra: &[&str]) {
    let mut args = vec!["animation", path_str(scene), "-o", path_str(output)];
    args.extend_from_slice(extra);
    let result = de_export(&args);
    assert!(
        result.status.success(),
        "de-export animation failed: {}",
        String::from_utf8_lossy(&result.stderr)
    );
}

#[test]
fn test_linear_slide_keeps_two_keyframes() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "slide.json", &animated_scene(vec![slide_action("slide", 1.0)]));
    let output = dir.path().join("slide.deanim");
    export(&scene, &output, &[]);

    let file = AnimationFile::load(&output).unwrap();
    assert_eq!(file.version, 2);
    assert_eq!(file.bones, vec!["root".to_string()]);
    assert_eq!(file.moves.len(), 1);

    let slide = &file.moves[0];
    assert_eq!(slide.name, "slide");
    assert_eq!(slide.playtime_frames, 10);
    assert!((slide.playtime_seconds - 0.4).abs() < 1e-6);

    let track = &slide.bones[0];
    assert!(track.flags.contains(BoneTrackFlags::VAR_POSITION));
    assert!(!track.flags.contains(BoneTrackFlags::VAR_ROTATION));
    let frames: Vec<u16> = track.keyframes.iter().map(|k| k.frame).collect();
    assert_eq!(frames, vec![0, 10]);
    assert!(track.keyframes[0].position.abs_diff_eq(Vec3::ZERO, 1e-5));
    assert!(track.keyframes[1].position.abs_diff_eq(Vec3::X, 1e-5));
}

#[test]
fn test_single_move_update_preserves_other_moves() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("walk.deanim");

    let full = animated_scene(vec![
        slide_action("a", 1.0),
        slide_action("b", 2.0),
        slide_action("c", 3.0),
    ]);
    export(&write_scene(dir.path(), "full.json", &full), &output, &[]);
    let before = AnimationFile::load(&output).unwrap();

    let edited = animated_scene(vec![slide_action("b", 5.0)]);
    export(&write_scene(dir.path(), "edited.json", &edited), &output, &["--move", "b"]);
    let after = AnimationFile::load(&output).unwrap();

    let names: Vec<&str> = after.moves.iter().map(|m| m.name.as_str()).collect();
    assert_eq!(names, vec!["a", "c", "b"]);
    assert_eq!(after.tables(), before.tables());
    assert_eq!(after.move_bytes(0), before.move_bytes(0));
    assert_eq!(after.move_bytes(1), before.move_bytes(2));

    let b = &after.moves[2].bones[0].keyframes;
    assert!(b[b.len() - 1].position.abs_diff_eq(Vec3::new(5.0, 0.0, 0.0), 1e-5));
}

#[test]
fn test_single_move_creates_missing_file() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("new.deanim");
    let scene = animated_scene(vec![slide_action("a", 1.0), slide_action("b", 2.0)]);
    export(&write_scene(dir.path(), "scene.json", &scene), &output, &["--move", "b"]);

    let file = AnimationFile::load(&output).unwrap();
    assert_eq!(file.moves.len(), 1);
    assert_eq!(file.moves[0].name, "b");
}

#[test]
fn test_unknown_move_fails() {
    let dir = tempdir().unwrap();
    let output = dir.path().join("none.deanim");
    let scene = write_scene(dir.path(), "scene.json", &animated_scene(vec![slide_action("a", 1.0)]));

    let result = de_export(&[
        "animation",
        path_str(&scene),
        "-o",
        path_str(&output),
        "--move",
        "missing",
    ]);
    assert!(!result.status.success());
    assert!(!output.exists());
}

#[test]
fn test_reparse_reproduces_file() {
    let dir = tempdir().unwrap();
    let scene = animated_scene(vec![slide_action("a", 1.0), slide_action("b", -2.0)]);
    let first = dir.path().join("first.deanim");
    let second = dir.path().join("second.deanim");
    let scene_path = write_scene(dir.path(), "scene.json", &scene);
    export(&scene_path, &first, &[]);
    export(&scene_path, &second, &[]);

    let bytes = std::fs::read(&first).unwrap();
    assert_eq!(bytes, std::fs::read(&second).unwrap());
    assert_eq!(AnimationFile::load(&first).unwrap().to_bytes(), bytes);
}

#[test]
fn test_move_filter_from_config() {
    let dir = tempdir().unwrap();
    let scene = animated_scene(vec![slide_action("walk", 1.0), slide_action("idle", 0.5)]);
    let scene_path = write_scene(dir.path(), "scene.json", &scene);
    let config = dir.path().join("custom.config");
    std::fs::write(&config, "moves.filter 'w.*'\nexport.fps 10\n").unwrap();
    let output = dir.path().join("out.deanim");

    export(&scene_path, &output, &["--config", path_str(&config)]);
    let file = AnimationFile::load(&output).unwrap();
    assert_eq!(file.moves.len(), 1);
    assert_eq!(file.moves[0].name, "walk");
    assert!((file.moves[0].playtime_seconds - 1.0).abs() < 1e-6);
}

fn move_set_scene() -> SceneSnapshot {
    let mut scene = animated_scene(vec![
        slide_action("walk", 1.0),
        slide_action("run", 2.0),
        slide_action("idle", 0.1),
        slide_action("idle_bored", 0.2),
    ]);
    scene.move_sets = vec![
        MoveSetData {
            name: "locomotion".into(),
            filters: vec!["walk".into(), "run".into()],
        },
        MoveSetData {
            name: "idles".into(),
            filters: vec!["idle.*".into()],
        },
    ];
    scene
}

fn move_names(path: &Path) -> Vec<String> {
    AnimationFile::load(path)
        .unwrap()
        .moves
        .into_iter()
        .map(|m| m.name)
        .collect()
}

#[test]
fn test_move_sets_select_different_actions() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "scene.json", &move_set_scene());
    let locomotion = dir.path().join("locomotion.deanim");
    let idles = dir.path().join("idles.deanim");

    export(&scene, &locomotion, &["--move-set", "locomotion"]);
    export(&scene, &idles, &["--move-set", "idles"]);

    assert_eq!(move_names(&locomotion), vec!["walk", "run"]);
    assert_eq!(move_names(&idles), vec!["idle", "idle_bored"]);
}

#[test]
fn test_active_move_set_overrides_config_filter() {
    let dir = tempdir().unwrap();
    let mut scene = move_set_scene();
    scene.active_move_set = Some("idles".into());
    let scene = write_scene(dir.path(), "scene.json", &scene);
    let config = dir.path().join("custom.config");
    std::fs::write(&config, "moves.filter 'walk'\n").unwrap();

    let active = dir.path().join("active.deanim");
    export(&scene, &active, &["--config", path_str(&config)]);
    assert_eq!(move_names(&active), vec!["idle", "idle_bored"]);

    let named = dir.path().join("named.deanim");
    export(&scene, &named, &["--move-set", "locomotion"]);
    assert_eq!(move_names(&named), vec!["walk", "run"]);
}

#[test]
fn test_unknown_move_set_fails() {
    let dir = tempdir().unwrap();
    let scene = write_scene(dir.path(), "scene.json", &move_set_scene());
    let output = dir.path().join("none.deanim");

    let result = de_export(&[
        "animation",
        path_str(&scene),
        "-o",
        path_str(&output),
        "--move-set",
        "swimming",
    ]);
    assert!(!result.status.success());
    assert!(String::from_utf8_lossy(&result.stderr).contains("swimming"));
    assert!(!output.exists());
}
