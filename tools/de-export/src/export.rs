//! Export orchestration
//!
//! Every export resolves and encodes into memory first. The target file is only
//! written once encoding succeeded, so a failed export never leaves a partial file.

use anyhow::{anyhow, Context, Result};
use std::path::Path;
use tracing::info;

use crate::animation::{build_animation, AnimationError, MoveSelection, VpsSource};
use crate::armature::{resolve_armature, Armature};
use crate::config::Configuration;
use crate::formats::{write_animation, write_model, write_navigation_space, write_occlusion_mesh, write_rig};
use crate::mesh::{resolve_mesh, resolve_model, Mesh, MeshError};
use crate::partial::update_animation_file;
use crate::scene::{MeshData, SceneSource};

fn find_mesh<'a, S: SceneSource>(scene: &'a S, name: &str) -> Result<&'a MeshData> {
    Ok(scene
        .mesh(name)
        .ok_or_else(|| MeshError::UnknownMesh(name.to_string()))?)
}

/// Resolve the named armature of the scene.
pub fn load_armature<S: SceneSource>(scene: &S, name: &str, config: &Configuration) -> Result<Armature> {
    let data = scene
        .armature(name)
        .ok_or_else(|| anyhow!("Armature '{}' not found", name))?;
    let armature = resolve_armature(data, config)?;
    info!("Armature '{}': {} bones", armature.name, armature.bones.len());
    Ok(armature)
}

/// Armature a mesh is parented to, if any.
fn mesh_armature<S: SceneSource>(scene: &S, mesh: &MeshData, config: &Configuration) -> Result<Option<Armature>> {
    mesh.armature
        .as_deref()
        .map(|name| load_armature(scene, name, config))
        .transpose()
        .with_context(|| format!("Mesh '{}'", mesh.name))
}

fn write_file(output: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(output, bytes)
        .with_context(|| format!("Failed to write {}", output.display()))?;
    info!("Wrote {} ({} bytes)", output.display(), bytes.len());
    Ok(())
}

// ============================================================================
// Model
// ============================================================================

/// Encode a mesh and its LOD chain as `.demodel`.
pub fn encode_model<S: SceneSource>(scene: &S, mesh: &str, config: &Configuration) -> Result<Vec<u8>> {
    let data = find_mesh(scene, mesh)?;
    let scaling = config.scaling();
    let armature = mesh_armature(scene, data, config)?;

    let levels = resolve_model(scene, mesh, armature.as_ref(), scaling)?;
    for (level, resolved) in levels.iter().enumerate() {
        resolved.log_info(level);
    }

    let armature = armature.unwrap_or_else(|| Armature::empty(scaling));
    let mut bytes = Vec::new();
    write_model(&mut bytes, &armature, &levels)
        .with_context(|| format!("Failed to encode model '{}'", mesh))?;
    Ok(bytes)
}

pub fn export_model<S: SceneSource>(scene: &S, mesh: &str, config: &Configuration, output: &Path) -> Result<()> {
    let bytes = encode_model(scene, mesh, config)?;
    write_file(output, &bytes)
}

// ============================================================================
// Occlusion mesh and navigation space
// ============================================================================

fn resolve_single<S: SceneSource>(
    scene: &S,
    mesh: &str,
    config: &Configuration,
) -> Result<(Mesh, Option<Armature>)> {
    let data = find_mesh(scene, mesh)?;
    let armature = mesh_armature(scene, data, config)?;
    let resolved = resolve_mesh(data, armature.as_ref(), config.scaling(), None)?;
    resolved.log_info(0);
    Ok((resolved, armature))
}

pub fn encode_occlusion_mesh<S: SceneSource>(scene: &S, mesh: &str, config: &Configuration) -> Result<Vec<u8>> {
    let (resolved, armature) = resolve_single(scene, mesh, config)?;
    let armature = armature.unwrap_or_else(|| Armature::empty(config.scaling()));
    let mut bytes = Vec::new();
    write_occlusion_mesh(&mut bytes, &armature, &resolved)
        .with_context(|| format!("Failed to encode occlusion mesh '{}'", mesh))?;
    Ok(bytes)
}

pub fn export_occlusion_mesh<S: SceneSource>(
    scene: &S,
    mesh: &str,
    config: &Configuration,
    output: &Path,
) -> Result<()> {
    let bytes = encode_occlusion_mesh(scene, mesh, config)?;
    write_file(output, &bytes)
}

pub fn encode_navigation_space<S: SceneSource>(scene: &S, mesh: &str, config: &Configuration) -> Result<Vec<u8>> {
    let (resolved, _) = resolve_single(scene, mesh, config)?;
    let mut bytes = Vec::new();
    write_navigation_space(&mut bytes, &resolved)
        .with_context(|| format!("Failed to encode navigation space '{}'", mesh))?;
    Ok(bytes)
}

pub fn export_navigation_space<S: SceneSource>(
    scene: &S,
    mesh: &str,
    config: &Configuration,
    output: &Path,
) -> Result<()> {
    let bytes = encode_navigation_space(scene, mesh, config)?;
    write_file(output, &bytes)
}

// ============================================================================
// Rig
// ============================================================================

pub fn encode_rig<S: SceneSource>(scene: &S, armature: &str, config: &Configuration) -> Result<String> {
    let resolved = load_armature(scene, armature, config)?;
    let data = scene
        .armature(armature)
        .ok_or_else(|| anyhow!("Armature '{}' not found", armature))?;
    write_rig(&resolved, data).with_context(|| format!("Failed to encode rig '{}'", armature))
}

pub fn export_rig<S: SceneSource>(scene: &S, armature: &str, config: &Configuration, output: &Path) -> Result<()> {
    let text = encode_rig(scene, armature, config)?;
    write_file(output, text.as_bytes())
}

// ============================================================================
// Animation
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct AnimationOptions {
    pub armature: String,
    /// Mesh whose shape keys become vertex position sets.
    pub mesh: Option<String>,
    /// Export only this action and merge it into an existing file.
    pub single_move: Option<String>,
    /// Named move set to export. Defaults to the scene's active set.
    pub move_set: Option<String>,
}

/// Action filters for an export: the named or active move set of the scene, else
/// `moves.filter` from the configuration.
pub fn move_filters<S: SceneSource>(
    scene: &S,
    options: &AnimationOptions,
    config: &Configuration,
) -> Result<Vec<String>> {
    let Some(name) = options.move_set.as_deref().or_else(|| scene.active_move_set()) else {
        return Ok(config.move_filters());
    };
    let set = scene
        .move_set(name)
        .ok_or_else(|| AnimationError::UnknownMoveSet(name.to_string()))?;
    info!("Move set '{}': {:?}", set.name, set.filters);
    Ok(set.filters.clone())
}

/// Sample the selected moves of an armature. Configuration overrides the scene frame
/// rate and thresholds.
pub fn build_scene_animation<S: SceneSource>(
    scene: &mut S,
    options: &AnimationOptions,
    config: &Configuration,
) -> Result<crate::animation::Animation> {
    let armature = load_armature(scene, &options.armature, config)?;

    let vps = match options.mesh.as_deref() {
        Some(mesh) => {
            let data = find_mesh(scene, mesh)?;
            let resolved = resolve_mesh(data, Some(&armature), config.scaling(), None)?;
            Some(VpsSource::from_mesh(&resolved))
        }
        None => None,
    };

    let fps = config.fps().unwrap_or_else(|| scene.fps());
    let selection = MoveSelection {
        filters: move_filters(scene, options, config)?,
        single: options.single_move.clone(),
    };
    build_animation(scene, &armature, vps, fps, &selection, None)
}

/// Export an animation. In single-move mode the move replaces its namesake in an
/// existing file and every other move is kept.
pub fn export_animation<S: SceneSource>(
    scene: &mut S,
    options: &AnimationOptions,
    config: &Configuration,
    output: &Path,
) -> Result<()> {
    let animation = build_scene_animation(scene, options, config)?;

    if options.single_move.is_some() {
        return update_animation_file(output, &animation);
    }

    let mut bytes = Vec::new();
    write_animation(&mut bytes, &animation)
        .with_context(|| format!("Failed to encode animation of '{}'", options.armature))?;
    write_file(output, &bytes)
}

/// Load the configuration named on the command line, or `deexport.config` next to
/// the scene.
pub fn load_configuration(explicit: Option<&Path>, scene: &Path) -> Result<Configuration> {
    match explicit {
        Some(path) => Configuration::load(path),
        None => {
            let dir = scene
                .parent()
                .filter(|dir| !dir.as_os_str().is_empty())
                .unwrap_or_else(|| Path::new("."));
            Configuration::load_from_dir(dir)
        }
    }
}
