//! LOD chain resolution

use hashbrown::HashSet;

use super::resolve::resolve_mesh;
use super::types::Mesh;
use super::MeshError;
use crate::armature::Armature;
use crate::scene::{MeshData, SceneSource};

/// Resolve a mesh and every LOD level reachable through `lod_mesh`.
///
/// Level 0 is the named mesh. Deeper levels must share its armature, texture names
/// and UV set names. Once a level declares a LOD error, every deeper level must
/// declare one that is at least as large.
pub fn resolve_model(
    scene: &impl SceneSource,
    name: &str,
    armature: Option<&Armature>,
    scaling: f32,
) -> Result<Vec<Mesh>, MeshError> {
    let chain = collect_chain(scene, name)?;
    let base_data = chain[0];

    let mut levels: Vec<Mesh> = Vec::with_capacity(chain.len());
    for (lod, data) in chain.iter().enumerate() {
        if lod > 0 && data.armature != base_data.armature {
            return Err(MeshError::LodArmatureMismatch {
                mesh: name.to_string(),
                lod,
            });
        }

        let mesh = resolve_mesh(data, armature, scaling, levels.first())?;
        if let Some(base) = levels.first() {
            check_layout(base, &mesh, name, lod)?;
        }
        levels.push(mesh);
    }

    check_lod_errors(&levels, name)?;
    Ok(levels)
}

fn collect_chain<'a, S: SceneSource>(scene: &'a S, name: &str) -> Result<Vec<&'a MeshData>, MeshError> {
    let mut chain = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(name.to_string());

    while let Some(current) = next {
        if !visited.insert(current.clone()) {
            return Err(MeshError::LodLoop {
                mesh: name.to_string(),
                repeated: current,
            });
        }
        let data = scene
            .mesh(&current)
            .ok_or_else(|| MeshError::UnknownMesh(current.clone()))?;
        next = data.lod_mesh.clone();
        chain.push(data);
    }
    Ok(chain)
}

fn check_layout(base: &Mesh, level: &Mesh, name: &str, lod: usize) -> Result<(), MeshError> {
    let textures_match = base.textures.len() == level.textures.len()
        && base
            .textures
            .iter()
            .zip(&level.textures)
            .all(|(a, b)| a.name == b.name);
    if !textures_match {
        return Err(MeshError::LodMaterialMismatch {
            mesh: name.to_string(),
            lod,
        });
    }

    let uv_sets_match = base.uv_sets.len() == level.uv_sets.len()
        && base
            .uv_sets
            .iter()
            .zip(&level.uv_sets)
            .all(|(a, b)| a.name == b.name);
    if !uv_sets_match {
        return Err(MeshError::LodUVSetMismatch {
            mesh: name.to_string(),
            lod,
        });
    }
    Ok(())
}

/// Equal consecutive errors are accepted.
fn check_lod_errors(levels: &[Mesh], name: &str) -> Result<(), MeshError> {
    let mut previous: Option<f32> = None;
    for (lod, level) in levels.iter().enumerate() {
        match (previous, level.lod_error) {
            (Some(_), None) => {
                return Err(MeshError::LodErrorOrdering {
                    mesh: name.to_string(),
                    lod,
                });
            }
            (Some(last), Some(error)) if error < last => {
                return Err(MeshError::LodErrorOrdering {
                    mesh: name.to_string(),
                    lod,
                });
            }
            (_, Some(error)) => previous = Some(error),
            (None, None) => {}
        }
    }
    Ok(())
}
