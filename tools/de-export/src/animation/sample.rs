//! Pose sampling
//!
//! Sampling drives the host: it switches the active action, steps the frame and reads
//! back pose matrices. [`SceneStateGuard`] captures the evaluation state up front and
//! puts it back when dropped, whether sampling finished or bailed out.

use std::ops::{Deref, DerefMut};

use anyhow::{anyhow, Context, Result};
use de_common::{convert_matrix_bone, matrix_to_euler, scale_matrix};
use glam::{Mat4, Vec3};
use hashbrown::HashSet;
use tracing::{debug, info};

use super::moves::{frame_range, select_actions, MoveSelection};
use super::optimize::optimize_keyframes;
use super::{Animation, BoneKeyframe, BoneTrack, Move, VpsKeyframe, VpsTrack};
use crate::armature::Armature;
use crate::mesh::Mesh;
use crate::progress::{Progress, ProgressObserver};
use crate::scene::{ActionData, SceneSource};

/// Suffix of the action driving a move's shape keys.
const SHAPE_KEY_ACTION_SUFFIX: &str = ".shapeKey";

// ============================================================================
// Scene state guard
// ============================================================================

/// Mutable access to a scene that restores frame, active action, rest pose and
/// shape key action on drop.
pub struct SceneStateGuard<'a, S: SceneSource> {
    scene: &'a mut S,
    armature: String,
    mesh: Option<String>,
    frame: i32,
    active_action: Option<String>,
    rest_pose: bool,
    shape_key_action: Option<String>,
}

impl<'a, S: SceneSource> SceneStateGuard<'a, S> {
    pub fn new(scene: &'a mut S, armature: &str, mesh: Option<&str>) -> Self {
        let frame = scene.frame();
        let active_action = scene.active_action(armature);
        let rest_pose = scene.rest_pose(armature);
        let shape_key_action = mesh.and_then(|mesh| scene.shape_key_action(mesh));
        Self {
            scene,
            armature: armature.to_string(),
            mesh: mesh.map(str::to_string),
            frame,
            active_action,
            rest_pose,
            shape_key_action,
        }
    }
}

impl<S: SceneSource> Deref for SceneStateGuard<'_, S> {
    type Target = S;

    fn deref(&self) -> &S {
        self.scene
    }
}

impl<S: SceneSource> DerefMut for SceneStateGuard<'_, S> {
    fn deref_mut(&mut self) -> &mut S {
        self.scene
    }
}

impl<S: SceneSource> Drop for SceneStateGuard<'_, S> {
    fn drop(&mut self) {
        self.scene
            .set_active_action(&self.armature, self.active_action.as_deref());
        self.scene.set_rest_pose(&self.armature, self.rest_pose);
        if let Some(mesh) = &self.mesh {
            self.scene
                .set_shape_key_action(mesh, self.shape_key_action.as_deref());
        }
        self.scene.set_frame(self.frame);
    }
}

// ============================================================================
// Sampling
// ============================================================================

/// Mesh whose shape keys are sampled as vertex position set weights.
#[derive(Debug, Clone)]
pub struct VpsSource {
    pub mesh: String,
    pub names: Vec<String>,
}

impl VpsSource {
    pub fn from_mesh(mesh: &Mesh) -> Self {
        Self {
            mesh: mesh.name.clone(),
            names: mesh.vps.iter().map(|vps| vps.name.clone()).collect(),
        }
    }
}

/// Sample one action into a move.
///
/// Bones without an action group stay unused and carry no keyframes. Shape key
/// weights come from the `<move>.shapeKey` action when the scene has one.
pub fn sample_move<S: SceneSource>(
    scene: &mut S,
    armature: &Armature,
    vps: Option<&VpsSource>,
    action: &ActionData,
) -> Result<Move> {
    let (first, last) = frame_range(action, armature, scene.playback_range());
    let name = action.move_name().to_string();

    let mut bones: Vec<BoneTrack> = armature
        .bones
        .iter()
        .map(|bone| BoneTrack {
            used: action.group(&bone.name).is_some(),
            keyframes: Vec::new(),
        })
        .collect();

    let shape_key_action = format!("{}{}", name, SHAPE_KEY_ACTION_SUFFIX);
    let keyed: HashSet<String> = scene
        .action(&shape_key_action)
        .map(|action| action.shape_keys.iter().map(|c| c.name.clone()).collect())
        .unwrap_or_default();
    let mut vps_tracks: Vec<VpsTrack> = vps
        .map(|source| {
            source
                .names
                .iter()
                .map(|name| VpsTrack {
                    used: keyed.contains(name),
                    keyframes: Vec::new(),
                })
                .collect()
        })
        .unwrap_or_default();

    scene.set_active_action(&armature.name, Some(&action.name));
    if let Some(source) = vps {
        let driver = (!keyed.is_empty()).then_some(shape_key_action.as_str());
        scene.set_shape_key_action(&source.mesh, driver);
    }

    // the host only re-evaluates poses after a frame change
    scene.set_frame(first + 1);
    for _ in 0..3 {
        scene.set_frame(first);
    }

    let scale = scale_matrix(armature.scaling);
    for time in first..=last {
        scene.set_frame(time);
        let frame = u16::try_from(time - first)
            .with_context(|| format!("Move '{}' is longer than 65535 frames", name))?;

        let poses = armature
            .bones
            .iter()
            .map(|bone| {
                scene
                    .pose_matrix(&armature.name, &bone.name)
                    .map(|pose| convert_matrix_bone(&pose))
                    .ok_or_else(|| anyhow!("Bone '{}' has no pose", bone.name))
            })
            .collect::<Result<Vec<Mat4>>>()?;

        for (bone, track) in armature.bones.iter().zip(bones.iter_mut()) {
            if !track.used {
                continue;
            }
            let reference = match bone.parent {
                Some(parent) => poses[parent] * bone.rest_matrix,
                None => bone.rest_matrix,
            };
            let local = reference.inverse() * poses[bone.index];
            let (scaling, _, _) = local.to_scale_rotation_translation();
            track.keyframes.push(BoneKeyframe {
                frame,
                position: (scale * local).transform_point3(Vec3::ZERO),
                rotation: matrix_to_euler(&local),
                scale: scaling,
            });
        }

        if let Some(source) = vps {
            for (name, track) in source.names.iter().zip(vps_tracks.iter_mut()) {
                if track.used {
                    track.keyframes.push(VpsKeyframe {
                        frame,
                        weight: scene.shape_key_value(&source.mesh, name),
                    });
                }
            }
        }
    }

    let thresholds = &armature.thresholds;
    for track in &mut bones {
        track.keyframes = optimize_keyframes(&track.keyframes, thresholds);
    }
    for track in &mut vps_tracks {
        track.keyframes = optimize_keyframes(&track.keyframes, thresholds);
    }

    debug!(
        "Move '{}': frames {}..={}, {} used bones",
        name,
        first,
        last,
        bones.iter().filter(|track| track.used).count()
    );

    Ok(Move {
        name,
        first_frame: first,
        last_frame: last,
        time_scaling: action.time_scaling,
        bones,
        vps: vps_tracks,
    })
}

/// Sample every selected action of an armature.
///
/// The scene's frame, active action, rest pose flag and shape key action are restored
/// before returning. Poses are evaluated with the rest pose switched off.
pub fn build_animation<S: SceneSource>(
    scene: &mut S,
    armature: &Armature,
    vps: Option<VpsSource>,
    fps: f32,
    selection: &MoveSelection,
    observer: Option<ProgressObserver>,
) -> Result<Animation> {
    let actions: Vec<ActionData> = select_actions(scene.actions(), selection)?
        .into_iter()
        .cloned()
        .collect();

    let mut progress = Progress::new(actions.len());
    if let Some(observer) = observer {
        progress = progress.with_observer(observer);
    }

    let mut guard = SceneStateGuard::new(scene, &armature.name, vps.as_ref().map(|v| v.mesh.as_str()));
    guard.set_rest_pose(&armature.name, false);

    progress.show();
    let mut moves = Vec::with_capacity(actions.len());
    for action in &actions {
        progress.advance(&format!("Sampling move {}", action.move_name()));
        let sampled = sample_move(&mut *guard, armature, vps.as_ref(), action)
            .with_context(|| format!("Move '{}'", action.move_name()))?;
        moves.push(sampled);
    }
    progress.hide();
    drop(guard);

    info!(
        "Animation of '{}': {} bones, {} vertex position sets, {} moves",
        armature.name,
        armature.bones.len(),
        vps.as_ref().map_or(0, |v| v.names.len()),
        moves.len()
    );

    Ok(Animation {
        bones: armature.bones.iter().map(|bone| bone.name.clone()).collect(),
        vps: vps.map(|v| v.names).unwrap_or_default(),
        moves,
        fps,
        thresholds: armature.thresholds,
        short_format: armature.short_format,
    })
}
