//! JSON scene snapshot
//!
//! A [`SceneSnapshot`] is a dump of the host scene: meshes with their evaluated
//! geometry, armatures with rest matrices, and actions as keyframed channels. Pose
//! evaluation follows the host rules: a bone's armature-space pose is its parent's pose
//! times the rest offset to the parent times the animated basis.

use anyhow::{Context, Result};
use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::scene::{
    ActionData, ArmatureData, BoneData, Keyframe, MeshData, MoveSetData, SceneSource,
};

const DEFAULT_FPS: f32 = 25.0;

fn default_fps() -> f32 {
    DEFAULT_FPS
}

/// Scene dump loaded from JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SceneSnapshot {
    #[serde(default = "default_fps")]
    pub fps: f32,
    #[serde(default)]
    pub frame: i32,
    #[serde(default)]
    pub frame_range: Option<[i32; 2]>,
    #[serde(default)]
    pub meshes: Vec<MeshData>,
    #[serde(default)]
    pub armatures: Vec<ArmatureData>,
    #[serde(default)]
    pub actions: Vec<ActionData>,
    #[serde(default)]
    pub move_sets: Vec<MoveSetData>,
    /// Move set used when the command line names none.
    #[serde(default)]
    pub active_move_set: Option<String>,
}

impl Default for SceneSnapshot {
    fn default() -> Self {
        Self {
            fps: DEFAULT_FPS,
            frame: 0,
            frame_range: None,
            meshes: Vec::new(),
            armatures: Vec::new(),
            actions: Vec::new(),
            move_sets: Vec::new(),
            active_move_set: None,
        }
    }
}

impl SceneSnapshot {
    /// Load a snapshot from a JSON file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scene: {}", path.display()))?;
        Self::from_json(&content)
            .with_context(|| format!("Failed to parse scene: {}", path.display()))
    }

    /// Parse a snapshot. Meshes without an edge list get one derived from their
    /// polygons.
    pub fn from_json(content: &str) -> Result<Self> {
        let mut snapshot: SceneSnapshot = serde_json::from_str(content)?;
        snapshot.prepare();
        Ok(snapshot)
    }

    pub fn prepare(&mut self) {
        for mesh in &mut self.meshes {
            if mesh.edges.is_empty() {
                mesh.derive_edges();
            }
        }
    }

    fn mesh_mut(&mut self, name: &str) -> Option<&mut MeshData> {
        self.meshes.iter_mut().find(|mesh| mesh.name == name)
    }

    fn armature_mut(&mut self, name: &str) -> Option<&mut ArmatureData> {
        self.armatures.iter_mut().find(|armature| armature.name == name)
    }

    /// Animated basis of a bone relative to its rest pose.
    fn bone_basis(&self, armature: &ArmatureData, bone: &BoneData) -> Mat4 {
        if armature.rest_pose {
            return Mat4::IDENTITY;
        }
        let Some(group) = armature
            .active_action
            .as_deref()
            .and_then(|name| self.action(name))
            .and_then(|action| action.group(&bone.name))
        else {
            return Mat4::IDENTITY;
        };

        let frame = self.frame as f32;
        let location = interpolate_vec3(&group.location, frame, Vec3::ZERO);
        let rotation = interpolate_quat(&group.rotation, frame);
        let scale = interpolate_vec3(&group.scale, frame, Vec3::ONE);
        Mat4::from_scale_rotation_translation(scale, rotation, location)
    }

    fn bone_pose(&self, armature: &ArmatureData, bone: &BoneData, depth: usize) -> Mat4 {
        let basis = self.bone_basis(armature, bone);
        let rest = bone.matrix_local.0;
        let parent = bone
            .parent
            .as_deref()
            .and_then(|name| armature.bone(name))
            .filter(|_| depth < armature.bones.len());
        match parent {
            Some(parent) => {
                let parent_pose = self.bone_pose(armature, parent, depth + 1);
                parent_pose * parent.matrix_local.0.inverse() * rest * basis
            }
            None => rest * basis,
        }
    }
}

impl SceneSource for SceneSnapshot {
    fn fps(&self) -> f32 {
        self.fps
    }

    fn playback_range(&self) -> Option<(i32, i32)> {
        self.frame_range.map(|[first, last]| (first, last))
    }

    fn mesh(&self, name: &str) -> Option<&MeshData> {
        self.meshes.iter().find(|mesh| mesh.name == name)
    }

    fn armature(&self, name: &str) -> Option<&ArmatureData> {
        self.armatures.iter().find(|armature| armature.name == name)
    }

    fn actions(&self) -> &[ActionData] {
        &self.actions
    }

    fn move_sets(&self) -> &[MoveSetData] {
        &self.move_sets
    }

    fn active_move_set(&self) -> Option<&str> {
        self.active_move_set.as_deref()
    }

    fn frame(&self) -> i32 {
        self.frame
    }

    fn set_frame(&mut self, frame: i32) {
        self.frame = frame;
    }

    fn active_action(&self, armature: &str) -> Option<String> {
        self.armature(armature)
            .and_then(|armature| armature.active_action.clone())
    }

    fn set_active_action(&mut self, armature: &str, action: Option<&str>) {
        if let Some(armature) = self.armature_mut(armature) {
            armature.active_action = action.map(str::to_string);
        }
    }

    fn rest_pose(&self, armature: &str) -> bool {
        self.armature(armature)
            .map(|armature| armature.rest_pose)
            .unwrap_or(false)
    }

    fn set_rest_pose(&mut self, armature: &str, rest: bool) {
        if let Some(armature) = self.armature_mut(armature) {
            armature.rest_pose = rest;
        }
    }

    fn shape_key_action(&self, mesh: &str) -> Option<String> {
        self.mesh(mesh).and_then(|mesh| mesh.shape_key_action.clone())
    }

    fn set_shape_key_action(&mut self, mesh: &str, action: Option<&str>) {
        if let Some(mesh) = self.mesh_mut(mesh) {
            mesh.shape_key_action = action.map(str::to_string);
        }
    }

    fn pose_matrix(&self, armature: &str, bone: &str) -> Option<Mat4> {
        let armature = self.armature(armature)?;
        let bone = armature.bone(bone)?;
        Some(self.bone_pose(armature, bone, 0))
    }

    fn shape_key_value(&self, mesh: &str, key: &str) -> f32 {
        let Some(mesh) = self.mesh(mesh) else {
            return 0.0;
        };
        let fallback = mesh.shape_key(key).map(|k| k.value).unwrap_or(0.0);
        mesh.shape_key_action
            .as_deref()
            .and_then(|name| self.action(name))
            .and_then(|action| action.shape_keys.iter().find(|c| c.name == key))
            .map(|channel| interpolate_f32(&channel.keys, self.frame as f32, fallback))
            .unwrap_or(fallback)
    }
}

// ============================================================================
// Channel interpolation
// ============================================================================

/// Locate the segment containing `frame` and the blend factor inside it.
///
/// Returns `None` past the last keyframe.
fn find_segment<T>(keys: &[Keyframe<T>], frame: f32) -> Option<(usize, f32)> {
    let mut i = 0;
    while i < keys.len() - 1 && keys[i + 1].frame < frame {
        i += 1;
    }

    if i >= keys.len() - 1 {
        return None;
    }

    let t0 = keys[i].frame;
    let t1 = keys[i + 1].frame;
    let factor = if t1 > t0 { (frame - t0) / (t1 - t0) } else { 0.0 };
    Some((i, factor.clamp(0.0, 1.0)))
}

fn interpolate_vec3(keys: &[Keyframe<Vec3>], frame: f32, default: Vec3) -> Vec3 {
    if keys.is_empty() {
        return default;
    }
    match find_segment(keys, frame) {
        Some((i, factor)) => keys[i].value.lerp(keys[i + 1].value, factor),
        None => keys[keys.len() - 1].value,
    }
}

fn interpolate_f32(keys: &[Keyframe<f32>], frame: f32, default: f32) -> f32 {
    if keys.is_empty() {
        return default;
    }
    match find_segment(keys, frame) {
        Some((i, factor)) => keys[i].value + (keys[i + 1].value - keys[i].value) * factor,
        None => keys[keys.len() - 1].value,
    }
}

fn interpolate_quat(keys: &[Keyframe<Quat>], frame: f32) -> Quat {
    if keys.is_empty() {
        return Quat::IDENTITY;
    }
    match find_segment(keys, frame) {
        Some((i, factor)) => keys[i]
            .value
            .normalize()
            .slerp(keys[i + 1].value.normalize(), factor),
        None => keys[keys.len() - 1].value.normalize(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ActionGroupData, HostMatrix};

    fn key<T>(frame: f32, value: T) -> Keyframe<T> {
        Keyframe { frame, value }
    }

    #[test]
    fn test_interpolate_vec3() {
        let keys = vec![key(0.0, Vec3::ZERO), key(10.0, Vec3::new(1.0, 0.0, 0.0))];
        assert_eq!(interpolate_vec3(&keys, 5.0, Vec3::ZERO), Vec3::new(0.5, 0.0, 0.0));
        assert_eq!(interpolate_vec3(&keys, -3.0, Vec3::ZERO), Vec3::ZERO);
        assert_eq!(interpolate_vec3(&keys, 20.0, Vec3::ZERO), Vec3::X);
        assert_eq!(interpolate_vec3(&[], 1.0, Vec3::ONE), Vec3::ONE);
    }

    #[test]
    fn test_interpolate_quat_halfway() {
        let keys = vec![
            key(0.0, Quat::IDENTITY),
            key(2.0, Quat::from_rotation_z(std::f32::consts::FRAC_PI_2)),
        ];
        let q = interpolate_quat(&keys, 1.0);
        assert!(q.abs_diff_eq(Quat::from_rotation_z(std::f32::consts::FRAC_PI_4), 1e-5));
    }

    fn two_bone_scene() -> SceneSnapshot {
        let root = BoneData {
            name: "root".into(),
            parent: None,
            matrix_local: HostMatrix(Mat4::IDENTITY),
            ..Default::default()
        };
        let child = BoneData {
            name: "child".into(),
            parent: Some("root".into()),
            matrix_local: HostMatrix(Mat4::from_translation(Vec3::new(0.0, 1.0, 0.0))),
            ..Default::default()
        };
        let action = ActionData {
            name: "walk".into(),
            groups: vec![ActionGroupData {
                name: "root".into(),
                location: vec![key(0.0, Vec3::ZERO), key(10.0, Vec3::new(2.0, 0.0, 0.0))],
                ..Default::default()
            }],
            ..Default::default()
        };
        SceneSnapshot {
            fps: 25.0,
            armatures: vec![ArmatureData {
                name: "Armature".into(),
                bones: vec![root, child],
                active_action: Some("walk".into()),
                ..Default::default()
            }],
            actions: vec![action],
            ..Default::default()
        }
    }

    #[test]
    fn test_pose_follows_parent() {
        let mut scene = two_bone_scene();
        scene.set_frame(5);
        let pose = scene.pose_matrix("Armature", "child").unwrap();
        let origin = pose.transform_point3(Vec3::ZERO);
        assert!(origin.abs_diff_eq(Vec3::new(1.0, 1.0, 0.0), 1e-5));
    }

    #[test]
    fn test_rest_pose_ignores_action() {
        let mut scene = two_bone_scene();
        scene.set_frame(10);
        scene.set_rest_pose("Armature", true);
        let pose = scene.pose_matrix("Armature", "child").unwrap();
        assert!(pose.abs_diff_eq(Mat4::from_translation(Vec3::Y), 1e-6));
    }

    #[test]
    fn test_from_json_derives_edges() {
        let json = r#"{
            "meshes": [{
                "name": "Quad",
                "vertices": [[0,0,0],[1,0,0],[1,1,0],[0,1,0]],
                "polygons": [{"vertices": [0,1,2,3]}]
            }]
        }"#;
        let scene = SceneSnapshot::from_json(json).unwrap();
        assert_eq!(scene.fps(), 25.0);
        let mesh = scene.mesh("Quad").unwrap();
        assert_eq!(mesh.edges.len(), 4);
        assert_eq!(mesh.settings.max_weights, 4);
    }
}
