//! Scene builders shared by the integration tests

#![allow(dead_code)]

use de_export::scene::{
    ActionData, ActionGroupData, ArmatureData, BoneData, EdgeData, GroupWeight, HostMatrix,
    Keyframe, MaterialData, MeshData, PolygonData, UvLayerData,
};
use de_export::SceneSnapshot;
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::path::{Path, PathBuf};
use std::process::{Command, Output};

/// Host bone matrix whose engine rest pose is the identity.
pub fn engine_identity_bone() -> HostMatrix {
    HostMatrix(Mat4::from_diagonal(Vec4::new(-1.0, -1.0, 1.0, 1.0)))
}

pub fn key<T>(frame: f32, value: T) -> Keyframe<T> {
    Keyframe { frame, value }
}

pub struct MeshBuilder {
    data: MeshData,
}

impl MeshBuilder {
    pub fn new(name: &str) -> Self {
        Self {
            data: MeshData {
                name: name.into(),
                materials: vec![MaterialData {
                    name: "mat0".into(),
                    ..Default::default()
                }],
                ..Default::default()
            },
        }
    }

    pub fn vertices(mut self, vertices: &[[f32; 3]]) -> Self {
        self.data.vertices = vertices.iter().map(|&v| Vec3::from(v)).collect();
        self
    }

    /// Add a polygon; its loops get the given UVs in the first layer.
    pub fn polygon(mut self, vertices: &[u32], uvs: &[[f32; 2]]) -> Self {
        self.data.polygons.push(PolygonData {
            vertices: vertices.to_vec(),
            material: 0,
        });
        if self.data.uv_layers.is_empty() {
            self.data.uv_layers.push(UvLayerData {
                name: "uv0".into(),
                uvs: Vec::new(),
            });
        }
        self.data.uv_layers[0]
            .uvs
            .extend(uvs.iter().map(|&uv| Vec2::from(uv)));
        self
    }

    /// Weight every vertex fully to one group.
    pub fn weighted_to(mut self, group: &str, armature: &str) -> Self {
        self.data.vertex_groups = vec![group.into()];
        self.data.weights = vec![vec![GroupWeight { group: 0, weight: 1.0 }]; self.data.vertices.len()];
        self.data.armature = Some(armature.into());
        self
    }

    pub fn no_seams(mut self) -> Self {
        self.data.settings.no_seams = true;
        self
    }

    /// Derive edges, then mark the listed ones sharp or as seams.
    pub fn build(mut self, sharp: &[[u32; 2]], seams: &[[u32; 2]]) -> MeshData {
        self.data.derive_edges();
        let matches = |edge: &EdgeData, pair: &[u32; 2]| {
            (edge.vertices[0] == pair[0] && edge.vertices[1] == pair[1])
                || (edge.vertices[0] == pair[1] && edge.vertices[1] == pair[0])
        };
        for edge in &mut self.data.edges {
            edge.sharp = sharp.iter().any(|pair| matches(edge, pair));
            edge.seam = seams.iter().any(|pair| matches(edge, pair));
        }
        self.data
    }
}

pub fn single_bone_armature() -> ArmatureData {
    ArmatureData {
        name: "Armature".into(),
        bones: vec![BoneData {
            name: "root".into(),
            matrix_local: engine_identity_bone(),
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// One triangle weighted to a single root bone.
pub fn triangle_scene() -> SceneSnapshot {
    let mesh = MeshBuilder::new("Triangle")
        .vertices(&[[0.0, 0.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]])
        .polygon(&[0, 1, 2], &[[0.0, 0.0], [1.0, 0.0], [0.0, 1.0]])
        .weighted_to("root", "Armature")
        .no_seams()
        .build(&[], &[]);
    SceneSnapshot {
        meshes: vec![mesh],
        armatures: vec![single_bone_armature()],
        ..Default::default()
    }
}

/// An action sliding `root` along X by `distance` over ten frames.
pub fn slide_action(name: &str, distance: f32) -> ActionData {
    ActionData {
        name: name.into(),
        groups: vec![ActionGroupData {
            name: "root".into(),
            location: vec![key(0.0, Vec3::ZERO), key(10.0, Vec3::new(distance, 0.0, 0.0))],
            ..Default::default()
        }],
        ..Default::default()
    }
}

/// Armature-only scene with the given actions. The bone uses the host identity.
pub fn animated_scene(actions: Vec<ActionData>) -> SceneSnapshot {
    SceneSnapshot {
        armatures: vec![ArmatureData {
            name: "Armature".into(),
            bones: vec![BoneData {
                name: "root".into(),
                ..Default::default()
            }],
            ..Default::default()
        }],
        actions,
        ..Default::default()
    }
}

pub fn write_scene(dir: &Path, name: &str, scene: &SceneSnapshot) -> PathBuf {
    let path = dir.join(name);
    let json = serde_json::to_string_pretty(scene).expect("Failed to serialize scene");
    std::fs::write(&path, json).expect("Failed to write scene");
    path
}

pub fn de_export(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_de-export"))
        .args(args)
        .output()
        .expect("Failed to run de-export")
}

pub fn path_str(path: &Path) -> &str {
    path.to_str().expect("Non UTF-8 temp path")
}
