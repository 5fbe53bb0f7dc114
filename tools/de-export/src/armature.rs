//! Armature resolver
//!
//! Walks the host skeleton depth-first from its roots in declaration order and assigns
//! every retained bone the next index. Bones matching an ignore filter get no index;
//! their children are still visited and attach to the nearest retained ancestor.

use anyhow::{Context, Result};
use de_common::{convert_matrix_bone, matrix_to_euler, scale_matrix};
use glam::{Mat4, Vec3};
use hashbrown::HashMap;
use regex::Regex;

use crate::config::Configuration;
use crate::scene::{ArmatureData, BoneData};

/// Default weight threshold for shape key tracks.
pub const DEFAULT_THRESHOLD_WEIGHT: f32 = 0.05;

/// A retained bone in engine space.
#[derive(Debug, Clone)]
pub struct Bone {
    pub index: usize,
    pub name: String,
    pub parent: Option<usize>,
    /// Rest matrix in armature space.
    pub rig_matrix: Mat4,
    /// Rest matrix relative to the parent bone.
    pub rest_matrix: Mat4,
    /// Scaled rest position relative to the parent.
    pub position: Vec3,
    /// Rest rotation relative to the parent, euler degrees.
    pub rotation: Vec3,
}

/// Keyframe thresholds and sample format of an armature.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub position: f32,
    /// Degrees.
    pub rotation: f32,
    pub scale: f32,
    pub weight: f32,
    /// Limit above which a scale channel counts as variable.
    pub variable_scale: f32,
}

#[derive(Debug, Clone)]
pub struct Armature {
    pub name: String,
    pub bones: Vec<Bone>,
    by_name: HashMap<String, usize>,
    pub thresholds: Thresholds,
    pub short_format: bool,
    pub rest_pose: bool,
    pub scaling: f32,
}

impl Armature {
    /// An armature without bones, used when a mesh has no armature.
    pub fn empty(scaling: f32) -> Self {
        Self {
            name: String::new(),
            bones: Vec::new(),
            by_name: HashMap::new(),
            thresholds: Thresholds {
                position: 0.001,
                rotation: 0.05,
                scale: 0.001,
                weight: DEFAULT_THRESHOLD_WEIGHT,
                variable_scale: 0.001,
            },
            short_format: false,
            rest_pose: false,
            scaling,
        }
    }

    pub fn bone(&self, name: &str) -> Option<&Bone> {
        self.by_name.get(name).map(|&index| &self.bones[index])
    }

    pub fn bone_index(&self, name: &str) -> Option<usize> {
        self.by_name.get(name).copied()
    }

    pub fn is_empty(&self) -> bool {
        self.bones.is_empty()
    }
}

/// Compile name filters anchored at both ends.
pub fn compile_filters(patterns: &[String]) -> Result<Vec<Regex>> {
    patterns
        .iter()
        .map(|pattern| {
            Regex::new(&format!("^(?:{})$", pattern))
                .with_context(|| format!("Invalid filter '{}'", pattern))
        })
        .collect()
}

/// Resolve a host armature. Filters from the armature and the configuration are
/// combined; configuration thresholds override the armature's.
pub fn resolve_armature(data: &ArmatureData, config: &Configuration) -> Result<Armature> {
    let mut patterns = data.bone_filters.clone();
    patterns.extend(config.bone_ignore_filters());
    let filters = compile_filters(&patterns)
        .with_context(|| format!("Armature '{}'", data.name))?;

    let scaling = config.scaling();
    let scale = config.threshold_scale().unwrap_or(data.threshold_scale);
    let thresholds = Thresholds {
        position: config.threshold_position().unwrap_or(data.threshold_position),
        rotation: config.threshold_rotation().unwrap_or(data.threshold_rotation),
        scale,
        weight: config.threshold_weight().unwrap_or(DEFAULT_THRESHOLD_WEIGHT),
        variable_scale: config.variable_scale_limit().unwrap_or(scale),
    };

    let mut walker = Walker {
        data,
        filters: &filters,
        scale: scale_matrix(scaling),
        bones: Vec::new(),
    };
    for root in data.bones.iter().filter(|bone| is_root(data, bone)) {
        walker.visit(root, None, 0);
    }

    let bones = walker.bones;
    let by_name = bones
        .iter()
        .map(|bone| (bone.name.clone(), bone.index))
        .collect();

    Ok(Armature {
        name: data.name.clone(),
        bones,
        by_name,
        thresholds,
        short_format: config.short_format().unwrap_or(data.short_format),
        rest_pose: data.rest_pose,
        scaling,
    })
}

fn is_root(data: &ArmatureData, bone: &BoneData) -> bool {
    match &bone.parent {
        None => true,
        Some(parent) => data.bone(parent).is_none(),
    }
}

struct Walker<'a> {
    data: &'a ArmatureData,
    filters: &'a [Regex],
    scale: Mat4,
    bones: Vec<Bone>,
}

impl Walker<'_> {
    fn visit(&mut self, bone: &BoneData, parent: Option<usize>, depth: usize) {
        if depth > self.data.bones.len() {
            return;
        }

        let ignored = self.filters.iter().any(|filter| filter.is_match(&bone.name));
        let retained_parent = if ignored {
            parent
        } else {
            let index = self.bones.len();
            let rig_matrix = convert_matrix_bone(&bone.matrix_local.0);
            let rest_matrix = match parent {
                Some(parent) => self.bones[parent].rig_matrix.inverse() * rig_matrix,
                None => rig_matrix,
            };
            self.bones.push(Bone {
                index,
                name: bone.name.clone(),
                parent,
                rig_matrix,
                rest_matrix,
                position: (self.scale * rest_matrix).transform_point3(Vec3::ZERO),
                rotation: matrix_to_euler(&rest_matrix),
            });
            Some(index)
        };

        let data = self.data;
        for child in data
            .bones
            .iter()
            .filter(|child| child.parent.as_deref() == Some(bone.name.as_str()))
        {
            self.visit(child, retained_parent, depth + 1);
        }
    }
}
