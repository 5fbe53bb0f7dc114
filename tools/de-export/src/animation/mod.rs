//! Animation sampling and keyframe optimization
//!
//! Each exported action becomes a move. The host is stepped frame by frame, every
//! retained bone's pose is sampled relative to its rest pose, and the resulting tracks
//! are thinned to the keyframes needed to reproduce them by linear interpolation.

mod moves;
mod optimize;
mod sample;

pub use moves::{frame_range, select_actions, MoveSelection};
pub use optimize::{optimize_keyframes, Interpolated};
pub use sample::{build_animation, sample_move, SceneStateGuard, VpsSource};

use de_common::{BoneTrackFlags, VpsTrackFlags};
use glam::Vec3;

use crate::armature::Thresholds;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum AnimationError {
    #[error("moves {actions:?} share the export name '{name}'")]
    DuplicateMoveName { name: String, actions: Vec<String> },

    #[error("action '{0}' not found or not exportable")]
    UnknownAction(String),

    #[error("move set '{0}' not found")]
    UnknownMoveSet(String),

    #[error("file has {file} bones but the armature has {armature}")]
    BoneCountMismatch { file: usize, armature: usize },

    #[error("file has {file} vertex position sets but the export has {current}")]
    VpsCountMismatch { file: usize, current: usize },

    #[error("unsupported animation version {0}")]
    UnsupportedVersion(u8),

    #[error("invalid animation file: {0}")]
    InvalidFile(String),
}

/// Bone sample relative to the rest pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoneKeyframe {
    pub frame: u16,
    pub position: Vec3,
    /// Euler degrees.
    pub rotation: Vec3,
    pub scale: Vec3,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VpsKeyframe {
    pub frame: u16,
    pub weight: f32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct BoneTrack {
    /// The move animates this bone.
    pub used: bool,
    pub keyframes: Vec<BoneKeyframe>,
}

impl BoneTrack {
    /// Variable-component flags: a component varies if any keyframe leaves the
    /// identity pose by more than its threshold.
    pub fn variability(&self, thresholds: &Thresholds) -> BoneTrackFlags {
        let mut flags = BoneTrackFlags::empty();
        for keyframe in &self.keyframes {
            if keyframe.position.length() > thresholds.position {
                flags |= BoneTrackFlags::VAR_POSITION;
            }
            if keyframe.rotation.length() > thresholds.rotation {
                flags |= BoneTrackFlags::VAR_ROTATION;
            }
            if (keyframe.scale - Vec3::ONE).length() > thresholds.variable_scale {
                flags |= BoneTrackFlags::VAR_SCALE;
            }
        }
        flags
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VpsTrack {
    pub used: bool,
    pub keyframes: Vec<VpsKeyframe>,
}

impl VpsTrack {
    pub fn variability(&self, thresholds: &Thresholds) -> VpsTrackFlags {
        if self
            .keyframes
            .iter()
            .any(|keyframe| keyframe.weight.abs() > thresholds.weight)
        {
            VpsTrackFlags::VAR_WEIGHT
        } else {
            VpsTrackFlags::empty()
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Move {
    pub name: String,
    pub first_frame: i32,
    pub last_frame: i32,
    pub time_scaling: f32,
    pub bones: Vec<BoneTrack>,
    pub vps: Vec<VpsTrack>,
}

impl Move {
    pub fn playtime_frames(&self) -> u16 {
        (self.last_frame - self.first_frame).clamp(0, u16::MAX as i32) as u16
    }

    pub fn playtime_seconds(&self, fps: f32) -> f32 {
        self.playtime_frames() as f32 / fps * self.time_scaling
    }
}

/// Everything written to a `.deanim` file.
#[derive(Debug, Clone, PartialEq)]
pub struct Animation {
    pub bones: Vec<String>,
    pub vps: Vec<String>,
    pub moves: Vec<Move>,
    pub fps: f32,
    pub thresholds: Thresholds,
    pub short_format: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn thresholds() -> Thresholds {
        Thresholds {
            position: 0.001,
            rotation: 0.05,
            scale: 0.001,
            weight: 0.05,
            variable_scale: 0.001,
        }
    }

    fn keyframe(position: Vec3, rotation: Vec3, scale: Vec3) -> BoneKeyframe {
        BoneKeyframe {
            frame: 0,
            position,
            rotation,
            scale,
        }
    }

    #[test]
    fn test_bone_variability() {
        let track = BoneTrack {
            used: true,
            keyframes: vec![
                keyframe(Vec3::ZERO, Vec3::ZERO, Vec3::ONE),
                keyframe(Vec3::new(0.0, 0.0005, 0.0), Vec3::new(0.0, 0.0, 10.0), Vec3::ONE),
            ],
        };
        assert_eq!(track.variability(&thresholds()), BoneTrackFlags::VAR_ROTATION);

        let rest = BoneTrack {
            used: true,
            keyframes: vec![keyframe(Vec3::ZERO, Vec3::ZERO, Vec3::ONE)],
        };
        assert!(rest.variability(&thresholds()).is_empty());
    }

    #[test]
    fn test_vps_variability() {
        let track = VpsTrack {
            used: true,
            keyframes: vec![
                VpsKeyframe { frame: 0, weight: 0.0 },
                VpsKeyframe { frame: 5, weight: 0.5 },
            ],
        };
        assert_eq!(track.variability(&thresholds()), VpsTrackFlags::VAR_WEIGHT);
    }

    #[test]
    fn test_playtime() {
        let mv = Move {
            name: "walk".into(),
            first_frame: 10,
            last_frame: 35,
            time_scaling: 2.0,
            bones: Vec::new(),
            vps: Vec::new(),
        };
        assert_eq!(mv.playtime_frames(), 25);
        assert!((mv.playtime_seconds(25.0) - 2.0).abs() < 1e-6);
    }
}
