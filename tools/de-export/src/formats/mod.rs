//! Engine asset writers
//!
//! Headers, signatures and flag sets live in `de_common::formats`; this module writes
//! the variable-length sections from resolved meshes, armatures and animations.

pub mod animation;
pub mod model;
pub mod navspace;
pub mod occlusion;
pub mod rig;

pub use animation::{encode_move, write_animation, AnimationFile, BoneTrackRecord, MoveRecord, VpsTrackRecord};
pub use model::{fan_quads, fan_triangles, write_model};
pub use navspace::write_navigation_space;
pub use occlusion::write_occlusion_mesh;
pub use rig::write_rig;

use anyhow::{Context, Result};

/// A table size that must fit a 16-bit count.
pub(crate) fn count_u16(count: usize, what: &str) -> Result<u16> {
    u16::try_from(count).with_context(|| format!("Too many {}: {}", what, count))
}
