//! Single-move animation updates
//!
//! Replacing one move re-encodes only that move. The header, the bone and vertex
//! position set tables and every other move are copied byte for byte from the
//! existing file; the replaced move is appended after them.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;

use crate::animation::{Animation, AnimationError};
use crate::formats::{encode_move, write_animation, AnimationFile};

/// Merge the moves of `animation` into an existing file's contents.
///
/// Fails without producing anything if the file is not version 2 or its tables do
/// not match the animation's bone and vertex position set counts.
pub fn merge_moves(existing: &AnimationFile, animation: &Animation) -> Result<Vec<u8>> {
    if existing.bones.len() != animation.bones.len() {
        return Err(AnimationError::BoneCountMismatch {
            file: existing.bones.len(),
            armature: animation.bones.len(),
        }
        .into());
    }
    if existing.vps.len() != animation.vps.len() {
        return Err(AnimationError::VpsCountMismatch {
            file: existing.vps.len(),
            current: animation.vps.len(),
        }
        .into());
    }

    let retained: Vec<usize> = (0..existing.moves.len())
        .filter(|&index| {
            let name = &existing.moves[index].name;
            !animation.moves.iter().any(|mv| mv.name == *name)
        })
        .collect();

    let count = u16::try_from(retained.len() + animation.moves.len())
        .context("Too many moves")?;

    let mut bytes = existing.tables().to_vec();
    bytes.extend_from_slice(&count.to_le_bytes());
    for &index in &retained {
        bytes.extend_from_slice(existing.move_bytes(index));
    }
    for mv in &animation.moves {
        bytes.extend(encode_move(
            mv,
            animation.fps,
            &animation.thresholds,
            animation.short_format,
        )?);
    }
    Ok(bytes)
}

/// Write `animation` into `path`, replacing moves of the same name and keeping the
/// others. A missing file is written from scratch.
pub fn update_animation_file(path: &Path, animation: &Animation) -> Result<()> {
    if !path.exists() {
        let mut bytes = Vec::new();
        write_animation(&mut bytes, animation)?;
        std::fs::write(path, bytes)
            .with_context(|| format!("Failed to write animation: {}", path.display()))?;
        return Ok(());
    }

    let existing = AnimationFile::load(path)?;
    let bytes = merge_moves(&existing, animation)
        .with_context(|| format!("Cannot update {}", path.display()))?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write animation: {}", path.display()))?;

    info!(
        "Updated {} move(s) in {}, kept {}",
        animation.moves.len(),
        path.display(),
        existing
            .moves
            .iter()
            .filter(|old| !animation.moves.iter().any(|mv| mv.name == old.name))
            .count()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::animation::{BoneKeyframe, BoneTrack, Move};
    use crate::armature::Thresholds;
    use glam::Vec3;

    fn thresholds() -> Thresholds {
        Thresholds {
            position: 0.001,
            rotation: 0.05,
            scale: 0.001,
            weight: 0.05,
            variable_scale: 0.001,
        }
    }

    fn mv(name: &str, distance: f32) -> Move {
        let keyframe = |frame: u16, x: f32| BoneKeyframe {
            frame,
            position: Vec3::new(x, 0.0, 0.0),
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        };
        Move {
            name: name.into(),
            first_frame: 0,
            last_frame: 20,
            time_scaling: 1.0,
            bones: vec![BoneTrack {
                used: true,
                keyframes: vec![keyframe(0, 0.0), keyframe(20, distance)],
            }],
            vps: Vec::new(),
        }
    }

    fn animation(moves: Vec<Move>, bones: &[&str]) -> Animation {
        Animation {
            bones: bones.iter().map(|b| b.to_string()).collect(),
            vps: Vec::new(),
            moves,
            fps: 25.0,
            thresholds: thresholds(),
            short_format: false,
        }
    }

    fn existing() -> AnimationFile {
        let full = animation(vec![mv("a", 1.0), mv("b", 2.0), mv("c", 3.0)], &["root"]);
        let mut bytes = Vec::new();
        write_animation(&mut bytes, &full).unwrap();
        AnimationFile::parse(bytes).unwrap()
    }

    #[test]
    fn test_untouched_moves_are_byte_identical() {
        let existing = existing();
        let update = animation(vec![mv("b", 5.0)], &["root"]);
        let merged = AnimationFile::parse(merge_moves(&existing, &update).unwrap()).unwrap();

        let names: Vec<_> = merged.moves.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "c", "b"]);
        assert_eq!(merged.move_bytes(0), existing.move_bytes(0));
        assert_eq!(merged.move_bytes(1), existing.move_bytes(2));
        assert_eq!(merged.tables(), existing.tables());

        let b = &merged.moves[2].bones[0].keyframes[1];
        assert!((b.position.x - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_new_move_is_appended() {
        let existing = existing();
        let update = animation(vec![mv("d", 1.0)], &["root"]);
        let merged = AnimationFile::parse(merge_moves(&existing, &update).unwrap()).unwrap();
        assert_eq!(merged.moves.len(), 4);
        assert_eq!(merged.moves[3].name, "d");
    }

    #[test]
    fn test_bone_count_mismatch() {
        let existing = existing();
        let update = animation(vec![mv("b", 5.0)], &["root", "spine"]);
        let error = merge_moves(&existing, &update).unwrap_err();
        assert_eq!(
            error.downcast_ref::<AnimationError>(),
            Some(&AnimationError::BoneCountMismatch { file: 1, armature: 2 })
        );
    }

    #[test]
    fn test_vps_count_mismatch() {
        let existing = existing();
        let mut update = animation(vec![mv("b", 5.0)], &["root"]);
        update.vps = vec!["smile".into()];
        let error = merge_moves(&existing, &update).unwrap_err();
        assert_eq!(
            error.downcast_ref::<AnimationError>(),
            Some(&AnimationError::VpsCountMismatch { file: 0, current: 1 })
        );
    }

    #[test]
    fn test_update_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk.deanim");

        update_animation_file(&path, &animation(vec![mv("a", 1.0)], &["root"])).unwrap();
        update_animation_file(&path, &animation(vec![mv("b", 2.0)], &["root"])).unwrap();

        let file = AnimationFile::load(&path).unwrap();
        let names: Vec<_> = file.moves.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_rejected_update_leaves_file_alone() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("walk.deanim");
        update_animation_file(&path, &animation(vec![mv("a", 1.0)], &["root"])).unwrap();
        let before = std::fs::read(&path).unwrap();

        let mismatched = animation(vec![mv("a", 2.0)], &["root", "spine"]);
        assert!(update_animation_file(&path, &mismatched).is_err());
        assert_eq!(std::fs::read(&path).unwrap(), before);
    }
}
