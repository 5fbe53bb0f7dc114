//! Greedy keyframe reduction
//!
//! Starting from the first sample, the anchor stays put while every sample between it
//! and the current candidate lies within threshold of the straight line joining them.
//! The first candidate that breaks the line commits the sample before it as the next
//! anchor. The last sample is always kept.

use super::{BoneKeyframe, VpsKeyframe};
use crate::armature::Thresholds;

/// A sample that can be checked against linear interpolation between two others.
pub trait Interpolated: Copy {
    fn frame(&self) -> u16;

    /// True if `self` lies further than the thresholds from the line between `first`
    /// and `last`, evaluated at `self`'s frame.
    fn deviates(&self, first: &Self, last: &Self, thresholds: &Thresholds) -> bool;
}

fn factor(frame: u16, first: u16, last: u16) -> f32 {
    let span = last as f32 - first as f32;
    if span == 0.0 {
        0.0
    } else {
        (frame as f32 - first as f32) / span
    }
}

impl Interpolated for BoneKeyframe {
    fn frame(&self) -> u16 {
        self.frame
    }

    fn deviates(&self, first: &Self, last: &Self, thresholds: &Thresholds) -> bool {
        let t = factor(self.frame, first.frame, last.frame);
        let position = first.position.lerp(last.position, t);
        let rotation = first.rotation.lerp(last.rotation, t);
        let scale = first.scale.lerp(last.scale, t);
        (self.position - position).length() > thresholds.position
            || (self.rotation - rotation).length() > thresholds.rotation
            || (self.scale - scale).length() > thresholds.scale
    }
}

impl Interpolated for VpsKeyframe {
    fn frame(&self) -> u16 {
        self.frame
    }

    fn deviates(&self, first: &Self, last: &Self, thresholds: &Thresholds) -> bool {
        let t = factor(self.frame, first.frame, last.frame);
        let weight = first.weight + (last.weight - first.weight) * t;
        (self.weight - weight).abs() > thresholds.weight
    }
}

fn is_linear<K: Interpolated>(keys: &[K], first: usize, last: usize, thresholds: &Thresholds) -> bool {
    keys[first + 1..last]
        .iter()
        .all(|key| !key.deviates(&keys[first], &keys[last], thresholds))
}

pub fn optimize_keyframes<K: Interpolated>(keys: &[K], thresholds: &Thresholds) -> Vec<K> {
    let Some(&head) = keys.first() else {
        return Vec::new();
    };

    let mut kept = vec![head];
    let mut first = 0;
    for index in 2..keys.len() {
        if !is_linear(keys, first, index, thresholds) {
            first = index - 1;
            kept.push(keys[first]);
        }
    }
    if first < keys.len() - 1 {
        kept.push(keys[keys.len() - 1]);
    }
    kept
}
