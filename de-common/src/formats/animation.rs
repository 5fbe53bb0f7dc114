//! Animation binary format (.deanim)
//!
//! # Layout
//! ```text
//! 0x00: signature "Drag[en]gine Animation  " (24 bytes, two trailing spaces)
//! 0x18: version u8 (2)
//! 0x19: flags u8 (0)
//! 0x1A: bone table, vps table, moves
//! ```
//!
//! Every track starts with a flag byte. Tracks flagged ignored, or with no variable
//! component, have no further bytes. Tracks without the few-keyframes bit store
//! `playtime_frames + 1` keyframes with implicit frame indices.

use bitflags::bitflags;

pub const ANIMATION_SIGNATURE: &[u8; 24] = b"Drag[en]gine Animation  ";
pub const ANIMATION_VERSION: u8 = 2;

bitflags! {
    /// Bone track flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct BoneTrackFlags: u8 {
        const VAR_POSITION = 0b0000_0001;
        const VAR_ROTATION = 0b0000_0010;
        const VAR_SCALE = 0b0000_0100;
        const FEW_KEYFRAMES = 0b0000_1000;
        const IGNORED = 0b0001_0000;
        /// Set for f32 samples, clear for quantized i16 samples.
        const FLOAT_FORMAT = 0b0010_0000;
    }
}

bitflags! {
    /// Vertex position set track flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct VpsTrackFlags: u8 {
        const VAR_WEIGHT = 0b0000_0001;
        const FEW_KEYFRAMES = 0b0000_0010;
        const IGNORED = 0b0000_0100;
        const FLOAT_FORMAT = 0b0000_1000;
    }
}

impl BoneTrackFlags {
    pub fn has_samples(self) -> bool {
        !self.contains(Self::IGNORED)
            && self.intersects(Self::VAR_POSITION | Self::VAR_ROTATION | Self::VAR_SCALE)
    }
}

impl VpsTrackFlags {
    pub fn has_samples(self) -> bool {
        !self.contains(Self::IGNORED) && self.contains(Self::VAR_WEIGHT)
    }
}

/// Animation header (26 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AnimationHeader {
    pub version: u8,
    pub flags: u8,
}

impl AnimationHeader {
    pub const SIZE: usize = 26;

    pub fn new() -> Self {
        Self {
            version: ANIMATION_VERSION,
            flags: 0,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..24].copy_from_slice(ANIMATION_SIGNATURE);
        bytes[24] = self.version;
        bytes[25] = self.flags;
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || &bytes[0..24] != ANIMATION_SIGNATURE {
            return None;
        }
        Some(Self {
            version: bytes[24],
            flags: bytes[25],
        })
    }
}

impl Default for AnimationHeader {
    fn default() -> Self {
        Self::new()
    }
}
