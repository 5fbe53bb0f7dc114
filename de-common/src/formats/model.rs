//! Model binary format (.demodel)
//!
//! # Layout
//! ```text
//! 0x00: signature "Drag[en]gine Model" (18 bytes, no NUL)
//! 0x12: version u16 (6)
//! 0x14: flags u16 (0)
//! 0x16: bone_count u16
//! 0x18: texture_count u16
//! 0x1A: uv_set_count u16
//! 0x1C: vertex_position_set_count u16
//! 0x1E: lod_count u16
//! 0x20: bones, textures, uv sets, vertex position sets, lod levels
//! ```
//!
//! Index fields inside a LOD level are `u16`, or `u32` when the level carries
//! [`LodFlags::LARGE_MODEL`].

use bitflags::bitflags;

pub const MODEL_SIGNATURE: &[u8; 18] = b"Drag[en]gine Model";
pub const MODEL_VERSION: u16 = 6;

bitflags! {
    /// Per-texture flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct TextureFlags: u16 {
        const DOUBLE_SIDED = 0b0000_0001;
        /// Followed by a `u8` decal offset.
        const DECAL = 0b0000_0010;
    }
}

bitflags! {
    /// Per-LOD flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct LodFlags: u8 {
        /// Followed by an `f32` LOD error.
        const HAS_LOD_ERROR = 0b0000_0001;
        /// All index fields are 32 bit.
        const LARGE_MODEL = 0b0000_0010;
    }
}

/// Model header (32 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelHeader {
    pub version: u16,
    pub flags: u16,
    pub bone_count: u16,
    pub texture_count: u16,
    pub uv_set_count: u16,
    pub vps_count: u16,
    pub lod_count: u16,
}

impl ModelHeader {
    pub const SIZE: usize = 32;

    pub fn new(
        bone_count: u16,
        texture_count: u16,
        uv_set_count: u16,
        vps_count: u16,
        lod_count: u16,
    ) -> Self {
        Self {
            version: MODEL_VERSION,
            flags: 0,
            bone_count,
            texture_count,
            uv_set_count,
            vps_count,
            lod_count,
        }
    }

    /// Write header to bytes
    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..18].copy_from_slice(MODEL_SIGNATURE);
        let fields = [
            self.version,
            self.flags,
            self.bone_count,
            self.texture_count,
            self.uv_set_count,
            self.vps_count,
            self.lod_count,
        ];
        for (i, value) in fields.iter().enumerate() {
            let offset = 18 + i * 2;
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    /// Read header from bytes
    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || &bytes[0..18] != MODEL_SIGNATURE {
            return None;
        }
        let field = |i: usize| {
            let offset = 18 + i * 2;
            u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
        };
        Some(Self {
            version: field(0),
            flags: field(1),
            bone_count: field(2),
            texture_count: field(3),
            uv_set_count: field(4),
            vps_count: field(5),
            lod_count: field(6),
        })
    }
}
