//! Occlusion mesh binary format (.deoccmesh)
//!
//! # Layout
//! ```text
//! 0x00: signature "Drag[en]gine Occlusion Mesh" (27 bytes)
//! 0x1B: version u16 (1)
//! 0x1D: flags u16 (0)
//! 0x1F: bones, weight sets, vertices, face tables
//! ```
//!
//! Faces are split in two runs: single-sided faces first, double-sided after. The
//! double-sided count is stored next to the face count.

pub const OCCLUSION_MESH_SIGNATURE: &[u8; 27] = b"Drag[en]gine Occlusion Mesh";
pub const OCCLUSION_MESH_VERSION: u16 = 1;

/// Occlusion mesh header (31 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OcclusionMeshHeader {
    pub version: u16,
    pub flags: u16,
}

impl OcclusionMeshHeader {
    pub const SIZE: usize = 31;

    pub fn new() -> Self {
        Self {
            version: OCCLUSION_MESH_VERSION,
            flags: 0,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..27].copy_from_slice(OCCLUSION_MESH_SIGNATURE);
        bytes[27..29].copy_from_slice(&self.version.to_le_bytes());
        bytes[29..31].copy_from_slice(&self.flags.to_le_bytes());
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || &bytes[0..27] != OCCLUSION_MESH_SIGNATURE {
            return None;
        }
        Some(Self {
            version: u16::from_le_bytes([bytes[27], bytes[28]]),
            flags: u16::from_le_bytes([bytes[29], bytes[30]]),
        })
    }
}

impl Default for OcclusionMeshHeader {
    fn default() -> Self {
        Self::new()
    }
}
