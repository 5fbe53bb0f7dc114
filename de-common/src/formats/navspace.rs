//! Navigation space binary format (.denavspace)
//!
//! # Layout
//! ```text
//! 0x00: signature "Drag[en]gine Navigation Space" (29 bytes)
//! 0x1D: version u16 (1)
//! 0x1F: flags u16 (0)
//! 0x21: space_type u16
//! 0x23: vertex_count u16
//! 0x25: edge_count u16
//! 0x27: corner_count u16
//! 0x29: face_count u16
//! 0x2B: vertices, edges (grid), faces (mesh), corners
//! ```

use serde::{Deserialize, Serialize};

pub const NAVIGATION_SPACE_SIGNATURE: &[u8; 29] = b"Drag[en]gine Navigation Space";
pub const NAVIGATION_SPACE_VERSION: u16 = 1;

/// Kind of navigation space stored in the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u16)]
pub enum NavSpaceType {
    /// Edges between vertices.
    Grid = 0,
    /// Faces built from corners.
    #[default]
    Mesh = 1,
}

impl NavSpaceType {
    pub fn from_u16(value: u16) -> Option<Self> {
        match value {
            0 => Some(Self::Grid),
            1 => Some(Self::Mesh),
            _ => None,
        }
    }
}

/// Navigation space header (43 bytes)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavSpaceHeader {
    pub version: u16,
    pub flags: u16,
    pub space_type: NavSpaceType,
    pub vertex_count: u16,
    pub edge_count: u16,
    pub corner_count: u16,
    pub face_count: u16,
}

impl NavSpaceHeader {
    pub const SIZE: usize = 43;

    pub fn new(
        space_type: NavSpaceType,
        vertex_count: u16,
        edge_count: u16,
        corner_count: u16,
        face_count: u16,
    ) -> Self {
        Self {
            version: NAVIGATION_SPACE_VERSION,
            flags: 0,
            space_type,
            vertex_count,
            edge_count,
            corner_count,
            face_count,
        }
    }

    pub fn to_bytes(&self) -> [u8; Self::SIZE] {
        let mut bytes = [0u8; Self::SIZE];
        bytes[0..29].copy_from_slice(NAVIGATION_SPACE_SIGNATURE);
        let fields = [
            self.version,
            self.flags,
            self.space_type as u16,
            self.vertex_count,
            self.edge_count,
            self.corner_count,
            self.face_count,
        ];
        for (i, value) in fields.iter().enumerate() {
            let offset = 29 + i * 2;
            bytes[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
        }
        bytes
    }

    pub fn from_bytes(bytes: &[u8]) -> Option<Self> {
        if bytes.len() < Self::SIZE || &bytes[0..29] != NAVIGATION_SPACE_SIGNATURE {
            return None;
        }
        let field = |i: usize| {
            let offset = 29 + i * 2;
            u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
        };
        Some(Self {
            version: field(0),
            flags: field(1),
            space_type: NavSpaceType::from_u16(field(2))?,
            vertex_count: field(3),
            edge_count: field(4),
            corner_count: field(5),
            face_count: field(6),
        })
    }
}
