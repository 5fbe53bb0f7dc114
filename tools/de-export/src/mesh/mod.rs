//! Mesh resolver
//!
//! Turns an evaluated host mesh into the tables the model, occlusion and navigation
//! encoders write: interned weight sets and texture coordinates, edges with
//! manifold ownership, faces with per-corner normal and tangent buckets, and the LOD
//! chain.

mod corners;
mod lod;
mod resolve;
pub mod types;

pub use corners::{assign_buckets, CornerBuckets};
pub use lod::resolve_model;
pub use resolve::resolve_mesh;
pub use types::*;

/// Fatal mesh validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum MeshError {
    #[error("mesh '{0}' not found")]
    UnknownMesh(String),

    #[error("mesh '{mesh}': edge {edge} is shared by more than two faces (non-manifold)")]
    NonManifoldMesh { mesh: String, edge: u32 },

    #[error("mesh '{mesh}': face {face} has fewer than three vertices")]
    DegenerateFace { mesh: String, face: u32 },

    #[error("mesh '{mesh}' has no materials")]
    NoMaterials { mesh: String },

    #[error("mesh '{mesh}': export name '{name}' is used by more than one material")]
    DuplicateExportName { mesh: String, name: String },

    #[error("mesh '{mesh}' has no UV layers")]
    NoUVSets { mesh: String },

    #[error("mesh '{mesh}' has no UV seams; mark seams or enable the no-seams override")]
    MissingUVSeams { mesh: String },

    #[error("mesh '{mesh}': LOD {lod} materials differ from the base mesh")]
    LodMaterialMismatch { mesh: String, lod: usize },

    #[error("mesh '{mesh}': LOD {lod} UV layers differ from the base mesh")]
    LodUVSetMismatch { mesh: String, lod: usize },

    #[error("mesh '{mesh}': LOD {lod} error is missing or smaller than the previous level")]
    LodErrorOrdering { mesh: String, lod: usize },

    #[error("mesh '{mesh}': LOD {lod} uses a different armature than the base mesh")]
    LodArmatureMismatch { mesh: String, lod: usize },

    #[error("mesh '{mesh}': LOD chain loops back to '{repeated}'")]
    LodLoop { mesh: String, repeated: String },

    #[error("mesh '{mesh}': no edge between vertices {a} and {b} of face {face}")]
    MissingEdge { mesh: String, face: u32, a: u32, b: u32 },

    #[error("mesh '{mesh}': vertex index {vertex} out of range")]
    InvalidVertex { mesh: String, vertex: u32 },

    #[error("mesh '{mesh}': face {face} uses material {material} which does not exist")]
    InvalidMaterial { mesh: String, face: u32, material: u16 },

    #[error("mesh '{mesh}': UV layer '{layer}' has {found} entries, expected {expected}")]
    UvLayerSize {
        mesh: String,
        layer: String,
        found: usize,
        expected: usize,
    },
}
