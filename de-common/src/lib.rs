//! Shared types and utilities for the Drag[en]gine asset tools
//!
//! Used by `de-export` (scene to engine asset exporter) for its encoders, readers
//! and the coordinate conversion of every exported entity.
//!
//! # Modules
//!
//! - [`math`] - Host to engine coordinate conversion
//! - [`formats`] - Binary asset format headers, flags and encoding helpers

pub mod formats;
pub mod math;

// Re-export commonly used format items
pub use formats::{
    ANIMATION_EXT, AnimationHeader, BinarySerializable, BoneTrackFlags, LARGE_MODEL_THRESHOLD,
    LodFlags, MODEL_EXT, ModelHeader, NAVIGATION_SPACE_EXT, NavSpaceHeader, NavSpaceType,
    OCCLUSION_MESH_EXT, OcclusionMeshHeader, RIG_EXT, ReadFormatExt, TextureFlags,
    VpsTrackFlags, WriteFormatExt, read_header,
};

// Re-export coordinate conversion
pub use math::{
    convert_matrix, convert_matrix_bone, convert_position, float_to_string, matrix_to_euler,
    scale_matrix,
};
