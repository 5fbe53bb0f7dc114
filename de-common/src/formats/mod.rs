//! Drag[en]gine binary asset formats
//!
//! All formats are little-endian and tightly packed. Every file starts with an ASCII
//! signature (no NUL) followed by a version number. Headers implement
//! [`BinarySerializable`]; variable-length sections are written by the exporter with
//! the helpers from [`io`].

pub mod animation;
pub mod io;
pub mod model;
pub mod navspace;
pub mod occlusion;
mod serialization;

pub use animation::*;
pub use io::{ReadFormatExt, WriteFormatExt};
pub use model::*;
pub use navspace::*;
pub use occlusion::*;
pub use serialization::{read_header, BinarySerializable};

/// File extensions, without the leading dot
pub const MODEL_EXT: &str = "demodel";
pub const ANIMATION_EXT: &str = "deanim";
pub const RIG_EXT: &str = "derig";
pub const OCCLUSION_MESH_EXT: &str = "deoccmesh";
pub const NAVIGATION_SPACE_EXT: &str = "denavspace";

/// Index counts above this switch a model LOD to 32-bit indices.
pub const LARGE_MODEL_THRESHOLD: usize = 65000;

/// Quantization factor for positions, scales and weights in short formats.
pub const QUANT_LINEAR: f32 = 1000.0;

/// Quantization factor for rotations (degrees) in short formats.
pub const QUANT_ROTATION: f32 = 100.0;
