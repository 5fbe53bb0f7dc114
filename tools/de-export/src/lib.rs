//! de-export library
//!
//! Converts a host scene (meshes, armatures, actions) into Drag[en]gine assets:
//! `.demodel`, `.deanim`, `.derig`, `.deoccmesh` and `.denavspace`.

pub mod animation;
pub mod armature;
pub mod config;
pub mod export;
pub mod formats;
pub mod mesh;
pub mod partial;
pub mod progress;
pub mod scene;
pub mod snapshot;

pub use animation::{Animation, AnimationError, Move, MoveSelection};
pub use armature::{resolve_armature, Armature, Bone, Thresholds};
pub use config::{ConfigError, Configuration};
pub use export::{
    encode_model, encode_navigation_space, encode_occlusion_mesh, encode_rig, export_animation,
    export_model, export_navigation_space, export_occlusion_mesh, export_rig, AnimationOptions,
};
pub use formats::AnimationFile;
pub use mesh::{resolve_mesh, resolve_model, Mesh, MeshError};
pub use partial::update_animation_file;
pub use progress::Progress;
pub use scene::SceneSource;
pub use snapshot::SceneSnapshot;
