//! Build helpers for engine modules
//!
//! - [`manifest`]: keep module manifests in sync with their library binaries
//! - [`codegen`]: generate the internal module registrar source

pub mod codegen;
pub mod manifest;

pub use codegen::{check_registrar, generate_registrar, write_registrar, ModuleList};
pub use manifest::{
    update_manifest, verify_manifest, Directive, DirectiveFile, LibraryDigest, Manifest,
    ManifestError,
};
