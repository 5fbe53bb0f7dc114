//! Module manifest maintenance
//!
//! A module manifest names its shared library inside `<library>` and records the
//! library's size and SHA-1:
//!
//! ```xml
//! <module>
//!     <library>
//!         <file>libdemodule.so</file>
//!         <size>42</size>
//!         <sha1>0123abcd...</sha1>
//!     </library>
//! </module>
//! ```
//!
//! The library is referenced by `<file>` (engine modules) or `<path>` (editor
//! modules), relative to the manifest.
//!
//! Rewrites keep the XML declaration and any comments or processing instructions
//! around the root element. Only UTF-8 manifests are accepted.

use anyhow::{Context, Result};
use serde::Deserialize;
use sha1::{Digest, Sha1};
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use xmltree::{Element, EmitterConfig, XMLNode};

const LIBRARY: &str = "library";
const SIZE: &str = "size";
const SHA1: &str = "sha1";
const VERSION: &str = "version";
const PRELOAD_LIBRARY: &str = "preloadLibrary";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const DEFAULT_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManifestError {
    #[error("manifest encoding '{0}' is not supported, only UTF-8")]
    UnsupportedEncoding(String),

    #[error("manifest has no <library> element")]
    MissingLibrary,

    #[error("<library> has neither a <file> nor a <path> element")]
    MissingFile,

    #[error("library binary not found: {0}")]
    MissingBinary(PathBuf),

    #[error("manifest version {found:?} does not match expected '{expected}'")]
    VersionMismatch {
        expected: String,
        found: Option<String>,
    },

    #[error("recorded {field} '{recorded}' does not match the library ('{actual}')")]
    Stale {
        field: &'static str,
        recorded: String,
        actual: String,
    },
}

// ============================================================================
// Library digest
// ============================================================================

/// Size and lowercase hex SHA-1 of a library binary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LibraryDigest {
    pub size: u64,
    pub sha1: String,
}

impl LibraryDigest {
    pub fn of_bytes(bytes: &[u8]) -> Self {
        Self {
            size: bytes.len() as u64,
            sha1: hex::encode(Sha1::digest(bytes)),
        }
    }

    pub fn of_file(path: &Path) -> Result<Self> {
        if !path.is_file() {
            return Err(ManifestError::MissingBinary(path.to_path_buf()).into());
        }
        let bytes = std::fs::read(path)
            .with_context(|| format!("Failed to read library: {}", path.display()))?;
        Ok(Self::of_bytes(&bytes))
    }
}

// ============================================================================
// Directives
// ============================================================================

/// Extra rewrites applied during an update, loaded from TOML:
///
/// ```toml
/// binary = "build/libdemodule.so"
///
/// [[directive]]
/// action = "filename"
/// keyword = "%FILENAME%"
///
/// [[directive]]
/// action = "preloadLibrary"
/// name = "libdependency.so"
/// ```
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectiveFile {
    /// Library to hash, relative to the manifest. Defaults to the `<file>`/`<path>`
    /// reference.
    #[serde(default)]
    pub binary: Option<String>,

    #[serde(default, rename = "directive")]
    pub directives: Vec<Directive>,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum Directive {
    /// Replace `keyword` with the library's file name.
    Filename { keyword: String },
    /// Replace `keyword` with the library's size.
    Filesize { keyword: String },
    /// Replace `keyword` with the library's SHA-1.
    Filehash { keyword: String },
    /// Add a `<preloadLibrary>` entry to `<library>`.
    PreloadLibrary { name: String },
    /// Replace `keyword` with `value`.
    Text { keyword: String, value: String },
}

impl DirectiveFile {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read directives: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse directives: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

// ============================================================================
// Manifest document
// ============================================================================

/// A parsed manifest and the directory its references are relative to.
#[derive(Debug, Clone)]
pub struct Manifest {
    root: Element,
    dir: PathBuf,
    bom: bool,
    /// XML declaration as written in the source
    declaration: Option<String>,
    /// Comments and processing instructions before the root element
    prolog: Vec<XMLNode>,
    epilog: Vec<XMLNode>,
}

impl Manifest {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read(path)
            .with_context(|| format!("Failed to read manifest: {}", path.display()))?;
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();
        Self::parse(&content, dir)
            .with_context(|| format!("Failed to parse manifest: {}", path.display()))
    }

    pub fn parse(content: &[u8], dir: PathBuf) -> Result<Self> {
        if content.starts_with(b"\xFF\xFE") || content.starts_with(b"\xFE\xFF") {
            return Err(ManifestError::UnsupportedEncoding("UTF-16".into()).into());
        }
        let (bom, body) = match content.strip_prefix(UTF8_BOM) {
            Some(body) => (true, body),
            None => (false, content),
        };

        let declaration = xml_declaration(body)?;
        if let Some(encoding) = declaration.as_deref().and_then(declared_encoding) {
            if !encoding.eq_ignore_ascii_case("UTF-8") {
                return Err(ManifestError::UnsupportedEncoding(encoding.to_string()).into());
            }
        }

        let mut prolog = Vec::new();
        let mut epilog = Vec::new();
        let mut root = None;
        for node in Element::parse_all(body)? {
            match node {
                XMLNode::Element(element) if root.is_none() => root = Some(element),
                node if root.is_none() => prolog.push(node),
                node => epilog.push(node),
            }
        }
        let root = root.context("Manifest has no root element")?;

        Ok(Self {
            root,
            dir,
            bom,
            declaration,
            prolog,
            epilog,
        })
    }

    fn library(&self) -> Result<&Element, ManifestError> {
        self.root.get_child(LIBRARY).ok_or(ManifestError::MissingLibrary)
    }

    fn library_mut(&mut self) -> Result<&mut Element, ManifestError> {
        self.root
            .get_mut_child(LIBRARY)
            .ok_or(ManifestError::MissingLibrary)
    }

    /// Library reference: the first `<file>` or `<path>` child of `<library>`.
    pub fn binary_reference(&self) -> Result<String, ManifestError> {
        self.library()?
            .children
            .iter()
            .filter_map(XMLNode::as_element)
            .find(|child| child.name == "file" || child.name == "path")
            .map(element_text)
            .filter(|text| !text.is_empty())
            .ok_or(ManifestError::MissingFile)
    }

    pub fn binary_path(&self) -> Result<PathBuf, ManifestError> {
        Ok(self.dir.join(self.binary_reference()?))
    }

    /// Text of a `<library>` child.
    pub fn library_value(&self, name: &str) -> Option<String> {
        self.library().ok()?.get_child(name).map(element_text)
    }

    pub fn version(&self) -> Option<String> {
        self.root.get_child(VERSION).map(element_text)
    }

    pub fn set_digest(&mut self, digest: &LibraryDigest) -> Result<(), ManifestError> {
        let library = self.library_mut()?;
        set_child_text(library, SIZE, &digest.size.to_string());
        set_child_text(library, SHA1, &digest.sha1);
        Ok(())
    }

    pub fn apply(&mut self, directive: &Directive, binary: &Path, digest: &LibraryDigest) -> Result<()> {
        match directive {
            Directive::Filename { keyword } => {
                let name = binary
                    .file_name()
                    .and_then(|name| name.to_str())
                    .with_context(|| format!("Invalid library file name: {}", binary.display()))?;
                replace_text(&mut self.root, keyword, name);
            }
            Directive::Filesize { keyword } => {
                replace_text(&mut self.root, keyword, &digest.size.to_string());
            }
            Directive::Filehash { keyword } => {
                replace_text(&mut self.root, keyword, &digest.sha1);
            }
            Directive::Text { keyword, value } => {
                replace_text(&mut self.root, keyword, value);
            }
            Directive::PreloadLibrary { name } => {
                let library = self.library_mut()?;
                let present = library
                    .children
                    .iter()
                    .filter_map(XMLNode::as_element)
                    .any(|child| child.name == PRELOAD_LIBRARY && element_text(child) == *name);
                if !present {
                    library
                        .children
                        .push(XMLNode::Element(text_element(PRELOAD_LIBRARY, name)));
                }
            }
        }
        Ok(())
    }

    /// Serialize with tab indentation, behind the source's own declaration (UTF-8 if
    /// it had none).
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut bytes = Vec::new();
        if self.bom {
            bytes.extend_from_slice(UTF8_BOM);
        }
        let declaration = self.declaration.as_deref().unwrap_or(DEFAULT_DECLARATION);
        writeln!(bytes, "{}", declaration)?;
        for node in &self.prolog {
            write_misc(&mut bytes, node)?;
        }

        let config = EmitterConfig::new()
            .perform_indent(true)
            .indent_string("\t")
            .write_document_declaration(false);
        self.root
            .write_with_config(&mut bytes, config)
            .context("Failed to write manifest XML")?;
        bytes.push(b'\n');

        for node in &self.epilog {
            write_misc(&mut bytes, node)?;
        }
        Ok(bytes)
    }
}

/// The `<?xml ...?>` declaration at the start of the document, if any.
fn xml_declaration(body: &[u8]) -> Result<Option<String>> {
    let is_declaration = body.starts_with(b"<?xml")
        && body.get(5).is_some_and(|c| c.is_ascii_whitespace());
    if !is_declaration {
        return Ok(None);
    }
    let end = body
        .windows(2)
        .position(|w| w == b"?>")
        .context("Unterminated XML declaration")?;
    let declaration = std::str::from_utf8(&body[..end + 2]).context("XML declaration is not ASCII")?;
    Ok(Some(declaration.to_string()))
}

fn declared_encoding(declaration: &str) -> Option<&str> {
    let (_, rest) = declaration.split_once("encoding")?;
    let rest = rest.trim_start().strip_prefix('=')?.trim_start();
    let quote = rest.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    rest[1..].split(quote).next()
}

/// Write a comment or processing instruction on its own line.
fn write_misc(bytes: &mut Vec<u8>, node: &XMLNode) -> Result<()> {
    match node {
        XMLNode::Comment(comment) => writeln!(bytes, "<!--{}-->", comment)?,
        XMLNode::ProcessingInstruction(name, Some(data)) => writeln!(bytes, "<?{} {}?>", name, data)?,
        XMLNode::ProcessingInstruction(name, None) => writeln!(bytes, "<?{}?>", name)?,
        _ => {}
    }
    Ok(())
}

fn element_text(element: &Element) -> String {
    element
        .get_text()
        .map(|text| text.trim().to_string())
        .unwrap_or_default()
}

fn text_element(name: &str, text: &str) -> Element {
    let mut element = Element::new(name);
    element.children.push(XMLNode::Text(text.to_string()));
    element
}

fn set_child_text(parent: &mut Element, name: &str, text: &str) {
    match parent.get_mut_child(name) {
        Some(child) => child.children = vec![XMLNode::Text(text.to_string())],
        None => parent.children.push(XMLNode::Element(text_element(name, text))),
    }
}

/// Replace `keyword` in every text node and attribute value below `element`.
fn replace_text(element: &mut Element, keyword: &str, value: &str) {
    for attribute in element.attributes.values_mut() {
        if attribute.contains(keyword) {
            *attribute = attribute.replace(keyword, value);
        }
    }
    for child in &mut element.children {
        match child {
            XMLNode::Element(child) => replace_text(child, keyword, value),
            XMLNode::Text(text) | XMLNode::CData(text) if text.contains(keyword) => {
                *text = text.replace(keyword, value);
            }
            _ => {}
        }
    }
}

// ============================================================================
// Operations
// ============================================================================

/// Recompute the library size and SHA-1 and write them into the manifest.
///
/// The manifest is only rewritten once every directive applied cleanly.
pub fn update_manifest(path: &Path, directives: Option<&DirectiveFile>) -> Result<LibraryDigest> {
    let mut manifest = Manifest::load(path)?;

    let binary = match directives.and_then(|d| d.binary.as_deref()) {
        Some(binary) => manifest.dir.join(binary),
        None => manifest.binary_path()?,
    };
    let digest = LibraryDigest::of_file(&binary)?;
    debug!("{}: {} bytes, sha1 {}", binary.display(), digest.size, digest.sha1);

    for directive in directives.map(|d| d.directives.as_slice()).unwrap_or_default() {
        manifest
            .apply(directive, &binary, &digest)
            .with_context(|| format!("Directive {:?}", directive))?;
    }
    manifest.set_digest(&digest)?;

    let bytes = manifest.to_bytes()?;
    std::fs::write(path, bytes)
        .with_context(|| format!("Failed to write manifest: {}", path.display()))?;

    info!(
        "Updated {}: size {}, sha1 {}",
        path.display(),
        digest.size,
        digest.sha1
    );
    Ok(digest)
}

/// Check that the manifest matches its library and, if given, the expected version.
pub fn verify_manifest(path: &Path, expected_version: Option<&str>) -> Result<LibraryDigest> {
    let manifest = Manifest::load(path)?;

    if let Some(expected) = expected_version {
        let found = manifest.version();
        if found.as_deref() != Some(expected) {
            return Err(ManifestError::VersionMismatch {
                expected: expected.to_string(),
                found,
            }
            .into());
        }
    }

    let binary = manifest.binary_path()?;
    let digest = LibraryDigest::of_file(&binary)?;

    let recorded_size = manifest.library_value(SIZE).unwrap_or_default();
    if recorded_size != digest.size.to_string() {
        return Err(ManifestError::Stale {
            field: SIZE,
            recorded: recorded_size,
            actual: digest.size.to_string(),
        }
        .into());
    }

    let recorded_sha1 = manifest.library_value(SHA1).unwrap_or_default();
    if !recorded_sha1.eq_ignore_ascii_case(&digest.sha1) {
        return Err(ManifestError::Stale {
            field: SHA1,
            recorded: recorded_sha1,
            actual: digest.sha1,
        }
        .into());
    }

    info!("{} matches {}", path.display(), binary.display());
    Ok(digest)
}
