//! Shared types passed between the merge and render stages.
//!
//! The merge stage produces one [`GeneratedRecord`] per table row. The render
//! stage consumes those records directly instead of rediscovering documents
//! by listing the build directory and parsing file names. The records are
//! also written to `build/manifest.json` so the render stage can run on its
//! own.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;

/// Name of the sidecar manifest inside the build directory.
pub const MANIFEST_FILENAME: &str = "manifest.json";

/// A card type, derived from a table's file stem.
///
/// The same name keys the template (`template/<name>.toml`), the table
/// (`data/<name>.csv`) and the default names of generated documents.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeName(String);

impl TypeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One generated document, as recorded by the merge stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneratedRecord {
    pub type_name: TypeName,
    /// Zero-based row position within the type's table.
    pub ordinal: usize,
    /// Document name without extension, e.g. `monster-2`.
    pub name: String,
    /// Document path relative to the build directory.
    pub document: String,
    /// Which default sheet to export.
    pub sheet_index: usize,
}

impl GeneratedRecord {
    /// Image file name for this record: `<name>.png`.
    pub fn image_filename(&self) -> String {
        format!("{}.png", self.name)
    }
}

/// A PNG written by the render stage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedImage {
    pub name: String,
    /// Image path relative to the build directory.
    pub image: String,
    pub width: u32,
    pub height: u32,
    /// SHA-256 of the decoded RGBA pixels, hex encoded.
    pub sha256: String,
}

/// Sidecar manifest at `build/manifest.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildManifest {
    pub documents: Vec<GeneratedRecord>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<RenderedImage>,
}

impl BuildManifest {
    pub fn load(build_dir: &Path) -> Result<Self, ManifestError> {
        let content = std::fs::read_to_string(build_dir.join(MANIFEST_FILENAME))?;
        Ok(serde_json::from_str(&content)?)
    }

    pub fn save(&self, build_dir: &Path) -> Result<(), ManifestError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(build_dir.join(MANIFEST_FILENAME), json)?;
        Ok(())
    }
}

#[derive(thiserror::Error, Debug)]
pub enum ManifestError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
