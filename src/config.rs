//! Project configuration module.
//!
//! Handles loading, validating, and merging `deckforge.toml`. Stock defaults
//! are serialized to a TOML table and the user's file is merged on top, so a
//! project file only needs the keys it wants to change.
//!
//! ## Config File Location
//!
//! ```text
//! my-deck/
//! ├── deckforge.toml           # Optional, overrides stock defaults
//! ├── template/
//! ├── data/
//! └── build/                   # Recreated on every run
//! ```
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! [folders]
//! template = "template"     # Template blueprints, one <type>.toml per type
//! data = "data"             # Tables, one <type>.csv per type
//! build = "build"           # Output root, wiped at the start of each run
//! images = "images"         # Image subdirectory inside the build root
//!
//! [table]
//! extension = "csv"         # Files with this extension are tables
//! delimiter = ","
//! quote = "\""
//!
//! [render]
//! dpi = 300                 # Pixels per inch for exported sheets
//! synthesize_bleed = false  # Extend edge pixels into the bleed margin
//!
//! [pipeline]
//! on_error = "fail-fast"    # or "skip" to report failures and continue
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Component, Path};
use thiserror::Error;

/// Name of the project configuration file inside the project root.
pub const CONFIG_FILENAME: &str = "deckforge.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Project configuration loaded from `deckforge.toml`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProjectConfig {
    /// Input and output folder names, relative to the project root.
    pub folders: FoldersConfig,
    /// Table discovery and parsing settings.
    pub table: TableConfig,
    /// Rasterization settings.
    pub render: RenderConfig,
    /// Driver behaviour.
    pub pipeline: PipelineConfig,
}

impl ProjectConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let folders = [
            ("folders.template", &self.folders.template),
            ("folders.data", &self.folders.data),
            ("folders.build", &self.folders.build),
            ("folders.images", &self.folders.images),
        ];
        for (key, value) in folders {
            if value.trim().is_empty() {
                return Err(ConfigError::Validation(format!("{key} must not be empty")));
            }
            if !is_single_segment(value) {
                return Err(ConfigError::Validation(format!(
                    "{key} must be a plain folder name, got \"{value}\""
                )));
            }
        }
        if self.folders.build == self.folders.data || self.folders.build == self.folders.template {
            return Err(ConfigError::Validation(
                "folders.build must differ from the input folders".into(),
            ));
        }
        if self.table.extension.is_empty() || self.table.extension.starts_with('.') {
            return Err(ConfigError::Validation(
                "table.extension must be a bare extension like \"csv\"".into(),
            ));
        }
        let delimiter = single_ascii("table.delimiter", &self.table.delimiter)?;
        let quote = single_ascii("table.quote", &self.table.quote)?;
        if delimiter == quote {
            return Err(ConfigError::Validation(
                "table.delimiter and table.quote must differ".into(),
            ));
        }
        if !(1..=2400).contains(&self.render.dpi) {
            return Err(ConfigError::Validation(
                "render.dpi must be 1-2400".into(),
            ));
        }
        Ok(())
    }
}

/// One ordinary path segment: no separators, no `.` or `..`, not absolute.
fn is_single_segment(value: &str) -> bool {
    let mut components = Path::new(value).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    ) && !value.contains(['/', '\\'])
}

fn single_ascii(key: &str, value: &str) -> Result<u8, ConfigError> {
    match value.as_bytes() {
        [b] if b.is_ascii() => Ok(*b),
        _ => Err(ConfigError::Validation(format!(
            "{key} must be a single ASCII character"
        ))),
    }
}

/// Folder layout of a project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FoldersConfig {
    pub template: String,
    pub data: String,
    pub build: String,
    /// Nested under `build`.
    pub images: String,
}

impl Default for FoldersConfig {
    fn default() -> Self {
        Self {
            template: "template".to_string(),
            data: "data".to_string(),
            build: "build".to_string(),
            images: "images".to_string(),
        }
    }
}

/// Delimited-text settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TableConfig {
    /// Extension (without dot) marking a file in the data folder as a table.
    pub extension: String,
    pub delimiter: String,
    pub quote: String,
}

impl TableConfig {
    /// Delimiter as a byte. Call after [`ProjectConfig::validate`].
    pub fn delimiter_byte(&self) -> u8 {
        self.delimiter.as_bytes().first().copied().unwrap_or(b',')
    }

    /// Quote character as a byte. Call after [`ProjectConfig::validate`].
    pub fn quote_byte(&self) -> u8 {
        self.quote.as_bytes().first().copied().unwrap_or(b'"')
    }
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            extension: "csv".to_string(),
            delimiter: ",".to_string(),
            quote: "\"".to_string(),
        }
    }
}

/// Rasterization settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RenderConfig {
    /// Pixels per inch.
    pub dpi: u32,
    /// Extend sheet edges into the bleed margin declared by the template.
    pub synthesize_bleed: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            dpi: 300,
            synthesize_bleed: false,
        }
    }
}

/// What the driver does when a single type or document fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FailurePolicy {
    /// Stop the run at the first failure.
    #[default]
    FailFast,
    /// Report the failure, skip the item and keep going.
    Skip,
}

/// Driver settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    pub on_error: FailurePolicy,
}

// =============================================================================
// Config loading, merging, and validation
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
pub fn stock_defaults_value() -> toml::Value {
    toml::Value::try_from(ProjectConfig::default()).expect("default config must serialize")
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load `deckforge.toml` from a project root as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(root: &Path) -> Result<Option<toml::Value>, ConfigError> {
    let config_path = root.join(CONFIG_FILENAME);
    if !config_path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(&config_path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Merge an optional overlay onto a base value, then deserialize and validate.
pub fn resolve_config(
    base: toml::Value,
    overlay: Option<toml::Value>,
) -> Result<ProjectConfig, ConfigError> {
    let merged = match overlay {
        Some(ov) => merge_toml(base, ov),
        None => base,
    };
    let config: ProjectConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Load the project config, falling back to stock defaults.
pub fn load_config(root: &Path) -> Result<ProjectConfig, ConfigError> {
    resolve_config(stock_defaults_value(), load_raw_config(root)?)
}

/// Returns a fully-commented stock `deckforge.toml`.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# deckforge project configuration
# ===============================
# All settings are optional. Values shown below are the defaults.
# Unknown keys will cause an error.

# ---------------------------------------------------------------------------
# Folder layout, relative to the project root
# ---------------------------------------------------------------------------
[folders]
# One <type>.toml blueprint per card type.
template = "template"

# One <type>.csv table per card type. Every table found here is a type.
data = "data"

# Output root. Deleted and recreated at the start of every run.
build = "build"

# Rendered PNGs go to <build>/<images>.
images = "images"

# ---------------------------------------------------------------------------
# Tables
# ---------------------------------------------------------------------------
[table]
extension = "csv"
delimiter = ","
quote = "\""

# ---------------------------------------------------------------------------
# Rendering
# ---------------------------------------------------------------------------
[render]
# Pixels per inch for exported sheets.
dpi = 300

# Extend edge pixels into each sheet's bleed margin.
synthesize_bleed = false

# ---------------------------------------------------------------------------
# Pipeline
# ---------------------------------------------------------------------------
[pipeline]
# "fail-fast" stops at the first broken template, table or sheet.
# "skip" reports it, skips that type or document and keeps going.
on_error = "fail-fast"
"##
}
