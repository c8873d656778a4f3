//! Template registry and document model.
//!
//! A [`Template`] is the immutable blueprint for one card type, parsed from
//! `template/<type>.toml`. It declares the bindable fields with their default
//! values and the ordered list of sheets (faces) every card of that type has.
//!
//! A [`Document`] is one concrete card: a fresh instance of the blueprint with
//! row values bound into its fields. Every row gets its own instance from
//! [`Template::instantiate`], so a value bound for one row can never show up
//! in the next.
//!
//! ## Template format
//!
//! ```toml
//! [fields]
//! name = ""
//! color = "#ffffff"
//!
//! [[sheets]]
//! name = "front"
//! width = 2.5          # inches
//! height = 3.5
//! bleed = 0.125        # inches, used only when bleed synthesis is on
//! background = "{color}"
//!
//! [[sheets.layers]]
//! kind = "rect"
//! x = 0.1
//! y = 0.1
//! width = 2.3
//! height = 0.4
//! fill = "#00000080"
//! visible = "{name}"
//!
//! [[sheets.layers]]
//! kind = "picture"
//! src = "art/{name}.png"
//! x = 0.2
//! y = 0.6
//! width = 2.1
//! height = 1.5
//! ```
//!
//! String properties may reference fields as `{field}`. Literal braces are
//! written `{{` and `}}`; references to unknown fields are left as written.

use crate::project::Project;
use crate::types::TypeName;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Extension of template blueprints.
pub const TEMPLATE_EXTENSION: &str = "toml";

/// Extension of generated documents in the build directory.
pub const DOCUMENT_EXTENSION: &str = "json";

#[derive(Error, Debug)]
pub enum TemplateError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Failed to parse template {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
    #[error("Invalid template {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
    #[error("Document JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
}

/// Immutable blueprint for one card type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Template {
    /// Bindable fields and their default values.
    #[serde(default)]
    pub fields: BTreeMap<String, String>,
    /// Default sheets, in face order.
    pub sheets: Vec<Sheet>,
}

/// One renderable face. Geometry is in inches.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Sheet {
    pub name: String,
    pub width: f32,
    pub height: f32,
    #[serde(default)]
    pub bleed: f32,
    #[serde(default = "default_background")]
    pub background: String,
    #[serde(default)]
    pub layers: Vec<Layer>,
}

fn default_background() -> String {
    "#ffffff".to_string()
}

/// A drawing layer, painted in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Layer {
    /// Solid (optionally translucent) rectangle.
    Rect {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        fill: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visible: Option<String>,
    },
    /// Raster image scaled to cover its frame, center-cropped.
    Picture {
        x: f32,
        y: f32,
        width: f32,
        height: f32,
        /// Path relative to the project root. Empty means "no picture".
        src: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        visible: Option<String>,
    },
}

/// Placement of a layer on its sheet, in inches from the top-left corner.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Frame {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Layer {
    pub fn frame(&self) -> Frame {
        match *self {
            Layer::Rect {
                x, y, width, height, ..
            }
            | Layer::Picture {
                x, y, width, height, ..
            } => Frame {
                x,
                y,
                width,
                height,
            },
        }
    }

    /// A layer is hidden when its `visible` property resolves to `""`, `"0"`
    /// or `"false"`.
    pub fn is_visible(&self) -> bool {
        let visible = match self {
            Layer::Rect { visible, .. } | Layer::Picture { visible, .. } => visible,
        };
        match visible.as_deref().map(str::trim) {
            None => true,
            Some(v) => !(v.is_empty() || v == "0" || v.eq_ignore_ascii_case("false")),
        }
    }

    fn resolve(&self, fields: &BTreeMap<String, String>) -> Layer {
        let mut layer = self.clone();
        match &mut layer {
            Layer::Rect { fill, visible, .. } => {
                *fill = substitute(fill, fields);
                if let Some(v) = visible {
                    *v = substitute(v, fields);
                }
            }
            Layer::Picture { src, visible, .. } => {
                *src = substitute(src, fields);
                if let Some(v) = visible {
                    *v = substitute(v, fields);
                }
            }
        }
        layer
    }
}

impl Sheet {
    fn resolve(&self, fields: &BTreeMap<String, String>) -> Sheet {
        Sheet {
            name: self.name.clone(),
            width: self.width,
            height: self.height,
            bleed: self.bleed,
            background: substitute(&self.background, fields),
            layers: self.layers.iter().map(|l| l.resolve(fields)).collect(),
        }
    }
}

impl Template {
    /// Parse a template from TOML text. `path` is used for error messages.
    pub fn parse(text: &str, path: &Path) -> Result<Self, TemplateError> {
        let template: Template = toml::from_str(text).map_err(|source| TemplateError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        template.validate(path)?;
        Ok(template)
    }

    fn validate(&self, path: &Path) -> Result<(), TemplateError> {
        let invalid = |reason: String| TemplateError::Invalid {
            path: path.to_path_buf(),
            reason,
        };
        if self.sheets.is_empty() {
            return Err(invalid("at least one [[sheets]] entry is required".into()));
        }
        for sheet in &self.sheets {
            if sheet.width <= 0.0 || sheet.height <= 0.0 {
                return Err(invalid(format!(
                    "sheet '{}' must have a positive width and height",
                    sheet.name
                )));
            }
            if sheet.bleed < 0.0 {
                return Err(invalid(format!(
                    "sheet '{}' has a negative bleed",
                    sheet.name
                )));
            }
            for layer in &sheet.layers {
                let frame = layer.frame();
                if frame.width < 0.0 || frame.height < 0.0 {
                    return Err(invalid(format!(
                        "sheet '{}' has a layer with negative size",
                        sheet.name
                    )));
                }
            }
        }
        Ok(())
    }

    /// A pristine document of this type with every field at its default.
    pub fn instantiate(&self, type_name: &TypeName) -> Document {
        Document {
            type_name: type_name.clone(),
            defaults: self.fields.clone(),
            fields: self.fields.clone(),
            sheets: self.sheets.clone(),
        }
    }
}

/// Load the template blueprint at `path`.
pub fn load_template(path: &Path) -> Result<Template, TemplateError> {
    let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Template::parse(&text, path)
}

/// Resolve a type name to its blueprint inside `project` and load it.
pub fn resolve_template(project: &Project, type_name: &TypeName) -> Result<Template, TemplateError> {
    load_template(&project.template_path(type_name))
}

/// A concrete card: a template instance with bound field values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub type_name: TypeName,
    defaults: BTreeMap<String, String>,
    fields: BTreeMap<String, String>,
    sheets: Vec<Sheet>,
}

impl Document {
    /// Bind `value` to the field `name`. Returns `false` (and changes nothing)
    /// when the template has no such field.
    pub fn bind_field(&mut self, name: &str, value: &str) -> bool {
        match self.fields.get_mut(name) {
            Some(slot) => {
                *slot = value.to_string();
                true
            }
            None => false,
        }
    }

    /// Restore every field to its template default.
    pub fn clear_fields(&mut self) {
        self.fields = self.defaults.clone();
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    pub fn fields(&self) -> &BTreeMap<String, String> {
        &self.fields
    }

    pub fn sheet_count(&self) -> usize {
        self.sheets.len()
    }

    /// The document's default sheets in face order, with field references
    /// resolved against the bound values.
    pub fn default_sheets(&self) -> Vec<Sheet> {
        self.sheets.iter().map(|s| s.resolve(&self.fields)).collect()
    }

    pub fn save(&self, path: &Path) -> Result<(), TemplateError> {
        let json = serde_json::to_string_pretty(self).map_err(|source| TemplateError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, json).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        let text = std::fs::read_to_string(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&text).map_err(|source| TemplateError::Json {
            path: path.to_path_buf(),
            source,
        })
    }
}

/// Replace `{field}` references in `text` with bound values.
pub fn substitute(text: &str, fields: &BTreeMap<String, String>) -> String {
    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(pos) = rest.find(['{', '}']) {
        out.push_str(&rest[..pos]);
        let tail = &rest[pos..];
        if tail.starts_with("{{") {
            out.push('{');
            rest = &tail[2..];
        } else if tail.starts_with("}}") {
            out.push('}');
            rest = &tail[2..];
        } else if tail.starts_with('{') {
            match tail.find('}') {
                Some(end) => {
                    let key = &tail[1..end];
                    match fields.get(key) {
                        Some(value) => out.push_str(value),
                        None => out.push_str(&tail[..=end]),
                    }
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push_str(tail);
                    rest = "";
                }
            }
        } else {
            out.push('}');
            rest = &tail[1..];
        }
    }
    out.push_str(rest);
    out
}
