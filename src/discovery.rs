//! Type discovery.
//!
//! Every table file directly inside the data folder defines one card type; its
//! file stem is the type name. Subdirectories are not searched and hidden
//! files are skipped. The extension must match exactly, case included, since
//! the table is later reopened as `<type>.<extension>`.
//!
//! The returned order is the order the directory listing produced. It is not
//! sorted and differs between filesystems, so callers must not depend on it.

use crate::types::TypeName;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoveryError {
    #[error("Cannot list data directory {path}: {source}")]
    Walk {
        path: PathBuf,
        source: walkdir::Error,
    },
}

/// Enumerate the types defined by `*.<extension>` files in `data_dir`.
pub fn discover_types(data_dir: &Path, extension: &str) -> Result<Vec<TypeName>, DiscoveryError> {
    let mut types = Vec::new();
    for entry in WalkDir::new(data_dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|source| DiscoveryError::Walk {
            path: data_dir.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(name) = table_type_name(entry.path(), extension) {
            types.push(name);
        }
    }
    tracing::debug!(dir = %data_dir.display(), count = types.len(), "discovered types");
    Ok(types)
}

fn table_type_name(path: &Path, extension: &str) -> Option<TypeName> {
    let file_name = path.file_name()?.to_str()?;
    if file_name.starts_with('.') {
        return None;
    }
    let matches = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e == extension);
    if !matches {
        return None;
    }
    let stem = path.file_stem()?.to_str()?;
    Some(TypeName::new(stem))
}
