//! Shared test utilities for the deckforge test suite.
//!
//! The fixture project under `fixtures/project/` has two card types:
//!
//! ```text
//! template/monster.toml   data/monster.csv   3 rows, front/back, one extra column
//! template/item.toml      data/item.csv      1 row, exports the back (sheet = 1)
//! ```
//!
//! # Usage
//!
//! ```ignore
//! use crate::test_helpers::*;
//!
//! let tmp = setup_fixtures();
//! let project = open_fixture(&tmp);
//! let summary = run(&project, ...).unwrap();
//!
//! let goblin = find_record(&summary, "monster-0");
//! assert_eq!(goblin.sheet_index, 0);
//! ```

use std::collections::BTreeSet;
use std::path::Path;
use tempfile::TempDir;

use crate::pipeline::BuildSummary;
use crate::project::Project;
use crate::types::{GeneratedRecord, RenderedImage};

// =========================================================================
// Fixture setup
// =========================================================================

/// Copy `fixtures/project/` to a temp directory and return it.
///
/// Tests get an isolated copy they can mutate without affecting other tests
/// or the source fixtures.
pub fn setup_fixtures() -> TempDir {
    let tmp = TempDir::new().unwrap();
    let fixtures = Path::new(env!("CARGO_MANIFEST_DIR")).join("fixtures/project");
    copy_dir_recursive(&fixtures, tmp.path()).unwrap();
    tmp
}

/// Open the copied fixture project with its (default) configuration.
pub fn open_fixture(tmp: &TempDir) -> Project {
    Project::open(tmp.path()).unwrap()
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            std::fs::create_dir_all(&dst_path)?;
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            std::fs::copy(&src_path, &dst_path)?;
        }
    }
    Ok(())
}

// =========================================================================
// Summary lookups — panics with a clear message on miss
// =========================================================================

/// Find a generated record by document name. Panics if not found.
pub fn find_record<'a>(summary: &'a BuildSummary, name: &str) -> &'a GeneratedRecord {
    summary
        .documents
        .iter()
        .find(|r| r.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = summary.documents.iter().map(|r| r.name.as_str()).collect();
            panic!("document '{name}' not found. Available: {names:?}")
        })
}

/// Find a rendered image by document name. Panics if not found.
pub fn find_image<'a>(summary: &'a BuildSummary, name: &str) -> &'a RenderedImage {
    summary
        .images
        .iter()
        .find(|i| i.name == name)
        .unwrap_or_else(|| {
            let names: Vec<&str> = summary.images.iter().map(|i| i.name.as_str()).collect();
            panic!("image '{name}' not found. Available: {names:?}")
        })
}

/// All document names. A set, because type order follows the directory
/// listing.
pub fn document_names(summary: &BuildSummary) -> BTreeSet<&str> {
    summary.documents.iter().map(|r| r.name.as_str()).collect()
}
