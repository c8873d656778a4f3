//! Row merge engine.
//!
//! Turns every row of a type's table into one generated document. Each row
//! starts from a pristine [`Template::instantiate`] copy, so values never leak
//! from one row into the next.
//!
//! ## Reserved columns
//!
//! | Column | Effect |
//! |---|---|
//! | `file` | Document name instead of `<type>-<ordinal>` |
//! | `sheet` | Index of the sheet to export |
//!
//! Reserved columns are never bound as template fields. Without a `sheet`
//! column the index comes from the trailing `-N` of a `file` name
//! (`01104-0-1` exports sheet 1), and defaults to 0.
//!
//! All rows of a type are bound and checked before anything is written, so a
//! bad row leaves no partial output for its type.

use crate::naming::{document_name, is_valid_document_name, parse_document_name};
use crate::table::RowRecord;
use crate::template::{DOCUMENT_EXTENSION, Document, Template, TemplateError};
use crate::types::{GeneratedRecord, MANIFEST_FILENAME, TypeName};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Column that overrides the generated document name.
pub const FILE_COLUMN: &str = "file";
/// Column that selects the exported sheet.
pub const SHEET_COLUMN: &str = "sheet";

#[derive(Error, Debug)]
pub enum MergeError {
    #[error("Row {row}: {reason}")]
    Row { row: usize, reason: String },
    #[error("Document '{name}' already exists")]
    Duplicate { name: String },
    #[error(transparent)]
    Save(#[from] TemplateError),
}

/// Merge `rows` into documents under `build_dir`, one per row, in row order.
pub fn merge_all(
    type_name: &TypeName,
    template: &Template,
    rows: &[RowRecord],
    build_dir: &Path,
) -> Result<Vec<GeneratedRecord>, MergeError> {
    let mut pending: Vec<(GeneratedRecord, Document)> = Vec::with_capacity(rows.len());
    let mut names = HashSet::new();

    for (ordinal, row) in rows.iter().enumerate() {
        let (record, document) = merge_row(type_name, template, ordinal, row)?;
        let path = build_dir.join(&record.document);
        if !names.insert(record.name.clone()) || path.exists() {
            return Err(MergeError::Duplicate { name: record.name });
        }
        pending.push((record, document));
    }

    let mut records = Vec::with_capacity(pending.len());
    for (record, document) in pending {
        document.save(&build_dir.join(&record.document))?;
        tracing::debug!(document = %record.name, sheet = record.sheet_index, "saved document");
        records.push(record);
    }
    Ok(records)
}

fn merge_row(
    type_name: &TypeName,
    template: &Template,
    ordinal: usize,
    row: &RowRecord,
) -> Result<(GeneratedRecord, Document), MergeError> {
    let mut document = template.instantiate(type_name);
    for (header, value) in row.iter() {
        if header == FILE_COLUMN || header == SHEET_COLUMN {
            continue;
        }
        // Unknown columns are fine; the table may carry data for other tools.
        document.bind_field(header, value);
    }

    let name = match row.get(FILE_COLUMN).map(str::trim) {
        Some(file) if !file.is_empty() => file.to_string(),
        _ => document_name(type_name.as_str(), ordinal),
    };
    if !is_valid_document_name(&name) {
        return Err(MergeError::Row {
            row: ordinal,
            reason: format!("'{name}' is not a usable document name"),
        });
    }
    if is_reserved_name(&name) {
        return Err(MergeError::Row {
            row: ordinal,
            reason: format!("'{name}' is reserved for the build manifest"),
        });
    }

    let sheet_index = resolve_sheet_index(row, &name).map_err(|reason| MergeError::Row {
        row: ordinal,
        reason,
    })?;

    let record = GeneratedRecord {
        type_name: type_name.clone(),
        ordinal,
        document: format!("{name}.{DOCUMENT_EXTENSION}"),
        name,
        sheet_index,
    };
    Ok((record, document))
}

/// `sheet` column, else the trailing number of an explicit `file` name, else 0.
/// The document would land on the manifest file. Compared without case so
/// case-insensitive filesystems are covered too.
fn is_reserved_name(name: &str) -> bool {
    format!("{name}.{DOCUMENT_EXTENSION}").eq_ignore_ascii_case(MANIFEST_FILENAME)
}

fn resolve_sheet_index(row: &RowRecord, name: &str) -> Result<usize, String> {
    match row.get(SHEET_COLUMN).map(str::trim) {
        Some(sheet) if !sheet.is_empty() => {
            return sheet
                .parse::<usize>()
                .map_err(|_| format!("sheet '{sheet}' is not a non-negative integer"));
        }
        _ => {}
    }
    let explicit_name = row.get(FILE_COLUMN).is_some_and(|f| !f.trim().is_empty());
    if explicit_name {
        return Ok(parse_document_name(name).index.unwrap_or(0));
    }
    Ok(0)
}
