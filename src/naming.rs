//! Document naming convention.
//!
//! Generated documents are named `<type>-<ordinal>` by default. A table may
//! override the name through its `file` column; such names conventionally end
//! in `-<sheet>`, the index of the sheet to export (`01104-0-0` picks sheet 0,
//! `01104-0-1` the back). This module builds default names and splits a name
//! into its stem and trailing number.

/// Result of parsing a name like `01104-0-1`.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName {
    /// Everything before the last dash, or the whole name if there is none.
    pub stem: String,
    /// Trailing numeric field, if the part after the last dash is a number.
    pub index: Option<usize>,
}

/// Default document name: `<type>-<ordinal>`.
pub fn document_name(type_name: &str, ordinal: usize) -> String {
    format!("{type_name}-{ordinal}")
}

/// Split a document name on its last dash.
///
/// - `"monster-2"` → stem="monster", index=Some(2)
/// - `"01104-0-1"` → stem="01104-0", index=Some(1)
/// - `"goblin-king"` → stem="goblin-king", index=None
/// - `"42"` → stem="", index=Some(42)
/// - `"boss-"` → stem="boss-", index=None
pub fn parse_document_name(name: &str) -> ParsedName {
    let (stem, tail) = match name.rfind('-') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => ("", name),
    };
    let index = if !tail.is_empty() && tail.bytes().all(|b| b.is_ascii_digit()) {
        tail.parse::<usize>().ok()
    } else {
        None
    };
    match index {
        Some(_) => ParsedName {
            stem: stem.to_string(),
            index,
        },
        None => ParsedName {
            stem: name.to_string(),
            index: None,
        },
    }
}

/// A name is usable as a file stem when it is non-empty, not a dot entry and
/// free of path separators.
pub fn is_valid_document_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && !name.contains(['/', '\\'])
        && !name.starts_with('.')
}
