//! Tabular source reader.
//!
//! Loads one delimited-text table into ordered [`RowRecord`]s. The first line
//! is the header. Fields are taken verbatim: whitespace around them is kept,
//! quoting uses the configured quote character (doubled to escape). Rows may
//! be shorter than the header (the missing cells are simply absent) or longer
//! (the extra cells are dropped).

use crate::config::TableConfig;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TableError {
    #[error("Failed to read table {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed table {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },
}

/// One data row: header → cell, in header order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RowRecord {
    cells: Vec<(String, String)>,
}

impl RowRecord {
    pub fn new(cells: Vec<(String, String)>) -> Self {
        Self { cells }
    }

    /// Cell value for `header`. With duplicate headers the last one wins.
    pub fn get(&self, header: &str) -> Option<&str> {
        self.cells
            .iter()
            .rev()
            .find(|(h, _)| h == header)
            .map(|(_, v)| v.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.cells.iter().map(|(h, v)| (h.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.cells.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }
}

/// Read and parse the table at `path`.
pub fn read_table(path: &Path, config: &TableConfig) -> Result<Vec<RowRecord>, TableError> {
    let text = std::fs::read_to_string(path).map_err(|source| TableError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_table(&text, config).map_err(|source| TableError::Csv {
        path: path.to_path_buf(),
        source,
    })
}

/// Parse table text already in memory.
pub fn parse_table(text: &str, config: &TableConfig) -> Result<Vec<RowRecord>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(config.delimiter_byte())
        .quote(config.quote_byte())
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::None)
        .from_reader(text.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();

    let mut rows = Vec::new();
    for record in reader.records() {
        let record = record?;
        let cells = headers
            .iter()
            .zip(record.iter())
            .map(|(h, v)| (h.clone(), v.to_string()))
            .collect();
        rows.push(RowRecord::new(cells));
    }
    Ok(rows)
}
