//! CLI output formatting.
//!
//! # Output Format
//!
//! ## Build
//!
//! ```text
//! Processing monster.csv...
//!     3 documents
//! Processing item.csv...
//!     1 document
//! Generating monster-0.png...
//!     750x1050 images/monster-0.png
//! ...
//! Generated 4 documents, 4 images
//! ```
//!
//! Status lines come first and are the same text an interactive host would
//! show in its progress bar. Details are indented beneath them.
//!
//! ## List
//!
//! ```text
//! Types
//! 001 item
//!     Template: template/item.toml
//!     Table: data/item.csv
//! 002 monster
//!     Template: template/monster.toml (missing)
//!     Table: data/monster.csv
//! ```
//!
//! # Architecture
//!
//! Each view has a `format_*` function (returns `Vec<String>`) for testability
//! and a `print_*` wrapper that writes to stdout. Format functions are pure,
//! apart from the existence checks in [`format_types`].

use crate::pipeline::{BuildSummary, PipelineEvent, Stage};
use crate::project::Project;
use crate::types::TypeName;
use std::path::Path;

/// Format a 1-based positional index as 3-digit zero-padded.
fn format_index(pos: usize) -> String {
    format!("{:0>3}", pos)
}

fn plural(n: usize, word: &str) -> String {
    if n == 1 {
        format!("{n} {word}")
    } else {
        format!("{n} {word}s")
    }
}

/// Path relative to the project root, for display.
fn relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}

// ============================================================================
// Pipeline events
// ============================================================================

/// Format a single pipeline event as display lines.
pub fn format_event(event: &PipelineEvent) -> Vec<String> {
    match event {
        PipelineEvent::Status(message) => vec![message.clone()],
        PipelineEvent::TypeMerged { documents, .. } => {
            vec![format!("    {}", plural(*documents, "document"))]
        }
        PipelineEvent::ImageWritten(image) => {
            vec![format!("    {}x{} {}", image.width, image.height, image.image)]
        }
        PipelineEvent::ItemFailed { item, error } => {
            vec![format!("    Skipped {item}: {error}")]
        }
        PipelineEvent::StageChanged(Stage::Cancelled) => vec!["Cancelled".to_string()],
        PipelineEvent::StageChanged(_) | PipelineEvent::TypesDiscovered(_) => Vec::new(),
    }
}

// ============================================================================
// Summary
// ============================================================================

/// Format the closing lines of a run.
pub fn format_summary(summary: &BuildSummary) -> Vec<String> {
    let mut lines = Vec::new();
    let mut headline = format!(
        "Generated {}, {}",
        plural(summary.documents.len(), "document"),
        plural(summary.images.len(), "image")
    );
    if summary.cancelled {
        headline.push_str(" before cancellation");
    }
    lines.push(headline);

    if !summary.failures.is_empty() {
        lines.push(format!("Skipped {}:", plural(summary.failures.len(), "item")));
        for failure in &summary.failures {
            lines.push(format!("    {}: {}", failure.item, failure.error));
        }
    }
    lines
}

pub fn print_summary(summary: &BuildSummary) {
    for line in format_summary(summary) {
        println!("{}", line);
    }
}

// ============================================================================
// Type listing
// ============================================================================

/// Format discovered types with the files that define them, sorted by name.
pub fn format_types(types: &[TypeName], project: &Project) -> Vec<String> {
    let mut sorted: Vec<&TypeName> = types.iter().collect();
    sorted.sort();

    let mut lines = vec!["Types".to_string()];
    if sorted.is_empty() {
        lines.push(format!(
            "    (no tables in {}/)",
            relative(project.root(), &project.data_dir())
        ));
        return lines;
    }
    for (i, type_name) in sorted.into_iter().enumerate() {
        lines.push(format!("{} {}", format_index(i + 1), type_name));

        let template = project.template_path(type_name);
        let missing = if template.is_file() { "" } else { " (missing)" };
        lines.push(format!(
            "    Template: {}{}",
            relative(project.root(), &template),
            missing
        ));
        lines.push(format!(
            "    Table: {}",
            relative(project.root(), &project.table_path(type_name))
        ));
    }
    lines
}

pub fn print_types(types: &[TypeName], project: &Project) {
    for line in format_types(types, project) {
        println!("{}", line);
    }
}
