//! # deckforge
//!
//! Batch card generator. Each table in a project's data folder defines one
//! card type; each row becomes one card, merged into the type's template and
//! rendered to a print-ready PNG.
//!
//! # Architecture: Two-Stage Pipeline
//!
//! ```text
//! 1. Merge    data/<type>.csv + template/<type>.toml  →  build/<type>-<n>.json
//!                                                        build/manifest.json
//! 2. Render   build/manifest.json                     →  build/images/<type>-<n>.png
//! ```
//!
//! The merge stage records every generated document (name, type, row
//! ordinal, sheet to export) in the manifest, and the render stage works
//! from those records. Nothing is recovered by parsing file names.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`pipeline`] | Driver state machine, failure policy, worker-thread runs |
//! | [`discovery`] | Finds card types in the data folder |
//! | [`build_dir`] | Wipes and recreates the build and image folders |
//! | [`table`] | CSV tables → ordered row records |
//! | [`template`] | TOML blueprints, per-row documents, `{field}` substitution |
//! | [`merge`] | Row merge engine and reserved `file`/`sheet` columns |
//! | [`rasterize`] | Picks a document's sheet and renders it |
//! | [`imaging`] | Pure-Rust sheet painting, PNG encoding, pixel digests |
//! | [`project`] | Project root, folders, host synchronization hook |
//! | [`config`] | `deckforge.toml` loading, merging and validation |
//! | [`types`] | Records shared between stages and the build manifest |
//! | [`naming`] | `<type>-<n>` document naming convention |
//! | [`cancel`] | Cooperative cancellation token |
//! | [`output`] | CLI output formatting |
//!
//! # Design Decisions
//!
//! ## Fresh Document Per Row
//!
//! A template is parsed once per type into an immutable [`template::Template`]
//! and every row gets its own instance. There is no shared scratch document,
//! so there is no reset step to forget.
//!
//! ## Host Synchronization
//!
//! An interactive host may keep its own view of the project folder. The
//! driver calls [`project::ProjectContext::synchronize`] after every change
//! on disk; batch runs pass [`project::Headless`].
//!
//! ## Failure Policy
//!
//! By default the first failing type or document stops the run. With
//! `on_error = "skip"` (or `--keep-going`) failures are reported and the
//! rest of the project is still built.

pub mod build_dir;
pub mod cancel;
pub mod config;
pub mod discovery;
pub mod imaging;
pub mod merge;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod project;
pub mod rasterize;
pub mod table;
pub mod template;
pub mod types;

#[cfg(test)]
pub(crate) mod test_helpers;
