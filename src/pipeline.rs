//! Pipeline driver.
//!
//! Runs a project through its two stages:
//!
//! ```text
//! Idle → Discovering → Cleaning → MergingType(0..n) → Rasterizing(0..m) → Done
//!                                        └──────────────┴──→ Cancelled
//! ```
//!
//! 1. **Merge**: every table in the data folder is one card type. Each row of
//!    `data/<type>.csv` is merged into `template/<type>.toml` and saved as a
//!    document in the build folder.
//! 2. **Render**: the selected sheet of every generated document is rendered
//!    and written as PNG under `build/images/`.
//!
//! The merge stage hands its [`GeneratedRecord`]s straight to the render
//! stage and also writes them to `build/manifest.json`, so `render` can run
//! on its own later. The build folder is wiped at the start of every full run
//! and every merge.
//!
//! The host is told to [`synchronize`](ProjectContext::synchronize) after the
//! build folder is reset, after each type, after the image folder is created
//! and after each image. Cancellation is checked at the top of every loop
//! iteration; whatever was written before it stays in place.

use crate::build_dir;
use crate::cancel::CancellationToken;
use crate::config::{FailurePolicy, ProjectConfig};
use crate::discovery::{DiscoveryError, discover_types};
use crate::imaging::{RenderError, RenderParams, SheetRenderer, encode_png, pixel_digest};
use crate::merge::{MergeError, merge_all};
use crate::project::{Project, ProjectContext, ProjectError};
use crate::rasterize::{RasterizeError, rasterize};
use crate::table::{TableError, read_table};
use crate::template::{Document, TemplateError, resolve_template};
use crate::types::{BuildManifest, GeneratedRecord, ManifestError, RenderedImage, TypeName};
use std::fmt;
use std::path::PathBuf;
use std::sync::mpsc::{Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("Cannot prepare {path}: {source}")]
    Cleanup {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Type '{type_name}': {source}")]
    TemplateBinding {
        type_name: TypeName,
        source: BindingError,
    },
    #[error("Type '{type_name}': document '{name}' already exists")]
    DuplicateDocument { type_name: TypeName, name: String },
    #[error("Document '{document}': {source}")]
    Document {
        document: String,
        source: TemplateError,
    },
    #[error("Document '{document}': {source}")]
    Render {
        document: String,
        source: RenderError,
    },
    #[error("Document '{document}': sheet index {index} out of range, it has {count} sheets")]
    IndexOutOfRange {
        document: String,
        index: usize,
        count: usize,
    },
    #[error("Project sync failed: {0}")]
    Sync(#[from] ProjectError),
    #[error("Manifest error: {0}")]
    Manifest(#[from] ManifestError),
    #[error("Pipeline worker panicked")]
    Worker,
}

/// Why a type could not be merged.
#[derive(Error, Debug)]
pub enum BindingError {
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Table(#[from] TableError),
    #[error(transparent)]
    Merge(MergeError),
}

impl PipelineError {
    /// Failures confined to one type or one document. Under
    /// [`FailurePolicy::Skip`] these are reported and the run continues.
    pub fn is_item_failure(&self) -> bool {
        matches!(
            self,
            PipelineError::TemplateBinding { .. }
                | PipelineError::DuplicateDocument { .. }
                | PipelineError::Document { .. }
                | PipelineError::Render { .. }
                | PipelineError::IndexOutOfRange { .. }
        )
    }
}

/// Driver state. Every transition is reported as
/// [`PipelineEvent::StageChanged`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Idle,
    Discovering,
    Cleaning,
    MergingType(usize),
    Rasterizing(usize),
    Done,
    Cancelled,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stage::Idle => f.write_str("idle"),
            Stage::Discovering => f.write_str("discovering"),
            Stage::Cleaning => f.write_str("cleaning"),
            Stage::MergingType(i) => write!(f, "merging type {i}"),
            Stage::Rasterizing(j) => write!(f, "rasterizing document {j}"),
            Stage::Done => f.write_str("done"),
            Stage::Cancelled => f.write_str("cancelled"),
        }
    }
}

/// Progress reported while a run is underway.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    StageChanged(Stage),
    /// Human readable status, e.g. `Processing monster.csv...`.
    Status(String),
    TypesDiscovered(Vec<TypeName>),
    TypeMerged {
        type_name: TypeName,
        documents: usize,
    },
    ImageWritten(RenderedImage),
    /// A type or document was skipped under [`FailurePolicy::Skip`].
    ItemFailed {
        item: String,
        error: String,
    },
}

/// Knobs for one run.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PipelineOptions {
    pub on_error: FailurePolicy,
    pub render: RenderParams,
}

impl PipelineOptions {
    pub fn from_config(config: &ProjectConfig) -> Self {
        Self {
            on_error: config.pipeline.on_error,
            render: RenderParams::from_config(&config.render),
        }
    }
}

/// A skipped type or document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemFailure {
    pub item: String,
    pub error: String,
}

/// How a run ended, for exit status purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Completed,
    CompletedWithFailures,
    Cancelled,
}

impl Outcome {
    pub fn exit_code(self) -> u8 {
        match self {
            Outcome::Completed => 0,
            Outcome::CompletedWithFailures => 1,
            Outcome::Cancelled => 130,
        }
    }
}

/// What a run produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BuildSummary {
    pub types: Vec<TypeName>,
    pub documents: Vec<GeneratedRecord>,
    pub images: Vec<RenderedImage>,
    pub failures: Vec<ItemFailure>,
    pub cancelled: bool,
}

impl BuildSummary {
    pub fn outcome(&self) -> Outcome {
        if self.cancelled {
            Outcome::Cancelled
        } else if self.failures.is_empty() {
            Outcome::Completed
        } else {
            Outcome::CompletedWithFailures
        }
    }

    fn manifest(&self) -> BuildManifest {
        BuildManifest {
            documents: self.documents.clone(),
            images: self.images.clone(),
        }
    }
}

// ============================================================================
// Entry points
// ============================================================================

/// Run the full pipeline on the caller's thread.
pub fn run(
    project: &Project,
    ctx: &dyn ProjectContext,
    renderer: &dyn SheetRenderer,
    options: &PipelineOptions,
    cancel: &CancellationToken,
    events: Option<&Sender<PipelineEvent>>,
) -> Result<BuildSummary, PipelineError> {
    let reporter = Reporter {
        events,
        status: None,
    };
    Driver::new(project, ctx, options, cancel, reporter).build(renderer)
}

/// Merge stage only: reset the build folder, merge every type and write the
/// manifest.
pub fn merge_stage(
    project: &Project,
    ctx: &dyn ProjectContext,
    options: &PipelineOptions,
    cancel: &CancellationToken,
    events: Option<&Sender<PipelineEvent>>,
) -> Result<BuildSummary, PipelineError> {
    let reporter = Reporter {
        events,
        status: None,
    };
    Driver::new(project, ctx, options, cancel, reporter).merge_only()
}

/// Render stage only: render every document listed in `build/manifest.json`
/// into a freshly emptied image folder.
pub fn render_stage(
    project: &Project,
    ctx: &dyn ProjectContext,
    renderer: &dyn SheetRenderer,
    options: &PipelineOptions,
    cancel: &CancellationToken,
    events: Option<&Sender<PipelineEvent>>,
) -> Result<BuildSummary, PipelineError> {
    let reporter = Reporter {
        events,
        status: None,
    };
    Driver::new(project, ctx, options, cancel, reporter).render_only(renderer)
}

/// Handle to a run on a worker thread.
pub struct RunHandle {
    cancel: CancellationToken,
    status: Arc<Mutex<Option<String>>>,
    events: Receiver<PipelineEvent>,
    worker: JoinHandle<Result<BuildSummary, PipelineError>>,
}

impl RunHandle {
    /// Ask the worker to stop at its next loop iteration.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Latest status message, if any has been posted yet.
    pub fn status(&self) -> Option<String> {
        self.status.lock().ok().and_then(|s| s.clone())
    }

    pub fn events(&self) -> &Receiver<PipelineEvent> {
        &self.events
    }

    pub fn is_finished(&self) -> bool {
        self.worker.is_finished()
    }

    /// Wait for the worker and return its result.
    pub fn join(self) -> Result<BuildSummary, PipelineError> {
        self.worker.join().map_err(|_| PipelineError::Worker)?
    }
}

/// Run the full pipeline on a dedicated worker thread.
pub fn spawn<C, R>(project: Project, ctx: C, renderer: R, options: PipelineOptions) -> RunHandle
where
    C: ProjectContext + 'static,
    R: SheetRenderer + 'static,
{
    let cancel = CancellationToken::new();
    let status = Arc::new(Mutex::new(None));
    let (tx, rx) = std::sync::mpsc::channel();

    let worker = {
        let cancel = cancel.clone();
        let status = Arc::clone(&status);
        std::thread::spawn(move || {
            let reporter = Reporter {
                events: Some(&tx),
                status: Some(status.as_ref()),
            };
            let result =
                Driver::new(&project, &ctx, &options, &cancel, reporter).build(&renderer);
            project.close();
            result
        })
    };

    RunHandle {
        cancel,
        status,
        events: rx,
        worker,
    }
}

// ============================================================================
// Driver
// ============================================================================

struct Reporter<'a> {
    events: Option<&'a Sender<PipelineEvent>>,
    status: Option<&'a Mutex<Option<String>>>,
}

impl Reporter<'_> {
    fn emit(&self, event: PipelineEvent) {
        if let Some(tx) = self.events {
            // A dropped receiver only means nobody is listening.
            let _ = tx.send(event);
        }
    }

    fn status(&self, message: String) {
        if let Some(Ok(mut slot)) = self.status.map(Mutex::lock) {
            *slot = Some(message.clone());
        }
        self.emit(PipelineEvent::Status(message));
    }
}

enum Flow {
    Finished,
    Cancelled,
}

struct Driver<'a> {
    project: &'a Project,
    ctx: &'a dyn ProjectContext,
    options: &'a PipelineOptions,
    cancel: &'a CancellationToken,
    reporter: Reporter<'a>,
    stage: Stage,
    summary: BuildSummary,
}

impl<'a> Driver<'a> {
    fn new(
        project: &'a Project,
        ctx: &'a dyn ProjectContext,
        options: &'a PipelineOptions,
        cancel: &'a CancellationToken,
        reporter: Reporter<'a>,
    ) -> Self {
        Self {
            project,
            ctx,
            options,
            cancel,
            reporter,
            stage: Stage::Idle,
            summary: BuildSummary::default(),
        }
    }

    fn build(mut self, renderer: &dyn SheetRenderer) -> Result<BuildSummary, PipelineError> {
        if let Flow::Cancelled = self.merge_phase()? {
            return self.finish_cancelled();
        }
        self.prepare_image_dir(false)?;
        self.save_manifest()?;
        let records = self.summary.documents.clone();
        if let Flow::Cancelled = self.render_phase(renderer, &records)? {
            return self.finish_cancelled();
        }
        self.finish()
    }

    fn merge_only(mut self) -> Result<BuildSummary, PipelineError> {
        if let Flow::Cancelled = self.merge_phase()? {
            return self.finish_cancelled();
        }
        self.finish()
    }

    fn render_only(mut self, renderer: &dyn SheetRenderer) -> Result<BuildSummary, PipelineError> {
        let manifest = BuildManifest::load(&self.project.build_dir())?;
        self.summary.documents = manifest.documents;
        self.prepare_image_dir(true)?;
        let records = self.summary.documents.clone();
        if let Flow::Cancelled = self.render_phase(renderer, &records)? {
            return self.finish_cancelled();
        }
        self.finish()
    }

    fn enter(&mut self, stage: Stage) {
        tracing::debug!(from = %self.stage, to = %stage, "stage change");
        self.stage = stage;
        self.reporter.emit(PipelineEvent::StageChanged(stage));
    }

    fn sync(&self) -> Result<(), PipelineError> {
        self.ctx.synchronize(self.project)?;
        Ok(())
    }

    fn save_manifest(&self) -> Result<(), PipelineError> {
        self.summary.manifest().save(&self.project.build_dir())?;
        Ok(())
    }

    fn finish(mut self) -> Result<BuildSummary, PipelineError> {
        self.save_manifest()?;
        self.enter(Stage::Done);
        tracing::info!(
            documents = self.summary.documents.len(),
            images = self.summary.images.len(),
            failures = self.summary.failures.len(),
            "run complete"
        );
        Ok(self.summary)
    }

    fn finish_cancelled(mut self) -> Result<BuildSummary, PipelineError> {
        self.save_manifest()?;
        self.summary.cancelled = true;
        self.enter(Stage::Cancelled);
        tracing::info!(stage = %self.stage, "run cancelled");
        Ok(self.summary)
    }

    /// Apply the failure policy to an item-level error.
    fn handle_failure(&mut self, item: &str, err: PipelineError) -> Result<(), PipelineError> {
        if self.options.on_error == FailurePolicy::FailFast || !err.is_item_failure() {
            return Err(err);
        }
        tracing::warn!(item, error = %err, "skipping");
        let failure = ItemFailure {
            item: item.to_string(),
            error: err.to_string(),
        };
        self.reporter.emit(PipelineEvent::ItemFailed {
            item: failure.item.clone(),
            error: failure.error.clone(),
        });
        self.summary.failures.push(failure);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Merge
    // ------------------------------------------------------------------------

    fn merge_phase(&mut self) -> Result<Flow, PipelineError> {
        let project = self.project;

        self.enter(Stage::Discovering);
        let types = discover_types(&project.data_dir(), &project.config().table.extension)?;
        tracing::info!(count = types.len(), "discovered types");
        self.reporter
            .emit(PipelineEvent::TypesDiscovered(types.clone()));
        self.summary.types = types.clone();

        self.enter(Stage::Cleaning);
        let build = self.project.build_dir();
        build_dir::reset(&build).map_err(|source| PipelineError::Cleanup {
            path: build.clone(),
            source,
        })?;
        self.sync()?;

        for (i, type_name) in types.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            self.enter(Stage::MergingType(i));
            let table = self.project.table_path(type_name);
            let table_name = table
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| type_name.to_string());
            self.reporter.status(format!("Processing {table_name}..."));

            match self.merge_type(type_name) {
                Ok(records) => {
                    tracing::info!(type_name = %type_name, documents = records.len(), "merged type");
                    self.reporter.emit(PipelineEvent::TypeMerged {
                        type_name: type_name.clone(),
                        documents: records.len(),
                    });
                    self.summary.documents.extend(records);
                }
                Err(err) => self.handle_failure(type_name.as_str(), err)?,
            }
            self.sync()?;
        }
        Ok(Flow::Finished)
    }

    fn merge_type(&self, type_name: &TypeName) -> Result<Vec<GeneratedRecord>, PipelineError> {
        let binding = |source: BindingError| PipelineError::TemplateBinding {
            type_name: type_name.clone(),
            source,
        };
        let template = resolve_template(self.project, type_name).map_err(|e| binding(e.into()))?;
        let rows = read_table(
            &self.project.table_path(type_name),
            &self.project.config().table,
        )
        .map_err(|e| binding(e.into()))?;
        tracing::debug!(type_name = %type_name, rows = rows.len(), "read table");

        merge_all(type_name, &template, &rows, &self.project.build_dir()).map_err(|e| match e {
            MergeError::Duplicate { name } => PipelineError::DuplicateDocument {
                type_name: type_name.clone(),
                name,
            },
            other => binding(BindingError::Merge(other)),
        })
    }

    // ------------------------------------------------------------------------
    // Render
    // ------------------------------------------------------------------------

    /// Create the image folder. `wipe` empties it first, for renders that
    /// run without a preceding merge.
    fn prepare_image_dir(&mut self, wipe: bool) -> Result<(), PipelineError> {
        let images = self.project.image_dir();
        let result = if wipe {
            build_dir::reset(&images)
        } else {
            build_dir::create_image_dir(&images)
        };
        result.map_err(|source| PipelineError::Cleanup {
            path: images.clone(),
            source,
        })?;
        self.sync()
    }

    fn render_phase(
        &mut self,
        renderer: &dyn SheetRenderer,
        records: &[GeneratedRecord],
    ) -> Result<Flow, PipelineError> {
        for (j, record) in records.iter().enumerate() {
            if self.cancel.is_cancelled() {
                return Ok(Flow::Cancelled);
            }
            self.enter(Stage::Rasterizing(j));
            self.reporter
                .status(format!("Generating {}...", record.image_filename()));

            match self.render_record(renderer, record) {
                Ok(image) => {
                    self.reporter.emit(PipelineEvent::ImageWritten(image.clone()));
                    self.summary.images.push(image);
                    self.sync()?;
                }
                Err(err) => self.handle_failure(&record.name, err)?,
            }
        }
        Ok(Flow::Finished)
    }

    fn render_record(
        &self,
        renderer: &dyn SheetRenderer,
        record: &GeneratedRecord,
    ) -> Result<RenderedImage, PipelineError> {
        let build = self.project.build_dir();
        let document =
            Document::load(&build.join(&record.document)).map_err(|source| {
                PipelineError::Document {
                    document: record.name.clone(),
                    source,
                }
            })?;

        let image = rasterize(renderer, &document, record.sheet_index, &self.options.render)
            .map_err(|e| match e {
                RasterizeError::IndexOutOfRange { index, count } => {
                    PipelineError::IndexOutOfRange {
                        document: record.name.clone(),
                        index,
                        count,
                    }
                }
                RasterizeError::Render(source) => PipelineError::Render {
                    document: record.name.clone(),
                    source,
                },
            })?;

        let filename = record.image_filename();
        encode_png(&image, &self.project.image_dir().join(&filename)).map_err(|source| {
            PipelineError::Render {
                document: record.name.clone(),
                source,
            }
        })?;
        tracing::debug!(document = %record.name, width = image.width(), height = image.height(), "wrote image");

        Ok(RenderedImage {
            name: record.name.clone(),
            image: format!("{}/{}", self.project.config().folders.images, filename),
            width: image.width(),
            height: image.height(),
            sha256: pixel_digest(&image),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::imaging::backend::tests::MockRenderer;
    use crate::project::tests::RecordingContext;
    use crate::test_helpers::*;
    use std::collections::BTreeSet;
    use std::fs;

    fn options() -> PipelineOptions {
        PipelineOptions::default()
    }

    fn skip() -> PipelineOptions {
        PipelineOptions {
            on_error: FailurePolicy::Skip,
            ..PipelineOptions::default()
        }
    }

    fn build(project: &Project, renderer: &dyn SheetRenderer) -> BuildSummary {
        run(
            project,
            &RecordingContext::new(),
            renderer,
            &options(),
            &CancellationToken::new(),
            None,
        )
        .unwrap()
    }

    // =========================================================================
    // Full run
    // =========================================================================

    #[test]
    fn example_project_yields_four_documents_and_images() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let summary = build(&project, &MockRenderer::new());

        assert_eq!(
            document_names(&summary),
            BTreeSet::from(["item-0", "monster-0", "monster-1", "monster-2"])
        );
        assert_eq!(summary.images.len(), 4);
        assert_eq!(summary.outcome(), Outcome::Completed);
        for name in ["item-0", "monster-0", "monster-1", "monster-2"] {
            assert!(tmp.path().join(format!("build/{name}.json")).exists());
            assert!(tmp.path().join(format!("build/images/{name}.png")).exists());
        }
    }

    #[test]
    fn records_follow_row_order_within_a_type() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let summary = build(&project, &MockRenderer::new());

        let monsters: Vec<_> = summary
            .documents
            .iter()
            .filter(|r| r.type_name.as_str() == "monster")
            .map(|r| (r.ordinal, r.name.as_str()))
            .collect();
        assert_eq!(
            monsters,
            [(0, "monster-0"), (1, "monster-1"), (2, "monster-2")]
        );
    }

    #[test]
    fn build_folder_is_wiped_first() {
        let tmp = setup_fixtures();
        fs::create_dir_all(tmp.path().join("build/images")).unwrap();
        fs::write(tmp.path().join("build/stale.json"), "{}").unwrap();
        fs::write(tmp.path().join("build/images/stale.png"), "").unwrap();

        let project = open_fixture(&tmp);
        build(&project, &MockRenderer::new());

        assert!(!tmp.path().join("build/stale.json").exists());
        assert!(!tmp.path().join("build/images/stale.png").exists());
    }

    #[test]
    fn manifest_lists_documents_and_images() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let summary = build(&project, &MockRenderer::new());

        let manifest = BuildManifest::load(&tmp.path().join("build")).unwrap();
        assert_eq!(manifest.documents, summary.documents);
        assert_eq!(manifest.images, summary.images);
        assert!(manifest.images.iter().all(|i| i.image.starts_with("images/")));
    }

    #[test]
    fn status_messages_name_tables_and_images() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let (tx, rx) = std::sync::mpsc::channel();
        run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            Some(&tx),
        )
        .unwrap();
        drop(tx);

        let statuses: BTreeSet<String> = rx
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::Status(s) => Some(s),
                _ => None,
            })
            .collect();
        assert!(statuses.contains("Processing monster.csv..."));
        assert!(statuses.contains("Processing item.csv..."));
        assert!(statuses.contains("Generating monster-2.png..."));
        assert_eq!(statuses.len(), 6);
    }

    #[test]
    fn stages_progress_in_order() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let (tx, rx) = std::sync::mpsc::channel();
        run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            Some(&tx),
        )
        .unwrap();
        drop(tx);

        let stages: Vec<Stage> = rx
            .iter()
            .filter_map(|e| match e {
                PipelineEvent::StageChanged(s) => Some(s),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            [
                Stage::Discovering,
                Stage::Cleaning,
                Stage::MergingType(0),
                Stage::MergingType(1),
                Stage::Rasterizing(0),
                Stage::Rasterizing(1),
                Stage::Rasterizing(2),
                Stage::Rasterizing(3),
                Stage::Done,
            ]
        );
    }

    #[test]
    fn synchronizes_after_every_mutation() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let ctx = RecordingContext::new();
        run(
            &project,
            &ctx,
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();
        // reset + 2 types + image folder + 4 images
        assert_eq!(ctx.count(), 8);
    }

    #[test]
    fn sync_failure_is_fatal_even_when_skipping() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::failing_after(1),
            &MockRenderer::new(),
            &skip(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::Sync(_))));
    }

    #[test]
    fn renders_at_configured_resolution() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let renderer = MockRenderer::new();
        let summary = build(&project, &renderer);

        assert!(renderer.get_calls().iter().all(|c| c.dpi == 300 && !c.synthesize_bleed));
        let goblin = find_image(&summary, "monster-0");
        // 2.5in x 3.5in at 300 DPI
        assert_eq!((goblin.width, goblin.height), (750, 1050));
    }

    #[test]
    fn sheet_column_selects_exported_face() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let renderer = MockRenderer::new();
        let summary = build(&project, &renderer);

        let item = find_record(&summary, "item-0");
        assert_eq!(item.sheet_index, 1);
        assert!(renderer.get_calls().iter().any(|c| c.sheet == "back"));
    }

    // =========================================================================
    // Failures
    // =========================================================================

    #[test]
    fn missing_data_folder_is_a_discovery_error() {
        let tmp = setup_fixtures();
        fs::remove_dir_all(tmp.path().join("data")).unwrap();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &skip(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::Discovery(_))));
    }

    #[test]
    fn upper_case_table_extension_is_not_a_type() {
        let tmp = setup_fixtures();
        fs::rename(
            tmp.path().join("data/item.csv"),
            tmp.path().join("data/item.CSV"),
        )
        .unwrap();
        let project = open_fixture(&tmp);
        let summary = build(&project, &MockRenderer::new());

        assert_eq!(summary.outcome(), Outcome::Completed);
        assert_eq!(
            document_names(&summary),
            BTreeSet::from(["monster-0", "monster-1", "monster-2"])
        );
        assert!(summary.types.iter().all(|t| t.as_str() == "monster"));
    }

    #[test]
    fn missing_template_fails_fast() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("data/spell.csv"), "name\nFireball\n").unwrap();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::TemplateBinding { ref type_name, .. }) if type_name.as_str() == "spell"
        ));
    }

    #[test]
    fn skip_policy_continues_past_broken_template() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("data/spell.csv"), "name\nFireball\n").unwrap();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &skip(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(result.documents.len(), 4);
        assert_eq!(result.images.len(), 4);
        assert_eq!(result.failures.len(), 1);
        assert_eq!(result.failures[0].item, "spell");
        assert_eq!(result.outcome(), Outcome::CompletedWithFailures);
        assert_eq!(result.outcome().exit_code(), 1);
    }

    #[test]
    fn render_failure_fails_fast() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::failing_on("back"),
            &options(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::Render { ref document, .. }) if document == "item-0"
        ));
    }

    #[test]
    fn skip_policy_skips_failed_render() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let summary = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::failing_on("back"),
            &skip(),
            &CancellationToken::new(),
            None,
        )
        .unwrap();

        assert_eq!(summary.documents.len(), 4);
        assert_eq!(summary.images.len(), 3);
        assert_eq!(summary.failures[0].item, "item-0");
        assert!(!tmp.path().join("build/images/item-0.png").exists());
    }

    #[test]
    fn sheet_index_past_the_end_is_out_of_range() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("data/item.csv"), "name,sheet\nPotion,2\n").unwrap();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::IndexOutOfRange { index: 2, count: 2, .. })
        ));
    }

    #[test]
    fn duplicate_document_across_types() {
        let tmp = setup_fixtures();
        fs::write(tmp.path().join("data/item.csv"), "file,name\nsame,A\n").unwrap();
        fs::write(tmp.path().join("data/monster.csv"), "file,name\nsame,B\n").unwrap();
        let project = open_fixture(&tmp);
        let result = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(
            result,
            Err(PipelineError::DuplicateDocument { ref name, .. }) if name == "same"
        ));
    }

    // =========================================================================
    // Cancellation
    // =========================================================================

    #[test]
    fn cancel_before_start_produces_nothing() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let summary = run(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &cancel,
            None,
        )
        .unwrap();

        assert!(summary.cancelled);
        assert!(summary.documents.is_empty());
        assert_eq!(summary.outcome().exit_code(), 130);
        assert!(!tmp.path().join("build/images").exists());
    }

    /// Cancels the run from inside the Nth synchronize call.
    struct CancelOnSync {
        token: CancellationToken,
        after: usize,
        calls: Mutex<usize>,
    }

    impl ProjectContext for CancelOnSync {
        fn synchronize(&self, _project: &Project) -> Result<(), ProjectError> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            if *calls == self.after {
                self.token.cancel();
            }
            Ok(())
        }
    }

    #[test]
    fn cancel_after_first_type_keeps_its_documents() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let token = CancellationToken::new();
        // sync #1 follows the reset, sync #2 follows the first type
        let ctx = CancelOnSync {
            token: token.clone(),
            after: 2,
            calls: Mutex::new(0),
        };
        let summary = run(&project, &ctx, &MockRenderer::new(), &options(), &token, None).unwrap();

        assert!(summary.cancelled);
        assert!(summary.images.is_empty());
        let first = &summary.types[0];
        assert!(!summary.documents.is_empty());
        assert!(summary.documents.iter().all(|r| &r.type_name == first));

        let second = &summary.types[1];
        let leaked = fs::read_dir(tmp.path().join("build"))
            .unwrap()
            .filter_map(|e| e.ok())
            .any(|e| e.file_name().to_string_lossy().starts_with(second.as_str()));
        assert!(!leaked, "no documents for {second} after cancellation");
    }

    #[test]
    fn cancel_during_rasterizing_keeps_earlier_images() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let token = CancellationToken::new();
        // reset, 2 types, image folder, first image
        let ctx = CancelOnSync {
            token: token.clone(),
            after: 5,
            calls: Mutex::new(0),
        };
        let summary = run(&project, &ctx, &MockRenderer::new(), &options(), &token, None).unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.documents.len(), 4);
        assert_eq!(summary.images.len(), 1);
        let manifest = BuildManifest::load(&tmp.path().join("build")).unwrap();
        assert_eq!(manifest.images.len(), 1);
    }

    // =========================================================================
    // Stages on their own
    // =========================================================================

    #[test]
    fn merge_then_render_matches_full_build() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let ctx = RecordingContext::new();
        let cancel = CancellationToken::new();

        let merged = merge_stage(&project, &ctx, &options(), &cancel, None).unwrap();
        assert_eq!(merged.documents.len(), 4);
        assert!(merged.images.is_empty());
        assert!(!tmp.path().join("build/images").exists());

        let rendered =
            render_stage(&project, &ctx, &MockRenderer::new(), &options(), &cancel, None).unwrap();
        assert_eq!(rendered.documents, merged.documents);
        assert_eq!(rendered.images.len(), 4);
    }

    #[test]
    fn render_without_manifest_fails() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let result = render_stage(
            &project,
            &RecordingContext::new(),
            &MockRenderer::new(),
            &options(),
            &CancellationToken::new(),
            None,
        );
        assert!(matches!(result, Err(PipelineError::Manifest(_))));
    }

    // =========================================================================
    // Worker thread
    // =========================================================================

    #[test]
    fn spawned_run_reports_status_and_completes() {
        let tmp = setup_fixtures();
        let project = open_fixture(&tmp);
        let handle = spawn(project, RecordingContext::new(), MockRenderer::new(), options());

        let events: Vec<PipelineEvent> = handle.events().iter().collect();
        assert!(events.contains(&PipelineEvent::StageChanged(Stage::Done)));
        assert!(handle.status().is_some_and(|s| s.starts_with("Generating ")));

        let summary = handle.join().unwrap();
        assert_eq!(summary.images.len(), 4);
    }

    #[test]
    fn outcome_exit_codes() {
        assert_eq!(Outcome::Completed.exit_code(), 0);
        assert_eq!(Outcome::CompletedWithFailures.exit_code(), 1);
        assert_eq!(Outcome::Cancelled.exit_code(), 130);
    }
}
