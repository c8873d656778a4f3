//! Project layout and the host-environment seam.
//!
//! A [`Project`] is an opened project root: its configuration plus the
//! resolved input and output folders. The pipeline never talks to a concrete
//! host application; after every directory mutation and every generated file
//! it calls [`ProjectContext::synchronize`], which a host can use to refresh
//! its view of the project tree. Batch runs use [`Headless`], which does
//! nothing.

use crate::config::{self, ConfigError, ProjectConfig};
use crate::types::TypeName;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProjectError {
    #[error("Project root not found: {0}")]
    NotFound(PathBuf),
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    #[error("Synchronization failed: {0}")]
    Sync(String),
}

/// An opened project.
#[derive(Debug, Clone)]
pub struct Project {
    root: PathBuf,
    config: ProjectConfig,
}

impl Project {
    /// Open the project at `root`, loading `deckforge.toml` if present.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, ProjectError> {
        let root = root.into();
        if !root.is_dir() {
            return Err(ProjectError::NotFound(root));
        }
        let config = config::load_config(&root)?;
        Ok(Self { root, config })
    }

    /// Open with an explicit config (no file lookup). The config is validated.
    pub fn with_config(root: impl Into<PathBuf>, config: ProjectConfig) -> Result<Self, ProjectError> {
        config.validate()?;
        Ok(Self {
            root: root.into(),
            config,
        })
    }

    /// Release the project at the end of a run.
    pub fn close(self) {
        tracing::debug!(root = %self.root.display(), "project closed");
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config(&self) -> &ProjectConfig {
        &self.config
    }

    pub fn template_dir(&self) -> PathBuf {
        self.root.join(&self.config.folders.template)
    }

    pub fn data_dir(&self) -> PathBuf {
        self.root.join(&self.config.folders.data)
    }

    pub fn build_dir(&self) -> PathBuf {
        self.root.join(&self.config.folders.build)
    }

    pub fn image_dir(&self) -> PathBuf {
        self.build_dir().join(&self.config.folders.images)
    }

    /// `<root>/template/<type>.toml`
    pub fn template_path(&self, type_name: &TypeName) -> PathBuf {
        self.template_dir()
            .join(format!("{}.{}", type_name, crate::template::TEMPLATE_EXTENSION))
    }

    /// `<root>/data/<type>.<table-ext>`
    pub fn table_path(&self, type_name: &TypeName) -> PathBuf {
        self.data_dir()
            .join(format!("{}.{}", type_name, self.config.table.extension))
    }
}

/// Host-environment capability injected into the pipeline.
///
/// `Send + Sync` so the same context can drive a run on a worker thread.
pub trait ProjectContext: Send + Sync {
    /// Bring the host's view of the project in line with the disk. Blocking.
    fn synchronize(&self, project: &Project) -> Result<(), ProjectError>;
}

/// Batch mode: there is no host to keep in sync.
#[derive(Debug, Clone, Copy, Default)]
pub struct Headless;

impl ProjectContext for Headless {
    fn synchronize(&self, _project: &Project) -> Result<(), ProjectError> {
        Ok(())
    }
}
