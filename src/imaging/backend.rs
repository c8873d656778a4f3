//! Sheet rendering backend trait and shared types.
//!
//! The [`SheetRenderer`] trait is the one operation the pipeline needs from a
//! rendering subsystem: paint a resolved sheet into an RGBA buffer.
//!
//! The production implementation is
//! [`RustRenderer`](super::rust_backend::RustRenderer), built on the `image`
//! crate. Tests use the mock in [`tests`].

use super::params::{ParseColorError, RenderParams};
use crate::template::Sheet;
use image::RgbaImage;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RenderError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Sheet '{sheet}': {source}")]
    Color {
        sheet: String,
        source: ParseColorError,
    },
    #[error("Failed to load picture {path}: {source}")]
    Picture {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("PNG encode failed for {path}: {source}")]
    Encode {
        path: PathBuf,
        source: image::ImageError,
    },
    #[error("Rendering failed: {0}")]
    Failed(String),
}

/// A rendering subsystem.
///
/// `Send + Sync` so a renderer can be moved onto the pipeline's worker thread.
pub trait SheetRenderer: Send + Sync {
    /// Paint `sheet` (placeholders already resolved) into a pixel buffer.
    fn render(&self, sheet: &Sheet, params: &RenderParams) -> Result<RgbaImage, RenderError>;
}
