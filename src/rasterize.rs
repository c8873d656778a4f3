//! Sheet rasterizer.
//!
//! Picks one default sheet of a generated document and hands it to the
//! rendering subsystem. Encoding the result is left to the caller.

use crate::imaging::{RenderError, RenderParams, SheetRenderer};
use crate::template::Document;
use image::RgbaImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RasterizeError {
    #[error("Sheet index {index} out of range, document has {count} sheets")]
    IndexOutOfRange { index: usize, count: usize },
    #[error(transparent)]
    Render(#[from] RenderError),
}

/// Render sheet `sheet_index` of `document`.
pub fn rasterize(
    renderer: &dyn SheetRenderer,
    document: &Document,
    sheet_index: usize,
    params: &RenderParams,
) -> Result<RgbaImage, RasterizeError> {
    let sheets = document.default_sheets();
    let count = sheets.len();
    let sheet = sheets
        .get(sheet_index)
        .ok_or(RasterizeError::IndexOutOfRange {
            index: sheet_index,
            count,
        })?;
    tracing::debug!(
        type_name = %document.type_name,
        sheet = %sheet.name,
        dpi = params.dpi,
        "rasterizing sheet"
    );
    Ok(renderer.render(sheet, params)?)
}
