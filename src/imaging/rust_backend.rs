//! Pure Rust rendering backend.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Canvas, compositing | `image::RgbaImage` + `image::imageops::overlay` |
//! | Picture decode (JPEG, PNG, WebP) | `image::ImageReader` |
//! | Picture fit | `image::DynamicImage::resize_to_fill` (Lanczos3) |
//! | Bleed synthesis | edge-clamped copy into a larger canvas |
//! | PNG encode | `image::codecs::png::PngEncoder` |
//!
//! Layers are painted in declaration order over the sheet background. Rect
//! fills and pictures are alpha-blended; anything outside the sheet is
//! clipped.

use super::backend::{RenderError, SheetRenderer};
use super::calculations::{PixelRect, bleed_source, frame_to_pixels, inches_to_pixels, sheet_pixels};
use super::params::{Color, RenderParams, RenderTarget};
use crate::template::{Layer, Sheet};
use image::imageops::{self, FilterType};
use image::{ImageEncoder, ImageReader, RgbaImage};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Pure Rust renderer. Picture paths resolve against `asset_root`, normally
/// the project root.
#[derive(Debug, Clone)]
pub struct RustRenderer {
    asset_root: PathBuf,
}

impl RustRenderer {
    pub fn new(asset_root: impl Into<PathBuf>) -> Self {
        Self {
            asset_root: asset_root.into(),
        }
    }

    fn load_picture(&self, src: &str, rect: PixelRect) -> Result<RgbaImage, RenderError> {
        let path = self.asset_root.join(src);
        let img = ImageReader::open(&path)
            .map_err(RenderError::Io)?
            .decode()
            .map_err(|source| RenderError::Picture {
                path: path.clone(),
                source,
            })?;
        Ok(img
            .resize_to_fill(rect.width, rect.height, FilterType::Lanczos3)
            .to_rgba8())
    }
}

fn parse_color(sheet: &Sheet, value: &str) -> Result<Color, RenderError> {
    value.parse().map_err(|source| RenderError::Color {
        sheet: sheet.name.clone(),
        source,
    })
}

/// Draw a one-pixel outline of `rect`, clipped to the canvas.
fn outline(canvas: &mut RgbaImage, rect: PixelRect, color: Color) {
    let (cw, ch) = (canvas.width() as i64, canvas.height() as i64);
    let x1 = rect.x + rect.width as i64 - 1;
    let y1 = rect.y + rect.height as i64 - 1;
    let mut put = |x: i64, y: i64| {
        if (0..cw).contains(&x) && (0..ch).contains(&y) {
            canvas.put_pixel(x as u32, y as u32, color.to_rgba());
        }
    };
    for x in rect.x..=x1 {
        put(x, rect.y);
        put(x, y1);
    }
    for y in rect.y..=y1 {
        put(rect.x, y);
        put(x1, y);
    }
}

/// Grow `canvas` by `margin` pixels on every side, filling the margin with
/// the nearest edge pixel.
fn synthesize_bleed(canvas: &RgbaImage, margin: u32) -> RgbaImage {
    let (w, h) = canvas.dimensions();
    RgbaImage::from_fn(w + 2 * margin, h + 2 * margin, |x, y| {
        let (sx, sy) = bleed_source(x, y, margin, w, h);
        *canvas.get_pixel(sx, sy)
    })
}

impl SheetRenderer for RustRenderer {
    fn render(&self, sheet: &Sheet, params: &RenderParams) -> Result<RgbaImage, RenderError> {
        let (w, h) = sheet_pixels(sheet.width, sheet.height, params.dpi);
        let background = parse_color(sheet, &sheet.background)?;
        let mut canvas = RgbaImage::from_pixel(w, h, background.to_rgba());

        for layer in sheet.layers.iter().filter(|l| l.is_visible()) {
            let frame = layer.frame();
            let rect = frame_to_pixels(frame.x, frame.y, frame.width, frame.height, params.dpi);
            if rect.is_empty() {
                continue;
            }
            match layer {
                Layer::Rect { fill, .. } => {
                    let fill = parse_color(sheet, fill)?;
                    let patch = RgbaImage::from_pixel(rect.width, rect.height, fill.to_rgba());
                    imageops::overlay(&mut canvas, &patch, rect.x, rect.y);
                }
                Layer::Picture { src, .. } => {
                    if src.trim().is_empty() {
                        continue;
                    }
                    let picture = self.load_picture(src.trim(), rect)?;
                    imageops::overlay(&mut canvas, &picture, rect.x, rect.y);
                }
            }
            if params.target == RenderTarget::Proof {
                outline(&mut canvas, rect, Color::PROOF);
            }
        }

        if params.synthesize_bleed {
            let margin = inches_to_pixels(sheet.bleed, params.dpi);
            if margin > 0 {
                canvas = synthesize_bleed(&canvas, margin);
            }
        }
        Ok(canvas)
    }
}

/// Write `img` to `path` as PNG.
pub fn encode_png(img: &RgbaImage, path: &Path) -> Result<(), RenderError> {
    let file = std::fs::File::create(path).map_err(RenderError::Io)?;
    let writer = std::io::BufWriter::new(file);
    image::codecs::png::PngEncoder::new(writer)
        .write_image(
            img.as_raw(),
            img.width(),
            img.height(),
            image::ExtendedColorType::Rgba8,
        )
        .map_err(|source| RenderError::Encode {
            path: path.to_path_buf(),
            source,
        })
}

/// SHA-256 over the image size and raw RGBA pixels, as a hex string.
///
/// Two renders with the same digest are pixel-identical regardless of how
/// the PNG encoder chose to compress them.
pub fn pixel_digest(img: &RgbaImage) -> String {
    let mut hasher = Sha256::new();
    hasher.update(img.width().to_le_bytes());
    hasher.update(img.height().to_le_bytes());
    hasher.update(img.as_raw());
    format!("{:x}", hasher.finalize())
}
