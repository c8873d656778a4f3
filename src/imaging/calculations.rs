//! Pure calculation functions for sheet geometry.
//!
//! All functions here are pure and testable without any I/O or images.
//! Sheet and layer geometry is authored in inches; these functions turn it
//! into pixel coordinates at a given resolution.

/// Convert a length in inches to whole pixels at `dpi`, rounding to nearest.
///
/// ```
/// # use deckforge::imaging::inches_to_pixels;
/// // A 2.5in poker card at 300 DPI is 750px wide
/// assert_eq!(inches_to_pixels(2.5, 300), 750);
/// assert_eq!(inches_to_pixels(0.0, 300), 0);
/// ```
pub fn inches_to_pixels(inches: f32, dpi: u32) -> u32 {
    if inches <= 0.0 {
        return 0;
    }
    (inches as f64 * dpi as f64).round() as u32
}

/// Pixel size of a sheet. Never zero in either direction.
pub fn sheet_pixels(width: f32, height: f32, dpi: u32) -> (u32, u32) {
    (
        inches_to_pixels(width, dpi).max(1),
        inches_to_pixels(height, dpi).max(1),
    )
}

/// A layer's placement in pixels. The origin may be negative or past the
/// canvas; compositing clips it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl PixelRect {
    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Convert a frame in inches to a pixel rectangle.
pub fn frame_to_pixels(x: f32, y: f32, width: f32, height: f32, dpi: u32) -> PixelRect {
    PixelRect {
        x: (x as f64 * dpi as f64).round() as i64,
        y: (y as f64 * dpi as f64).round() as i64,
        width: inches_to_pixels(width, dpi),
        height: inches_to_pixels(height, dpi),
    }
}

/// Source pixel for output pixel `(x, y)` of a canvas grown by `margin` on
/// every side: coordinates inside the original map through, coordinates in
/// the margin clamp to the nearest edge pixel.
pub fn bleed_source(x: u32, y: u32, margin: u32, width: u32, height: u32) -> (u32, u32) {
    let clamp = |v: u32, len: u32| v.saturating_sub(margin).min(len - 1);
    (clamp(x, width), clamp(y, height))
}
