//! Sheet rendering — pure Rust, no system dependencies.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Paint** | `image::RgbaImage` + `imageops::overlay` |
//! | **Pictures** | `ImageReader` + `resize_to_fill` (Lanczos3) |
//! | **Encode** | `PngEncoder` |
//! | **Digest** | `sha2::Sha256` over raw pixels |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for inch/pixel geometry (unit testable)
//! - **Parameters**: Data structures describing a render
//! - **Backend**: [`SheetRenderer`] trait + [`RustRenderer`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{RenderError, SheetRenderer};
pub use calculations::{inches_to_pixels, sheet_pixels};
pub use params::{Color, ParseColorError, RenderParams, RenderTarget};
pub use rust_backend::{RustRenderer, encode_png, pixel_digest};
