//! Parameter types for sheet rendering.
//!
//! These types describe *what* to render, not *how*. They are the interface
//! between the rasterizer (which picks the sheet) and the
//! [`backend`](super::backend) (which does the pixel work).
//!
//! - [`RenderTarget`] — what the pixels are for.
//! - [`RenderParams`] — resolution, bleed synthesis and target for one render.
//! - [`Color`] — RGBA color parsed from `#rgb`, `#rrggbb` or `#rrggbbaa`.

use crate::config::RenderConfig;
use std::fmt;
use std::str::FromStr;

/// What a rendered sheet is for.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RenderTarget {
    /// Final artwork.
    #[default]
    Export,
    /// Final artwork with every layer frame outlined, for checking templates.
    Proof,
}

/// Full specification of one sheet render.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderParams {
    pub target: RenderTarget,
    /// Pixels per inch.
    pub dpi: u32,
    /// Grow the canvas by the sheet's bleed margin and extend edge pixels
    /// into it.
    pub synthesize_bleed: bool,
}

impl RenderParams {
    pub fn from_config(config: &RenderConfig) -> Self {
        Self {
            target: RenderTarget::Export,
            dpi: config.dpi,
            synthesize_bleed: config.synthesize_bleed,
        }
    }
}

impl Default for RenderParams {
    fn default() -> Self {
        Self::from_config(&RenderConfig::default())
    }
}

/// An 8-bit RGBA color.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Color(pub [u8; 4]);

impl Color {
    pub const WHITE: Color = Color([255, 255, 255, 255]);
    pub const PROOF: Color = Color([255, 0, 255, 255]);

    pub fn to_rgba(self) -> image::Rgba<u8> {
        image::Rgba(self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseColorError(pub String);

impl fmt::Display for ParseColorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "invalid color '{}', expected #rgb, #rrggbb or #rrggbbaa", self.0)
    }
}

impl std::error::Error for ParseColorError {}

impl FromStr for Color {
    type Err = ParseColorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ParseColorError(s.to_string());
        let hex = s.trim().strip_prefix('#').ok_or_else(err)?;
        if !hex.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(err());
        }
        let channel = |i: usize, len: usize| u8::from_str_radix(&hex[i..i + len], 16);
        let rgba = match hex.len() {
            3 => {
                let c = |i| channel(i, 1).map(|v| v * 17);
                [c(0), c(1), c(2), Ok(255)]
            }
            6 => [channel(0, 2), channel(2, 2), channel(4, 2), Ok(255)],
            8 => [channel(0, 2), channel(2, 2), channel(4, 2), channel(6, 2)],
            _ => return Err(err()),
        };
        let mut out = [0u8; 4];
        for (slot, value) in out.iter_mut().zip(rgba) {
            *slot = value.map_err(|_| err())?;
        }
        Ok(Color(out))
    }
}
