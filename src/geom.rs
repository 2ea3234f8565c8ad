//! # Geometry Model
//!
//! Templates are authored in millimeters (the physical unit users think in);
//! the pagination engine runs its cursor arithmetic in device pixels at a
//! fixed 96 dpi ratio. This module owns that conversion and the mm-space
//! bounding box used by widgets.

use serde::{Deserialize, Serialize};

/// Device pixels per millimeter at 96 dpi.
pub const PX_PER_MM: f64 = 96.0 / 25.4;

/// Tolerance for "how many rows fit" flooring. Without it, an exact fit like
/// 130mm / 10mm can land at 12.999999… and lose a row.
pub const FIT_EPSILON: f64 = 1e-6;

/// Convert millimeters to device pixels.
pub fn mm_to_px(mm: f64) -> f64 {
    mm * PX_PER_MM
}

/// Convert device pixels to millimeters.
pub fn px_to_mm(px: f64) -> f64 {
    px / PX_PER_MM
}

/// How many whole units of `step` fit into `space`, with epsilon slack so an
/// exact multiple is never undercounted. Returns 0 for non-positive `step`.
pub fn units_that_fit(space: f64, step: f64) -> usize {
    if step <= 0.0 || space <= 0.0 {
        return 0;
    }
    ((space / step) + FIT_EPSILON).floor() as usize
}

/// An axis-aligned bounding box in millimeters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }
}
