//! Locates the transcript table inside a full page image.
//!
//! The table header is expected to carry a green band. The first scanline
//! with enough marker pixels anchors the top edge, the last scanline with
//! any ink anchors the bottom edge, and the horizontal extent of the marker
//! pixels gives the left/right edges. Images without a marker band fall back
//! to the whole image.

use serde::Serialize;

use super::sampler::{sample_rows, RowStat};
use super::PixelBuffer;

/// A scanline with more marker pixels than this is the header row.
const HEADER_MARKER_RATIO: f32 = 0.05;
/// Scanlines above this marker ratio contribute to the horizontal span.
const SPAN_MARKER_RATIO: f32 = 0.02;
/// The last scanline above this active ratio is the bottom of the table.
const BOTTOM_ACTIVE_RATIO: f32 = 0.02;
/// Vertical padding as a fraction of image height.
const VERTICAL_PADDING: f64 = 0.02;
/// Horizontal padding as a fraction of image width.
const HORIZONTAL_PADDING: f64 = 0.01;

/// Integer rectangle in pixel coordinates of some buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Bounds {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl Bounds {
    /// Bounds covering the whole buffer.
    pub fn full(img: &PixelBuffer) -> Self {
        Self {
            x: 0,
            y: 0,
            width: img.width(),
            height: img.height(),
        }
    }
}

#[cfg(test)]
impl Bounds {
    /// Returns true if the rectangle lies inside a buffer of the given size.
    pub fn fits_within(&self, width: u32, height: u32) -> bool {
        self.x as u64 + self.width as u64 <= width as u64
            && self.y as u64 + self.height as u64 <= height as u64
    }
}

/// Detects the table region of a page image.
///
/// Never fails: without a marker band the full image is returned.
pub fn detect_table_bounds(img: &PixelBuffer) -> Bounds {
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Bounds::full(img);
    }

    let stats = sample_rows(img);
    bounds_from_stats(&stats, width, height)
}

/// Core of [`detect_table_bounds`], split out so it can run on precomputed stats.
fn bounds_from_stats(stats: &[RowStat], width: u32, height: u32) -> Bounds {
    let Some(header_row) = stats
        .iter()
        .position(|s| s.marker_ratio > HEADER_MARKER_RATIO)
    else {
        crate::log("No header marker found, using full image as table region");
        return Bounds {
            x: 0,
            y: 0,
            width,
            height,
        };
    };

    let pad_y = (height as f64 * VERTICAL_PADDING).floor() as u32;
    let pad_x = (width as f64 * HORIZONTAL_PADDING).floor() as u32;

    let top = (header_row as u32).saturating_sub(pad_y);

    let bottom = stats
        .iter()
        .rposition(|s| s.active_ratio > BOTTOM_ACTIVE_RATIO)
        .map(|row| (row as u32 + pad_y).min(height - 1))
        .unwrap_or(height - 1);

    let (mut left, mut right) = marker_span(stats).unwrap_or((0, width - 1));
    if left >= right {
        left = 0;
        right = width - 1;
    }
    left = left.saturating_sub(pad_x);
    right = (right + pad_x).min(width - 1);

    let table_height = (bottom + 1).saturating_sub(top).max(1).min(height - top);

    Bounds {
        x: left,
        y: top,
        width: right - left + 1,
        height: table_height,
    }
}

/// Minimum and maximum marker X across all scanlines with a usable marker ratio.
fn marker_span(stats: &[RowStat]) -> Option<(u32, u32)> {
    let mut span: Option<(u32, u32)> = None;

    for s in stats.iter().filter(|s| s.marker_ratio > SPAN_MARKER_RATIO) {
        if let (Some(min_x), Some(max_x)) = (s.min_marker_x, s.max_marker_x) {
            span = Some(match span {
                Some((l, r)) => (l.min(min_x), r.max(max_x)),
                None => (min_x, max_x),
            });
        }
    }

    span
}
