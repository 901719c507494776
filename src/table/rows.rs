//! Row segmentation of a cropped table image.
//!
//! Scans the table top to bottom with a two-state machine. A scanline with
//! enough ink opens a row; the row stays open through faint lines and closes
//! after two consecutive quiet scanlines. Bands that are too short to be a
//! real table row are dropped.

use serde::Serialize;

use super::sampler::{sample_rows, RowStat};
use super::PixelBuffer;

/// Active ratio needed to open a row.
const ENTER_ACTIVE_RATIO: f32 = 0.015;
/// Active ratio needed to keep a row open.
const STAY_ACTIVE_RATIO: f32 = 0.01;
/// Consecutive quiet scanlines that close a row.
const QUIET_LINES_TO_CLOSE: u32 = 2;
/// Minimum kept row height in pixels.
const MIN_ROW_HEIGHT_PX: f64 = 12.0;
/// Minimum kept row height as a fraction of table height.
const MIN_ROW_HEIGHT_RATIO: f64 = 0.015;

/// Stats used for a row that is still open when the scan reaches the bottom.
const TRAILING_ROW_ACTIVE_RATIO: f32 = 0.02;
const TRAILING_ROW_MARKER_RATIO: f32 = 0.0;

/// A horizontal band of the table believed to hold one row.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DetectedRow {
    pub top: u32,
    pub bottom: u32,
    pub height: u32,
    /// Peak active ratio seen inside the band
    pub active_ratio: f32,
    /// Peak marker ratio seen inside the band
    pub marker_ratio: f32,
}

/// Segmenter state.
#[derive(Debug, Clone, Copy, PartialEq)]
enum ScanState {
    Outside,
    Inside {
        start: u32,
        quiet: u32,
        peak_active: f32,
        peak_marker: f32,
    },
}

/// Splits a cropped table image into row bands.
pub fn segment_rows(table: &PixelBuffer) -> Vec<DetectedRow> {
    let stats = sample_rows(table);
    segment_stats(&stats)
}

/// Minimum band height (exclusive) for a table of the given height.
pub fn min_row_height(table_height: u32) -> f64 {
    MIN_ROW_HEIGHT_PX.max(table_height as f64 * MIN_ROW_HEIGHT_RATIO)
}

fn segment_stats(stats: &[RowStat]) -> Vec<DetectedRow> {
    let min_height = min_row_height(stats.len() as u32);
    let mut rows = Vec::new();
    let mut state = ScanState::Outside;

    let mut keep = |row: DetectedRow| {
        if row.height as f64 > min_height {
            rows.push(row);
        }
    };

    for (index, stat) in stats.iter().enumerate() {
        let index = index as u32;

        state = match state {
            ScanState::Outside if stat.active_ratio > ENTER_ACTIVE_RATIO => ScanState::Inside {
                start: index.saturating_sub(1),
                quiet: 0,
                peak_active: stat.active_ratio,
                peak_marker: stat.marker_ratio,
            },
            ScanState::Outside => ScanState::Outside,
            ScanState::Inside {
                start,
                peak_active,
                peak_marker,
                ..
            } if stat.active_ratio > STAY_ACTIVE_RATIO => ScanState::Inside {
                start,
                quiet: 0,
                peak_active: peak_active.max(stat.active_ratio),
                peak_marker: peak_marker.max(stat.marker_ratio),
            },
            ScanState::Inside {
                start,
                quiet,
                peak_active,
                peak_marker,
            } => {
                let quiet = quiet + 1;
                if quiet >= QUIET_LINES_TO_CLOSE {
                    keep(DetectedRow {
                        top: start,
                        bottom: index,
                        height: index - start,
                        active_ratio: peak_active,
                        marker_ratio: peak_marker,
                    });
                    ScanState::Outside
                } else {
                    ScanState::Inside {
                        start,
                        quiet,
                        peak_active,
                        peak_marker,
                    }
                }
            }
        };
    }

    if let ScanState::Inside { start, .. } = state {
        let bottom = stats.len() as u32 - 1;
        keep(DetectedRow {
            top: start,
            bottom,
            height: bottom - start,
            active_ratio: TRAILING_ROW_ACTIVE_RATIO,
            marker_ratio: TRAILING_ROW_MARKER_RATIO,
        });
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);

    /// Builds a white table with fully inked scanlines in the given ranges.
    fn table_with_bands(height: u32, bands: &[(u32, u32)]) -> PixelBuffer {
        ImageBuffer::from_fn(100, height, |_, y| {
            if bands.iter().any(|&(a, b)| (a..b).contains(&y)) {
                BLACK
            } else {
                WHITE
            }
        })
    }

    #[test]
    fn test_two_separate_rows() {
        let table = table_with_bands(400, &[(50, 80), (150, 190)]);
        let rows = segment_rows(&table);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].top, 49);
        // Last ink line 79, quiet at 80 and 81 -> closes at 81
        assert_eq!(rows[0].bottom, 81);
        assert_eq!(rows[0].height, 32);
        assert_eq!(rows[1].top, 149);
        assert_eq!(rows[1].bottom, 191);
    }

    #[test]
    fn test_single_quiet_line_does_not_split() {
        // One white line at 70 inside the band
        let table = table_with_bands(400, &[(50, 70), (71, 90)]);
        let rows = segment_rows(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].top, 49);
        assert_eq!(rows[0].bottom, 91);
    }

    #[test]
    fn test_segmentation_is_deterministic() {
        let table = table_with_bands(600, &[(10, 40), (60, 95), (120, 121), (200, 260)]);
        let first = segment_rows(&table);
        let second = segment_rows(&table);
        assert_eq!(first, second);
    }

    #[test]
    fn test_height_filter_boundary() {
        // Table height 400: threshold max(12, 6) = 12.
        // k inked lines produce a band of height k + 2.
        let at_threshold = table_with_bands(400, &[(100, 110)]);
        assert!(segment_rows(&at_threshold).is_empty());

        let below_threshold = table_with_bands(400, &[(100, 109)]);
        assert!(segment_rows(&below_threshold).is_empty());

        let above_threshold = table_with_bands(400, &[(100, 111)]);
        let rows = segment_rows(&above_threshold);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].height, 13);
    }

    #[test]
    fn test_height_filter_scales_with_table() {
        // Table height 1000: threshold max(12, 15) = 15
        assert_eq!(min_row_height(1000), 15.0);
        let excluded = table_with_bands(1000, &[(100, 113)]);
        assert!(segment_rows(&excluded).is_empty());

        let included = table_with_bands(1000, &[(100, 114)]);
        assert_eq!(segment_rows(&included).len(), 1);
    }

    #[test]
    fn test_open_row_closed_at_end() {
        let table = table_with_bands(200, &[(170, 200)]);
        let rows = segment_rows(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].top, 169);
        assert_eq!(rows[0].bottom, 199);
        assert_eq!(rows[0].height, 30);
        assert_eq!(rows[0].active_ratio, 0.02);
        assert_eq!(rows[0].marker_ratio, 0.0);
    }

    #[test]
    fn test_row_at_top_clamps_start() {
        let table = table_with_bands(200, &[(0, 30)]);
        let rows = segment_rows(&table);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].top, 0);
    }

    #[test]
    fn test_faint_line_does_not_open_row() {
        // 1 inked pixel out of 100 = 0.01, below the entry threshold
        let table: PixelBuffer = ImageBuffer::from_fn(100, 200, |x, _| {
            if x == 0 { BLACK } else { WHITE }
        });
        assert!(segment_rows(&table).is_empty());
    }

    #[test]
    fn test_closed_row_reports_peak_ratios() {
        let green = Rgba([40, 170, 80, 255]);
        let table: PixelBuffer = ImageBuffer::from_fn(100, 200, |x, y| {
            if (20..40).contains(&y) && x < 50 {
                green
            } else if (40..50).contains(&y) {
                BLACK
            } else {
                WHITE
            }
        });
        let rows = segment_rows(&table);
        assert_eq!(rows.len(), 1);
        assert!((rows[0].marker_ratio - 0.5).abs() < 1e-6);
        assert!((rows[0].active_ratio - 1.0).abs() < 1e-6);
    }
}
