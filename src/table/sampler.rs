//! Per-scanline pixel statistics.
//!
//! Classifies every pixel of a buffer as "active" (non-background ink) and/or
//! "marker" (part of the green header band) and reduces each scanline to a
//! [`RowStat`]. Both the bounds detector and the row segmenter are built on
//! top of these stats.

use image::Rgba;

use super::PixelBuffer;

/// Pixels with luma below this are considered ink rather than paper.
pub const ACTIVE_BRIGHTNESS_THRESHOLD: f32 = 248.0;

/// Aggregate values for one scanline.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RowStat {
    /// Fraction of pixels on the line that are active (0.0 to 1.0)
    pub active_ratio: f32,
    /// Fraction of pixels on the line that are marker-colored (0.0 to 1.0)
    pub marker_ratio: f32,
    /// Leftmost marker pixel, if any
    pub min_marker_x: Option<u32>,
    /// Rightmost marker pixel, if any
    pub max_marker_x: Option<u32>,
}

/// Perceptual brightness using the ITU-R BT.601 luma weights.
/// Alpha is ignored.
pub fn luma(pixel: &Rgba<u8>) -> f32 {
    0.299 * pixel[0] as f32 + 0.587 * pixel[1] as f32 + 0.114 * pixel[2] as f32
}

/// Returns true if the pixel is darker than near-white paper.
pub fn is_active(pixel: &Rgba<u8>) -> bool {
    luma(pixel) < ACTIVE_BRIGHTNESS_THRESHOLD
}

/// Returns true if the pixel belongs to a saturated green header band.
pub fn is_marker(pixel: &Rgba<u8>) -> bool {
    let r = pixel[0] as i32;
    let g = pixel[1] as i32;
    let b = pixel[2] as i32;
    g > 120 && g > r + 25 && g > b + 10
}

/// Computes one [`RowStat`] per scanline in a single pass over the buffer.
pub fn sample_rows(img: &PixelBuffer) -> Vec<RowStat> {
    let (width, height) = img.dimensions();
    let mut stats = Vec::with_capacity(height as usize);

    if width == 0 {
        stats.resize(height as usize, RowStat::default());
        return stats;
    }

    for row in img.rows() {
        let mut active = 0u32;
        let mut marker = 0u32;
        let mut min_x: Option<u32> = None;
        let mut max_x: Option<u32> = None;

        for (x, pixel) in row.enumerate() {
            if is_active(pixel) {
                active += 1;
            }
            if is_marker(pixel) {
                marker += 1;
                let x = x as u32;
                min_x = Some(min_x.map_or(x, |m| m.min(x)));
                max_x = Some(max_x.map_or(x, |m| m.max(x)));
            }
        }

        stats.push(RowStat {
            active_ratio: active as f32 / width as f32,
            marker_ratio: marker as f32 / width as f32,
            min_marker_x: min_x,
            max_marker_x: max_x,
        });
    }

    stats
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::ImageBuffer;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([60, 180, 90, 255]);

    #[test]
    fn test_luma_weights() {
        assert!((luma(&WHITE) - 255.0).abs() < 0.01);
        assert!((luma(&BLACK) - 0.0).abs() < 0.01);
        assert!((luma(&Rgba([255, 0, 0, 0])) - 76.245).abs() < 0.01);
    }

    #[test]
    fn test_near_white_is_background() {
        assert!(!is_active(&Rgba([250, 250, 250, 255])));
        assert!(is_active(&Rgba([240, 240, 240, 255])));
    }

    #[test]
    fn test_marker_predicate() {
        assert!(is_marker(&GREEN));
        // Not green-dominant enough
        assert!(!is_marker(&Rgba([110, 130, 110, 255])));
        // Too dark
        assert!(!is_marker(&Rgba([0, 110, 0, 255])));
        assert!(!is_marker(&WHITE));
    }

    #[test]
    fn test_sample_rows_ratios_and_span() {
        // Row 0: all white. Row 1: 2 black of 10. Row 2: green at x=3..=6
        let img: PixelBuffer = ImageBuffer::from_fn(10, 3, |x, y| match y {
            1 if x < 2 => BLACK,
            2 if (3..=6).contains(&x) => GREEN,
            _ => WHITE,
        });

        let stats = sample_rows(&img);
        assert_eq!(stats.len(), 3);

        assert_eq!(stats[0].active_ratio, 0.0);
        assert_eq!(stats[0].min_marker_x, None);

        assert!((stats[1].active_ratio - 0.2).abs() < 1e-6);
        assert_eq!(stats[1].marker_ratio, 0.0);

        assert!((stats[2].marker_ratio - 0.4).abs() < 1e-6);
        assert!((stats[2].active_ratio - 0.4).abs() < 1e-6);
        assert_eq!(stats[2].min_marker_x, Some(3));
        assert_eq!(stats[2].max_marker_x, Some(6));
    }

    #[test]
    fn test_sample_rows_does_not_touch_buffer() {
        let img: PixelBuffer = ImageBuffer::from_pixel(4, 4, GREEN);
        let before = img.clone();
        let _ = sample_rows(&img);
        assert_eq!(img, before);
    }
}
