use anyhow::{anyhow, Result};
use image::imageops::{self, FilterType};
use image::{ImageBuffer, Luma};

use crate::table::{Bounds, PixelBuffer};

/// Default bound on either image dimension before detection runs.
pub const DEFAULT_MAX_DIMENSION: u32 = 2400;

/// Shrinks an image so neither side exceeds `max_dimension`, keeping the
/// aspect ratio. Images already within the bound are returned unchanged.
pub fn downscale_to_fit(img: PixelBuffer, max_dimension: u32) -> PixelBuffer {
    let (w, h) = img.dimensions();
    let longest = w.max(h);
    if max_dimension == 0 || longest <= max_dimension {
        return img;
    }

    let scale = max_dimension as f64 / longest as f64;
    let new_w = ((w as f64 * scale).round() as u32).clamp(1, max_dimension);
    let new_h = ((h as f64 * scale).round() as u32).clamp(1, max_dimension);

    crate::log(&format!(
        "Downscaling {}x{} to {}x{} (max {}px)",
        w, h, new_w, new_h, max_dimension
    ));

    imageops::resize(&img, new_w, new_h, FilterType::Triangle)
}

/// Copies a rectangle out of an image.
///
/// The rectangle is clamped to the image; an empty result is an error since
/// nothing downstream can work on a zero-sized buffer.
pub fn crop_bounds(img: &PixelBuffer, bounds: &Bounds) -> Result<PixelBuffer> {
    let (w, h) = img.dimensions();

    let x0 = bounds.x.min(w);
    let y0 = bounds.y.min(h);
    let cw = bounds.width.min(w - x0);
    let ch = bounds.height.min(h - y0);

    if cw == 0 || ch == 0 {
        return Err(anyhow!(
            "Cannot crop {}x{} at ({}, {}) from {}x{} image",
            bounds.width,
            bounds.height,
            bounds.x,
            bounds.y,
            w,
            h
        ));
    }

    Ok(imageops::crop_imm(img, x0, y0, cw, ch).to_image())
}

/// Converts a cell crop to grayscale for the recognizer.
pub fn to_grayscale(img: &PixelBuffer) -> ImageBuffer<Luma<u8>, Vec<u8>> {
    imageops::grayscale(img)
}
