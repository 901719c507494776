//! Table structure detection on raw RGBA buffers.
//!
//! This module provides:
//! - Per-scanline ink/marker statistics
//! - Table bounds detection anchored on the green header band
//! - Row band segmentation
//! - The fixed column layout applied to every row

pub mod bounds;
pub mod columns;
pub mod rows;
pub mod sampler;

pub use bounds::{detect_table_bounds, Bounds};
pub use columns::{ColumnDefinition, FieldKey, COLUMNS};
pub use rows::{segment_rows, DetectedRow};

use image::{ImageBuffer, Rgba};

/// Row-major RGBA8 pixel buffer.
pub type PixelBuffer = ImageBuffer<Rgba<u8>, Vec<u8>>;
