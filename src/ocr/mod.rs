//! OCR module for reading transcript cells.
//!
//! This module provides:
//! - Tesseract discovery and trained data provisioning
//! - Image preparation (downscale, crop, grayscale)
//! - The recognizer trait and its Tesseract implementation
//! - Text cleanup and numeric parsing
//! - Per-cell orchestration producing course records

pub mod cells;
pub mod engine;
pub mod extract;
pub mod preprocess;
pub mod setup;

pub use engine::{RecognitionParams, TesseractEngine};
pub use setup::ensure_tesseract;
