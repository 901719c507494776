use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::process::Command;
use tempfile::NamedTempFile;

use super::preprocess::to_grayscale;
use crate::table::PixelBuffer;

/// Engine-level settings applied once before per-cell calls begin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecognitionParams {
    /// Tesseract language spec, e.g. "chi_sim+eng"
    pub language: String,
    /// Tesseract page segmentation mode (7 = single text line)
    pub page_segmentation_mode: u8,
    /// Restricts output to these characters when set
    pub char_whitelist: Option<String>,
}

impl Default for RecognitionParams {
    fn default() -> Self {
        Self {
            language: "chi_sim+eng".to_string(),
            page_segmentation_mode: 7,
            char_whitelist: None,
        }
    }
}

/// A text recognition backend.
///
/// One instance serves one processing run at a time and is never asked to
/// handle overlapping requests. `terminate` releases whatever the engine
/// holds; an engine must reject calls after it.
pub trait TextRecognizer {
    /// Applies engine settings. Called once per run, before any `recognize`.
    fn configure(&mut self, params: &RecognitionParams) -> Result<()>;

    /// Recognizes the text in one cell image.
    fn recognize(&mut self, region: &PixelBuffer) -> Result<String>;

    /// Releases the engine.
    fn terminate(&mut self) -> Result<()>;
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum EngineState {
    Unconfigured,
    Ready,
    Terminated,
}

/// Recognizer that shells out to the `tesseract` executable per cell.
#[derive(Debug)]
pub struct TesseractEngine {
    executable: PathBuf,
    tessdata_dir: Option<PathBuf>,
    params: RecognitionParams,
    state: EngineState,
}

impl TesseractEngine {
    pub fn new(executable: PathBuf, tessdata_dir: Option<PathBuf>) -> Self {
        Self {
            executable,
            tessdata_dir,
            params: RecognitionParams::default(),
            state: EngineState::Unconfigured,
        }
    }

    /// Builds the argument list for one invocation on `input`.
    fn build_args(&self, input: &str) -> Vec<String> {
        let mut args = vec![input.to_string(), "stdout".to_string()];

        if let Some(dir) = &self.tessdata_dir {
            args.push("--tessdata-dir".to_string());
            args.push(dir.to_string_lossy().to_string());
        }

        args.push("-l".to_string());
        args.push(self.params.language.clone());
        args.push("--psm".to_string());
        args.push(self.params.page_segmentation_mode.to_string());

        if let Some(whitelist) = &self.params.char_whitelist {
            args.push("-c".to_string());
            args.push(format!("tessedit_char_whitelist={}", whitelist));
        }

        args
    }
}

impl TextRecognizer for TesseractEngine {
    fn configure(&mut self, params: &RecognitionParams) -> Result<()> {
        if self.state == EngineState::Terminated {
            return Err(anyhow!("Cannot configure a terminated Tesseract engine"));
        }
        self.params = params.clone();
        self.state = EngineState::Ready;
        crate::log(&format!(
            "Tesseract configured: lang={} psm={} whitelist={}",
            self.params.language,
            self.params.page_segmentation_mode,
            self.params.char_whitelist.as_deref().unwrap_or("<none>")
        ));
        Ok(())
    }

    fn recognize(&mut self, region: &PixelBuffer) -> Result<String> {
        match self.state {
            EngineState::Ready => {}
            EngineState::Unconfigured => {
                return Err(anyhow!("Tesseract engine used before configure()"))
            }
            EngineState::Terminated => {
                return Err(anyhow!("Tesseract engine used after terminate()"))
            }
        }

        // Save cell to temporary file
        let temp_input = NamedTempFile::with_suffix(".png")?;
        to_grayscale(region)
            .save(temp_input.path())
            .context("Failed to write cell image for Tesseract")?;

        let input = temp_input.path().to_string_lossy().to_string();
        let output = Command::new(&self.executable)
            .args(self.build_args(&input))
            .output()
            .with_context(|| format!("Failed to run {}", self.executable.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(anyhow!("Tesseract failed: {}", stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    fn terminate(&mut self) -> Result<()> {
        self.state = EngineState::Terminated;
        Ok(())
    }
}
