//! Application configuration.
//!
//! Loads settings from config.json at startup. Provides GPA thresholds,
//! recognizer settings, the image size bound and the default sort order.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use crate::analysis::{GpaRules, SortOptions};
use crate::ocr::preprocess::DEFAULT_MAX_DIMENSION;
use crate::ocr::RecognitionParams;

/// Global configuration instance, initialized once at startup.
static CONFIG: OnceLock<AppConfig> = OnceLock::new();

/// Recognizer section of the config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OcrConfig {
    /// Tesseract language spec, e.g. "chi_sim+eng"
    pub language: String,
    /// Tesseract page segmentation mode
    pub page_segmentation_mode: u8,
    /// Restricts recognized characters when set
    pub char_whitelist: Option<String>,
    /// Explicit path to the tesseract executable
    pub tesseract_path: Option<PathBuf>,
}

impl Default for OcrConfig {
    fn default() -> Self {
        let params = RecognitionParams::default();
        Self {
            language: params.language,
            page_segmentation_mode: params.page_segmentation_mode,
            char_whitelist: params.char_whitelist,
            tesseract_path: None,
        }
    }
}

impl OcrConfig {
    /// Engine settings applied once per run.
    pub fn recognition_params(&self) -> RecognitionParams {
        RecognitionParams {
            language: self.language.clone(),
            page_segmentation_mode: self.page_segmentation_mode,
            char_whitelist: self.char_whitelist.clone(),
        }
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Score thresholds for the GPA tiers
    pub gpa_rules: GpaRules,
    /// Recognizer settings
    pub ocr: OcrConfig,
    /// Images larger than this in either dimension are downscaled first
    pub max_image_dimension: u32,
    /// Order of the printed and exported records
    pub sort: SortOptions,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            gpa_rules: GpaRules::default(),
            ocr: OcrConfig::default(),
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            sort: SortOptions::default(),
        }
    }
}

/// Default location: config.json next to the executable.
pub fn default_config_path() -> PathBuf {
    crate::paths::get_exe_dir().join("config.json")
}

/// Loads configuration from `path` (or the default location) or returns defaults.
pub fn load_config(path: Option<&Path>) -> AppConfig {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    crate::log(&format!("Looking for config at: {}", config_path.display()));

    if config_path.exists() {
        match fs::read_to_string(&config_path) {
            Ok(contents) => match serde_json::from_str(&contents) {
                Ok(config) => {
                    crate::log("Config loaded");
                    return config;
                }
                Err(e) => {
                    crate::log(&format!(
                        "Failed to parse {}: {}. Using defaults.",
                        config_path.display(),
                        e
                    ));
                }
            },
            Err(e) => {
                crate::log(&format!(
                    "Failed to read {}: {}. Using defaults.",
                    config_path.display(),
                    e
                ));
            }
        }
    } else {
        crate::log("Config file not found. Using default config.");
    }

    AppConfig::default()
}

/// Writes the default configuration as pretty JSON.
pub fn save_default(path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(&AppConfig::default())
        .context("Failed to serialize default config")?;
    fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
    Ok(())
}

/// Initializes the global configuration. Call once at startup.
pub fn init_config(config: AppConfig) {
    let _ = CONFIG.set(config);
}

/// Returns a reference to the global configuration.
/// Panics if called before init_config().
pub fn get_config() -> &'static AppConfig {
    CONFIG
        .get()
        .expect("Config not initialized. Call init_config() first.")
}
