use anyhow::{Context, Result};
use chrono::Local;
use std::path::PathBuf;
use std::sync::OnceLock;

static EXE_DIR: OnceLock<PathBuf> = OnceLock::new();

/// Returns the directory containing the executable.
pub fn get_exe_dir() -> &'static PathBuf {
    EXE_DIR.get_or_init(|| {
        std::env::current_exe()
            .ok()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
            .unwrap_or_else(|| PathBuf::from("."))
    })
}

/// Returns the logs directory: `<exe_dir>/logs/`
pub fn get_logs_dir() -> PathBuf {
    get_exe_dir().join("logs")
}

/// Returns the output directory: `<exe_dir>/output/`
pub fn get_output_dir() -> PathBuf {
    get_exe_dir().join("output")
}

/// Creates a timestamped run directory: `<exe_dir>/output/YYYYMMDD_HHMMSS/`
pub fn create_run_dir() -> Result<PathBuf> {
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let run_dir = get_output_dir().join(timestamp);
    std::fs::create_dir_all(&run_dir)
        .with_context(|| format!("Failed to create run directory: {}", run_dir.display()))?;
    Ok(run_dir)
}

/// Ensures all output directories exist. Call at startup.
pub fn ensure_directories() -> std::io::Result<()> {
    std::fs::create_dir_all(get_logs_dir())?;
    std::fs::create_dir_all(get_output_dir())?;
    Ok(())
}
