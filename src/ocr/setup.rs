use anyhow::{anyhow, Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::log;

const TESSDATA_REPO: &str = "https://github.com/tesseract-ocr/tessdata/raw/main";

/// Common install locations of the tesseract executable.
const COMMON_EXECUTABLE_PATHS: &[&str] = &[
    "/usr/bin/tesseract",
    "/usr/local/bin/tesseract",
    "/opt/homebrew/bin/tesseract",
    r"C:\Program Files\Tesseract-OCR\tesseract.exe",
    r"C:\Program Files (x86)\Tesseract-OCR\tesseract.exe",
];

/// Common tessdata locations shipped by system packages.
const COMMON_TESSDATA_PATHS: &[&str] = &[
    "/usr/share/tesseract-ocr/5/tessdata",
    "/usr/share/tesseract-ocr/4.00/tessdata",
    "/usr/share/tessdata",
    "/usr/local/share/tessdata",
    "/opt/homebrew/share/tessdata",
    r"C:\Program Files\Tesseract-OCR\tessdata",
    r"C:\Program Files (x86)\Tesseract-OCR\tessdata",
];

#[derive(Debug, Clone)]
pub struct TesseractPaths {
    pub executable: PathBuf,
    pub tessdata: PathBuf,
}

/// Returns the directory where downloaded trained data is stored.
pub fn get_local_tessdata_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("transcript-ocr")
        .join("tessdata")
}

/// Splits a Tesseract language spec ("chi_sim+eng") into its languages.
pub fn languages(spec: &str) -> Vec<&str> {
    spec.split('+')
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .collect()
}

fn has_languages(dir: &Path, langs: &[&str]) -> bool {
    langs
        .iter()
        .all(|lang| dir.join(format!("{}.traineddata", lang)).exists())
}

/// Ensures Tesseract and the trained data for `language` are available.
///
/// The executable must already be installed. Missing trained data is copied
/// from a system tessdata directory when possible, otherwise downloaded.
pub fn ensure_tesseract(configured: Option<&Path>, language: &str) -> Result<TesseractPaths> {
    let executable = find_tesseract_executable(configured)?;
    log(&format!("Tesseract executable: {}", executable.display()));

    let tessdata = ensure_tessdata(language)?;
    log(&format!("Tesseract data: {}", tessdata.display()));

    Ok(TesseractPaths {
        executable,
        tessdata,
    })
}

/// Finds the Tesseract executable: configured path first, then PATH, then common locations.
pub fn find_tesseract_executable(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(path) = configured {
        if path.exists() {
            return Ok(path.to_path_buf());
        }
        log(&format!(
            "Configured Tesseract path {} does not exist, searching",
            path.display()
        ));
    }

    // Check PATH
    if let Ok(output) = std::process::Command::new("tesseract")
        .arg("--version")
        .output()
    {
        if output.status.success() {
            return Ok(PathBuf::from("tesseract"));
        }
    }

    for path in COMMON_EXECUTABLE_PATHS {
        let p = PathBuf::from(path);
        if p.exists() {
            return Ok(p);
        }
    }

    Err(anyhow!("Tesseract not found. Please install Tesseract-OCR."))
}

/// Finds an existing tessdata directory holding every language in `language`.
pub fn find_tessdata_dir(language: &str) -> Option<PathBuf> {
    let langs = languages(language);
    candidate_tessdata_dirs()
        .into_iter()
        .find(|dir| has_languages(dir, &langs))
}

fn candidate_tessdata_dirs() -> Vec<PathBuf> {
    let mut dirs = vec![get_local_tessdata_dir()];

    // TESSDATA_PREFIX may point at the tessdata dir or its parent
    if let Ok(prefix) = std::env::var("TESSDATA_PREFIX") {
        let p = PathBuf::from(&prefix);
        dirs.push(p.join("tessdata"));
        dirs.push(p);
    }

    dirs.extend(COMMON_TESSDATA_PATHS.iter().map(PathBuf::from));
    dirs
}

/// Makes sure every requested language has trained data, returning the directory to use.
pub fn ensure_tessdata(language: &str) -> Result<PathBuf> {
    if let Some(dir) = find_tessdata_dir(language) {
        return Ok(dir);
    }

    let local_dir = get_local_tessdata_dir();
    fs::create_dir_all(&local_dir)
        .with_context(|| format!("Failed to create {}", local_dir.display()))?;

    for lang in languages(language) {
        let target = local_dir.join(format!("{}.traineddata", lang));
        if target.exists() {
            continue;
        }
        if copy_from_system(lang, &target)? {
            continue;
        }
        download_traineddata(lang, &target)?;
    }

    Ok(local_dir)
}

/// Copies `<lang>.traineddata` from a system tessdata directory. Returns false if none has it.
fn copy_from_system(lang: &str, target: &Path) -> Result<bool> {
    let file_name = format!("{}.traineddata", lang);
    for dir in candidate_tessdata_dirs().iter().skip(1) {
        let source = dir.join(&file_name);
        if source.exists() {
            log(&format!("Copying {} from: {}", file_name, source.display()));
            fs::copy(&source, target)?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Downloads `<lang>.traineddata` from the tessdata repository.
fn download_traineddata(lang: &str, target: &Path) -> Result<()> {
    let url = format!("{}/{}.traineddata", TESSDATA_REPO, lang);
    log(&format!("Downloading {}...", url));

    let client = reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(300))
        .build()?;

    let response = client
        .get(&url)
        .header("User-Agent", "transcript-ocr")
        .send()?;

    if !response.status().is_success() {
        return Err(anyhow!(
            "Failed to download {}.traineddata: HTTP {}",
            lang,
            response.status()
        ));
    }

    let bytes = response.bytes()?;
    write_atomically(target, &bytes)?;

    log(&format!(
        "Downloaded {}.traineddata ({} bytes)",
        lang,
        bytes.len()
    ));

    Ok(())
}

/// Writes `bytes` to a temp file next to `target`, then renames it into place.
///
/// An interrupted write leaves no partial file at `target`.
fn write_atomically(target: &Path, bytes: &[u8]) -> Result<()> {
    let dir = target
        .parent()
        .ok_or_else(|| anyhow!("No parent directory for {}", target.display()))?;
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(bytes)?;
    tmp.as_file().sync_all()?;
    tmp.persist(target)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    Ok(())
}
