//! Transcript OCR
//!
//! A command-line tool that reads photographed academic transcripts,
//! locates the course table, recognizes each cell with Tesseract, and
//! reports the extracted courses with credit-weighted statistics.

mod analysis;
mod ocr;
mod paths;
mod pipeline;
mod record;
mod table;

use anyhow::{anyhow, Context, Result};
use chrono::Local;
use clap::Parser;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use analysis::{GpaRules, SortDirection, SortKey, SortOptions};
use ocr::TesseractEngine;
use pipeline::{BatchOptions, LogSink, RunOutcome, RunReport, SourceImage, StepStatus};

/// Per-run log file, written in addition to the main log while set.
static SESSION_LOG: Mutex<Option<PathBuf>> = Mutex::new(None);

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);

    let log_path = paths::get_logs_dir().join("transcript_ocr.log");
    append_line(&log_path, &line);

    if let Ok(session) = SESSION_LOG.lock() {
        if let Some(path) = session.as_ref() {
            append_line(path, &line);
        }
    }
}

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = file.write_all(line.as_bytes());
    }
}

/// Activates (or with `None`, deactivates) the per-run log file.
pub fn set_session_log(path: Option<PathBuf>) {
    if let Ok(mut session) = SESSION_LOG.lock() {
        *session = path;
    }
}

#[derive(Parser, Debug)]
#[command(name = "transcript-ocr", version, about = "Extract course records from transcript images")]
struct Cli {
    /// Transcript images, processed in the given order
    #[arg(required_unless_present = "init_config")]
    images: Vec<PathBuf>,

    /// Config file (default: config.json next to the executable)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Write the default config to this path and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,

    /// Minimum score for 4 grade points
    #[arg(long)]
    grade_a: Option<f64>,

    /// Minimum score for 3 grade points
    #[arg(long)]
    grade_b: Option<f64>,

    /// Minimum score for 2 grade points
    #[arg(long)]
    grade_c: Option<f64>,

    /// Field to sort records by
    #[arg(long, value_enum)]
    sort_by: Option<SortKey>,

    /// Sort in descending order
    #[arg(long)]
    descending: bool,

    /// JSON report path (default: records.json in the run directory)
    #[arg(long)]
    json: Option<PathBuf>,

    /// CSV path (default: records.csv in the run directory)
    #[arg(long)]
    csv: Option<PathBuf>,

    /// Tesseract language spec, e.g. "chi_sim+eng"
    #[arg(long)]
    lang: Option<String>,
}

impl Cli {
    /// Applies command-line overrides on top of the loaded config.
    fn apply_overrides(&self, config: &mut pipeline::AppConfig) {
        if let Some(a) = self.grade_a {
            config.gpa_rules.grade_a = a;
        }
        if let Some(b) = self.grade_b {
            config.gpa_rules.grade_b = b;
        }
        if let Some(c) = self.grade_c {
            config.gpa_rules.grade_c = c;
        }
        if let Some(key) = self.sort_by {
            config.sort.key = key;
        }
        if self.descending {
            config.sort.direction = SortDirection::Descending;
        }
        if let Some(lang) = &self.lang {
            config.ocr.language = lang.clone();
        }
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        append_line(
            &paths::get_logs_dir().join("transcript_ocr.log"),
            &log_msg,
        );
    }));

    let cli = Cli::parse();

    // Ensure output directories exist
    paths::ensure_directories()?;

    if let Some(path) = &cli.init_config {
        pipeline::config::save_default(path)?;
        log(&format!("Default config written: {}", path.display()));
        return Ok(());
    }

    let mut config = pipeline::load_config(cli.config.as_deref());
    cli.apply_overrides(&mut config);
    pipeline::init_config(config);

    let run_dir = paths::create_run_dir()?;
    set_session_log(Some(run_dir.join("session.log")));
    log(&format!("Run folder: {}", run_dir.display()));

    let result = run(&cli, &run_dir);
    if let Err(e) = &result {
        log(&format!("Error: {:#}", e));
    }

    set_session_log(None);
    result
}

/// Loads the images, runs recognition and writes the results.
fn run(cli: &Cli, run_dir: &Path) -> Result<()> {
    let config = pipeline::get_config();

    let images = cli
        .images
        .iter()
        .map(|path| load_image(path))
        .collect::<Result<Vec<_>>>()?;

    let tesseract = ocr::ensure_tesseract(config.ocr.tesseract_path.as_deref(), &config.ocr.language)?;
    let engine = TesseractEngine::new(tesseract.executable, Some(tesseract.tessdata));

    let options = BatchOptions {
        params: config.ocr.recognition_params(),
        max_image_dimension: config.max_image_dimension,
        gpa_rules: config.gpa_rules,
        sort: config.sort,
    };

    let handle = pipeline::start_processing(engine, images, options);

    let cancel = handle.cancel.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        log("Interrupt received, cancelling");
        cancel.cancel();
    }) {
        log(&format!("Warning: Ctrl-C handler not installed: {}", e));
    }

    let mut sink = LogSink;
    for event in handle.events.iter() {
        event.dispatch(&mut sink);
    }
    let report = handle.wait()?;

    let json_path = cli.json.clone().unwrap_or_else(|| run_dir.join("records.json"));
    let csv_path = cli.csv.clone().unwrap_or_else(|| run_dir.join("records.csv"));
    finish_run(&report, config.gpa_rules, config.sort, &json_path, &csv_path)
}

/// Prints and exports a completed run. Failed and cancelled runs become errors.
fn finish_run(
    report: &RunReport,
    rules: GpaRules,
    sort: SortOptions,
    json_path: &Path,
    csv_path: &Path,
) -> Result<()> {
    match report.outcome {
        RunOutcome::Completed => {
            print_report(report);
            analysis::export_records(
                &report.records,
                report.summary,
                rules,
                sort,
                Some(json_path),
                Some(csv_path),
            )
        }
        RunOutcome::NoRecords => {
            log("No course records were found. Check that the images show a transcript table.");
            Ok(())
        }
        RunOutcome::Cancelled | RunOutcome::Failed => {
            for step in report.steps.iter().filter(|s| s.status == StepStatus::Error) {
                log(&format!(
                    "Step '{}' stopped: {}",
                    step.label,
                    step.detail.as_deref().unwrap_or("")
                ));
            }
            if report.outcome == RunOutcome::Cancelled {
                Err(anyhow!("Processing cancelled (stage: {})", report.stage))
            } else {
                Err(anyhow!("Processing failed (stage: {})", report.stage))
            }
        }
    }
}

/// Decodes an image file. The file stem becomes the record label.
fn load_image(path: &Path) -> Result<SourceImage> {
    let pixels = image::open(path)
        .with_context(|| format!("Failed to open image: {}", path.display()))?
        .to_rgba8();

    let label = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "image".to_string());

    log(&format!(
        "Loaded {} ({}x{})",
        path.display(),
        pixels.width(),
        pixels.height()
    ));

    Ok(SourceImage { label, pixels })
}

fn format_number(value: Option<f64>) -> String {
    value.map(|v| format!("{}", v)).unwrap_or_else(|| "-".to_string())
}

fn print_report(report: &RunReport) {
    println!();
    println!(
        "{:<12} {:<10} {:<24} {:>7} {:>7}  {}",
        "Term", "Number", "Course", "Credits", "Score", "Remarks"
    );
    for record in &report.records {
        println!(
            "{:<12} {:<10} {:<24} {:>7} {:>7}  {}",
            record.term,
            record.course_number,
            record.course_name,
            format_number(record.credits),
            format_number(record.score),
            record.remarks
        );
    }

    let summary = &report.summary;
    println!();
    println!("Records:        {}", summary.record_count);
    println!("Total credits:  {:.1}", summary.total_credits);
    println!("Weighted score: {:.2}", summary.weighted_score);
    println!("Average score:  {:.2}", summary.average_score);
    println!("GPA:            {:.2}", summary.gpa);
    println!();
}
