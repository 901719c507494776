//! Recognition session and the per-batch processing loop.
//!
//! A [`RecognitionSession`] owns the engine for one run: it is configured
//! once on open and terminated exactly once on close. Dropping a session
//! that was not closed terminates the engine, so the engine is released on
//! every exit path.

use anyhow::{Context, Result};
use serde::Serialize;

use super::cancel::{is_cancellation, CancellationToken};
use super::progress::ProgressSink;
use super::state::{
    ProcessingMachine, ProcessingStage, ProcessingStep, STEP_LOCATE, STEP_RECOGNIZE,
};
use crate::analysis::{sort_records, GpaRules, RecordSummary, SortOptions};
use crate::ocr::cells::{extract_records, ImageSource};
use crate::ocr::engine::{RecognitionParams, TextRecognizer};
use crate::ocr::extract::FieldPatterns;
use crate::ocr::preprocess::{crop_bounds, downscale_to_fit, DEFAULT_MAX_DIMENSION};
use crate::record::CourseRecord;
use crate::table::{detect_table_bounds, segment_rows, PixelBuffer};

/// Exclusive owner of a configured recognition engine.
pub struct RecognitionSession<R: TextRecognizer> {
    engine: R,
    closed: bool,
}

impl<R: TextRecognizer> RecognitionSession<R> {
    /// Configures the engine. On failure the engine is still terminated.
    pub fn open(engine: R, params: &RecognitionParams) -> Result<Self> {
        let mut session = Self {
            engine,
            closed: false,
        };
        session
            .engine
            .configure(params)
            .context("Failed to configure recognition engine")?;
        Ok(session)
    }

    pub fn engine(&mut self) -> &mut R {
        &mut self.engine
    }

    /// Terminates the engine.
    pub fn close(mut self) -> Result<()> {
        self.release()
    }

    fn release(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.engine
            .terminate()
            .context("Failed to terminate recognition engine")
    }
}

impl<R: TextRecognizer> Drop for RecognitionSession<R> {
    fn drop(&mut self) {
        if let Err(e) = self.release() {
            crate::log(&format!("{:#}", e));
        }
    }
}

/// A decoded input image and the label used for its records.
#[derive(Debug, Clone)]
pub struct SourceImage {
    pub label: String,
    pub pixels: PixelBuffer,
}

/// Per-run settings.
#[derive(Debug, Clone)]
pub struct BatchOptions {
    pub params: RecognitionParams,
    pub max_image_dimension: u32,
    pub gpa_rules: GpaRules,
    pub sort: SortOptions,
}

impl Default for BatchOptions {
    fn default() -> Self {
        Self {
            params: RecognitionParams::default(),
            max_image_dimension: DEFAULT_MAX_DIMENSION,
            gpa_rules: GpaRules::default(),
            sort: SortOptions::default(),
        }
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunOutcome {
    /// At least one record was extracted
    Completed,
    /// The run finished but every row was rejected
    NoRecords,
    /// The run stopped on an error
    Failed,
    /// The run was cancelled
    Cancelled,
}

/// Result of one run.
#[derive(Debug, Clone)]
pub struct RunReport {
    pub outcome: RunOutcome,
    pub stage: ProcessingStage,
    pub steps: Vec<ProcessingStep>,
    /// Sorted records; empty unless the run completed
    pub records: Vec<CourseRecord>,
    pub summary: RecordSummary,
}

/// Ties the state machine to its observer.
struct Tracker<'a> {
    machine: ProcessingMachine,
    sink: &'a mut dyn ProgressSink,
}

impl Tracker<'_> {
    fn advance(&mut self, stage: ProcessingStage) -> Result<()> {
        let changed = self.machine.advance(stage)?;
        self.sink.stage_changed(stage);
        for step in &changed {
            self.sink.step_changed(step);
        }
        Ok(())
    }

    fn complete_step(&mut self, id: &str) {
        if let Some(step) = self.machine.complete_step(id) {
            self.sink.step_changed(&step);
        }
    }

    fn detail(&mut self, id: &str, detail: String) {
        if let Some(step) = self.machine.set_detail(id, detail) {
            self.sink.step_changed(&step);
        }
    }

    fn progress(&mut self, percent: f64) {
        if let Some(p) = self.machine.update_progress(percent) {
            self.sink.progress(p);
        }
    }
}

/// Processes a batch of images with `engine` and returns the outcome.
///
/// Never returns an error: failures and cancellation are reported through
/// [`RunReport::outcome`] and the step list, and the full error is logged.
pub fn process_batch<R: TextRecognizer>(
    engine: R,
    images: Vec<SourceImage>,
    options: &BatchOptions,
    cancel: &CancellationToken,
    sink: &mut dyn ProgressSink,
) -> RunReport {
    let mut tracker = Tracker {
        machine: ProcessingMachine::new(),
        sink,
    };

    let result = run_stages(&mut tracker, engine, images, options, cancel);

    let (outcome, records) = match result {
        Ok(records) if records.is_empty() => {
            crate::log("No records extracted");
            (RunOutcome::NoRecords, records)
        }
        Ok(records) => (RunOutcome::Completed, records),
        Err(e) if is_cancellation(&e) => {
            crate::log("Processing cancelled");
            interrupt(&mut tracker, ProcessingStage::Cancelled);
            (RunOutcome::Cancelled, Vec::new())
        }
        Err(e) => {
            crate::log(&format!("Processing failed: {:#}", e));
            interrupt(&mut tracker, ProcessingStage::Failed);
            (RunOutcome::Failed, Vec::new())
        }
    };

    let summary = RecordSummary::from_records(&records, &options.gpa_rules);

    RunReport {
        outcome,
        stage: tracker.machine.stage(),
        steps: tracker.machine.steps().to_vec(),
        records,
        summary,
    }
}

fn interrupt(tracker: &mut Tracker<'_>, stage: ProcessingStage) {
    if let Err(e) = tracker.advance(stage) {
        crate::log(&format!("{:#}", e));
    }
}

fn run_stages<R: TextRecognizer>(
    tracker: &mut Tracker<'_>,
    engine: R,
    images: Vec<SourceImage>,
    options: &BatchOptions,
    cancel: &CancellationToken,
) -> Result<Vec<CourseRecord>> {
    tracker.advance(ProcessingStage::LoadingEngine)?;
    let mut session = RecognitionSession::open(engine, &options.params)?;
    cancel.check()?;

    tracker.advance(ProcessingStage::LocatingTables)?;
    let patterns = FieldPatterns::new()?;
    let image_count = images.len();
    let mut records = Vec::new();

    for (image_index, image) in images.into_iter().enumerate() {
        cancel.check()?;

        tracker.detail(
            STEP_LOCATE,
            format!("Image {}/{}: {}", image_index + 1, image_count, image.label),
        );

        let scaled = downscale_to_fit(image.pixels, options.max_image_dimension);
        let bounds = detect_table_bounds(&scaled);
        let table = crop_bounds(&scaled, &bounds)
            .with_context(|| format!("Failed to crop table from {}", image.label))?;
        let rows = segment_rows(&table);

        crate::log(&format!(
            "{}: table {}x{} at ({}, {}), {} rows",
            image.label,
            bounds.width,
            bounds.height,
            bounds.x,
            bounds.y,
            rows.len()
        ));

        if image_index == 0 {
            tracker.advance(ProcessingStage::Recognizing)?;
        }
        if image_index + 1 == image_count {
            tracker.complete_step(STEP_LOCATE);
        }
        tracker.detail(
            STEP_RECOGNIZE,
            format!("Image {}/{}: {}", image_index + 1, image_count, image.label),
        );

        let source = ImageSource {
            label: &image.label,
            image_index,
        };
        let image_records = extract_records(
            session.engine(),
            &table,
            &rows,
            source,
            &patterns,
            cancel,
            |done, total| {
                let fraction = done as f64 / total.max(1) as f64;
                tracker.progress((image_index as f64 + fraction) / image_count as f64 * 100.0);
            },
        )?;
        tracker.progress((image_index + 1) as f64 / image_count as f64 * 100.0);

        records.extend(image_records);
    }

    session.close()?;

    tracker.advance(ProcessingStage::Summarizing)?;
    sort_records(&mut records, options.sort);
    tracker.advance(ProcessingStage::Done)?;

    Ok(records)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::progress::{create_event_channel, ProgressEvent};
    use crate::pipeline::state::{StepStatus, CANCELLED_DETAIL, FAILED_DETAIL};
    use anyhow::anyhow;
    use image::{ImageBuffer, Rgba};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
    const BLACK: Rgba<u8> = Rgba([0, 0, 0, 255]);
    const GREEN: Rgba<u8> = Rgba([40, 200, 40, 255]);

    const GOOD_ROW: [&str; 9] = [
        "10231", "必修", "高等数学", "Calculus", "MATH101", "本科", "4", "91", "",
    ];
    const OTHER_ROW: [&str; 9] = [
        "10577", "选修", "大学英语", "English", "ENG102", "本科", "2", "78", "",
    ];

    /// Recognizer returning a fixed script, counting lifecycle calls.
    struct ScriptedRecognizer {
        script: Vec<String>,
        calls: usize,
        configured: Arc<AtomicUsize>,
        terminated: Arc<AtomicUsize>,
        fail_at: Option<usize>,
        cancel_at: Option<(usize, CancellationToken)>,
    }

    impl ScriptedRecognizer {
        fn new(rows: &[[&str; 9]]) -> Self {
            Self {
                script: rows
                    .iter()
                    .flat_map(|r| r.iter().map(|s| s.to_string()))
                    .collect(),
                calls: 0,
                configured: Arc::new(AtomicUsize::new(0)),
                terminated: Arc::new(AtomicUsize::new(0)),
                fail_at: None,
                cancel_at: None,
            }
        }
    }

    impl TextRecognizer for ScriptedRecognizer {
        fn configure(&mut self, _params: &RecognitionParams) -> Result<()> {
            self.configured.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn recognize(&mut self, _region: &PixelBuffer) -> Result<String> {
            self.calls += 1;
            if self.fail_at == Some(self.calls) {
                return Err(anyhow!("engine crashed"));
            }
            if let Some((at, token)) = &self.cancel_at {
                if *at == self.calls {
                    token.cancel();
                }
            }
            Ok(self
                .script
                .get(self.calls - 1)
                .cloned()
                .unwrap_or_default())
        }

        fn terminate(&mut self) -> Result<()> {
            self.terminated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// 200x200 page: green header at rows 10..20, two ink rows of 20 lines.
    fn page(label: &str) -> SourceImage {
        let pixels = ImageBuffer::from_fn(200, 200, |x, y| {
            if (10..20).contains(&y) {
                GREEN
            } else if ((40..60).contains(&y) || (80..100).contains(&y)) && x < 100 {
                BLACK
            } else {
                WHITE
            }
        });
        SourceImage {
            label: label.to_string(),
            pixels,
        }
    }

    struct RecordingSink {
        events: Vec<ProgressEvent>,
    }

    impl ProgressSink for RecordingSink {
        fn stage_changed(&mut self, stage: ProcessingStage) {
            self.events.push(ProgressEvent::Stage(stage));
        }

        fn progress(&mut self, percent: u8) {
            self.events.push(ProgressEvent::Progress(percent));
        }
    }

    #[test]
    fn test_session_closes_once() {
        let engine = ScriptedRecognizer::new(&[]);
        let terminated = engine.terminated.clone();

        let session = RecognitionSession::open(engine, &RecognitionParams::default()).unwrap();
        session.close().unwrap();
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_session_drop_releases_engine() {
        let engine = ScriptedRecognizer::new(&[]);
        let terminated = engine.terminated.clone();
        {
            let _session =
                RecognitionSession::open(engine, &RecognitionParams::default()).unwrap();
        }
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_batch_extracts_sorted_records() {
        let engine = ScriptedRecognizer::new(&[GOOD_ROW, OTHER_ROW, OTHER_ROW, GOOD_ROW]);
        let configured = engine.configured.clone();
        let terminated = engine.terminated.clone();
        let mut sink = RecordingSink { events: Vec::new() };

        let options = BatchOptions {
            sort: SortOptions {
                key: crate::analysis::SortKey::Score,
                direction: crate::analysis::SortDirection::Descending,
            },
            ..BatchOptions::default()
        };

        let report = process_batch(
            engine,
            vec![page("spring"), page("fall")],
            &options,
            &CancellationToken::new(),
            &mut sink,
        );

        assert_eq!(report.outcome, RunOutcome::Completed);
        assert_eq!(report.stage, ProcessingStage::Done);
        assert!(report.steps.iter().all(|s| s.status == StepStatus::Done));
        assert_eq!(configured.load(Ordering::SeqCst), 1);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);

        assert_eq!(report.records.len(), 4);
        let scores: Vec<Option<f64>> = report.records.iter().map(|r| r.score).collect();
        assert_eq!(scores, vec![Some(91.0), Some(91.0), Some(78.0), Some(78.0)]);
        // stable: spring's row comes before fall's among equal scores
        assert_eq!(report.records[0].term, "spring");
        assert_eq!(report.records[1].term, "fall");
        assert!(report.records[0].id.starts_with("spring-0-"));
        assert!(report.records[1].id.starts_with("fall-1-"));

        assert!((report.summary.total_credits - 12.0).abs() < 1e-9);

        let stages: Vec<ProcessingStage> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Stage(s) => Some(*s),
                _ => None,
            })
            .collect();
        assert_eq!(
            stages,
            vec![
                ProcessingStage::LoadingEngine,
                ProcessingStage::LocatingTables,
                ProcessingStage::Recognizing,
                ProcessingStage::Summarizing,
                ProcessingStage::Done,
            ]
        );

        let percents: Vec<u8> = sink
            .events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress(p) => Some(*p),
                _ => None,
            })
            .collect();
        assert!(percents.windows(2).all(|w| w[0] < w[1]));
        assert_eq!(percents.last(), Some(&100));
    }

    #[test]
    fn test_batch_without_records() {
        let engine = ScriptedRecognizer::new(&[]);
        let terminated = engine.terminated.clone();
        let (mut sink, _events) = create_event_channel();

        let report = process_batch(
            engine,
            vec![page("blank")],
            &BatchOptions::default(),
            &CancellationToken::new(),
            &mut sink,
        );

        assert_eq!(report.outcome, RunOutcome::NoRecords);
        assert_eq!(report.stage, ProcessingStage::Done);
        assert!(report.records.is_empty());
        assert_eq!(report.summary.record_count, 0);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_cancel_mid_run() {
        let cancel = CancellationToken::new();
        let mut engine = ScriptedRecognizer::new(&[GOOD_ROW, GOOD_ROW]);
        engine.cancel_at = Some((4, cancel.clone()));
        let terminated = engine.terminated.clone();
        let (mut sink, _events) = create_event_channel();

        let report = process_batch(
            engine,
            vec![page("spring"), page("fall")],
            &BatchOptions::default(),
            &cancel,
            &mut sink,
        );

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.stage, ProcessingStage::Cancelled);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
        assert!(report.records.is_empty());

        let recognize = report.steps.iter().find(|s| s.id == STEP_RECOGNIZE).unwrap();
        assert_eq!(recognize.status, StepStatus::Error);
        assert_eq!(recognize.detail.as_deref(), Some(CANCELLED_DETAIL));
    }

    #[test]
    fn test_cancel_before_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let engine = ScriptedRecognizer::new(&[GOOD_ROW]);
        let terminated = engine.terminated.clone();
        let (mut sink, _events) = create_event_channel();

        let report = process_batch(
            engine,
            vec![page("spring")],
            &BatchOptions::default(),
            &cancel,
            &mut sink,
        );

        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_engine_error_fails_run() {
        let mut engine = ScriptedRecognizer::new(&[GOOD_ROW, GOOD_ROW]);
        engine.fail_at = Some(2);
        let terminated = engine.terminated.clone();
        let (mut sink, _events) = create_event_channel();

        let report = process_batch(
            engine,
            vec![page("spring")],
            &BatchOptions::default(),
            &CancellationToken::new(),
            &mut sink,
        );

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(report.stage, ProcessingStage::Failed);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);

        let errors: Vec<&ProcessingStep> = report
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Error)
            .collect();
        assert!(!errors.is_empty());
        assert!(errors
            .iter()
            .all(|s| s.detail.as_deref() == Some(FAILED_DETAIL)));
    }

    #[test]
    fn test_empty_image_fails_run() {
        let engine = ScriptedRecognizer::new(&[]);
        let terminated = engine.terminated.clone();
        let (mut sink, _events) = create_event_channel();

        let report = process_batch(
            engine,
            vec![SourceImage {
                label: "empty".to_string(),
                pixels: ImageBuffer::new(0, 0),
            }],
            &BatchOptions::default(),
            &CancellationToken::new(),
            &mut sink,
        );

        assert_eq!(report.outcome, RunOutcome::Failed);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
    }
}
