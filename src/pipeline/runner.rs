//! Background runner for a processing batch.
//!
//! Moves the engine and images onto a worker thread so the caller can keep
//! draining progress events (and request cancellation) while recognition
//! blocks.

use anyhow::{anyhow, Result};
use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use super::cancel::CancellationToken;
use super::progress::{create_event_channel, ProgressEvent};
use super::session::{process_batch, BatchOptions, RunReport, SourceImage};
use crate::ocr::engine::TextRecognizer;

/// Handle to a run started with [`start_processing`].
pub struct RunHandle {
    /// Cancels the run at its next checkpoint
    pub cancel: CancellationToken,
    /// Progress events; the channel closes when the run ends
    pub events: Receiver<ProgressEvent>,
    join: JoinHandle<RunReport>,
}

impl RunHandle {
    /// Waits for the worker thread and returns its report.
    pub fn wait(self) -> Result<RunReport> {
        self.join
            .join()
            .map_err(|_| anyhow!("Processing thread panicked"))
    }
}

/// Starts processing `images` on a worker thread.
pub fn start_processing<R>(engine: R, images: Vec<SourceImage>, options: BatchOptions) -> RunHandle
where
    R: TextRecognizer + Send + 'static,
{
    let cancel = CancellationToken::new();
    let (mut sink, events) = create_event_channel();
    let worker_cancel = cancel.clone();

    crate::log(&format!("Starting processing: {} images", images.len()));

    let join = thread::spawn(move || {
        let report = process_batch(engine, images, &options, &worker_cancel, &mut sink);
        crate::log(&format!("Processing thread finished: {:?}", report.outcome));
        report
    });

    RunHandle {
        cancel,
        events,
        join,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::session::RunOutcome;
    use crate::pipeline::state::ProcessingStage;
    use crate::ocr::engine::RecognitionParams;
    use crate::table::PixelBuffer;
    use image::ImageBuffer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    struct SilentRecognizer {
        terminated: Arc<AtomicUsize>,
    }

    impl TextRecognizer for SilentRecognizer {
        fn configure(&mut self, _params: &RecognitionParams) -> Result<()> {
            Ok(())
        }

        fn recognize(&mut self, _region: &PixelBuffer) -> Result<String> {
            Ok(String::new())
        }

        fn terminate(&mut self) -> Result<()> {
            self.terminated.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    fn blank(label: &str) -> SourceImage {
        SourceImage {
            label: label.to_string(),
            pixels: ImageBuffer::from_pixel(64, 48, image::Rgba([255, 255, 255, 255])),
        }
    }

    #[test]
    fn test_events_stream_until_done() {
        let terminated = Arc::new(AtomicUsize::new(0));
        let engine = SilentRecognizer {
            terminated: terminated.clone(),
        };

        let handle = start_processing(engine, vec![blank("a"), blank("b")], BatchOptions::default());
        let events: Vec<ProgressEvent> = handle.events.iter().collect();
        let report = handle.wait().unwrap();

        assert_eq!(report.outcome, RunOutcome::NoRecords);
        assert_eq!(terminated.load(Ordering::SeqCst), 1);
        assert_eq!(
            events.iter().rev().find_map(|e| match e {
                ProgressEvent::Stage(s) => Some(*s),
                _ => None,
            }),
            Some(ProcessingStage::Done)
        );
        assert!(events.contains(&ProgressEvent::Progress(100)));
    }

    struct GatedRecognizer {
        released: Arc<std::sync::atomic::AtomicBool>,
    }

    impl TextRecognizer for GatedRecognizer {
        fn configure(&mut self, _params: &RecognitionParams) -> Result<()> {
            while !self.released.load(Ordering::SeqCst) {
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
            Ok(())
        }

        fn recognize(&mut self, _region: &PixelBuffer) -> Result<String> {
            Ok(String::new())
        }

        fn terminate(&mut self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_cancel_from_another_thread() {
        let released = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let engine = GatedRecognizer {
            released: released.clone(),
        };

        let handle = start_processing(engine, vec![blank("a")], BatchOptions::default());
        let cancel = handle.cancel.clone();
        std::thread::spawn(move || cancel.cancel()).join().unwrap();
        released.store(true, Ordering::SeqCst);

        let _events: Vec<ProgressEvent> = handle.events.iter().collect();
        let report = handle.wait().unwrap();
        assert_eq!(report.outcome, RunOutcome::Cancelled);
        assert_eq!(report.stage, ProcessingStage::Cancelled);
        assert!(report.records.is_empty());
    }
}
