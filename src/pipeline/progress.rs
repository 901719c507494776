//! Progress reporting for a processing run.
//!
//! A run reports to a [`ProgressSink`]. Sinks are observers only and never
//! slow the run down: [`ChannelSink`] forwards events over an unbounded
//! std::sync::mpsc channel so another thread can consume them.

use std::sync::mpsc::{channel, Receiver, Sender};

use super::state::{ProcessingStage, ProcessingStep};

/// Observer of a running batch. All hooks default to doing nothing.
pub trait ProgressSink {
    fn stage_changed(&mut self, _stage: ProcessingStage) {}

    fn step_changed(&mut self, _step: &ProcessingStep) {}

    /// Recognition progress, 0-100, never decreasing within a run.
    fn progress(&mut self, _percent: u8) {}
}

/// Sink that writes every event to the log.
#[derive(Debug, Default)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn stage_changed(&mut self, stage: ProcessingStage) {
        crate::log(&format!("Stage: {}", stage));
    }

    fn step_changed(&mut self, step: &ProcessingStep) {
        match &step.detail {
            Some(detail) => crate::log(&format!(
                "Step {} [{:?}]: {}",
                step.label, step.status, detail
            )),
            None => crate::log(&format!("Step {} [{:?}]", step.label, step.status)),
        }
    }

    fn progress(&mut self, percent: u8) {
        crate::log(&format!("Progress: {}%", percent));
    }
}

/// A progress event sent across threads.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Stage(ProcessingStage),
    Step(ProcessingStep),
    Progress(u8),
}

impl ProgressEvent {
    /// Replays the event on another sink.
    pub fn dispatch(&self, sink: &mut dyn ProgressSink) {
        match self {
            ProgressEvent::Stage(stage) => sink.stage_changed(*stage),
            ProgressEvent::Step(step) => sink.step_changed(step),
            ProgressEvent::Progress(percent) => sink.progress(*percent),
        }
    }
}

/// Sink that forwards events to a channel.
///
/// Send errors are ignored: a receiver that went away just stops observing.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    sender: Sender<ProgressEvent>,
}

impl ChannelSink {
    pub fn new(sender: Sender<ProgressEvent>) -> Self {
        Self { sender }
    }
}

impl ProgressSink for ChannelSink {
    fn stage_changed(&mut self, stage: ProcessingStage) {
        let _ = self.sender.send(ProgressEvent::Stage(stage));
    }

    fn step_changed(&mut self, step: &ProcessingStep) {
        let _ = self.sender.send(ProgressEvent::Step(step.clone()));
    }

    fn progress(&mut self, percent: u8) {
        let _ = self.sender.send(ProgressEvent::Progress(percent));
    }
}

/// Creates a channel sink and the receiver for its events.
pub fn create_event_channel() -> (ChannelSink, Receiver<ProgressEvent>) {
    let (sender, receiver) = channel();
    (ChannelSink::new(sender), receiver)
}
