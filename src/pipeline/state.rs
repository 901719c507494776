//! Processing state machine for a batch run.
//!
//! The run sequences through: Init → LoadingEngine → LocatingTables →
//! Recognizing → Summarizing → Done. Any non-terminal stage may end in
//! Failed or Cancelled instead. Locating and recognizing are interleaved
//! per image but reported as two coarse steps spanning the whole batch.

use anyhow::{anyhow, Result};
use serde::Serialize;

/// Run stages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ProcessingStage {
    /// Nothing started yet
    Init,
    /// Configuring the recognition engine
    LoadingEngine,
    /// Finding the table in the first image
    LocatingTables,
    /// Recognizing cells (later images are located during this stage)
    Recognizing,
    /// Computing the record summary
    Summarizing,
    /// Run finished
    Done,
    /// Run aborted by an error
    Failed,
    /// Run aborted by the user
    Cancelled,
}

impl std::fmt::Display for ProcessingStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProcessingStage::Init => write!(f, "Init"),
            ProcessingStage::LoadingEngine => write!(f, "Loading engine"),
            ProcessingStage::LocatingTables => write!(f, "Locating tables"),
            ProcessingStage::Recognizing => write!(f, "Recognizing"),
            ProcessingStage::Summarizing => write!(f, "Summarizing"),
            ProcessingStage::Done => write!(f, "Done"),
            ProcessingStage::Failed => write!(f, "Failed"),
            ProcessingStage::Cancelled => write!(f, "Cancelled"),
        }
    }
}

impl ProcessingStage {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            ProcessingStage::Done | ProcessingStage::Failed | ProcessingStage::Cancelled
        )
    }

    /// Returns true if the run may move from `self` to `next`.
    pub fn can_transition_to(self, next: ProcessingStage) -> bool {
        use ProcessingStage::*;

        if self.is_terminal() {
            return false;
        }
        matches!(
            (self, next),
            (_, Failed)
                | (_, Cancelled)
                | (Init, LoadingEngine)
                | (LoadingEngine, LocatingTables)
                | (LocatingTables, Recognizing)
                | (LocatingTables, Summarizing)
                | (Recognizing, Summarizing)
                | (Summarizing, Done)
        )
    }
}

/// Validated stage transition.
pub fn transition(from: ProcessingStage, to: ProcessingStage) -> Result<ProcessingStage> {
    if from.can_transition_to(to) {
        Ok(to)
    } else {
        Err(anyhow!("Invalid stage transition: {} -> {}", from, to))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Active,
    Done,
    Error,
}

/// One entry of the user-facing step list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProcessingStep {
    pub id: &'static str,
    pub label: &'static str,
    pub status: StepStatus,
    pub detail: Option<String>,
}

pub const STEP_ENGINE: &str = "engine";
pub const STEP_LOCATE: &str = "locate";
pub const STEP_RECOGNIZE: &str = "recognize";
pub const STEP_SUMMARIZE: &str = "summarize";

/// Detail shown on steps interrupted by an error.
pub const FAILED_DETAIL: &str = "Processing failed";
/// Detail shown on steps interrupted by cancellation.
pub const CANCELLED_DETAIL: &str = "Cancelled";

const STEPS: [(&str, &str); 4] = [
    (STEP_ENGINE, "Load recognition engine"),
    (STEP_LOCATE, "Locate tables"),
    (STEP_RECOGNIZE, "Recognize cells"),
    (STEP_SUMMARIZE, "Summarize records"),
];

/// Stage, step list and progress of one run.
#[derive(Debug, Clone)]
pub struct ProcessingMachine {
    stage: ProcessingStage,
    steps: Vec<ProcessingStep>,
    percent: u8,
}

impl Default for ProcessingMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl ProcessingMachine {
    pub fn new() -> Self {
        Self {
            stage: ProcessingStage::Init,
            steps: STEPS
                .iter()
                .map(|&(id, label)| ProcessingStep {
                    id,
                    label,
                    status: StepStatus::Pending,
                    detail: None,
                })
                .collect(),
            percent: 0,
        }
    }

    pub fn stage(&self) -> ProcessingStage {
        self.stage
    }

    pub fn steps(&self) -> &[ProcessingStep] {
        &self.steps
    }

    /// Moves to `next` and updates the step list.
    ///
    /// Returns the steps whose status changed.
    pub fn advance(&mut self, next: ProcessingStage) -> Result<Vec<ProcessingStep>> {
        self.stage = transition(self.stage, next)?;

        let mut changed = Vec::new();
        match next {
            ProcessingStage::Init => {}
            ProcessingStage::LoadingEngine => {
                self.set_status(STEP_ENGINE, StepStatus::Active, None, &mut changed);
            }
            ProcessingStage::LocatingTables => {
                self.set_status(STEP_ENGINE, StepStatus::Done, None, &mut changed);
                self.set_status(STEP_LOCATE, StepStatus::Active, None, &mut changed);
            }
            ProcessingStage::Recognizing => {
                self.set_status(STEP_RECOGNIZE, StepStatus::Active, None, &mut changed);
            }
            ProcessingStage::Summarizing => {
                self.set_status(STEP_LOCATE, StepStatus::Done, None, &mut changed);
                self.set_status(STEP_RECOGNIZE, StepStatus::Done, None, &mut changed);
                self.set_status(STEP_SUMMARIZE, StepStatus::Active, None, &mut changed);
            }
            ProcessingStage::Done => {
                self.set_status(STEP_SUMMARIZE, StepStatus::Done, None, &mut changed);
            }
            ProcessingStage::Failed => self.interrupt_active(FAILED_DETAIL, &mut changed),
            ProcessingStage::Cancelled => self.interrupt_active(CANCELLED_DETAIL, &mut changed),
        }

        Ok(changed)
    }

    /// Marks a step done ahead of its stage, e.g. `locate` once every image is located.
    pub fn complete_step(&mut self, id: &str) -> Option<ProcessingStep> {
        let mut changed = Vec::new();
        self.set_status(id, StepStatus::Done, None, &mut changed);
        changed.pop()
    }

    /// Sets the detail text of a step without changing its status.
    pub fn set_detail(&mut self, id: &str, detail: impl Into<String>) -> Option<ProcessingStep> {
        let step = self.steps.iter_mut().find(|s| s.id == id)?;
        step.detail = Some(detail.into());
        Some(step.clone())
    }

    /// Records progress. Returns the new percentage only if it went up.
    pub fn update_progress(&mut self, percent: f64) -> Option<u8> {
        let value = percent.clamp(0.0, 100.0).floor() as u8;
        if value > self.percent {
            self.percent = value;
            Some(value)
        } else {
            None
        }
    }

    fn set_status(
        &mut self,
        id: &str,
        status: StepStatus,
        detail: Option<&str>,
        changed: &mut Vec<ProcessingStep>,
    ) {
        if let Some(step) = self.steps.iter_mut().find(|s| s.id == id) {
            if step.status == status && detail.is_none() {
                return;
            }
            step.status = status;
            if let Some(d) = detail {
                step.detail = Some(d.to_string());
            }
            changed.push(step.clone());
        }
    }

    fn interrupt_active(&mut self, detail: &str, changed: &mut Vec<ProcessingStep>) {
        let active: Vec<&'static str> = self
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Active)
            .map(|s| s.id)
            .collect();
        for id in active {
            self.set_status(id, StepStatus::Error, Some(detail), changed);
        }
    }
}
