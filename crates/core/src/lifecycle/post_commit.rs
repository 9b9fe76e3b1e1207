//! Steps that run after a primary single-record write has committed.
//!
//! None of these steps are transactional with the primary write. Each step
//! carries a [`FailurePolicy`] so partial application is visible in the
//! returned [`PostCommitReport`] instead of disappearing into a log line.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Logged and reported, never turns the operation into a failure.
    LogOnly,
    /// Reported to the caller as an error even though the primary write stands.
    Surface,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PostCommitStep {
    AssignmentHistory,
    ProgressHistory,
    DisableNamesakes,
    HideWorkItems,
}

impl PostCommitStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::AssignmentHistory => "assignment_history",
            Self::ProgressHistory => "progress_history",
            Self::DisableNamesakes => "disable_namesakes",
            Self::HideWorkItems => "hide_work_items",
        }
    }

    pub fn policy(&self) -> FailurePolicy {
        match self {
            Self::DisableNamesakes => FailurePolicy::Surface,
            Self::AssignmentHistory | Self::ProgressHistory | Self::HideWorkItems => {
                FailurePolicy::LogOnly
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Applied { affected: u64 },
    Skipped,
    Failed { message: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: PostCommitStep,
    #[serde(flatten)]
    pub outcome: StepOutcome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct PostCommitReport {
    steps: Vec<StepRecord>,
}

impl PostCommitReport {
    pub fn record(&mut self, step: PostCommitStep, outcome: StepOutcome) {
        self.steps.push(StepRecord { step, outcome });
    }

    pub fn steps(&self) -> &[StepRecord] {
        &self.steps
    }

    pub fn outcome(&self, step: PostCommitStep) -> Option<&StepOutcome> {
        self.steps.iter().find(|record| record.step == step).map(|record| &record.outcome)
    }

    /// First failure whose policy requires surfacing it to the caller.
    pub fn surfaced_failure(&self) -> Option<(PostCommitStep, &str)> {
        self.steps.iter().find_map(|record| match &record.outcome {
            StepOutcome::Failed { message } if record.step.policy() == FailurePolicy::Surface => {
                Some((record.step, message.as_str()))
            }
            _ => None,
        })
    }

    pub fn is_clean(&self) -> bool {
        !self.steps.iter().any(|record| matches!(record.outcome, StepOutcome::Failed { .. }))
    }
}
