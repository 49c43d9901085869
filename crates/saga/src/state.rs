//! Saga and step state machines.

use serde::{Deserialize, Serialize};

/// The status of a fulfillment saga.
///
/// State transitions:
/// ```text
/// Pending ──► InProgress ──┬──► Completed
///                          ├──► Failed ──► Compensating ──► Compensated
///                          └──────────────► Compensating
/// ```
/// Nothing ever returns to `InProgress`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SagaStatus {
    /// Created, not yet executed.
    #[default]
    Pending,

    /// Phase 1 ran; waiting for picking to finish.
    InProgress,

    /// Every step finished (terminal state).
    Completed,

    /// A step failed.
    Failed,

    /// Compensating actions are running.
    Compensating,

    /// Compensation finished (terminal state).
    Compensated,
}

impl SagaStatus {
    /// Returns true if the saga can begin running.
    pub fn can_start(&self) -> bool {
        matches!(self, SagaStatus::Pending)
    }

    /// Returns true if compensation may run from this state.
    ///
    /// `Compensating` is included so an interrupted compensation can be
    /// resumed.
    pub fn can_compensate(&self) -> bool {
        matches!(
            self,
            SagaStatus::InProgress | SagaStatus::Failed | SagaStatus::Compensating
        )
    }

    /// Returns true if this is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SagaStatus::Completed | SagaStatus::Compensated)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStatus::Pending => "pending",
            SagaStatus::InProgress => "in_progress",
            SagaStatus::Completed => "completed",
            SagaStatus::Failed => "failed",
            SagaStatus::Compensating => "compensating",
            SagaStatus::Compensated => "compensated",
        }
    }
}

impl std::fmt::Display for SagaStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// The status of a single saga step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    /// Returns true if the step counts as done for saga completion.
    pub fn is_done(&self) -> bool {
        matches!(self, StepStatus::Completed | StepStatus::Skipped)
    }

    /// Returns the state name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::Pending => "pending",
            StepStatus::InProgress => "in_progress",
            StepStatus::Completed => "completed",
            StepStatus::Failed => "failed",
            StepStatus::Skipped => "skipped",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
