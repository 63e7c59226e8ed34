//! Execution state models

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Overall pipeline execution status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExecutionStatus {
    /// Pipeline has not started
    Pending,
    /// Pipeline is currently running
    Running,
    /// Pipeline completed successfully
    Completed,
    /// Pipeline failed
    Failed,
}

/// Linear run state machine.
///
/// `Pending -> Running(0) -> Running(1) -> ... -> Succeeded`, or
/// `Running(i) -> Failed(i)`. Indices only move forward and terminal
/// states accept no further transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunState {
    Pending,
    Running(usize),
    Succeeded,
    Failed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("invalid run state transition from {from} to {to}")]
pub struct InvalidTransition {
    pub from: RunState,
    pub to: RunState,
}

impl RunState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, RunState::Succeeded | RunState::Failed(_))
    }

    /// Move to `Running(index)`; only the next index is allowed
    pub fn start_step(self, index: usize) -> Result<RunState, InvalidTransition> {
        let to = RunState::Running(index);
        match self {
            RunState::Pending if index == 0 => Ok(to),
            RunState::Running(current) if index == current + 1 => Ok(to),
            from => Err(InvalidTransition { from, to }),
        }
    }

    /// Move to `Succeeded`. A pipeline without steps succeeds straight from `Pending`.
    pub fn succeed(self) -> Result<RunState, InvalidTransition> {
        match self {
            RunState::Pending | RunState::Running(_) => Ok(RunState::Succeeded),
            from => Err(InvalidTransition {
                from,
                to: RunState::Succeeded,
            }),
        }
    }

    /// Move to `Failed(i)` for the currently running step
    pub fn fail(self) -> Result<RunState, InvalidTransition> {
        match self {
            RunState::Running(index) => Ok(RunState::Failed(index)),
            from => Err(InvalidTransition {
                from,
                to: RunState::Failed(0),
            }),
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        match self {
            RunState::Pending => ExecutionStatus::Pending,
            RunState::Running(_) => ExecutionStatus::Running,
            RunState::Succeeded => ExecutionStatus::Completed,
            RunState::Failed(_) => ExecutionStatus::Failed,
        }
    }
}

impl fmt::Display for RunState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunState::Pending => write!(f, "pending"),
            RunState::Running(index) => write!(f, "running({})", index),
            RunState::Succeeded => write!(f, "succeeded"),
            RunState::Failed(index) => write!(f, "failed({})", index),
        }
    }
}

/// State of a single step
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum StepState {
    /// Step has not run yet
    Pending,
    /// Step is currently running
    Running {
        started_at: DateTime<Utc>,
    },
    /// Step completed successfully
    Completed {
        output: String,
        started_at: DateTime<Utc>,
        completed_at: DateTime<Utc>,
    },
    /// Step failed
    Failed {
        error: String,
        output: String,
        started_at: DateTime<Utc>,
        failed_at: DateTime<Utc>,
    },
    /// Step never ran because an earlier step failed
    Skipped {
        reason: String,
    },
}

impl StepState {
    /// Check if step is in a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepState::Completed { .. } | StepState::Failed { .. } | StepState::Skipped { .. }
        )
    }

    /// Whether the step's action was invoked at all
    pub fn was_invoked(&self) -> bool {
        matches!(
            self,
            StepState::Running { .. } | StepState::Completed { .. } | StepState::Failed { .. }
        )
    }
}

/// Overall pipeline state
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineState {
    /// Unique run ID
    pub run_id: Uuid,

    /// Position in the run state machine
    pub run: RunState,

    /// When execution started
    pub started_at: Option<DateTime<Utc>>,

    /// When execution completed/failed
    pub completed_at: Option<DateTime<Utc>>,

    /// Total number of steps
    pub total_steps: usize,

    /// Number of completed steps
    pub completed_steps: usize,
}

impl PipelineState {
    /// Create a new pipeline state
    pub fn new(total_steps: usize) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            run: RunState::Pending,
            started_at: None,
            completed_at: None,
            total_steps,
            completed_steps: 0,
        }
    }

    pub fn status(&self) -> ExecutionStatus {
        self.run.status()
    }

    /// Record the start of the run
    pub fn start(&mut self) {
        self.started_at = Some(Utc::now());
    }

    pub fn start_step(&mut self, index: usize) -> Result<(), InvalidTransition> {
        self.run = self.run.start_step(index)?;
        Ok(())
    }

    pub fn step_completed(&mut self) {
        self.completed_steps += 1;
    }

    /// Mark pipeline as completed
    pub fn complete(&mut self) -> Result<(), InvalidTransition> {
        self.run = self.run.succeed()?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Mark pipeline as failed at the running step
    pub fn fail(&mut self) -> Result<(), InvalidTransition> {
        self.run = self.run.fail()?;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Calculate progress percentage (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total_steps == 0 {
            return 1.0;
        }
        self.completed_steps as f64 / self.total_steps as f64
    }
}
