//! Terminal outcome of a pipeline run

use crate::action::ActionError;
use crate::core::{state::StepState, trigger::TriggerEvent, Pipeline};
use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Success,
    Failure,
}

/// The step that stopped the pipeline
#[derive(Debug, Clone, Serialize)]
pub struct StepFailure {
    /// Zero-based position of the failing step
    pub index: usize,
    pub name: String,
    #[serde(serialize_with = "serialize_error")]
    pub error: ActionError,
}

impl StepFailure {
    /// One-based position, as shown in reports
    pub fn step_number(&self) -> usize {
        self.index + 1
    }
}

fn serialize_error<S: serde::Serializer>(error: &ActionError, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&error.to_string())
}

/// Buffered record of one step, attributed to the final report
#[derive(Debug, Clone, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub name: String,
    pub state: StepState,
}

impl StepReport {
    /// Captured output of the step, if it ran
    pub fn output(&self) -> &str {
        match &self.state {
            StepState::Completed { output, .. } | StepState::Failed { output, .. } => output,
            _ => "",
        }
    }
}

/// Produced once, at the end of a run or at its first failure
#[derive(Debug, Clone, Serialize)]
pub struct RunResult {
    pub run_id: Uuid,
    pub pipeline_name: String,
    pub trigger: Option<TriggerEvent>,
    pub outcome: Outcome,
    pub failure: Option<StepFailure>,
    pub steps: Vec<StepReport>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub(crate) fn from_pipeline(pipeline: &Pipeline, failure: Option<StepFailure>) -> Self {
        let finished_at = pipeline.state.completed_at.unwrap_or_else(Utc::now);
        RunResult {
            run_id: pipeline.state.run_id,
            pipeline_name: pipeline.name.clone(),
            trigger: pipeline.trigger.clone(),
            outcome: if failure.is_some() {
                Outcome::Failure
            } else {
                Outcome::Success
            },
            failure,
            steps: pipeline
                .steps
                .iter()
                .map(|step| StepReport {
                    index: step.index,
                    name: step.name.clone(),
                    state: step.state.clone(),
                })
                .collect(),
            started_at: pipeline.state.started_at.unwrap_or(finished_at),
            finished_at,
        }
    }

    pub fn is_success(&self) -> bool {
        self.outcome == Outcome::Success
    }

    /// Zero-based index of the failing step
    pub fn failing_index(&self) -> Option<usize> {
        self.failure.as_ref().map(|f| f.index)
    }

    /// Steps whose action was invoked, in order
    pub fn invoked_steps(&self) -> Vec<&str> {
        self.steps
            .iter()
            .filter(|s| s.state.was_invoked())
            .map(|s| s.name.as_str())
            .collect()
    }

    pub fn completed_steps(&self) -> usize {
        self.steps
            .iter()
            .filter(|s| matches!(s.state, StepState::Completed { .. }))
            .count()
    }

    pub fn duration(&self) -> std::time::Duration {
        self.finished_at
            .signed_duration_since(self.started_at)
            .to_std()
            .unwrap_or_default()
    }
}
