//! Step executor - runs a pipeline's steps in order against one environment

use crate::{
    action::{ActionError, ActionOutcome, ActionRegistry},
    core::{
        EnvMutation, Environment, InvalidTransition, Outcome, Pipeline, RunResult, Step,
        StepFailure, StepState,
    },
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Events that can occur during pipeline execution
#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        index: usize,
        name: String,
    },
    StepCompleted {
        index: usize,
        name: String,
        duration: Duration,
    },
    StepFailed {
        index: usize,
        name: String,
        error: String,
    },
    StepSkipped {
        index: usize,
        name: String,
    },
    PipelineFinished {
        run_id: Uuid,
        outcome: Outcome,
    },
}

/// Type for event handlers
pub type EventHandler = Arc<dyn Fn(ExecutionEvent) + Send + Sync>;

/// Executes the steps of a pipeline one at a time
///
/// The first failing step ends the run; the steps after it are never invoked.
/// The executor never retries: retry policy belongs to the step's action.
pub struct StepExecutor {
    registry: Arc<ActionRegistry>,
    event_handlers: Vec<EventHandler>,
}

impl StepExecutor {
    pub fn new(registry: ActionRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            event_handlers: Vec::new(),
        }
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(ExecutionEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Arc::new(handler));
    }

    /// Emit an event to all handlers
    fn emit_event(&self, event: ExecutionEvent) {
        for handler in &self.event_handlers {
            handler(event.clone());
        }
    }

    /// Execute the entire pipeline
    pub async fn execute(&self, pipeline: &mut Pipeline, env: &mut Environment) -> RunResult {
        let run_id = pipeline.state.run_id;
        info!(
            "Starting pipeline {} ({}) with {} steps",
            pipeline.name,
            run_id,
            pipeline.steps.len()
        );

        pipeline.state.start();
        self.emit_event(ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: pipeline.steps.len(),
        });

        for (key, value) in &pipeline.variables {
            env.apply(EnvMutation::set_var(key.clone(), value.clone()));
        }

        let mut failure = None;
        for index in 0..pipeline.steps.len() {
            advance(pipeline.state.start_step(index));

            let step = pipeline.steps[index].clone();
            let started_at = Utc::now();
            pipeline.steps[index].state = StepState::Running { started_at };
            self.emit_event(ExecutionEvent::StepStarted {
                index,
                name: step.name.clone(),
            });

            let clock = Instant::now();
            match self.execute_step(&step, env).await {
                Ok(outcome) => {
                    for mutation in outcome.mutations {
                        env.apply(mutation);
                    }
                    pipeline.steps[index].state = StepState::Completed {
                        output: outcome.output,
                        started_at,
                        completed_at: Utc::now(),
                    };
                    pipeline.state.step_completed();

                    info!("Step {} '{}' completed", step.number(), step.name);
                    self.emit_event(ExecutionEvent::StepCompleted {
                        index,
                        name: step.name.clone(),
                        duration: clock.elapsed(),
                    });
                }
                Err(error) => {
                    warn!("Step {} '{}' failed: {}", step.number(), step.name, error);
                    pipeline.steps[index].state = StepState::Failed {
                        error: error.to_string(),
                        output: error.output().to_string(),
                        started_at,
                        failed_at: Utc::now(),
                    };
                    advance(pipeline.state.fail());

                    self.emit_event(ExecutionEvent::StepFailed {
                        index,
                        name: step.name.clone(),
                        error: error.to_string(),
                    });
                    failure = Some(StepFailure {
                        index,
                        name: step.name,
                        error,
                    });
                    break;
                }
            }
        }

        match &failure {
            Some(failed) => {
                let reason = format!("step {} failed", failed.step_number());
                for step in pipeline.steps.iter_mut().skip(failed.index + 1) {
                    step.state = StepState::Skipped {
                        reason: reason.clone(),
                    };
                    self.emit_event(ExecutionEvent::StepSkipped {
                        index: step.index,
                        name: step.name.clone(),
                    });
                }
            }
            None => advance(pipeline.state.complete()),
        }

        let result = RunResult::from_pipeline(pipeline, failure);
        info!(
            "Pipeline {} finished: {:?} ({})",
            pipeline.name, result.outcome, pipeline.state.run
        );
        self.emit_event(ExecutionEvent::PipelineFinished {
            run_id,
            outcome: result.outcome,
        });

        result
    }

    /// Resolve and invoke one step's action, racing runner teardown
    async fn execute_step(&self, step: &Step, env: &Environment) -> Result<ActionOutcome, ActionError> {
        if let Some(reason) = env.teardown_reason() {
            return Err(ActionError::Cancelled(reason));
        }

        let action = self.registry.resolve(step)?;
        let params = step.params.render(env.vars());
        debug!("Invoking '{}' for step '{}' with {:?}", step.action, step.name, params);

        tokio::select! {
            biased;
            reason = env.torn_down() => {
                warn!("Runner torn down during step '{}': {}", step.name, reason);
                Err(ActionError::Cancelled(reason))
            }
            result = action.run(&params, env) => result,
        }
    }
}

/// The executor drives the run state strictly forward
fn advance(transition: Result<(), InvalidTransition>) {
    debug_assert!(transition.is_ok(), "{:?}", transition);
}
