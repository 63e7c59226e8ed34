//! Live progress display on stderr, driven by execution events

use crate::{
    core::Outcome,
    execution::ExecutionEvent,
    report::{CHECK, CROSS, ROCKET, SKIP},
};
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

const TEMPLATE: &str = "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// Progress bar that follows a run step by step
#[derive(Debug, Clone)]
pub struct LiveReporter {
    progress: ProgressBar,
}

impl Default for LiveReporter {
    fn default() -> Self {
        Self::new()
    }
}

impl LiveReporter {
    /// Draws to stderr
    pub fn new() -> Self {
        Self {
            progress: ProgressBar::new(0),
        }
    }

    /// Swallows everything; used with `--json`
    pub fn hidden() -> Self {
        Self {
            progress: ProgressBar::hidden(),
        }
    }

    /// Event handler suitable for `ExecutionEngine::add_event_handler`
    pub fn handler(&self) -> impl Fn(ExecutionEvent) + Send + Sync + 'static {
        let reporter = self.clone();
        move |event| reporter.observe(&event)
    }

    pub fn observe(&self, event: &ExecutionEvent) {
        let progress = &self.progress;
        match event {
            ExecutionEvent::PipelineStarted {
                run_id,
                pipeline_name,
                total_steps,
            } => {
                progress.set_length(*total_steps as u64);
                progress.set_position(0);
                progress.set_style(
                    ProgressStyle::default_bar()
                        .template(TEMPLATE)
                        .unwrap_or_else(|_| ProgressStyle::default_bar())
                        .progress_chars("#>-"),
                );
                progress.enable_steady_tick(Duration::from_millis(100));
                progress.println(format!(
                    "{}Starting pipeline {} ({})",
                    ROCKET,
                    style(pipeline_name).bold(),
                    style(&run_id.to_string()[..8]).dim()
                ));
            }
            ExecutionEvent::StepStarted { index, name } => {
                progress.set_message(format!("{}. {}", index + 1, name));
            }
            ExecutionEvent::StepCompleted {
                index,
                name,
                duration,
            } => {
                progress.inc(1);
                progress.println(format!(
                    "{}{}. {} {}",
                    CHECK,
                    index + 1,
                    style(name).green(),
                    style(format!("({:.1}s)", duration.as_secs_f64())).dim()
                ));
            }
            ExecutionEvent::StepFailed { index, name, error } => {
                progress.println(format!(
                    "{}{}. {}: {}",
                    CROSS,
                    index + 1,
                    style(name).red(),
                    style(error).dim()
                ));
            }
            ExecutionEvent::StepSkipped { index, name } => {
                progress.println(format!("{}{}. {}", SKIP, index + 1, style(name).dim()));
            }
            ExecutionEvent::PipelineFinished { outcome, .. } => {
                match outcome {
                    Outcome::Success => progress.set_message("done"),
                    Outcome::Failure => progress.set_message("failed"),
                }
                progress.finish_and_clear();
            }
        }
    }
}
