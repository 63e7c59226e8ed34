//! Reporting - turns a finished dispatch into a summary and an exit status

pub mod live;

use crate::{
    core::{RunResult, StepState},
    execution::Dispatch,
    runner::ProvisionError,
};
use console::{style, Emoji};
use serde::Serialize;

pub use live::LiveReporter;

pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");
pub static SKIP: Emoji<'_, '_> = Emoji("⏭️  ", "- ");

/// Run succeeded, or no pipeline accepted the event
pub const EXIT_SUCCESS: i32 = 0;
/// A step failed
pub const EXIT_STEP_FAILURE: i32 = 1;
/// No runner could be provisioned
pub const EXIT_PROVISION_ERROR: i32 = 2;

/// Final, user-facing result of one dispatch
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Report {
    pub exit_code: i32,
    pub summary: String,
}

impl Report {
    pub fn is_success(&self) -> bool {
        self.exit_code == EXIT_SUCCESS
    }
}

/// Renders run results
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    /// Truncate each step's output to this many lines
    max_output_lines: Option<usize>,
}

impl Reporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_output_lines(mut self, lines: usize) -> Self {
        self.max_output_lines = Some(lines);
        self
    }

    pub fn report(&self, dispatch: &Dispatch) -> Report {
        match dispatch {
            Dispatch::Ignored { event } => Report {
                exit_code: EXIT_SUCCESS,
                summary: format!("{}No pipeline accepts {}, nothing to run", INFO, event),
            },
            Dispatch::Completed(result) => self.report_result(result),
        }
    }

    pub fn report_result(&self, result: &RunResult) -> Report {
        let mut lines = Vec::with_capacity(result.steps.len() * 2 + 1);
        for step in &result.steps {
            lines.push(format_step_line(step.index + 1, &step.name, &step.state));
            let output = step.output().trim_end();
            if !output.trim().is_empty() {
                lines.push(indent(&self.truncate(output)));
            }
        }

        let trigger = result
            .trigger
            .as_ref()
            .map(|t| format!(" on {}", t))
            .unwrap_or_default();

        let exit_code = match &result.failure {
            None => {
                lines.push(format!(
                    "{}Pipeline {}{} succeeded ({} steps in {:.1}s)",
                    CHECK,
                    style(&result.pipeline_name).bold(),
                    trigger,
                    result.completed_steps(),
                    result.duration().as_secs_f64()
                ));
                EXIT_SUCCESS
            }
            Some(failure) => {
                lines.push(format!(
                    "{}Pipeline {}{} failed at step {} ({}): {}",
                    CROSS,
                    style(&result.pipeline_name).bold(),
                    trigger,
                    failure.step_number(),
                    style(&failure.name).red(),
                    failure.error
                ));
                EXIT_STEP_FAILURE
            }
        };

        Report {
            exit_code,
            summary: lines.join("\n"),
        }
    }

    pub fn report_provision_error(&self, error: &ProvisionError) -> Report {
        Report {
            exit_code: EXIT_PROVISION_ERROR,
            summary: format!("{}Could not provision a runner: {}", CROSS, error),
        }
    }

    fn truncate(&self, output: &str) -> String {
        match self.max_output_lines {
            Some(max) => format_output(output, max),
            None => output.to_string(),
        }
    }
}

fn indent(output: &str) -> String {
    output
        .lines()
        .map(|line| format!("    {}", line))
        .collect::<Vec<_>>()
        .join("\n")
}

fn format_step_line(number: usize, name: &str, state: &StepState) -> String {
    match state {
        StepState::Completed {
            started_at,
            completed_at,
            ..
        } => {
            let secs = (*completed_at - *started_at).num_milliseconds() as f64 / 1000.0;
            format!(
                "{}{}. {} {}",
                CHECK,
                number,
                name,
                style(format!("({:.1}s)", secs)).dim()
            )
        }
        StepState::Failed { .. } => format!("{}{}. {}", CROSS, number, style(name).red()),
        StepState::Skipped { .. } => format!(
            "{}{}. {} {}",
            SKIP,
            number,
            style(name).dim(),
            style("(skipped)").dim()
        ),
        StepState::Running { .. } => format!("{}{}. {}", SPINNER, number, name),
        StepState::Pending => format!("  {}. {}", number, style(name).dim()),
    }
}

/// Format step output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{}... ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
