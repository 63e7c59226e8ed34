//! CLI output formatting

use crate::{core::ExecutionStatus, persistence::RunSummary};

// Re-export style and the shared emojis
pub use crate::report::{CHECK, CROSS, INFO, ROCKET, SPINNER, WARN};
pub use console::style;

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Completed => style("SUCCEEDED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
    }
}

/// One history line
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Completed => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        ExecutionStatus::Pending => INFO,
    };

    let trigger = summary
        .trigger
        .as_ref()
        .map(|t| format!(" ({})", t))
        .unwrap_or_default();

    let failed = match (summary.failed_step, &summary.failed_step_name) {
        (Some(number), Some(name)) => format!(" at step {} ({})", number, name),
        _ => String::new(),
    };

    format!(
        "{}{} - {}{} - {}{} ({}/{}) - {}",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        style(trigger).dim(),
        format_status(summary.status),
        failed,
        summary.completed_steps,
        summary.total_steps,
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim()
    )
}

pub fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
