//! CLI command definitions

use crate::core::{config::MAX_TIMEOUT_MINUTES, EventKind};
use clap::Args;
use std::path::PathBuf;

/// Run a pipeline
#[derive(Debug, Args, Clone)]
pub struct RunCommand {
    /// Pipeline YAML files, evaluated in order; the first accepting one runs
    #[arg(short, long = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Event kind (push, pull-request)
    #[arg(long, default_value = "push", value_parser = parse_event_kind)]
    pub event: EventKind,

    /// Branch the event targets
    #[arg(long, default_value = "main")]
    pub branch: String,

    /// Variable overrides (key=value)
    #[arg(long = "var", value_parser = parse_key_value)]
    pub variables: Vec<(String, String)>,

    /// Maximum run duration, enforced by the runner
    #[arg(long, value_parser = clap::value_parser!(u64).range(1..=MAX_TIMEOUT_MINUTES))]
    pub timeout_minutes: Option<u64>,

    /// Maximum number of runners alive at once
    #[arg(long, default_value_t = 4)]
    pub max_runs: usize,

    /// Lines of output shown per step in the summary
    #[arg(long, default_value_t = 40)]
    pub output_lines: usize,

    /// Project directory steps run in
    #[arg(long, default_value = ".")]
    pub working_dir: PathBuf,

    /// Don't save the run to history
    #[arg(long)]
    pub no_history: bool,

    /// Print the run result as JSON instead of the summary
    #[arg(long)]
    pub json: bool,
}

/// Validate pipeline definitions
#[derive(Debug, Args, Clone)]
pub struct ValidateCommand {
    /// Pipeline YAML files
    #[arg(short, long = "file", required = true)]
    pub files: Vec<PathBuf>,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// List pipelines with recorded runs
#[derive(Debug, Args, Clone)]
pub struct ListCommand {
    /// Show run counts
    #[arg(long)]
    pub with_counts: bool,

    /// List the builtin actions instead
    #[arg(long)]
    pub actions: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

/// Show run history
#[derive(Debug, Args, Clone)]
pub struct HistoryCommand {
    /// Pipeline name to filter by
    #[arg(short, long)]
    pub pipeline: Option<String>,

    /// Number of recent runs to show
    #[arg(short, long, default_value_t = 10)]
    pub limit: usize,

    /// Show a single run
    #[arg(long)]
    pub run_id: Option<String>,

    /// Show full details
    #[arg(long)]
    pub verbose: bool,

    /// Output in JSON format
    #[arg(long)]
    pub json: bool,
}

pub fn parse_event_kind(s: &str) -> Result<EventKind, String> {
    s.parse()
}

/// Parse key=value pairs
pub fn parse_key_value(s: &str) -> Result<(String, String), String> {
    match s.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(format!("Invalid key=value pair: {}", s)),
    }
}
