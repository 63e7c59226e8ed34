//! cirun - a local CI runner
//!
//! An event is matched against pipeline definitions, a fresh runner is
//! provisioned for the accepted pipeline, its steps run in order until the
//! first failure, and the runner is released before a single result is
//! reported.

pub mod action;
pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;
pub mod report;
pub mod runner;

// Re-export commonly used types
pub use action::{Action, ActionError, ActionOutcome, ActionRegistry, ShellRunner};
pub use core::config::PipelineConfig;
pub use core::{
    Environment, EventKind, Pipeline, RunResult, RunState, Step, StepState, TriggerEvaluator,
    TriggerEvent,
};
pub use execution::{Dispatch, ExecutionEngine, ExecutionEvent, StepExecutor};
pub use report::{LiveReporter, Report, Reporter};
pub use runner::{LocalProvisioner, ProvisionError, Provisioner, ProvisionerConfig, RunnerLease};
