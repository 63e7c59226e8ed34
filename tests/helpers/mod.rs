//! Test utility functions for cirun

#![allow(dead_code)]

use async_trait::async_trait;
use cirun::action::{Action, ActionError, ActionOutcome, ActionRegistry};
use cirun::core::{config::PipelineConfig, EnvMutation, Environment, StepParams, StepState, TriggerEvent};
use cirun::execution::{Dispatch, ExecutionEngine};
use cirun::report::{Report, Reporter};
use cirun::runner::{LocalProvisioner, ProvisionError, Provisioner, ProvisionerConfig, RunnerLease};
use cirun::RunResult;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uuid::Uuid;

/// Name the mock action is registered under
pub const MOCK: &str = "mock";

/// Shared record of mock invocations, in call order
#[derive(Debug, Clone, Default)]
pub struct CallLog {
    calls: Arc<Mutex<Vec<String>>>,
    attempts: Arc<Mutex<HashMap<String, usize>>>,
}

impl CallLog {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn attempts(&self, label: &str) -> usize {
        self.attempts.lock().unwrap().get(label).copied().unwrap_or(0)
    }

    fn record(&self, label: &str) -> usize {
        self.calls.lock().unwrap().push(label.to_string());
        let mut attempts = self.attempts.lock().unwrap();
        let count = attempts.entry(label.to_string()).or_insert(0);
        *count += 1;
        *count
    }
}

/// Scripted mock action, driven entirely by the step's parameters:
///
/// - `label`: name recorded in the call log (defaults to "unnamed")
/// - `output`: captured output of the call
/// - `set`: `KEY=VALUE` variable declared on success
/// - `sleep_ms`: delay before returning
/// - `fail`: "true" to fail with `output` as the captured output
/// - `fail_times`: fail only the first N calls for this label
#[derive(Debug, Clone, Default)]
pub struct MockAction {
    log: CallLog,
}

impl MockAction {
    pub fn new(log: CallLog) -> Self {
        Self { log }
    }
}

#[async_trait]
impl Action for MockAction {
    async fn run(&self, params: &StepParams, _env: &Environment) -> Result<ActionOutcome, ActionError> {
        let label = params.get("label").unwrap_or("unnamed");
        let attempt = self.log.record(label);

        if let Some(ms) = params.get("sleep_ms").and_then(|v| v.parse().ok()) {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }

        let output = params.get("output").unwrap_or_default().to_string();
        let fail_times: usize = params.get("fail_times").and_then(|v| v.parse().ok()).unwrap_or(0);
        if params.get("fail") == Some("true") || attempt <= fail_times {
            return Err(ActionError::CommandFailed {
                command: label.to_string(),
                code: 1,
                output,
            });
        }

        let mut outcome = ActionOutcome::new(output);
        if let Some((key, value)) = params.get("set").and_then(|s| s.split_once('=')) {
            outcome = outcome.with_mutation(EnvMutation::set_var(key, value));
        }
        Ok(outcome)
    }
}

/// Local provisioner that counts acquire and release calls
pub struct CountingProvisioner {
    inner: LocalProvisioner,
    acquired: AtomicUsize,
    released: AtomicUsize,
}

impl CountingProvisioner {
    pub fn new(config: ProvisionerConfig) -> Self {
        Self {
            inner: LocalProvisioner::new(config),
            acquired: AtomicUsize::new(0),
            released: AtomicUsize::new(0),
        }
    }

    pub fn acquired(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn available(&self) -> usize {
        self.inner.available()
    }
}

#[async_trait]
impl Provisioner for CountingProvisioner {
    async fn acquire(&self) -> Result<RunnerLease, ProvisionError> {
        let lease = self.inner.acquire().await?;
        self.acquired.fetch_add(1, Ordering::SeqCst);
        Ok(lease)
    }

    async fn release(&self, lease: &mut RunnerLease) {
        self.released.fetch_add(1, Ordering::SeqCst);
        self.inner.release(lease).await;
    }
}

/// Provisioner settings rooted in a fresh temp directory
pub fn provisioner_config(max_runs: usize) -> ProvisionerConfig {
    ProvisionerConfig::new()
        .with_working_dir(std::env::temp_dir())
        .with_base_dir(std::env::temp_dir().join(format!("cirun-test-{}", Uuid::new_v4())))
        .with_max_concurrent_runs(max_runs)
}

/// Engine with the builtin actions plus the mock, and its call log
pub fn engine_with(config: ProvisionerConfig) -> (ExecutionEngine<CountingProvisioner>, CallLog) {
    let log = CallLog::default();
    let mut registry = ActionRegistry::with_builtins();
    registry.register(MOCK, MockAction::new(log.clone()));
    let engine = ExecutionEngine::new(CountingProvisioner::new(config), registry);
    (engine, log)
}

pub fn engine(max_runs: usize) -> (ExecutionEngine<CountingProvisioner>, CallLog) {
    engine_with(provisioner_config(max_runs))
}

pub fn definitions(yamls: &[&str]) -> Vec<PipelineConfig> {
    yamls
        .iter()
        .map(|yaml| PipelineConfig::from_yaml(yaml).unwrap())
        .collect()
}

/// Result of dispatching one event in a test
#[derive(Debug)]
pub struct TestRun {
    pub dispatch: Result<Dispatch, ProvisionError>,
    pub report: Report,
}

impl TestRun {
    pub fn result(&self) -> &RunResult {
        self.dispatch
            .as_ref()
            .ok()
            .and_then(Dispatch::result)
            .unwrap_or_else(|| panic!("expected a completed run, got {:?}", self.dispatch))
    }

    pub fn exit_code(&self) -> i32 {
        self.report.exit_code
    }
}

/// Dispatch an event and render the report
pub async fn dispatch(
    engine: &ExecutionEngine<CountingProvisioner>,
    definitions: &[PipelineConfig],
    event: TriggerEvent,
) -> TestRun {
    let dispatch = engine.dispatch(definitions, &event).await;
    finish(dispatch)
}

pub fn finish(dispatch: Result<Dispatch, ProvisionError>) -> TestRun {
    let reporter = Reporter::new();
    let report = match &dispatch {
        Ok(d) => reporter.report(d),
        Err(e) => reporter.report_provision_error(e),
    };
    TestRun { dispatch, report }
}

/// Assert every acquired runner was released
pub fn assert_runners_released(engine: &ExecutionEngine<CountingProvisioner>) {
    let provisioner = engine.provisioner();
    assert_eq!(
        provisioner.acquired(),
        provisioner.released(),
        "every acquired runner must be released"
    );
}

/// Assert a step completed with output containing `expected`
pub fn assert_step_completed(result: &RunResult, index: usize, expected: &str) {
    let step = &result.steps[index];
    assert!(
        matches!(step.state, StepState::Completed { .. }),
        "Step {} '{}' should be completed, but was in state: {:?}",
        index + 1,
        step.name,
        step.state
    );
    assert!(
        step.output().contains(expected),
        "Step {} output:\n{}\n\ndoes not contain:\n{}",
        index + 1,
        step.output(),
        expected
    );
}

/// Assert the steps from `from` onward were never invoked
pub fn assert_skipped_from(result: &RunResult, from: usize) {
    for step in &result.steps[from..] {
        assert!(
            matches!(step.state, StepState::Skipped { .. }),
            "Step {} '{}' should be skipped, but was in state: {:?}",
            step.index + 1,
            step.name,
            step.state
        );
    }
}
