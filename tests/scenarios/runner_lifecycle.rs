//! Test: Runner Lifecycle - provisioning, isolation, teardown and release

use crate::helpers::*;
use cirun::action::ActionError;
use cirun::core::{TeardownReason, TriggerEvent};
use cirun::runner::{ProvisionError, Provisioner};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

const SLOW: &str = r#"
name: "Slow"
on:
  push:
    branches: [main]
steps:
  - name: "Quick"
    uses: mock
    with: { label: "quick" }
  - name: "Hang"
    uses: mock
    with: { label: "hang", sleep_ms: 30000 }
  - name: "Never"
    uses: mock
    with: { label: "never" }
"#;

#[tokio::test]
async fn test_release_is_idempotent() {
    let (engine, _log) = engine(1);
    let provisioner = engine.provisioner();

    let mut lease = provisioner.acquire().await.unwrap();
    let scratch = lease.environment().scratch_dir().to_path_buf();
    assert!(scratch.is_dir());

    provisioner.release(&mut lease).await;
    provisioner.release(&mut lease).await;

    assert!(lease.is_released());
    assert!(!scratch.exists());
    assert_eq!(provisioner.available(), 1);
}

#[tokio::test]
async fn test_no_capacity_is_reported_without_running() {
    let (engine, log) = engine(1);
    let mut held = engine.provisioner().acquire().await.unwrap();

    let run = dispatch(&engine, &definitions(&[SLOW]), TriggerEvent::push("main")).await;

    assert!(matches!(run.dispatch, Err(ProvisionError::NoCapacity { limit: 1 })));
    assert_eq!(run.exit_code(), 2);
    assert!(run.report.summary.contains("no runner capacity"));
    assert!(log.calls().is_empty());

    engine.provisioner().release(&mut held).await;
}

#[tokio::test]
async fn test_concurrent_runs_are_isolated() {
    let first = r#"
name: "First"
on:
  push:
    branches: [main]
steps:
  - name: "Claim"
    uses: mock
    with: { label: "first-claim", set: "OWNER=first", sleep_ms: 50 }
  - name: "Check"
    uses: mock
    with: { label: "first-check", output: "owner={{ OWNER }}", sleep_ms: 50 }
"#;
    let second = r#"
name: "Second"
on:
  push:
    branches: [develop]
steps:
  - name: "Claim"
    uses: mock
    with: { label: "second-claim", set: "OWNER=second", sleep_ms: 50 }
  - name: "Check"
    uses: mock
    with: { label: "second-check", output: "owner={{ OWNER }}", sleep_ms: 50 }
"#;
    let (engine, _log) = engine(2);
    let definitions = definitions(&[first, second]);

    let (a, b) = tokio::join!(
        dispatch(&engine, &definitions, TriggerEvent::push("main")),
        dispatch(&engine, &definitions, TriggerEvent::push("develop")),
    );

    assert_step_completed(a.result(), 1, "owner=first");
    assert_step_completed(b.result(), 1, "owner=second");
    assert_ne!(a.result().run_id, b.result().run_id);
    assert_eq!(engine.provisioner().acquired(), 2);
    assert_runners_released(&engine);
    assert_eq!(engine.provisioner().available(), 2);
}

#[tokio::test]
async fn test_abort_mid_step_fails_that_step() {
    let (engine, log) = engine(1);
    let definitions = definitions(&[SLOW]);
    let started = Instant::now();

    let scratch = Arc::new(Mutex::new(None));
    let seen = scratch.clone();
    let dispatched = engine
        .dispatch_with(&definitions, &TriggerEvent::push("main"), move |lease| {
            *seen.lock().unwrap() = Some(lease.environment().scratch_dir().to_path_buf());
            let abort = lease.abort_handle();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(200)).await;
                abort.abort();
            });
        })
        .await;
    let run = finish(dispatched);

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(run.exit_code(), 1);
    let failure = run.result().failure.as_ref().unwrap();
    assert_eq!(failure.step_number(), 2);
    assert_eq!(failure.error, ActionError::Cancelled(TeardownReason::Aborted));
    assert_eq!(log.calls(), vec!["quick", "hang"]);
    assert_skipped_from(run.result(), 2);

    assert_runners_released(&engine);
    let scratch = scratch.lock().unwrap().clone().unwrap();
    assert!(!scratch.exists());
}

#[tokio::test]
async fn test_max_run_duration_fails_running_step() {
    let (engine, log) =
        engine_with(provisioner_config(1).with_max_run_duration(Duration::from_millis(200)));
    let started = Instant::now();

    let run = dispatch(&engine, &definitions(&[SLOW]), TriggerEvent::push("main")).await;

    assert!(started.elapsed() < Duration::from_secs(10));
    assert_eq!(run.exit_code(), 1);
    let failure = run.result().failure.as_ref().unwrap();
    assert_eq!(failure.name, "Hang");
    assert_eq!(failure.error, ActionError::Cancelled(TeardownReason::TimedOut));
    assert_eq!(log.attempts("never"), 0);
    assert_runners_released(&engine);
}
