//! Test: Retry Behavior - retries belong to the step's action, never the executor

use crate::helpers::*;
use cirun::core::TriggerEvent;

#[tokio::test]
async fn test_retry_recovers_flaky_step() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Download browser"
    uses: mock
    with: { label: "download", fail_times: 2, output: "downloaded" }
    retry:
      attempts: 3
  - name: "Run tests"
    uses: mock
    with: { label: "tests" }
"#;
    let (engine, log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 0);
    assert_eq!(log.attempts("download"), 3);
    assert_eq!(log.attempts("tests"), 1);
    assert_step_completed(run.result(), 0, "downloaded");
    assert_eq!(engine.provisioner().acquired(), 1);
}

#[tokio::test]
async fn test_retry_gives_up_after_max_attempts() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Download browser"
    uses: mock
    with: { label: "download", fail: true }
    retry:
      attempts: 2
  - name: "Run tests"
    uses: mock
    with: { label: "tests" }
"#;
    let (engine, log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 1);
    assert_eq!(log.attempts("download"), 2);
    assert_eq!(log.attempts("tests"), 0);
    assert_eq!(run.result().failure.as_ref().unwrap().step_number(), 1);
}

#[tokio::test]
async fn test_steps_without_retry_run_once() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Flaky"
    uses: mock
    with: { label: "flaky", fail_times: 1 }
"#;
    let (engine, log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 1);
    assert_eq!(log.attempts("flaky"), 1);
}
