//! Test: Failure Handling - the first failing step ends the run

use crate::helpers::*;
use cirun::action::ActionError;
use cirun::core::TriggerEvent;

const FAILS_AT_THREE: &str = r#"
name: "CI"
on:
  push:
    branches: [main]
  pull_request:
    branches: [main]
steps:
  - name: "Set up Python"
    uses: mock
    with: { label: "one", output: "python 3.10 ready" }
  - name: "Set up Poetry"
    uses: mock
    with: { label: "two", output: "poetry 1.5.1 ready" }
  - name: "Install dependencies"
    uses: mock
    with:
      label: "three"
      fail: true
      output: "Because shop depends on requests (^9.0) which doesn't match any versions, version solving failed."
  - name: "Set up browser"
    uses: mock
    with: { label: "four" }
  - name: "Run tests"
    uses: mock
    with: { label: "five" }
"#;

#[tokio::test]
async fn test_failure_at_step_three_stops_run() {
    let (engine, log) = engine(1);

    let run = dispatch(
        &engine,
        &definitions(&[FAILS_AT_THREE]),
        TriggerEvent::pull_request("main"),
    )
    .await;

    assert_ne!(run.exit_code(), 0);
    assert_eq!(run.exit_code(), 1);

    let result = run.result();
    assert!(!result.is_success());
    let failure = result.failure.as_ref().unwrap();
    assert_eq!(failure.step_number(), 3);
    assert_eq!(failure.name, "Install dependencies");
    assert!(matches!(failure.error, ActionError::CommandFailed { code: 1, .. }));

    // steps 4 and 5 never invoked
    assert_eq!(log.calls(), vec!["one", "two", "three"]);
    assert_eq!(log.attempts("four"), 0);
    assert_eq!(log.attempts("five"), 0);
    assert_skipped_from(result, 3);
    assert_eq!(
        result.invoked_steps(),
        vec!["Set up Python", "Set up Poetry", "Install dependencies"]
    );

    assert_runners_released(&engine);
}

#[tokio::test]
async fn test_report_names_failing_step_with_output() {
    let (engine, _log) = engine(1);

    let run = dispatch(
        &engine,
        &definitions(&[FAILS_AT_THREE]),
        TriggerEvent::pull_request("main"),
    )
    .await;

    let summary = &run.report.summary;
    assert!(summary.contains("failed at step 3"), "summary was:\n{}", summary);
    assert!(summary.contains("Install dependencies"));
    assert!(summary.contains("version solving failed"));
    // output of the steps that succeeded is kept too
    assert!(summary.contains("python 3.10 ready"));
    assert!(summary.contains("poetry 1.5.1 ready"));
}

#[tokio::test]
async fn test_failing_first_step_invokes_nothing_else() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Broken"
    uses: mock
    with: { label: "broken", fail: true }
  - name: "After"
    uses: mock
    with: { label: "after" }
"#;
    let (engine, log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 1);
    assert_eq!(run.result().failing_index(), Some(0));
    assert_eq!(log.calls(), vec!["broken"]);
    assert_runners_released(&engine);
}

#[tokio::test]
async fn test_unknown_action_is_a_step_failure() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Prepare"
    uses: mock
    with: { label: "prepare" }
  - name: "Deploy"
    uses: deploy-to-prod
"#;
    let (engine, log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 1);
    let failure = run.result().failure.as_ref().unwrap();
    assert_eq!(failure.step_number(), 2);
    assert_eq!(failure.error, ActionError::UnknownAction("deploy-to-prod".to_string()));
    assert_eq!(log.calls(), vec!["prepare"]);
    assert_runners_released(&engine);
}
