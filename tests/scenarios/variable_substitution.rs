//! Test: Variable Substitution - placeholders resolve from the environment

use crate::helpers::*;
use cirun::core::TriggerEvent;
use std::collections::BTreeMap;

#[tokio::test]
async fn test_placeholders_see_earlier_mutations() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
env:
  PROJECT: "shop"
steps:
  - name: "Pick version"
    uses: mock
    with: { label: "pick", set: "PYTHON_VERSION=3.10" }
  - name: "Report"
    uses: mock
    with: { label: "report", output: "{{ PROJECT }} on python {{ PYTHON_VERSION }}" }
"#;
    let (engine, _log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 0);
    assert_step_completed(run.result(), 1, "shop on python 3.10");
}

#[tokio::test]
async fn test_retried_step_mutations_apply_once_it_succeeds() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Flaky setup"
    uses: mock
    with: { label: "setup", set: "READY=yes", fail_times: 1 }
    retry:
      attempts: 2
  - name: "Check"
    uses: mock
    with: { label: "check", output: "ready={{ READY }} missing={{ MISSING }}" }
"#;
    let (engine, _log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    // unknown placeholders are left as written
    assert_step_completed(run.result(), 1, "ready=yes missing={{ MISSING }}");
}

#[tokio::test]
async fn test_overrides_replace_definition_env() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
env:
  TARGET: "staging"
steps:
  - name: "Deploy"
    uses: mock
    with: { label: "deploy", output: "deploying to {{ TARGET }}" }
"#;
    let (engine, _log) = engine(1);
    let engine = engine.with_variables(BTreeMap::from([(
        "TARGET".to_string(),
        "production".to_string(),
    )]));

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_step_completed(run.result(), 0, "deploying to production");
}
