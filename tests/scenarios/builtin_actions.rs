//! Test: Builtin Actions - a full pipeline through real shell steps

use crate::helpers::*;
use cirun::action::ActionError;
use cirun::core::TriggerEvent;
use std::path::PathBuf;
use uuid::Uuid;

fn project() -> PathBuf {
    let dir = std::env::temp_dir().join(format!("cirun-project-{}", Uuid::new_v4()));
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("pyproject.toml"), "[tool.poetry]\nname = \"shop\"\n").unwrap();
    dir
}

const PYTHON_CI: &str = r#"
name: "Python CI"
on:
  push:
    branches: [main]
  pull_request:
    branches: [main]
env:
  CI: true
steps:
  - name: "Set up Python"
    uses: setup-toolchain
    with:
      name: python
      version: "3.10"
      install: "echo installing $TOOLCHAIN_NAME $TOOLCHAIN_VERSION"
  - name: "Set up Poetry"
    uses: setup-package-manager
    with:
      name: poetry
      version: "1.5.1"
  - name: "Install dependencies"
    uses: install-dependencies
    with:
      manifest: pyproject.toml
      command: "echo resolving with $PACKAGE_MANAGER"
  - name: "Set up browser"
    uses: setup-browser
    with:
      name: chrome
  - name: "Run tests"
    uses: run-tests
    with:
      command: "echo python={{ PYTHON_VERSION }} ci=$CI browser=$BROWSER_PATH"
"#;

#[tokio::test]
async fn test_python_pipeline_end_to_end() {
    let dir = project();
    let (engine, _log) = engine_with(provisioner_config(1).with_working_dir(&dir));

    let run = dispatch(&engine, &definitions(&[PYTHON_CI]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 0, "report:\n{}", run.report.summary);
    let result = run.result();
    assert_step_completed(result, 0, "installing python 3.10");
    assert_step_completed(result, 1, "poetry 1.5.1 ready");
    assert_step_completed(result, 2, "resolving with poetry");
    assert_step_completed(result, 3, "chrome stable provisioned");
    assert_step_completed(result, 4, "python=3.10 ci=true browser=");
    assert!(result.steps[4].output().contains("chrome-stable"));
    assert_runners_released(&engine);

    std::fs::remove_dir_all(dir).ok();
}

#[tokio::test]
async fn test_dependencies_need_a_package_manager() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Install dependencies"
    uses: install-dependencies
  - name: "Run tests"
    run: "echo unreachable"
"#;
    let (engine, _log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 1);
    let failure = run.result().failure.as_ref().unwrap();
    assert_eq!(failure.step_number(), 1);
    assert!(matches!(failure.error, ActionError::MissingCapability(_)));
    assert_skipped_from(run.result(), 1);
}

#[tokio::test]
async fn test_failing_script_output_reaches_report() {
    let yaml = r#"
name: "CI"
on:
  push:
    branches: [main]
steps:
  - name: "Lint"
    run: "echo lint ok"
  - name: "Run tests"
    run: "echo '1 failed, 41 passed' && exit 3"
"#;
    let (engine, _log) = engine(1);

    let run = dispatch(&engine, &definitions(&[yaml]), TriggerEvent::push("main")).await;

    assert_eq!(run.exit_code(), 1);
    let failure = run.result().failure.as_ref().unwrap();
    assert!(matches!(failure.error, ActionError::CommandFailed { code: 3, .. }));
    assert!(run.report.summary.contains("failed at step 2"));
    assert!(run.report.summary.contains("1 failed, 41 passed"));
    assert!(run.report.summary.contains("lint ok"));
}
