//! Test: Trigger Filtering - only accepted events provision a runner

use crate::helpers::*;
use cirun::core::TriggerEvent;
use cirun::execution::Dispatch;

const MAIN_ONLY: &str = r#"
name: "CI"
on:
  push:
    branches: [main]
  pull_request:
    branches: [main]
steps:
  - name: "Test"
    uses: mock
    with: { label: "ci" }
"#;

const RELEASE: &str = r#"
name: "Release"
on:
  push:
    branches: [main, "release/1.x"]
steps:
  - name: "Publish"
    uses: mock
    with: { label: "release" }
"#;

#[tokio::test]
async fn test_push_to_develop_is_ignored() {
    let (engine, log) = engine(1);

    let run = dispatch(&engine, &definitions(&[MAIN_ONLY]), TriggerEvent::push("develop")).await;

    assert_eq!(run.exit_code(), 0);
    assert!(matches!(run.dispatch, Ok(Dispatch::Ignored { .. })));
    assert_eq!(engine.provisioner().acquired(), 0);
    assert_eq!(engine.provisioner().released(), 0);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn test_unlisted_event_kind_is_ignored() {
    let (engine, log) = engine(1);

    let run = dispatch(
        &engine,
        &definitions(&[RELEASE]),
        TriggerEvent::pull_request("main"),
    )
    .await;

    assert_eq!(run.exit_code(), 0);
    assert!(run.dispatch.as_ref().unwrap().is_ignored());
    assert_eq!(engine.provisioner().acquired(), 0);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn test_branch_match_is_exact() {
    let (engine, log) = engine(1);

    for branch in ["Main", "main2", "release/1", "release/1.x/hotfix"] {
        let run = dispatch(
            &engine,
            &definitions(&[MAIN_ONLY, RELEASE]),
            TriggerEvent::push(branch),
        )
        .await;
        assert!(run.dispatch.as_ref().unwrap().is_ignored(), "{} should be ignored", branch);
    }
    assert_eq!(engine.provisioner().acquired(), 0);
    assert!(log.calls().is_empty());
}

#[tokio::test]
async fn test_first_matching_definition_wins() {
    let (engine, log) = engine(1);
    let definitions = definitions(&[MAIN_ONLY, RELEASE]);

    let run = dispatch(&engine, &definitions, TriggerEvent::push("main")).await;
    assert_eq!(run.result().pipeline_name, "CI");
    assert_eq!(log.calls(), vec!["ci"]);

    let run = dispatch(&engine, &definitions, TriggerEvent::push("release/1.x")).await;
    assert_eq!(run.result().pipeline_name, "Release");
    assert_eq!(log.calls(), vec!["ci", "release"]);

    assert_eq!(engine.provisioner().acquired(), 2);
    assert_runners_released(&engine);
}
