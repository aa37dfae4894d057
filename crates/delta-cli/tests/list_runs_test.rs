//! `delta list-runs` filtering and formats.

use delta_testing::{StubLlmServer, TestWorld};
use predicates::prelude::*;
use serde_json::Value;

#[test]
fn empty_workspace_lists_nothing() {
    let world = TestWorld::new();

    world
        .cli()
        .args(["list-runs"])
        .assert()
        .success()
        .stderr(predicate::str::contains("no runs found"));
}

#[test]
fn completed_and_waiting_runs_are_listed_and_filtered() {
    let world = TestWorld::new();

    let server = StubLlmServer::start(vec![
        StubLlmServer::final_message("first done"),
        StubLlmServer::tool_call("call_h", "ask_human", serde_json::json!({"prompt": "Name?"})),
    ])
    .unwrap();
    world.set_llm_endpoint(&server.base_url());

    world
        .cli()
        .args(["run", "-m", "finish fast", "--run-id", "done-run"])
        .assert()
        .success();
    world
        .cli()
        .args(["run", "-m", "ask me", "--run-id", "waiting-run"])
        .assert()
        .code(101);

    let output = world
        .cli()
        .args(["list-runs", "--format", "json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let runs: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(runs.len(), 2);
    // Most recently updated first.
    assert_eq!(runs[0]["run_id"], "waiting-run");
    assert_eq!(runs[1]["run_id"], "done-run");

    let output = world
        .cli()
        .args(["list-runs", "--status", "WAITING_FOR_INPUT", "--format", "json"])
        .output()
        .unwrap();
    let runs: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["run_id"], "waiting-run");

    let output = world
        .cli()
        .args(["list-runs", "--resumable", "--first", "--format", "json"])
        .output()
        .unwrap();
    let runs: Vec<Value> = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0]["run_id"], "waiting-run");
}

#[test]
fn text_format_shows_status_and_id() {
    let world = TestWorld::new();
    let server = StubLlmServer::start(vec![StubLlmServer::final_message("ok")]).unwrap();
    world.set_llm_endpoint(&server.base_url());

    world
        .cli()
        .args(["run", "-m", "quick", "--run-id", "r-text"])
        .assert()
        .success();

    world
        .cli()
        .args(["list-runs"])
        .assert()
        .success()
        .stdout(predicate::str::contains("COMPLETED"))
        .stdout(predicate::str::contains("r-text"));
}
