//! Orphan reclamation and cross-host protection (janitor).

use delta_testing::{StubLlmServer, TestWorld};
use predicates::prelude::*;
use serde_json::json;

/// Seed a run directory that looks like a crashed engine left it behind.
fn seed_running_run(world: &TestWorld, run_id: &str, pid: u32, hostname: &str) {
    let run_dir = world.workspace().join(".delta").join(run_id);
    std::fs::create_dir_all(&run_dir).unwrap();

    let metadata = json!({
        "run_id": run_id,
        "workspace_id": "W001",
        "agent_name": "test-agent",
        "status": "RUNNING",
        "created_at": "2026-07-01T10:00:00Z",
        "updated_at": "2026-07-01T10:00:05Z",
        "initial_message": "finish the report",
        "iterations": 1,
        "max_iterations": 30,
        "agent_home": world.agent_root().display().to_string(),
        "work_dir": world.workspace().display().to_string(),
        "pid": pid,
        "hostname": hostname,
        "start_time_unix": 1_782_000_000u64,
        "process_name": "delta",
    });
    std::fs::write(
        run_dir.join("metadata.json"),
        serde_json::to_string_pretty(&metadata).unwrap(),
    )
    .unwrap();
}

/// A pid that is certainly dead: spawn and reap a child.
fn dead_pid() -> u32 {
    let mut child = std::process::Command::new("true").spawn().unwrap();
    let pid = child.id();
    child.wait().unwrap();
    pid
}

#[test]
#[cfg(unix)]
fn orphan_running_run_is_reclaimed_and_resumed() {
    let world = TestWorld::new();
    std::fs::create_dir_all(world.workspace()).unwrap();
    seed_running_run(&world, "orphan1", dead_pid(), &TestWorld::local_hostname());

    let server = StubLlmServer::start(vec![StubLlmServer::final_message("picked it back up")])
        .unwrap();
    world.set_llm_endpoint(&server.base_url());

    world
        .cli()
        .args(["continue", "--run-id", "orphan1"])
        .assert()
        .success()
        .stderr(predicate::str::contains("reclaimed"));

    let run_dir = world.workspace().join(".delta/orphan1");
    let metadata = delta_testing::run_metadata(&run_dir).unwrap();
    assert_eq!(metadata["status"], "COMPLETED");
}

#[test]
fn cross_host_running_run_requires_force() {
    let world = TestWorld::new();
    std::fs::create_dir_all(world.workspace()).unwrap();
    seed_running_run(&world, "remote1", 1, "some-other-machine");

    world
        .cli()
        .args(["continue", "--run-id", "remote1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("--force"));

    // Unchanged without --force.
    let run_dir = world.workspace().join(".delta/remote1");
    let metadata = delta_testing::run_metadata(&run_dir).unwrap();
    assert_eq!(metadata["status"], "RUNNING");
}

#[test]
fn cross_host_with_force_takes_over() {
    let world = TestWorld::new();
    std::fs::create_dir_all(world.workspace()).unwrap();
    seed_running_run(&world, "remote2", 1, "some-other-machine");

    let server =
        StubLlmServer::start(vec![StubLlmServer::final_message("taken over")]).unwrap();
    world.set_llm_endpoint(&server.base_url());

    world
        .cli()
        .args(["continue", "--run-id", "remote2", "--force"])
        .assert()
        .success();

    let run_dir = world.workspace().join(".delta/remote2");
    let metadata = delta_testing::run_metadata(&run_dir).unwrap();
    assert_eq!(metadata["status"], "COMPLETED");
}

#[test]
fn continue_unknown_run_exits_1() {
    let world = TestWorld::new();
    std::fs::create_dir_all(world.workspace()).unwrap();

    world
        .cli()
        .args(["continue", "--run-id", "never-existed"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not found"));
}
