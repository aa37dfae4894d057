//! `delta tool expand` prints the normalized form.

use delta_testing::TestWorld;
use predicates::prelude::*;

#[test]
fn expand_prints_shell_rewrite_and_manifest() {
    let world = TestWorld::new();
    let path = world.write_file(
        "tools/analysis.yaml",
        "
tools:
  - name: count_lines
    description: Count lines in a file
    shell: \"cat ${file} | wc -l\"
  - name: write_note
    exec: \"tee ${path}\"
    stdin: content
",
    );

    world
        .cli()
        .args(["tool", "expand", path.to_str().unwrap()])
        .assert()
        .success()
        .stdout(predicate::str::contains("tool: count_lines (shell)"))
        .stdout(predicate::str::contains("cat \\\"$1\\\" | wc -l"))
        .stdout(predicate::str::contains("- file (argument, position 0, required)"))
        .stdout(predicate::str::contains("tool: write_note (exec)"))
        .stdout(predicate::str::contains("stdin: content"));
}

#[test]
fn expand_rejects_conflicting_override() {
    let world = TestWorld::new();
    let path = world.write_file(
        "tools/bad.yaml",
        "
tools:
  - name: echo_test
    exec: \"echo ${message}\"
    parameters:
      - name: message
        inject_as: stdin
",
    );

    world
        .cli()
        .args(["tool", "expand", path.to_str().unwrap()])
        .assert()
        .code(126)
        .stderr(predicate::str::contains("message"));
}

#[test]
fn expand_output_is_stable() {
    let world = TestWorld::new();
    let path = world.write_file(
        "tools/one.yaml",
        "tools:\n  - name: list_dir\n    exec: \"ls ${dir}\"\n",
    );

    let first = world
        .cli()
        .args(["tool", "expand", path.to_str().unwrap()])
        .output()
        .unwrap();
    let second = world
        .cli()
        .args(["tool", "expand", path.to_str().unwrap()])
        .output()
        .unwrap();
    assert_eq!(first.stdout, second.stdout);
}
