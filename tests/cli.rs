use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::tempdir;

#[test]
fn osier_runs_the_quickstart_demo() {
    let mut cmd = Command::cargo_bin("osier").expect("binary exists");
    cmd.arg("run").arg("demos/quickstart.osr");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Hello from Osier!"))
        .stdout(predicate::str::contains("counting 2"))
        .stdout(predicate::str::contains("OSIER"));
}

#[test]
fn osier_eval_prints_results() {
    let mut cmd = Command::cargo_bin("osier").expect("binary exists");
    cmd.arg("eval").arg("print math.abs(-4)");
    cmd.assert().success().stdout(predicate::str::contains("4"));
}

#[test]
fn scripts_set_the_process_exit_code() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("exit.osr");
    fs::write(&script, "print leaving\nsystem.exit(3)\n").expect("write script");

    let mut cmd = Command::cargo_bin("osier").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .code(3)
        .stdout(predicate::str::contains("leaving"));
}

#[test]
fn uncaught_errors_exit_nonzero() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("broken.osr");
    fs::write(&script, "stack pop\n").expect("write script");

    let mut cmd = Command::cargo_bin("osier").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Error (line 1)"));
}

#[test]
fn syntax_errors_are_reported_before_exit() {
    let dir = tempdir().expect("create temp dir");
    let script = dir.path().join("mangled.osr");
    fs::write(&script, "if x > 1\n    print inside\n").expect("write script");

    let mut cmd = Command::cargo_bin("osier").expect("binary exists");
    cmd.arg("run").arg(&script);
    cmd.assert()
        .code(1)
        .stdout(predicate::str::contains("Syntax error (line 1)"));
}

#[test]
fn missing_script_fails() {
    let mut cmd = Command::cargo_bin("osier").expect("binary exists");
    cmd.arg("run").arg("no/such/file.osr");
    cmd.assert().failure();
}
