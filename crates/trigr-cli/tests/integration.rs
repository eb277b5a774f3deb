//! Integration tests for the trigr binary

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

fn fixture_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
}

fn trigr_cmd() -> Command {
    let mut cmd = cargo_bin_cmd!("trigr");
    cmd.env_remove("TRIGR_CONFIG").env_remove("TRIGR_LOG");
    cmd
}

/// Copy the basic fixture into a scratch directory so builds can write into it
fn scratch_project() -> Option<TempDir> {
    let temp_dir = TempDir::new().ok()?;
    let source = fixture_dir().join("basic").join("main.py");
    fs::copy(source, temp_dir.path().join("main.py")).ok()?;
    Some(temp_dir)
}

fn write(path: &Path, content: &str) -> bool {
    fs::write(path, content).is_ok()
}

#[test]
fn test_version() {
    trigr_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("trigr"));
}

#[test]
fn test_help() {
    trigr_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deployment manifest"));
}

#[test]
fn test_invalid_command() {
    trigr_cmd().arg("invalid").assert().failure();
}

#[test]
fn test_build_writes_default_yaml() {
    let Some(project) = scratch_project() else {
        return;
    };
    trigr_cmd()
        .arg("build")
        .arg(project.path())
        .assert()
        .success();

    let Ok(content) = fs::read_to_string(project.path().join("functions.yaml")) else {
        panic!("functions.yaml should be written");
    };
    assert!(content.contains("specVersion: v1alpha1"));
    assert!(content.contains("helloWorld:"));
    assert!(content.contains("onMessagePublished_orders:"));
    assert!(content.contains("{{ params.MIN_INSTANCES }}"));
}

#[test]
fn test_build_to_stdout_as_json() {
    let output = trigr_cmd()
        .args(["build", "--stdout", "--format", "json"])
        .arg(fixture_dir().join("basic"))
        .output();
    let Ok(output) = output else {
        panic!("trigr should run");
    };
    assert!(output.status.success());

    let Ok(json) = serde_json::from_slice::<serde_json::Value>(&output.stdout) else {
        panic!("stdout should be a JSON manifest");
    };
    assert_eq!(json["endpoints"]["helloWorld"]["entryPoint"], "hello_world");
    assert_eq!(
        json["endpoints"]["onMessagePublished_orders"]["eventTrigger"]["eventFilters"]["topic"],
        "orders"
    );
    assert_eq!(json["params"][0]["name"], "MIN_INSTANCES");
}

#[test]
fn test_build_explicit_output() {
    let Some(project) = scratch_project() else {
        return;
    };
    let output = project.path().join("out").join("manifest.json");
    trigr_cmd()
        .arg("build")
        .arg(project.path())
        .arg("-o")
        .arg(&output)
        .args(["--format", "json"])
        .assert()
        .success();
    assert!(output.exists());
    assert!(!project.path().join("functions.yaml").exists());
}

#[test]
fn test_build_uses_config_format() {
    let Some(project) = scratch_project() else {
        return;
    };
    trigr_cmd()
        .env("TRIGR_CONFIG", fixture_dir().join("trigr.toml"))
        .arg("build")
        .arg(project.path())
        .assert()
        .success();
    assert!(project.path().join("functions.json").exists());
}

#[test]
fn test_invalid_config_fails() {
    let Some(project) = scratch_project() else {
        return;
    };
    if !write(&project.path().join("trigr.toml"), "formt = \"json\"\n") {
        return;
    }
    trigr_cmd()
        .arg("check")
        .arg(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("Invalid configuration"));
}

#[test]
fn test_check_lists_endpoints() {
    trigr_cmd()
        .args(["--no-color", "check"])
        .arg(fixture_dir().join("basic"))
        .assert()
        .success()
        .stdout(predicate::str::contains("helloWorld httpsTrigger"))
        .stdout(predicate::str::contains(
            "onMessagePublished_orders eventTrigger (google.cloud.pubsub.topic.v1.messagePublished)",
        ))
        .stdout(predicate::str::contains("MIN_INSTANCES int = 0"));
}

#[test]
fn test_keys_prints_locations() {
    trigr_cmd()
        .arg("keys")
        .arg(fixture_dir().join("basic"))
        .assert()
        .success()
        .stdout(predicate::str::contains("helloWorld\tmain.py:6:"))
        .stdout(predicate::str::contains("onMessagePublished_orders\tmain.py:11:"));
}

#[test]
fn test_syntax_error_fails_without_output() {
    let Some(project) = scratch_project() else {
        return;
    };
    if !write(
        &project.path().join("broken.py"),
        "@https.onRequest(\"x\"\ndef x(req): pass\n",
    ) {
        return;
    }
    trigr_cmd()
        .arg("build")
        .arg(project.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("broken.py:"));
    assert!(!project.path().join("functions.yaml").exists());
}

#[test]
fn test_missing_source_dir() {
    trigr_cmd()
        .args(["keys", "does/not/exist"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("does not exist"));
}
