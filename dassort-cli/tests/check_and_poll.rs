use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

const PROFILE: &str = r#"
dassort:
  json:
    keys: [subject]
    map: [subj]
    default: [unknown]
  path: "${root}/${subj}${sub}"
  command:
    exts: [.avi]
    run: "echo ${path}"
"#;

fn dassort_cmd(source: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("dassort"));
    for var in [
        "DASSORT_SOURCE",
        "DASSORT_DESTINATION",
        "DASSORT_HOST",
        "DASSORT_CMDHOST",
        "DASSORT_USER",
    ] {
        cmd.env_remove(var);
    }
    cmd.current_dir(source).env("RUST_LOG", "warn");
    cmd
}

fn source_with_profile() -> TempDir {
    let src = TempDir::new().expect("src");
    fs::write(src.path().join("camera.yaml"), PROFILE).expect("write profile");
    src
}

#[test]
fn check_lists_profiles() {
    let src = source_with_profile();
    dassort_cmd(src.path())
        .args(["check", "-p", "nocopy", "-d", "/out"])
        .assert()
        .success()
        .stdout(contains("camera.yaml"))
        .stdout(contains("is valid"));
}

#[test]
fn check_json_carries_the_resolved_profile() {
    let src = source_with_profile();
    let output = dassort_cmd(src.path())
        .args(["check", "--json", "-p", "nocopy", "-d", "/out"])
        .output()
        .expect("run check");
    assert!(output.status.success());

    let payload: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(payload["profiles"][0]["name"], "camera.yaml");
    assert_eq!(payload["profiles"][0]["destination_root"], "/out");
    assert_eq!(payload["warnings"].as_array().map(Vec::len), Some(0));
}

#[test]
fn check_fails_on_scp_without_a_host() {
    let src = source_with_profile();
    dassort_cmd(src.path())
        .args(["check", "-p", "scp"])
        .assert()
        .failure()
        .stderr(contains("no remote"));
}

#[test]
fn check_fails_without_any_profile() {
    let src = TempDir::new().expect("src");
    dassort_cmd(src.path())
        .arg("check")
        .assert()
        .failure()
        .stderr(contains("no configuration file found"));
}

#[test]
fn poll_sends_and_deletes_a_stable_group() {
    let src = source_with_profile();
    fs::write(src.path().join("job1.json"), r#"{"subject": "S01"}"#).unwrap();
    fs::write(src.path().join("job1.data"), "payload").unwrap();

    let output = dassort_cmd(src.path())
        .args([
            "poll", "--json", "-p", "nocopy", "-d", "/out", "--delete", "--settle-time", "0",
        ])
        .output()
        .expect("run poll");
    assert!(output.status.success(), "{}", String::from_utf8_lossy(&output.stderr));

    let report: Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(report["processed"], 1);
    assert_eq!(report["groups"][0]["destination"], "/out/S01");
    assert!(!src.path().join("job1.data").exists());
    assert!(src.path().join("job1.json").exists());
}

#[test]
fn poll_refuses_triggers_without_delete() {
    let src = source_with_profile();
    fs::write(src.path().join("job1.json"), r#"{"subject": "S01"}"#).unwrap();
    fs::write(src.path().join("job1.avi"), "frames").unwrap();

    dassort_cmd(src.path())
        .args(["poll", "-p", "nocopy", "--settle-time", "0"])
        .assert()
        .failure()
        .stderr(contains("enable --delete"));
    assert!(src.path().join("job1.avi").exists());
}

#[test]
fn dry_run_poll_touches_nothing() {
    let src = source_with_profile();
    fs::write(src.path().join("job1.json"), r#"{"subject": "S01"}"#).unwrap();
    fs::write(src.path().join("job1.avi"), "frames").unwrap();

    dassort_cmd(src.path())
        .args(["poll", "-p", "nocopy", "--settle-time", "0", "--dry-run", "--delete"])
        .assert()
        .success()
        .stdout(contains("[dry-run]"));
    assert!(src.path().join("job1.avi").exists());
}

#[test]
fn zero_wait_time_is_rejected() {
    let src = source_with_profile();
    dassort_cmd(src.path())
        .args(["watch", "-w", "0"])
        .assert()
        .failure()
        .stderr(contains("wait-time"));
}
