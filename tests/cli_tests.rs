//! Integration tests for the mfsbench binary
#![allow(deprecated)] // suppress assert_cmd::Command::cargo_bin deprecation in tests

use predicates::prelude::*;
use std::io::Write;

#[test]
fn test_bench_memory_backend_text_report() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args([
        "bench",
        "--backend",
        "memory",
        "--allow-empty-root",
        "--files",
        "5",
        "--iterations",
        "2",
        "--max-depth",
        "4",
    ]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("=== Results ==="))
        .stdout(predicate::str::contains("bulk add + link: "))
        .stdout(predicate::str::contains("individual writes: "))
        .stdout(predicate::str::contains("Difference: "))
        .stdout(predicate::str::contains("is faster by"))
        .stderr(predicate::str::contains("Iteration 2/2"))
        .stderr(predicate::str::contains("destination root after iteration"));
}

#[test]
fn test_bench_json_report_parses() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args([
        "bench",
        "--backend",
        "memory",
        "--allow-empty-root",
        "--files",
        "3",
        "--iterations",
        "1",
        "--format",
        "json",
    ]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["file_count"], 3);
    assert_eq!(parsed["iterations"], 1);
    assert_eq!(parsed["strategies"].as_array().unwrap().len(), 2);
    assert!(parsed["comparison"]["faster"].is_string());
}

#[test]
fn test_bench_memory_backend_needs_empty_root_flag() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args(["bench", "--backend", "memory"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("--allow-empty-root"));
}

#[test]
fn test_setup_memory_backend() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args(["setup", "--backend", "memory", "--files", "20"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "Setup complete! In-memory approach finished in",
        ))
        .stdout(predicate::str::contains("Directory CID: Qm"))
        .stdout(predicate::str::contains("Directory size: 20480 bytes"));
}

#[test]
fn test_setup_disk_technique_json() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args([
        "setup",
        "--backend",
        "memory",
        "--technique",
        "disk",
        "--files",
        "10",
        "--format",
        "json",
    ]);

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["technique"], "disk");
    assert_eq!(parsed["total_files"], 10);
    assert_eq!(parsed["details"]["throughput"]["processed_bytes"], 10240);
}

#[test]
fn test_invalid_file_count_rejected() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args(["bench", "--backend", "memory", "--allow-empty-root", "--files", "0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("file_count must be >= 1"));
}

#[test]
fn test_unreachable_daemon_reported() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args(["bench", "--api-url", "http://127.0.0.1:1/api/v0"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("daemon unreachable"));
}

#[test]
fn test_config_file_values_apply() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(
        file,
        "[bench]\nfile_count = 4\niterations = 1\nrequire_baseline = false\nparent_policy = \"explicit-mkdir\""
    )
    .unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.arg("bench")
        .arg("--backend")
        .arg("memory")
        .arg("--format")
        .arg("json")
        .arg("--config")
        .arg(file.path());

    let output = cmd.output().unwrap();
    assert!(output.status.success());
    let parsed: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(parsed["file_count"], 4);
}

#[test]
fn test_missing_config_file_reported() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.args(["bench", "--config", "/nonexistent/mfsbench.toml"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}

#[test]
fn test_help_lists_subcommands() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("mfsbench");
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("bench"))
        .stdout(predicate::str::contains("setup"));
}
