//! End-to-end CLI tests for the download-counter binary.

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// Command bound to a database inside `dir`, isolated from any user config.
fn counter(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("download-counter").unwrap();
    cmd.env("XDG_CONFIG_HOME", dir.path().join("config"))
        .env_remove("RUST_LOG")
        .arg("--db")
        .arg(dir.path().join("stats.db"));
    cmd
}

/// Test that --help displays usage information and exits with code 0.
#[test]
fn test_binary_help_displays_usage() {
    let mut cmd = Command::cargo_bin("download-counter").unwrap();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Count file downloads"));
}

/// Test that --version displays version and exits with code 0.
#[test]
fn test_binary_version_displays_version() {
    let mut cmd = Command::cargo_bin("download-counter").unwrap();
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("download-counter"));
}

/// Test that invalid flags cause non-zero exit.
#[test]
fn test_binary_invalid_flag_returns_error() {
    let mut cmd = Command::cargo_bin("download-counter").unwrap();
    cmd.arg("--invalid-flag")
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"));
}

/// Test that a missing subcommand is a usage error.
#[test]
fn test_binary_requires_subcommand() {
    let mut cmd = Command::cargo_bin("download-counter").unwrap();
    cmd.assert().failure().code(2);
}

#[test]
fn test_max_on_empty_database_prints_zero() {
    let dir = TempDir::new().unwrap();
    counter(&dir).arg("max").assert().success().stdout("0\n");
}

#[test]
fn test_record_then_top_and_max() {
    let dir = TempDir::new().unwrap();
    for id in ["1", "1", "1", "2"] {
        counter(&dir).args(["-q", "record", id]).assert().success();
    }

    counter(&dir).arg("max").assert().success().stdout("3\n");
    counter(&dir)
        .args(["top", "-o", "total", "-n", "5"])
        .assert()
        .success()
        .stdout("1\n2\n");
}

#[test]
fn test_show_reports_missing_resources() {
    let dir = TempDir::new().unwrap();
    counter(&dir).args(["-q", "record", "9", "--user", "4"]).assert().success();

    counter(&dir)
        .args(["show", "9", "10"])
        .assert()
        .success()
        .stdout(predicate::str::contains("9\ttotal=1\ttoday=1"))
        .stdout(predicate::str::contains("user=4"))
        .stdout(predicate::str::contains("10\tno downloads"));
}

#[test]
fn test_settings_toggle_and_purge() {
    let dir = TempDir::new().unwrap();
    counter(&dir)
        .arg("settings")
        .assert()
        .success()
        .stdout("count_downloads = false\n");

    counter(&dir)
        .args(["-q", "settings", "--enable"])
        .assert()
        .success()
        .stdout("count_downloads = true\n");
    counter(&dir)
        .arg("settings")
        .assert()
        .success()
        .stdout("count_downloads = true\n");

    counter(&dir).args(["-q", "record", "3"]).assert().success();
    counter(&dir)
        .args(["-q", "settings", "--purge"])
        .assert()
        .success()
        .stdout(predicate::str::contains("purged = 1"));
    counter(&dir).arg("max").assert().success().stdout("0\n");
}

#[test]
fn test_fetch_counts_served_file() {
    let dir = TempDir::new().unwrap();
    let files = dir.path().join("files");
    std::fs::create_dir_all(files.join("private")).unwrap();
    std::fs::write(files.join("private/notes.txt"), "hello").unwrap();

    counter(&dir)
        .args(["-q", "register-file", "12", "notes.txt", "private://notes.txt"])
        .assert()
        .success();
    counter(&dir).args(["-q", "settings", "--enable"]).assert().success();

    counter(&dir)
        .args(["-q", "fetch", "12", "--files-root"])
        .arg(&files)
        .assert()
        .success()
        .stdout("hello");
    counter(&dir).arg("max").assert().success().stdout("1\n");
}

#[test]
fn test_fetch_unknown_file_fails() {
    let dir = TempDir::new().unwrap();
    counter(&dir)
        .args(["-q", "fetch", "404", "--files-root"])
        .arg(dir.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("File 404 is not available for download"));
}

#[test]
fn test_invalid_config_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let config = dir.path().join("bad.toml");
    std::fs::write(&config, "default_limit = 0\n").unwrap();

    counter(&dir)
        .arg("--config")
        .arg(&config)
        .arg("max")
        .assert()
        .failure()
        .stderr(predicate::str::contains("default_limit"));
}

#[test]
fn test_report_json_is_valid() {
    let dir = TempDir::new().unwrap();
    counter(&dir).args(["-q", "record", "1"]).assert().success();

    let output = counter(&dir)
        .args(["report", "--json"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let report: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(report["max_total_count"], 1);
    assert_eq!(report["rows"][0]["resource_id"], 1);
}
