//! Basic CLI tests for the bwt-perla command-line interface.

use assert_cmd::Command;
use predicates::prelude::*;

/// Test that the CLI binary exists and shows help.
#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.arg("--help");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Read water softener data"))
        .stdout(predicate::str::contains("detect"))
        .stdout(predicate::str::contains("poll"))
        .stdout(predicate::str::contains("sensors"));
}

/// Test that the CLI shows version information.
#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.arg("--version");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("bwt-perla"));
}

/// Test that providing no subcommand shows an error.
#[test]
fn test_no_subcommand_shows_error() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();

    // Clap's error code for a missing required subcommand
    cmd.assert().failure().code(2);
}

#[test]
fn test_sensors_for_silk() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.args(["sensors", "--model", "perla_silk"]);

    cmd.assert()
        .success()
        .stdout(predicate::str::contains("Sensors for perla_silk"))
        .stdout(predicate::str::contains("next_customer_service"))
        .stdout(predicate::str::contains("silk_register_47"))
        .stdout(predicate::str::contains("holiday_mode").not());
}

#[test]
fn test_sensors_for_duplex_as_json() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.args(["sensors", "--model", "perla_local_api", "--columns", "2", "--json"]);

    let output = cmd.assert().success().get_output().stdout.clone();
    let list: serde_json::Value = serde_json::from_slice(&output).unwrap();
    let keys: Vec<&str> = list
        .as_array()
        .unwrap()
        .iter()
        .map(|s| s["key"].as_str().unwrap())
        .collect();
    assert!(keys.contains(&"capacity_2"));
    assert!(keys.contains(&"holiday_mode"));
    assert_eq!(keys.len(), 23);
}

#[test]
fn test_unknown_model_rejected() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.args(["sensors", "--model", "perla_max"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("perla_max"));
}

#[test]
fn test_poll_without_host_fails() {
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.env_remove("BWT_PERLA_HOST").args(["poll", "--once"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("No host given"));
}

#[test]
fn test_local_api_without_code_fails_validation() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("perla.toml");
    std::fs::write(&path, "host = \"192.0.2.1\"\nmodel = \"perla_local_api\"\n").unwrap();

    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.env_remove("BWT_PERLA_CODE")
        .env_remove("BWT_PERLA_HOST")
        .env_remove("BWT_PERLA_MODEL")
        .arg("--config")
        .arg(&path)
        .args(["poll", "--once"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("requires a code"));
}

#[test]
fn test_missing_config_file_reported() {
    let dir = tempfile::tempdir().unwrap();
    let mut cmd = Command::cargo_bin("bwt-perla").unwrap();
    cmd.arg("--config")
        .arg(dir.path().join("missing.toml"))
        .args(["detect"]);

    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read config file"));
}
