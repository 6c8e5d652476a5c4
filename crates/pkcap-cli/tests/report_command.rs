//! Tests for the `pkcap report` command

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn pkcap_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pkcap"))
}

#[test]
fn text_report_to_stdout() {
    let output = Command::new(pkcap_binary())
        .arg("report")
        .env_remove("PKCAP_CONFIG")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Key Metrics at 70% Variance Reduction"));
    assert!(stdout.contains("29.99"));
    assert!(stdout.contains("N/A"), "Unstable wait time should be N/A");
}

#[test]
fn json_report_parses() {
    let output = Command::new(pkcap_binary())
        .args(["report", "-f", "json", "--clients", "0.5"])
        .env_remove("PKCAP_CONFIG")
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let value: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(value["scenarios"].as_array().unwrap().len(), 10);
    assert!(value["scenarios"][0]["wait_time"].is_number());
    assert!(value["warnings"].as_array().unwrap().is_empty());
}

#[test]
fn report_to_file() {
    let dir = tempdir().unwrap();
    let target = dir.path().join("report.txt");

    let output = Command::new(pkcap_binary())
        .args(["report", "-o"])
        .arg(&target)
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    let content = fs::read_to_string(&target).unwrap();
    assert!(content.contains("Input Parameters"));
}

#[test]
fn missing_reference_fails() {
    let output = Command::new(pkcap_binary())
        .args(["report", "--reference", "65"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Reference scenario 65% not found"), "stderr: {stderr}");
}

#[test]
fn unordered_scenarios_fail() {
    let output = Command::new(pkcap_binary())
        .args(["report", "--scenarios", "0,50,20", "--reference", "20"])
        .output()
        .expect("Failed to execute command");

    assert_eq!(output.status.code(), Some(1));
}
