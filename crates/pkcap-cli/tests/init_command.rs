//! Tests for the `pkcap init` command

use std::fs;
use std::path::PathBuf;
use std::process::Command;
use tempfile::tempdir;

fn pkcap_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_pkcap"))
}

#[test]
fn init_creates_config_file() {
    let dir = tempdir().unwrap();
    let expected_file = dir.path().join("capacity.toml");

    let output = Command::new(pkcap_binary())
        .args(["init", "capacity", "-o"])
        .arg(dir.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success(), "Command should succeed");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Created:"), "Should show 'Created:'");
    assert!(expected_file.exists(), "File should be created");

    let content = fs::read_to_string(&expected_file).unwrap();
    assert!(content.contains("[baseline]"));
    assert!(content.contains("[scenarios]"));
    assert!(content.contains("[capacity]"));
    assert!(content.contains("stability = \"warn\""));
}

#[test]
fn init_refuses_overwrite() {
    let dir = tempdir().unwrap();
    let existing_file = dir.path().join("pkcap.toml");
    fs::write(&existing_file, "# existing").unwrap();

    let output = Command::new(pkcap_binary())
        .args(["init", "-o"])
        .arg(dir.path())
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Command should fail");
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("already exists"));
    assert_eq!(fs::read_to_string(&existing_file).unwrap(), "# existing");
}

#[test]
fn init_force_overwrites() {
    let dir = tempdir().unwrap();
    let existing_file = dir.path().join("pkcap.toml");
    fs::write(&existing_file, "# existing").unwrap();

    let output = Command::new(pkcap_binary())
        .args(["init", "--force", "-o"])
        .arg(dir.path())
        .output()
        .expect("Failed to execute command");

    assert!(output.status.success());
    assert!(fs::read_to_string(&existing_file).unwrap().contains("[baseline]"));
}

#[test]
fn init_output_is_loadable() {
    let dir = tempdir().unwrap();

    let init = Command::new(pkcap_binary())
        .args(["init", "-o"])
        .arg(dir.path())
        .output()
        .expect("Failed to execute command");
    assert!(init.status.success());

    let report = Command::new(pkcap_binary())
        .args(["report", "-c"])
        .arg(dir.path().join("pkcap.toml"))
        .output()
        .expect("Failed to execute command");
    assert!(report.status.success(), "{}", String::from_utf8_lossy(&report.stderr));
}
