//! CLI integration tests

use std::process::Command;

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(
        stdout.contains("SDN DoS detector"),
        "Should show app description"
    );
    assert!(stdout.contains("status"), "Should show status command");
    assert!(
        stdout.contains("detections"),
        "Should show detections command"
    );
    assert!(stdout.contains("debug"), "Should show debug command");
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "--version"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("ddosctl"), "Should show binary name");
}

/// Test detections subcommand help
#[test]
fn test_detections_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "detections", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Detections help should succeed");
    assert!(stdout.contains("--limit"), "Should show limit option");
}

/// Test debug subcommand help
#[test]
fn test_debug_help() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "debug", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Debug help should succeed");
    assert!(stdout.contains("on"), "Should show on subcommand");
    assert!(stdout.contains("off"), "Should show off subcommand");
    assert!(stdout.contains("show"), "Should show show subcommand");
}

/// Test format option
#[test]
fn test_format_option() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
}

/// Test api-url option
#[test]
fn test_api_url_option() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "--help"])
        .output()
        .expect("Failed to execute command");

    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("DDOSCTL_API_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "invalid-command"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing debug subcommand error handling
#[test]
fn test_debug_requires_subcommand() {
    let output = Command::new("cargo")
        .args(["run", "-p", "ddos-cli", "--", "debug"])
        .output()
        .expect("Failed to execute command");

    assert!(!output.status.success(), "Bare debug command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Usage") || stderr.contains("error"),
        "Should show usage or error message"
    );
}
