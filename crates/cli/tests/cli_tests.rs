//! CLI integration tests

use std::process::{Command, Output};

fn sensorctl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sensorctl"))
        .args(args)
        .env_remove("SENSOR_HUB_URL")
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = sensorctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Sensor Hub"), "Should show app name");
    for command in ["send", "history", "abnormal", "count", "export", "watch", "status"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = sensorctl(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("sensorctl"), "Should show binary name");
}

#[test]
fn test_send_help() {
    let output = sensorctl(&["send", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Send help should succeed");
    assert!(stdout.contains("--temperature"));
    assert!(stdout.contains("--humidity"));
    assert!(stdout.contains("--soil-moisture"));
}

#[test]
fn test_history_help() {
    let output = sensorctl(&["history", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "History help should succeed");
    assert!(stdout.contains("--limit"), "Should show limit option");
    assert!(stdout.contains("--abnormal-only"), "Should show abnormal-only option");
}

#[test]
fn test_export_help() {
    let output = sensorctl(&["export", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Export help should succeed");
    assert!(stdout.contains("--output"), "Should show output option");
}

/// Test format and api-url options
#[test]
fn test_global_options() {
    let output = sensorctl(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(stdout.contains("--format"), "Should show format option");
    assert!(stdout.contains("table"), "Should show table format");
    assert!(stdout.contains("json"), "Should show json format");
    assert!(stdout.contains("--api-url"), "Should show api-url option");
    assert!(stdout.contains("SENSOR_HUB_URL"), "Should show env var");
}

/// Test invalid command error handling
#[test]
fn test_invalid_command() {
    let output = sensorctl(&["invalid-command"]);

    assert!(!output.status.success(), "Invalid command should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("error") || stderr.contains("invalid"),
        "Should show error message"
    );
}

/// Test missing required argument error handling
#[test]
fn test_missing_argument() {
    let output = sensorctl(&["send", "--temperature", "25"]);

    assert!(!output.status.success(), "Missing argument should fail");

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("required") || stderr.contains("error"),
        "Should show error about missing argument"
    );
}

#[test]
fn test_count_against_mock_hub() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/abnormal-count")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(r#"{"count":3}"#)
        .create();

    let output = sensorctl(&["--api-url", &server.url(), "--format", "json", "count"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    mock.assert();
    assert!(output.status.success(), "Count should succeed");
    let json: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(json["count"], 3);
}

#[test]
fn test_unreachable_hub_fails() {
    let output = sensorctl(&["--api-url", "http://127.0.0.1:1", "count"]);

    assert!(!output.status.success(), "Unreachable hub should fail");
}
