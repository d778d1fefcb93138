//! CLI integration tests

use std::process::Command;

fn run(args: &[&str]) -> std::process::Output {
    Command::new("cargo")
        .args(["run", "-q", "-p", "mdok-cli", "--"])
        .args(args)
        .output()
        .expect("Failed to execute command")
}

/// Test that the CLI shows help
#[test]
fn test_cli_help() {
    let output = run(&["--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI help should succeed");
    assert!(stdout.contains("Monitor Docker container groups"), "Should show about text");
    for command in ["configs", "create", "delete", "sessions", "summary", "export"] {
        assert!(stdout.contains(command), "Should show {} command", command);
    }
}

/// Test that the CLI shows version
#[test]
fn test_cli_version() {
    let output = run(&["--version"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "CLI version should succeed");
    assert!(stdout.contains("mdok"), "Should show binary name");
}

/// Test summary subcommand help lists the filters
#[test]
fn test_summary_help() {
    let output = run(&["summary", "--help"]);
    let stdout = String::from_utf8_lossy(&output.stdout);

    assert!(output.status.success(), "Summary help should succeed");
    assert!(stdout.contains("--session"));
    assert!(stdout.contains("--last"));
    assert!(stdout.contains("--from"));
    assert!(stdout.contains("--all"));
}

/// Test that create and configs work against a temporary data directory
#[test]
fn test_create_then_list_configs() {
    let home = tempfile::TempDir::new().unwrap();
    let home_arg = home.path().to_str().unwrap();

    let created = run(&["--home", home_arg, "create", "stack", "web", "db", "-i", "10"]);
    assert!(created.status.success(), "create should succeed");

    let listed = run(&["--home", home_arg, "--format", "json", "configs"]);
    let stdout = String::from_utf8_lossy(&listed.stdout);
    assert!(listed.status.success());
    assert!(stdout.contains("\"name\": \"stack\""));
    assert!(stdout.contains("\"interval\": 10"));
}

/// Test that reporting on an unknown config fails
#[test]
fn test_summary_unknown_config_fails() {
    let home = tempfile::TempDir::new().unwrap();
    let output = run(&["--home", home.path().to_str().unwrap(), "summary", "missing"]);

    assert!(!output.status.success());
}
