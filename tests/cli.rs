mod common;

use common::{run_ampliflow, write_valid_config};

#[test]
fn help_documents_exit_codes() {
    let output = run_ampliflow(&["--help"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--config"));
    assert!(stdout.contains("--bootstrap-environment"));
    assert!(stdout.contains("Exit codes"));
    assert!(stdout.contains("configuration error"));
}

#[test]
fn no_arguments_shows_usage() {
    let output = run_ampliflow(&[]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"));
}

#[test]
fn missing_config_file_exits_with_config_code() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = dir.path().join("absent.json");
    let output = run_ampliflow(&["--config", &config.display().to_string()]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("configuration error"));
}

#[test]
fn malformed_config_exits_with_config_code() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = dir.path().join("config.json");
    std::fs::write(&config, "{ not json").expect("write config");

    let output = run_ampliflow(&["--config", &config.display().to_string()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn missing_environment_manager_exits_with_bootstrap_code() {
    let dir = tempfile::tempdir().expect("create temp dir");
    let config = write_valid_config(dir.path());

    // Config resolves, then manager lookup fails before any track work.
    let output = run_ampliflow(&[
        "--config",
        &config.display().to_string(),
        "--conda",
        "ampliflow-no-such-manager",
        "--output",
        &dir.path().join("out").display().to_string(),
        "--cache-dir",
        &dir.path().join("cache").display().to_string(),
    ]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("bootstrap"));
}
