//! Integration tests for the `airctl` binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! config handling and error exit codes -- all without a live service.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `airctl` binary with env isolation.
///
/// Clears all `AIRCTL_*` env vars and points config/data directories at
/// `home` so tests never touch the user's real configuration.
fn airctl_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("airctl");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env("XDG_DATA_HOME", home.join(".local/share"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("AIRCTL_PROFILE")
        .env_remove("AIRCTL_OUTPUT")
        .env_remove("AIRCTL_INSECURE")
        .env_remove("AIRCTL_TIMEOUT")
        .env_remove("AIRCTL_VARIANT")
        .env_remove("AIRCTL_API_BASE_URL")
        .env_remove("AIRCTL_EMAIL")
        .env_remove("AIRCTL_PASSWORD")
        .env_remove("AIRCTL_TOKEN");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = airctl_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path()).arg("--help").assert().success().stdout(
        predicate::str::contains("AC units")
            .and(predicate::str::contains("homes"))
            .and(predicate::str::contains("devices"))
            .and(predicate::str::contains("set"))
            .and(predicate::str::contains("power"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("airctl"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_use_binary_name() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["completions", "fish"])
        .assert()
        .success()
        .stdout(predicate::str::contains("complete -c airctl"));
}

// ── Argument errors ─────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = airctl_cmd(home.path()).arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("unrecognized") || text.contains("foobar"),
        "Expected error mentioning invalid subcommand:\n{text}"
    );
}

#[test]
fn test_invalid_mode_is_rejected_by_parser() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["set", "--mode", "turbo"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("turbo"));
}

#[test]
fn test_temperature_and_step_conflict() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["set", "--temperature", "22", "--step", "-1"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("cannot be used with"));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = airctl_cmd(home.path())
        .args(["--output", "invalid", "devices", "list"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_devices_list_without_config() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["devices", "list"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_unknown_profile_flag() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["--profile", "cabin", "homes", "list"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("cabin"));
}

#[test]
fn test_config_show_without_config() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default_profile"));
}

#[test]
fn test_config_set_then_show_and_profiles() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["config", "set", "api_base_url", "https://ac.example.com"])
        .assert()
        .success();
    airctl_cmd(home.path())
        .args(["config", "set", "email", "ana@example.com"])
        .assert()
        .success();

    airctl_cmd(home.path())
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://ac.example.com")
                .and(predicate::str::contains("ana@example.com")),
        );
    airctl_cmd(home.path())
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout(predicate::str::contains("default *"));
}

#[test]
fn test_config_set_rejects_unknown_key() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["config", "set", "colour", "red"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("unknown config key"));
}

#[test]
fn test_config_use_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["config", "use", "cabin"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("not found"));
}

// ── Service errors ──────────────────────────────────────────────────

#[test]
fn test_unreachable_service_exits_with_connection_code() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .env("AIRCTL_TOKEN", "stale-token")
        .args(["--api-url", "http://127.0.0.1:9", "--timeout", "5", "homes", "list"])
        .assert()
        .code(7);
}

// ── Subcommand help discovery ───────────────────────────────────────

#[test]
fn test_devices_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["devices", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("list")
                .and(predicate::str::contains("status"))
                .and(predicate::str::contains("toggle")),
        );
}

#[test]
fn test_power_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["power", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("on")
                .and(predicate::str::contains("off"))
                .and(predicate::str::contains("toggle")),
        );
}

#[test]
fn test_config_subcommands_exist() {
    let home = tempfile::tempdir().unwrap();
    airctl_cmd(home.path())
        .args(["config", "--help"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("init")
                .and(predicate::str::contains("show"))
                .and(predicate::str::contains("profiles"))
                .and(predicate::str::contains("set-password")),
        );
}
