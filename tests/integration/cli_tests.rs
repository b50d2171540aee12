//! Integration tests for the CLI binary.
//!
//! Verifies that the `aocr` binary responds to basic flags and manages a
//! registry rooted in a temporary directory. No test here reaches the
//! network: no session token is ever configured.
//!
//! This test is registered as a [[test]] in the aoc-runner-cli crate
//! so that CARGO_BIN_EXE_aocr is available.

use std::path::Path;
use std::process::{Command, Output};

/// Get a Command pointing to the `aocr` binary.
fn aocr_binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_aocr"))
}

/// Run `aocr` with its state rooted at `root` and no session override.
fn aocr_in(root: &Path, args: &[&str]) -> Output {
    aocr_binary()
        .args(args)
        .env("AOC_RUNNER_DIR", root)
        .env("AOC_RUNNER_PROJECT_HOME", root)
        .env_remove("AOC_RUNNER_SESSION")
        .env_remove("AOC_RUNNER_AUTH_DIR")
        .env_remove("AOC_RUNNER_USERS_DIR")
        .env_remove("AOC_RUNNER_CACHE_DIR")
        .output()
        .expect("failed to execute aocr")
}

fn seed_tokens(root: &Path) {
    let auth = root.join(".auth");
    std::fs::create_dir_all(&auth).unwrap();
    std::fs::write(
        auth.join("tokens.json"),
        r#"{
  "default_user": "github.1",
  "users": [
    {"user_name": "alice", "aoc_id": 1, "login_source": "github",
     "last_updated": "2024-01-16T10:12:22.760942", "token": "aaaa1111"},
    {"user_name": "bob", "aoc_id": 2, "login_source": "google",
     "last_updated": "2024-01-16T10:12:22.855008", "token": "bbbb2222"}
  ]
}"#,
    )
    .unwrap();
}

#[test]
fn cli_responds_to_help() {
    let output = aocr_binary()
        .arg("--help")
        .output()
        .expect("failed to execute aocr --help");

    assert!(
        output.status.success(),
        "aocr --help should exit with success, stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("aocr") || stdout.contains("Usage"),
        "aocr --help output should contain usage information, got: {stdout}"
    );
}

#[test]
fn cli_responds_to_version() {
    let output = aocr_binary()
        .arg("--version")
        .output()
        .expect("failed to execute aocr --version");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(
        stdout.contains("0.1") || stdout.contains("aocr"),
        "aocr --version should contain version info, got: {stdout}"
    );
}

#[test]
fn cli_exits_with_error_on_unknown_flag() {
    let output = aocr_binary()
        .arg("--nonexistent-flag")
        .output()
        .expect("failed to execute aocr");

    assert!(
        !output.status.success(),
        "aocr with unknown flag should exit with error"
    );
}

#[test]
fn cli_list_on_fresh_root_creates_empty_registry() {
    let dir = tempfile::tempdir().unwrap();
    let output = aocr_in(dir.path(), &["list"]);

    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(String::from_utf8_lossy(&output.stdout).contains("No users found"));
    assert!(dir.path().join(".auth").join("tokens.json").exists());
}

#[test]
fn cli_list_masks_tokens_and_marks_default() {
    let dir = tempfile::tempdir().unwrap();
    seed_tokens(dir.path());

    let output = aocr_in(dir.path(), &["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("* github.1"), "got: {stdout}");
    assert!(stdout.contains("google.2"));
    assert!(stdout.contains("...1111"));
    assert!(!stdout.contains("aaaa1111"));
}

#[test]
fn cli_default_and_remove() {
    let dir = tempfile::tempdir().unwrap();
    seed_tokens(dir.path());

    let output = aocr_in(dir.path(), &["default", "--key", "google.2"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("google.2"));

    let output = aocr_in(dir.path(), &["remove", "google.2"]);
    assert!(output.status.success());

    let output = aocr_in(dir.path(), &["show"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("github.1"));
}

#[test]
fn cli_default_unknown_key_fails() {
    let dir = tempfile::tempdir().unwrap();
    seed_tokens(dir.path());

    let output = aocr_in(dir.path(), &["default", "--key", "reddit.9"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("error:"));
}

#[test]
fn cli_default_requires_a_target() {
    let dir = tempfile::tempdir().unwrap();
    let output = aocr_in(dir.path(), &["default"]);
    assert!(!output.status.success());
}

#[test]
fn cli_update_then_show_reveal() {
    let dir = tempfile::tempdir().unwrap();
    seed_tokens(dir.path());

    let output = aocr_in(dir.path(), &["update", "github.1", "cccc3333"]);
    assert!(output.status.success());

    let output = aocr_in(dir.path(), &["show", "github.1", "--reveal"]);
    assert!(output.status.success());
    assert!(String::from_utf8_lossy(&output.stdout).contains("cccc3333"));
}
