//! CLI integration tests
//!
//! These tests verify the command-line interface behavior, including:
//! - Command parsing and validation
//! - Output modes
//! - Error handling
//! - Exit codes

use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

fn buildsmith_bin() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_buildsmith"))
}

/// Creates a repository with a single Go package in `lib`.
fn create_go_repo(dir: &TempDir) -> PathBuf {
    let repo_path = dir.path().to_path_buf();
    fs::write(
        repo_path.join("WORKSPACE"),
        "workspace(name = \"example\")\n",
    )
    .expect("Failed to write WORKSPACE");
    fs::create_dir_all(repo_path.join("lib")).expect("Failed to create lib directory");
    fs::write(repo_path.join("lib/lib.go"), "package lib\n").expect("Failed to write lib.go");
    repo_path
}

fn run_update(repo: &Path, extra: &[&str]) -> Output {
    Command::new(buildsmith_bin())
        .arg("update")
        .arg("--repo-root")
        .arg(repo)
        .arg("--go-prefix")
        .arg("example.com/repo")
        .args(extra)
        .arg(repo)
        .env_remove("RUST_LOG")
        .output()
        .expect("Failed to execute buildsmith")
}

#[test]
fn test_cli_help() {
    let output = Command::new(buildsmith_bin())
        .arg("--help")
        .output()
        .expect("Failed to execute buildsmith");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("update"));
    assert!(stdout.contains("fix"));
}

#[test]
fn test_cli_version() {
    let output = Command::new(buildsmith_bin())
        .arg("--version")
        .output()
        .expect("Failed to execute buildsmith");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn test_cli_print_mode() {
    let temp = TempDir::new().unwrap();
    let repo = create_go_repo(&temp);

    let output = run_update(&repo, &["--mode", "print"]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("go_library("));
    assert!(stdout.contains("importpath = \"example.com/repo/lib\""));
    assert!(!repo.join("lib/BUILD.bazel").exists());
}

#[test]
fn test_cli_fix_mode_writes_files() {
    let temp = TempDir::new().unwrap();
    let repo = create_go_repo(&temp);

    let output = run_update(&repo, &[]);

    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));
    assert!(output.stdout.is_empty());
    let build = fs::read_to_string(repo.join("lib/BUILD.bazel")).unwrap();
    assert!(build.contains("name = \"go_default_library\""));
}

#[test]
fn test_cli_diff_mode_after_fix_is_empty() {
    let temp = TempDir::new().unwrap();
    let repo = create_go_repo(&temp);

    assert!(run_update(&repo, &[]).status.success());
    let output = run_update(&repo, &["--mode", "diff"]);

    assert!(output.status.success());
    assert!(output.stdout.is_empty());
}

#[test]
fn test_cli_invalid_mode() {
    let temp = TempDir::new().unwrap();
    let repo = create_go_repo(&temp);

    let output = run_update(&repo, &["--mode", "overwrite"]);

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("unrecognized emit mode"), "stderr: {}", stderr);
    assert!(!repo.join("lib/BUILD.bazel").exists());
}

#[test]
fn test_cli_dir_outside_repo_root() {
    let temp = TempDir::new().unwrap();
    let repo = create_go_repo(&temp);
    let outside = TempDir::new().unwrap();

    let output = Command::new(buildsmith_bin())
        .arg("update")
        .arg("--repo-root")
        .arg(&repo)
        .arg(outside.path())
        .output()
        .expect("Failed to execute buildsmith");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("is not a subdirectory of repo root"), "stderr: {}", stderr);
}

#[test]
fn test_cli_missing_subcommand() {
    let output = Command::new(buildsmith_bin())
        .output()
        .expect("Failed to execute buildsmith");

    assert!(!output.status.success());
}
