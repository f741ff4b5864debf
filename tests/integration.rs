//! CLI tests for the `insight` binary.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[store]
path = "{}/data/insight.sqlite"

[server]
bind = "127.0.0.1:0"
"#,
        root.display()
    );

    let config_path = config_dir.join("insight.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_insight(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_insight"))
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .expect("failed to run insight binary");

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_store() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_insight(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Store initialized"));
    assert!(tmp.path().join("data/insight.sqlite").exists());
}

#[test]
fn test_init_idempotent() {
    let (_tmp, config_path) = setup_test_env();

    let (_, _, first) = run_insight(&config_path, &["init"]);
    assert!(first, "First init failed");

    let (_, _, second) = run_insight(&config_path, &["init"]);
    assert!(second, "Second init failed (not idempotent)");
}

#[test]
fn test_purge_on_fresh_store() {
    let (_tmp, config_path) = setup_test_env();

    run_insight(&config_path, &["init"]);
    let (stdout, stderr, success) = run_insight(&config_path, &["purge"]);
    assert!(success, "purge failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("Purged 0 expired records."));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");

    let (_, stderr, success) = run_insight(&missing, &["init"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_is_rejected() {
    let (_tmp, config_path) = setup_test_env();
    let mut content = fs::read_to_string(&config_path).unwrap();
    content.push_str("\n[retention]\nsaved_list_capacity = 0\n");
    fs::write(&config_path, content).unwrap();

    let (_, stderr, success) = run_insight(&config_path, &["init"]);
    assert!(!success);
    assert!(stderr.contains("saved_list_capacity"));
}
