//! Drives the `vectcode` binary against a throwaway config.
//!
//! Embedding is disabled, so these cover the commands that only touch the
//! metadata tracker plus the failure paths of `index` and `search`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn setup() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();

    let config = format!(
        r#"[db]
path = "{root}/data/metadata.db"

[vector_store]
path = "{root}/data/vectors.db"

[embedding]
provider = "disabled"
"#,
        root = root.display()
    );
    let config_path = root.join("vectcode.toml");
    fs::write(&config_path, config).unwrap();

    let project = root.join("billing");
    fs::create_dir_all(&project).unwrap();
    fs::write(
        project.join("main.go"),
        "package main\n\nfunc Charge() error { return nil }\n",
    )
    .unwrap();

    (tmp, config_path)
}

fn run(config: &Path, args: &[&str]) -> (String, String, bool) {
    let output = Command::new(env!("CARGO_BIN_EXE_vectcode"))
        .arg("--config")
        .arg(config)
        .args(args)
        .env("RUST_LOG", "warn")
        .output()
        .expect("failed to run vectcode");

    (
        String::from_utf8_lossy(&output.stdout).to_string(),
        String::from_utf8_lossy(&output.stderr).to_string(),
        output.status.success(),
    )
}

#[test]
fn test_init_creates_databases() {
    let (tmp, config) = setup();

    let (stdout, stderr, ok) = run(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data/metadata.db").exists());
    assert!(tmp.path().join("data/vectors.db").exists());

    let (_, stderr, ok) = run(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_list_on_empty_tracker() {
    let (_tmp, config) = setup();
    let (stdout, _, ok) = run(&config, &["list"]);
    assert!(ok);
    assert!(stdout.contains("No projects indexed."));
}

#[test]
fn test_group_lifecycle() {
    let (_tmp, config) = setup();

    let (stdout, stderr, ok) = run(
        &config,
        &["group", "create", "--name", "payments", "--description", "money"],
    );
    assert!(ok, "group create failed: {}", stderr);
    assert!(stdout.contains("Created group payments"));

    let (_, stderr, ok) = run(&config, &["group", "create", "--name", "payments"]);
    assert!(!ok);
    assert!(stderr.contains("payments"));

    let (stdout, _, ok) = run(&config, &["group", "list"]);
    assert!(ok);
    assert!(stdout.contains("payments"));
    assert!(stdout.contains("money"));

    let (_, _, ok) = run(&config, &["group", "delete", "--name", "payments"]);
    assert!(ok);

    let (stdout, _, ok) = run(&config, &["group", "list"]);
    assert!(ok);
    assert!(stdout.contains("No groups."));

    let (_, _, ok) = run(&config, &["group", "delete", "--name", "payments"]);
    assert!(!ok);
}

#[test]
fn test_index_fails_without_embedder() {
    let (tmp, config) = setup();
    let project = tmp.path().join("billing");

    let (_, stderr, ok) = run(
        &config,
        &["index", "--path", project.to_str().unwrap(), "--name", "billing"],
    );
    assert!(!ok);
    assert!(stderr.contains("billing"));

    let (stdout, _, ok) = run(&config, &["list"]);
    assert!(ok);
    assert!(stdout.contains("No projects indexed."));
}

#[test]
fn test_unknown_project_info_fails() {
    let (_tmp, config) = setup();
    let (_, stderr, ok) = run(&config, &["info", "--name", "ghost"]);
    assert!(!ok);
    assert!(stderr.contains("ghost"));
}

#[test]
fn test_search_scope_flags_conflict() {
    let (_tmp, config) = setup();
    let (_, _, ok) = run(
        &config,
        &["search", "--query", "charge", "--project", "a", "--group", "b"],
    );
    assert!(!ok);
}

#[test]
fn test_search_unknown_group_fails() {
    let (_tmp, config) = setup();
    let (_, stderr, ok) = run(&config, &["search", "--query", "charge", "--group", "nope"]);
    assert!(!ok);
    assert!(stderr.contains("nope"));
}
