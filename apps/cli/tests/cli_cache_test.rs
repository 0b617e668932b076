//! Integration tests for the `voxtrain cache` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

fn voxtrain(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("voxtrain").unwrap();
    cmd.arg("--root").arg(root);
    cmd
}

#[test]
fn test_cache_status_without_dataset() {
    let temp = TempDir::new().unwrap();

    voxtrain(temp.path())
        .arg("cache")
        .arg("alice")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("missing").and(predicate::str::contains("none")));
}

#[test]
fn test_cache_status_pending_before_any_run() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("datasets/alice")).unwrap();
    fs::write(root.join("datasets/alice/a.wav"), b"aaaa").unwrap();

    voxtrain(&root)
        .arg("cache")
        .arg("alice")
        .arg("status")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Dataset files: 1")
                .and(predicate::str::contains("pending (stages will run)")),
        );
}

#[test]
fn test_cache_status_treats_corrupt_record_as_absent() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("datasets/alice")).unwrap();
    fs::write(root.join("datasets/alice/a.wav"), b"aaaa").unwrap();
    fs::create_dir_all(root.join("experiments/alice")).unwrap();
    fs::write(root.join("experiments/alice/preprocess_cache.json"), b"{not json").unwrap();

    voxtrain(&root)
        .arg("cache")
        .arg("alice")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("none").and(predicate::str::contains("pending")));
}

#[test]
fn test_cache_clear_reports_whether_a_record_existed() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("experiments/alice")).unwrap();
    let record = root.join("experiments/alice/preprocess_cache.json");
    fs::write(&record, b"{}").unwrap();

    voxtrain(&root)
        .arg("cache")
        .arg("alice")
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("Cleared cache record"));
    assert!(!record.exists());

    voxtrain(&root)
        .arg("cache")
        .arg("alice")
        .arg("clear")
        .assert()
        .success()
        .stdout(predicate::str::contains("No cache record"));
}
