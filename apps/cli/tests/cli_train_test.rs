//! Integration tests for the `voxtrain train` command.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const DIR_STAGE: &str = "out=\n\
prev=\n\
for arg in \"$@\"; do\n\
  [ \"$prev\" = \"--output\" ] && out=$arg\n\
  prev=$arg\n\
done\n\
mkdir -p \"$out\" && touch \"$out/chunk_0\"";

const FILE_STAGE: &str = "out=\n\
prev=\n\
for arg in \"$@\"; do\n\
  [ \"$prev\" = \"--output\" ] && out=$arg\n\
  prev=$arg\n\
done\n\
echo data > \"$out\"";

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    path
}

/// Workspace with stage doubles and a trainer double running `trainer_body`
/// from the experiment directory.
fn init_workspace(temp: &TempDir, trainer_body: &str) -> PathBuf {
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("datasets/alice")).unwrap();
    fs::write(root.join("datasets/alice/a.wav"), b"aaaa").unwrap();

    let scripts = temp.path().join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    let segment = write_script(&scripts, "segment.sh", DIR_STAGE);
    let pitch = write_script(&scripts, "pitch.sh", DIR_STAGE);
    let features = write_script(&scripts, "features.sh", DIR_STAGE);
    let filelist = write_script(&scripts, "filelist.sh", FILE_STAGE);
    let train_config = write_script(&scripts, "train_config.sh", FILE_STAGE);
    let trainer = write_script(&scripts, "trainer.sh", trainer_body);

    fs::write(
        root.join("voxtrain.toml"),
        format!(
            "[stages]\n\
             interpreter = \"/bin/sh\"\n\
             segment_script = \"{}\"\n\
             pitch_script = \"{}\"\n\
             features_script = \"{}\"\n\
             filelist_script = \"{}\"\n\
             train_config_script = \"{}\"\n\
             \n\
             [trainer]\n\
             interpreter = \"/bin/sh\"\n\
             train_script = \"{}\"\n\
             \n\
             [supervisor]\n\
             log_poll_secs = 1\n\
             checkpoint_poll_secs = 1\n\
             telemetry_interval_secs = 60\n",
            segment.display(),
            pitch.display(),
            features.display(),
            filelist.display(),
            train_config.display(),
            trainer.display()
        ),
    )
    .unwrap();
    root
}

fn voxtrain(root: &Path) -> Command {
    let mut cmd = Command::cargo_bin("voxtrain").unwrap();
    cmd.arg("--root").arg(root);
    cmd
}

#[test]
fn test_train_requires_epochs() {
    let temp = TempDir::new().unwrap();
    voxtrain(temp.path())
        .arg("train")
        .arg("alice")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--epochs"));
}

#[cfg(unix)]
#[test]
fn test_train_dry_run_writes_nothing_to_the_store() {
    let temp = TempDir::new().unwrap();
    let root = init_workspace(&temp, "echo '[epoch 1] loss_gen=2.5'");

    voxtrain(&root)
        .arg("train")
        .arg("alice")
        .arg("--epochs")
        .arg("2")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("completed"));

    assert!(!root.join("tracking").exists(), "dry-run must not touch the run store");
}

#[cfg(unix)]
#[test]
fn test_train_json_outcome() {
    let temp = TempDir::new().unwrap();
    let root = init_workspace(
        &temp,
        "echo '[epoch 1] loss_gen=2.5, loss_disc=1.4'\n\
         touch checkpoints/G_1.pth",
    );

    let output = voxtrain(&root)
        .arg("--log-level")
        .arg("error")
        .arg("train")
        .arg("alice")
        .arg("--epochs")
        .arg("2")
        .arg("--batch-size")
        .arg("4")
        .arg("--json")
        .assert()
        .success()
        .get_output()
        .clone();

    let outcome: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(outcome["run"]["status"], "completed");
    assert_eq!(outcome["run"]["run_name"], "alice-2epochs-bs4");
    assert_eq!(outcome["run"]["checkpoints"], 1);
    assert_eq!(outcome["pipeline"]["skipped"], false);
    assert_eq!(outcome["pipeline"]["stages_run"].as_array().unwrap().len(), 5);

    // The run landed in the file store under the default group.
    let group_dir = root.join("tracking/voice-training");
    assert_eq!(fs::read_dir(&group_dir).unwrap().count(), 1);
}

#[cfg(unix)]
#[test]
fn test_train_failure_exits_nonzero_with_tail() {
    let temp = TempDir::new().unwrap();
    let root = init_workspace(
        &temp,
        "echo 'Traceback: boom' 1>&2\n\
         exit 7",
    );

    voxtrain(&root)
        .arg("train")
        .arg("alice")
        .arg("--epochs")
        .arg("2")
        .assert()
        .failure()
        .code(1)
        .stdout(
            predicate::str::contains("failed")
                .and(predicate::str::contains("Last trainer output:"))
                .and(predicate::str::contains("Traceback: boom")),
        );

    // Tail persisted next to the training log.
    let tail = root.join("experiments/alice/logs/failure_tail.log");
    assert!(fs::read_to_string(tail).unwrap().contains("Traceback: boom"));
}
