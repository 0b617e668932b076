//! Golden-path flow: prepare, train, inspect cache and runs.

#![cfg(unix)]

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

const TRAINER: &str = "echo '[epoch 1] loss_gen=2.5, loss_disc=1.45, lr=0.0001'\n\
touch checkpoints/G_1.pth\n\
echo '[epoch 2] loss_gen=2.2, loss_disc=1.40, lr=0.0001'";

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    path
}

fn init_workspace(temp: &TempDir) -> PathBuf {
    let root = temp.path().join("root");
    fs::create_dir_all(root.join("datasets/mika")).unwrap();
    fs::write(root.join("datasets/mika/take1.wav"), b"aaaa").unwrap();
    fs::write(root.join("datasets/mika/take2.flac"), b"bbbb").unwrap();

    let scripts = temp.path().join("scripts");
    fs::create_dir_all(&scripts).unwrap();
    let segment = write_script(&scripts, "segment.sh", DIR_STAGE);
    let pitch = write_script(&scripts, "pitch.sh", DIR_STAGE);
    let features = write_script(&scripts, "features.sh", DIR_STAGE);
    let filelist = write_script(&scripts, "filelist.sh", FILE_STAGE);
    let train_config = write_script(&scripts, "train_config.sh", FILE_STAGE);
    let trainer = write_script(&scripts, "trainer.sh", TRAINER);

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
             checkpoint_poll_secs = 1\n",
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
fn test_golden_path() {
    let temp = TempDir::new().unwrap();
    let root = init_workspace(&temp);

    // Prepare from scratch: all stages run.
    voxtrain(&root)
        .arg("prepare")
        .arg("mika")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ran 5 stages over 2 files"));

    // The cache is now valid.
    voxtrain(&root)
        .arg("cache")
        .arg("mika")
        .arg("status")
        .assert()
        .success()
        .stdout(predicate::str::contains("ready (stages will be skipped)"));

    // Training skips preprocessing and completes.
    voxtrain(&root)
        .arg("train")
        .arg("mika")
        .arg("--epochs")
        .arg("2")
        .arg("--batch-size")
        .arg("4")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("cached")
                .and(predicate::str::contains("mika-2epochs-bs4"))
                .and(predicate::str::contains("completed"))
                .and(predicate::str::contains("Checkpoints: 1")),
        );

    // Trainer output was captured to the training log.
    let log = fs::read_to_string(root.join("experiments/mika/logs/training.log")).unwrap();
    assert!(log.contains("[epoch 2] loss_gen=2.2"));

    // Metrics landed in the file store as JSONL.
    let group = root.join("tracking/voice-training");
    let run_dir = fs::read_dir(&group).unwrap().next().unwrap().unwrap().path();
    let loss = fs::read_to_string(run_dir.join("metrics/loss_gen")).unwrap();
    assert_eq!(loss.lines().count(), 2);
    let meta = fs::read_to_string(run_dir.join("meta.json")).unwrap();
    assert!(meta.contains("\"completed\""));

    // The checkpoint was copied into the run's artifacts.
    assert!(run_dir.join("artifacts/G_1.pth").is_file());

    // And the run shows up in the listing, filtered by experiment.
    voxtrain(&root)
        .arg("runs")
        .arg("mika")
        .assert()
        .success()
        .stdout(predicate::str::contains("mika-2epochs-bs4").and(predicate::str::contains("completed")));

    // A different experiment filter hides it.
    voxtrain(&root)
        .arg("runs")
        .arg("bob")
        .assert()
        .success()
        .stdout(predicate::str::contains("No runs recorded"));
}
