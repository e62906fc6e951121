//! Concurrency tests for hydrate.
//!
//! These tests verify that multiple processes can safely append to and
//! read from the same journal (file locking).

use assert_cmd::Command;
use predicates::prelude::*;
use std::path::{Path, PathBuf};
use std::thread;
use tempfile::TempDir;

fn cli(dir: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("hydrate"));
    cmd.env("XDG_CONFIG_HOME", dir.join("config"))
        .env_remove("RUST_LOG")
        .arg("--data-dir")
        .arg(dir);
    cmd
}

fn setup_test_dir() -> TempDir {
    tempfile::tempdir().expect("Failed to create temp dir")
}

#[test]
fn test_parallel_logging_keeps_every_entry() {
    let temp_dir = setup_test_dir();
    let data_dir: PathBuf = temp_dir.path().to_path_buf();

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let dir = data_dir.clone();
            thread::spawn(move || {
                cli(&dir).args(["log", "100"]).assert().success();
            })
        })
        .collect();

    for handle in handles {
        handle.join().expect("logging thread panicked");
    }

    let journal = data_dir.join("water_log.jsonl");
    let content = std::fs::read_to_string(&journal).expect("Failed to read journal");
    assert_eq!(content.lines().count(), 8, "Expected 8 journal lines");
    for line in content.lines() {
        let value: serde_json::Value = serde_json::from_str(line).expect("torn journal line");
        assert_eq!(value["entry"]["amount"], 100);
    }

    cli(&data_dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total consumed:   0.8L"));
}

#[test]
fn test_reads_during_writes() {
    let temp_dir = setup_test_dir();
    let data_dir: PathBuf = temp_dir.path().to_path_buf();

    cli(&data_dir).args(["log", "250"]).assert().success();

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for _ in 0..4 {
            cli(&writer_dir).args(["log", "250"]).assert().success();
        }
    });

    for _ in 0..4 {
        cli(&data_dir).arg("today").assert().success();
    }
    writer.join().expect("writer thread panicked");

    cli(&data_dir)
        .arg("today")
        .assert()
        .success()
        .stdout(predicate::str::contains("1250ml / 2000ml"));
}

#[test]
fn test_compact_during_logging_loses_nothing() {
    let temp_dir = setup_test_dir();
    let data_dir: PathBuf = temp_dir.path().to_path_buf();

    cli(&data_dir).args(["log", "100"]).assert().success();

    let writer_dir = data_dir.clone();
    let writer = thread::spawn(move || {
        for _ in 0..6 {
            cli(&writer_dir).args(["log", "100"]).assert().success();
        }
    });

    for _ in 0..6 {
        cli(&data_dir).arg("compact").assert().success();
    }
    writer.join().expect("writer thread panicked");

    let journal = data_dir.join("water_log.jsonl");
    let content = std::fs::read_to_string(&journal).expect("Failed to read journal");
    assert_eq!(content.lines().count(), 7, "Expected 7 journal lines");

    cli(&data_dir)
        .arg("stats")
        .assert()
        .success()
        .stdout(predicate::str::contains("Total consumed:   0.7L"));
}
