// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Black-box tests for the quire binary.
//!
//! The configured server is a closed local port, so every network call
//! fails fast and exercises the offline path.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;
use yare::parameterized;

struct Workspace {
    dir: TempDir,
}

impl Workspace {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let config = format!(
            "server_url = \"ws://127.0.0.1:9\"\n\
             session_token = \"tok-1\"\n\
             queue_path = {:?}\n\
             request_timeout_ms = 1000\n",
            dir.path().join("queue.db")
        );
        fs::write(dir.path().join("config.toml"), config).unwrap();
        Workspace { dir }
    }

    fn file(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    fn quire(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("quire").unwrap();
        cmd.arg("--config").arg(self.dir.path().join("config.toml"));
        cmd
    }
}

#[test]
fn empty_queue_reports_nothing_pending() {
    let ws = Workspace::new();
    ws.quire()
        .arg("pending")
        .assert()
        .success()
        .stdout("nothing pending\n");
}

#[test]
fn offline_save_is_queued_and_listed() {
    let ws = Workspace::new();
    let essay = ws.file("essay.txt", "Some people think exams are unfair.");

    ws.quire()
        .args(["save", "--attempt", "A1", "--task2"])
        .arg(&essay)
        .assert()
        .success()
        .stdout(predicate::str::starts_with("queued A1 rev "));

    ws.quire()
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 draft(s), 0 event(s) queued for A1"));
}

#[test]
fn repeated_offline_saves_keep_one_draft() {
    let ws = Workspace::new();
    let essay = ws.file("essay.txt", "First.");

    for _ in 0..3 {
        ws.quire()
            .args(["save", "--attempt", "A1", "--task2"])
            .arg(&essay)
            .assert()
            .success();
    }

    let output = ws
        .quire()
        .args(["pending", "--output", "json"])
        .output()
        .unwrap();
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["counts"]["drafts"], 1);
    assert_eq!(json["attempts"], serde_json::json!(["A1"]));
}

#[test]
fn offline_event_is_queued() {
    let ws = Workspace::new();
    ws.quire()
        .args(["event", "--attempt", "A1", "--kind", "blur"])
        .args(["--payload", r#"{"away":true}"#])
        .assert()
        .success();

    ws.quire()
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("0 draft(s), 1 event(s) queued"));
}

#[test]
fn load_falls_back_to_queued_draft() {
    let ws = Workspace::new();
    let essay = ws.file("essay.txt", "Written on the train.");
    ws.quire()
        .args(["save", "--attempt", "A1", "--task2"])
        .arg(&essay)
        .assert()
        .success();

    ws.quire()
        .args(["load", "--attempt", "A1"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Written on the train."));
}

#[test]
fn sync_against_unreachable_server_keeps_records() {
    let ws = Workspace::new();
    let essay = ws.file("essay.txt", "Still here.");
    ws.quire()
        .args(["save", "--attempt", "A1", "--task2"])
        .arg(&essay)
        .assert()
        .success();

    ws.quire()
        .arg("sync")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 attempt(s) failed and stay queued"));

    ws.quire()
        .arg("pending")
        .assert()
        .success()
        .stdout(predicate::str::contains("1 draft(s)"));
}

#[test]
fn discard_without_dead_letters() {
    let ws = Workspace::new();
    ws.quire()
        .args(["discard", "--attempt", "A1"])
        .assert()
        .success()
        .stdout("discarded 0 dead letter(s) for A1\n");
}

#[test]
fn save_without_tasks_fails() {
    let ws = Workspace::new();
    ws.quire()
        .args(["save", "--attempt", "A1"])
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains("nothing to save"));
}

#[test]
fn invalid_event_payload_fails() {
    let ws = Workspace::new();
    ws.quire()
        .args(["event", "--attempt", "A1", "--kind", "focus", "--payload", "{oops"])
        .assert()
        .failure()
        .code(1);
}

#[test]
fn bad_config_is_reported() {
    let ws = Workspace::new();
    fs::write(ws.dir.path().join("config.toml"), "server_url = \"http://x\"\n").unwrap();
    ws.quire()
        .arg("pending")
        .assert()
        .failure()
        .stderr(predicate::str::contains("config"));
}

#[test]
fn diff_marks_changed_sentences() {
    let ws = Workspace::new();
    let old = ws.file("old.txt", "Cities are growing. Cars are a problem.");
    let new = ws.file("new.txt", "Cities are growing. Buses are the answer.");

    ws.quire()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .success()
        .stdout(predicate::str::contains("  Cities are growing."))
        .stdout(predicate::str::contains("- Cars are a problem."))
        .stdout(predicate::str::contains("+ Buses are the answer."))
        .stdout(predicate::str::contains("1 unchanged, 1 added, 1 removed"));
}

#[test]
fn diff_without_previous_text() {
    let ws = Workspace::new();
    let old = ws.file("old.txt", "");
    let new = ws.file("new.txt", "Hello.");

    ws.quire()
        .arg("diff")
        .arg(&old)
        .arg(&new)
        .assert()
        .success()
        .stdout("no previous version to compare against\n");
}

#[parameterized(
    long_version = { "--version" },
    short_version = { "-V" },
)]
fn version_flag_outputs_version(flag: &str) {
    #[allow(deprecated)]
    Command::cargo_bin("quire")
        .unwrap()
        .arg(flag)
        .assert()
        .success()
        .stdout(predicate::str::contains("quire"))
        .stdout(predicate::str::is_match(r"[0-9]+\.[0-9]+\.[0-9]+").unwrap());
}
