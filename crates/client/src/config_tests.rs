// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use super::*;
use tempfile::TempDir;
use yare::parameterized;

#[test]
fn test_defaults() {
    let config = Config::default();
    assert_eq!(config.request_timeout(), Duration::from_secs(5));
    assert_eq!(config.max_replay_attempts, 8);
    assert_eq!(config.background_sync_tag, "quire-draft-sync");
    assert!(config.session_token.is_none());
    assert!(config.queue_path().ends_with("quire/queue.db"));
    config.validate().unwrap();
}

#[test]
fn test_empty_file_uses_defaults() {
    let config: Config = toml::from_str("").unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_partial_file() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(
        &path,
        r#"
server_url = "wss://exam.example.com/sync"
session_token = "tok-1"
queue_path = "/tmp/q.db"
max_replay_attempts = 3
"#,
    )
    .unwrap();

    let config = Config::load(&path).unwrap();
    assert_eq!(config.server_url, "wss://exam.example.com/sync");
    assert_eq!(config.session_token.as_deref(), Some("tok-1"));
    assert_eq!(config.queue_path(), PathBuf::from("/tmp/q.db"));
    assert_eq!(config.request_timeout_ms, 5_000);
    assert_eq!(config.orchestrator_settings().max_replay_attempts, 3);
}

#[test]
fn test_save_and_reload() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("config.toml");
    let config = Config {
        session_token: Some("secret".into()),
        request_timeout_ms: 250,
        ..Config::default()
    };

    config.save(&path).unwrap();
    assert_eq!(Config::load(&path).unwrap(), config);
}

#[test]
fn test_load_or_default_missing_file() {
    let temp = TempDir::new().unwrap();
    let config = Config::load_or_default(&temp.path().join("absent.toml")).unwrap();
    assert_eq!(config, Config::default());
}

#[test]
fn test_load_missing_file_is_error() {
    let temp = TempDir::new().unwrap();
    let err = Config::load(&temp.path().join("absent.toml")).unwrap_err();
    assert!(matches!(err, Error::Config(_)));
}

#[parameterized(
    http_url = { "server_url = \"http://localhost\"" },
    zero_timeout = { "request_timeout_ms = 0" },
    zero_attempts = { "max_replay_attempts = 0" },
    bad_toml = { "server_url = " },
)]
fn test_invalid_config_rejected(content: &str) {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("config.toml");
    fs::write(&path, content).unwrap();
    assert!(matches!(Config::load(&path), Err(Error::Config(_))));
}
