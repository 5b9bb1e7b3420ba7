// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client configuration.
//!
//! Stored as TOML, by default in `<config dir>/quire/config.toml`. Every key
//! is optional:
//! - `server_url`: WebSocket endpoint of the save server
//! - `session_token`: presented to the server on connect
//! - `queue_path`: offline queue database (defaults to the local data dir)
//! - `request_timeout_ms`, `max_replay_attempts`, `background_sync_tag`

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::orchestrator::{OrchestratorSettings, DEFAULT_MAX_REPLAY_ATTEMPTS, DEFAULT_SYNC_TAG};

const APP_DIR_NAME: &str = "quire";
const CONFIG_FILE_NAME: &str = "config.toml";
const QUEUE_FILE_NAME: &str = "queue.db";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queue_path: Option<PathBuf>,
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Failed replays before a queued record is moved to dead letters.
    #[serde(default = "default_max_replay_attempts")]
    pub max_replay_attempts: u32,
    #[serde(default = "default_background_sync_tag")]
    pub background_sync_tag: String,
}

fn default_server_url() -> String {
    "ws://127.0.0.1:7890".to_string()
}

fn default_request_timeout_ms() -> u64 {
    5_000
}

fn default_max_replay_attempts() -> u32 {
    DEFAULT_MAX_REPLAY_ATTEMPTS
}

fn default_background_sync_tag() -> String {
    DEFAULT_SYNC_TAG.to_string()
}

impl Default for Config {
    fn default() -> Self {
        Config {
            server_url: default_server_url(),
            session_token: None,
            queue_path: None,
            request_timeout_ms: default_request_timeout_ms(),
            max_replay_attempts: default_max_replay_attempts(),
            background_sync_tag: default_background_sync_tag(),
        }
    }
}

impl Config {
    /// Load and validate a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file yields the defaults.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Config::default())
        }
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {}", e)))?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, content)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.server_url.starts_with("ws://") || self.server_url.starts_with("wss://")) {
            return Err(Error::Config(format!(
                "server_url must be a ws:// or wss:// URL, got '{}'",
                self.server_url
            )));
        }
        if self.request_timeout_ms == 0 {
            return Err(Error::Config("request_timeout_ms must be positive".into()));
        }
        if self.max_replay_attempts == 0 {
            return Err(Error::Config("max_replay_attempts must be at least 1".into()));
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    /// Resolved location of the offline queue database.
    pub fn queue_path(&self) -> PathBuf {
        match &self.queue_path {
            Some(path) => path.clone(),
            None => data_dir().join(QUEUE_FILE_NAME),
        }
    }

    pub fn orchestrator_settings(&self) -> OrchestratorSettings {
        OrchestratorSettings {
            max_replay_attempts: self.max_replay_attempts,
            background_sync_tag: self.background_sync_tag.clone(),
        }
    }
}

/// Default config file location.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
        .join(CONFIG_FILE_NAME)
}

fn data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR_NAME)
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
