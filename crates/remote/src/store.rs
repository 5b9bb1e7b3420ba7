// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! SQLite-backed attempt store.
//!
//! Holds the attempts the endpoint writes to, their per-task draft text and
//! the exam event log. Attempt creation and finalisation belong to the exam
//! service; this store only exposes them so the server can be seeded.

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};

use qr_core::{AttemptStatus, DraftSnapshot, EventType, TaskKey, TaskSnapshot};

use crate::error::{Error, Result};

pub const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS attempts (
    id TEXT PRIMARY KEY,
    user_id TEXT NOT NULL,
    status TEXT NOT NULL DEFAULT 'draft',
    active_task TEXT,
    elapsed_seconds INTEGER,
    revision INTEGER NOT NULL DEFAULT 0,
    last_update_ms INTEGER,
    created_at TEXT NOT NULL
);

-- One row per task; a write only lands if its revision is newer
CREATE TABLE IF NOT EXISTS attempt_tasks (
    attempt_id TEXT NOT NULL,
    task TEXT NOT NULL,
    content TEXT NOT NULL,
    word_count INTEGER NOT NULL,
    revision INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (attempt_id, task),
    FOREIGN KEY (attempt_id) REFERENCES attempts(id)
);

-- Exam telemetry, deduplicated on the client's offline id
CREATE TABLE IF NOT EXISTS exam_events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,
    occurred_at INTEGER NOT NULL,
    offline_id TEXT NOT NULL UNIQUE,
    received_at TEXT NOT NULL,
    FOREIGN KEY (attempt_id) REFERENCES attempts(id)
);

CREATE INDEX IF NOT EXISTS idx_attempts_user ON attempts(user_id);
CREATE INDEX IF NOT EXISTS idx_exam_events_attempt ON exam_events(attempt_id, occurred_at);
"#;

/// The parts of an attempt the endpoint checks before writing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    pub id: String,
    pub user_id: String,
    pub status: AttemptStatus,
    /// When a draft write last landed, in ms since epoch.
    pub last_update_ms: Option<u64>,
}

/// An exam event as stored.
#[cfg(test)]
#[derive(Debug, Clone, PartialEq)]
pub struct StoredEvent {
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub occurred_at: i64,
    pub offline_id: String,
}

/// A new exam event to record.
#[derive(Debug, Clone, Copy)]
pub struct NewEvent<'a> {
    pub attempt_id: &'a str,
    pub event_type: EventType,
    pub payload: &'a serde_json::Value,
    pub occurred_at: i64,
    pub offline_id: &'a str,
}

fn parse_db<T: std::str::FromStr>(
    value: &str,
    column: &str,
) -> std::result::Result<T, rusqlite::Error> {
    value.parse().map_err(|_| {
        rusqlite::Error::FromSqlConversionFailure(
            0,
            rusqlite::types::Type::Text,
            Box::new(Error::CorruptedData(format!(
                "invalid value '{value}' in column '{column}'"
            ))),
        )
    })
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

pub struct AttemptStore {
    conn: Connection,
}

impl AttemptStore {
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        conn.execute_batch(SCHEMA)?;
        Ok(AttemptStore { conn })
    }

    #[cfg(test)]
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(AttemptStore { conn })
    }

    /// Register an attempt. Existing attempts are left untouched.
    pub fn create_attempt(&self, id: &str, user_id: &str, now: DateTime<Utc>) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO attempts (id, user_id, status, created_at)
             VALUES (?1, ?2, 'draft', ?3)",
            params![id, user_id, now.to_rfc3339()],
        )?;
        Ok(inserted == 1)
    }

    /// Finalisation is driven by the exam service.
    #[cfg(test)]
    pub fn set_status(&self, id: &str, status: AttemptStatus) -> Result<bool> {
        let updated = self.conn.execute(
            "UPDATE attempts SET status = ?2 WHERE id = ?1",
            params![id, status.as_str()],
        )?;
        Ok(updated == 1)
    }

    pub fn attempt(&self, id: &str) -> Result<Option<AttemptRecord>> {
        let record = self
            .conn
            .query_row(
                "SELECT id, user_id, status, last_update_ms FROM attempts WHERE id = ?1",
                params![id],
                |row| {
                    let status: String = row.get(2)?;
                    let last_update: Option<i64> = row.get(3)?;
                    Ok(AttemptRecord {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        status: parse_db(&status, "status")?,
                        last_update_ms: last_update.map(to_u64),
                    })
                },
            )
            .optional()?;
        Ok(record)
    }

    /// Persist a draft snapshot, task by task.
    ///
    /// Tasks whose stored revision is already at or past the snapshot's are
    /// left alone, so replays and reordered saves are harmless. Returns the
    /// number of task rows written; the throttle window only restarts when
    /// something was written.
    pub fn write_draft(&mut self, snapshot: &DraftSnapshot, now_ms: u64) -> Result<usize> {
        let revision = to_i64(snapshot.revision);
        let updated_at = qr_core::clock::ms_to_utc(now_ms).to_rfc3339();
        let tx = self.conn.transaction()?;

        let mut written = 0;
        for (task, content) in &snapshot.tasks {
            written += tx.execute(
                "INSERT INTO attempt_tasks (attempt_id, task, content, word_count, revision, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                 ON CONFLICT(attempt_id, task) DO UPDATE SET
                    content = excluded.content,
                    word_count = excluded.word_count,
                    revision = excluded.revision,
                    updated_at = excluded.updated_at
                 WHERE excluded.revision > attempt_tasks.revision",
                params![
                    snapshot.attempt_id,
                    task.as_str(),
                    content.content,
                    content.word_count,
                    revision,
                    updated_at
                ],
            )?;
        }

        let meta = tx.execute(
            "UPDATE attempts SET
                active_task = COALESCE(?2, active_task),
                elapsed_seconds = COALESCE(?3, elapsed_seconds),
                revision = ?4
             WHERE id = ?1 AND revision < ?4",
            params![
                snapshot.attempt_id,
                snapshot.active_task.map(|t| t.as_str()),
                snapshot.elapsed_seconds.map(to_i64),
                revision
            ],
        )?;

        if written > 0 || meta > 0 {
            tx.execute(
                "UPDATE attempts SET last_update_ms = ?2 WHERE id = ?1",
                params![snapshot.attempt_id, to_i64(now_ms)],
            )?;
        }
        tx.commit()?;
        Ok(written)
    }

    /// The stored draft, or `None` if nothing has been saved yet.
    pub fn load_draft(&self, id: &str) -> Result<Option<DraftSnapshot>> {
        let header = self
            .conn
            .query_row(
                "SELECT active_task, elapsed_seconds, revision FROM attempts WHERE id = ?1",
                params![id],
                |row| {
                    let active: Option<String> = row.get(0)?;
                    let elapsed: Option<i64> = row.get(1)?;
                    let revision: i64 = row.get(2)?;
                    Ok((active, elapsed, revision))
                },
            )
            .optional()?;
        let Some((active, elapsed, revision)) = header else {
            return Ok(None);
        };

        let mut stmt = self.conn.prepare(
            "SELECT task, content, word_count FROM attempt_tasks WHERE attempt_id = ?1",
        )?;
        let tasks = stmt
            .query_map(params![id], |row| {
                let task: String = row.get(0)?;
                Ok((
                    parse_db::<TaskKey>(&task, "task")?,
                    TaskSnapshot {
                        content: row.get(1)?,
                        word_count: row.get(2)?,
                    },
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        if tasks.is_empty() && revision == 0 {
            return Ok(None);
        }

        let mut draft = DraftSnapshot::new(id).with_revision(to_u64(revision));
        draft.tasks = tasks.into_iter().collect();
        draft.active_task = active
            .map(|a| parse_db::<TaskKey>(&a, "active_task"))
            .transpose()?;
        draft.elapsed_seconds = elapsed.map(to_u64);
        Ok(Some(draft))
    }

    /// Record an exam event. Returns false if the offline id was seen before.
    pub fn record_event(&self, event: NewEvent<'_>, now: DateTime<Utc>) -> Result<bool> {
        let inserted = self.conn.execute(
            "INSERT OR IGNORE INTO exam_events
                (attempt_id, event_type, payload, occurred_at, offline_id, received_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                event.attempt_id,
                event.event_type.as_str(),
                serde_json::to_string(event.payload)?,
                event.occurred_at,
                event.offline_id,
                now.to_rfc3339()
            ],
        )?;
        Ok(inserted == 1)
    }

    /// Events for an attempt in occurrence order.
    #[cfg(test)]
    pub fn events(&self, attempt_id: &str) -> Result<Vec<StoredEvent>> {
        let mut stmt = self.conn.prepare(
            "SELECT event_type, payload, occurred_at, offline_id FROM exam_events
             WHERE attempt_id = ?1 ORDER BY occurred_at, id",
        )?;
        let rows = stmt
            .query_map(params![attempt_id], |row| {
                let event_type: String = row.get(0)?;
                let payload: String = row.get(1)?;
                Ok((event_type, payload, row.get(2)?, row.get(3)?))
            })?
            .collect::<std::result::Result<Vec<(String, String, i64, String)>, _>>()?;

        rows.into_iter()
            .map(|(event_type, payload, occurred_at, offline_id)| {
                Ok(StoredEvent {
                    event_type: parse_db(&event_type, "event_type")?,
                    payload: serde_json::from_str(&payload)?,
                    occurred_at,
                    offline_id,
                })
            })
            .collect()
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
