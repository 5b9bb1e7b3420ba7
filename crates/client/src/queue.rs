// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Durable local queue for drafts and exam events awaiting delivery.
//!
//! Backed by SQLite so a queued edit survives crashes and restarts. Drafts
//! coalesce to one row per attempt (only the latest state matters); events
//! are an append-only log replayed in emission order.
//!
//! Only the sync orchestrator removes records, through
//! [`QueueStore::take_all_for_attempt`], which reads and deletes in one
//! transaction.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::Serialize;

use qr_core::{DraftSnapshot, EventType, QueuedDraftRecord, QueuedEventRecord};

/// SQL schema for the offline queue.
pub const SCHEMA: &str = r#"
-- Latest queued draft per attempt
CREATE TABLE IF NOT EXISTS drafts (
    attempt_id TEXT PRIMARY KEY,
    revision INTEGER NOT NULL,
    snapshot TEXT NOT NULL,       -- JSON DraftSnapshot
    queued_at TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0
);

-- Exam telemetry log
CREATE TABLE IF NOT EXISTS events (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    event_type TEXT NOT NULL,
    payload TEXT NOT NULL,        -- JSON
    occurred_at INTEGER NOT NULL,
    offline_id TEXT NOT NULL,
    attempts INTEGER NOT NULL DEFAULT 0
);

-- Records given up on after repeated replay failures
CREATE TABLE IF NOT EXISTS dead_letters (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    attempt_id TEXT NOT NULL,
    kind TEXT NOT NULL,           -- draft|event
    record TEXT NOT NULL,         -- JSON
    reason TEXT NOT NULL,
    abandoned_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_events_attempt ON events(attempt_id, occurred_at);
CREATE INDEX IF NOT EXISTS idx_dead_letters_attempt ON dead_letters(attempt_id);
"#;

/// Error type for queue operations.
#[derive(Debug, thiserror::Error)]
pub enum QueueError {
    /// The storage quota is exhausted; the record was not written.
    #[error("offline storage is full")]
    StorageFull,

    /// The store could not be opened or is no longer usable.
    #[error("offline storage unavailable: {0}")]
    Unavailable(String),

    /// Database error.
    #[error("database error: {0}")]
    Database(rusqlite::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A stored row could not be decoded.
    #[error("corrupted queue record: {0}")]
    Corrupted(String),
}

impl From<rusqlite::Error> for QueueError {
    fn from(e: rusqlite::Error) -> Self {
        match e.sqlite_error_code() {
            Some(ErrorCode::DiskFull) => QueueError::StorageFull,
            Some(ErrorCode::CannotOpen) | Some(ErrorCode::ReadOnly) => {
                QueueError::Unavailable(e.to_string())
            }
            _ => QueueError::Database(e),
        }
    }
}

/// Result type for queue operations.
pub type QueueResult<T> = Result<T, QueueError>;

/// Everything queued for one attempt, removed from the store.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct TakenRecords {
    pub draft: Option<QueuedDraftRecord>,
    /// Ordered by `occurred_at`, then insertion.
    pub events: Vec<QueuedEventRecord>,
}

impl TakenRecords {
    pub fn is_empty(&self) -> bool {
        self.draft.is_none() && self.events.is_empty()
    }
}

/// Row counts, for status display.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PendingCounts {
    pub drafts: usize,
    pub events: usize,
    pub dead_letters: usize,
}

/// Kind of an abandoned record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Draft,
    Event,
}

impl RecordKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::Draft => "draft",
            RecordKind::Event => "event",
        }
    }
}

/// A record that replay gave up on.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DeadLetter {
    pub id: i64,
    pub attempt_id: String,
    pub kind: RecordKind,
    pub record: serde_json::Value,
    pub reason: String,
    pub abandoned_at: DateTime<Utc>,
}

/// Run schema creation on a queue connection.
pub fn run_migrations(conn: &Connection) -> QueueResult<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

fn corrupted(column: &str, value: &str) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(
        0,
        rusqlite::types::Type::Text,
        Box::new(QueueError::Corrupted(format!(
            "invalid value '{value}' in column '{column}'"
        ))),
    )
}

/// Parse an RFC3339 timestamp from the database.
fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>, rusqlite::Error> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| corrupted(column, value))
}

fn parse_json<T: serde::de::DeserializeOwned>(
    value: &str,
    column: &str,
) -> Result<T, rusqlite::Error> {
    serde_json::from_str(value).map_err(|_| corrupted(column, value))
}

fn draft_from_row(row: &rusqlite::Row<'_>) -> Result<QueuedDraftRecord, rusqlite::Error> {
    let snapshot: String = row.get(0)?;
    let queued_at: String = row.get(1)?;
    Ok(QueuedDraftRecord {
        snapshot: parse_json::<DraftSnapshot>(&snapshot, "snapshot")?,
        queued_at: parse_timestamp(&queued_at, "queued_at")?,
        attempts: row.get(2)?,
    })
}

fn event_from_row(row: &rusqlite::Row<'_>) -> Result<QueuedEventRecord, rusqlite::Error> {
    let event_type: String = row.get(2)?;
    let payload: String = row.get(3)?;
    Ok(QueuedEventRecord {
        id: Some(row.get(0)?),
        attempt_id: row.get(1)?,
        event_type: event_type
            .parse::<EventType>()
            .map_err(|_| corrupted("event_type", &event_type))?,
        payload: parse_json(&payload, "payload")?,
        occurred_at: row.get(4)?,
        offline_id: row.get(5)?,
        attempts: row.get(6)?,
    })
}

fn revision_param(revision: u64) -> i64 {
    i64::try_from(revision).unwrap_or(i64::MAX)
}

/// SQLite-backed offline queue.
pub struct QueueStore {
    conn: Mutex<Connection>,
}

impl QueueStore {
    /// Open a queue at the given path, creating and migrating if needed.
    ///
    /// Any failure here means offline durability is not available; it is
    /// reported as [`QueueError::Unavailable`].
    pub fn open(path: &Path) -> QueueResult<Self> {
        Self::try_open(path).map_err(|e| match e {
            QueueError::Unavailable(_) => e,
            other => QueueError::Unavailable(other.to_string()),
        })
    }

    fn try_open(path: &Path) -> QueueResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = FULL;
             PRAGMA busy_timeout = 5000;",
        )?;
        run_migrations(&conn)?;
        Ok(QueueStore {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory queue (for testing).
    pub fn open_in_memory() -> QueueResult<Self> {
        let conn = Connection::open_in_memory()?;
        run_migrations(&conn)?;
        Ok(QueueStore {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Queue a draft, replacing any draft already queued for the attempt.
    pub fn put_draft(&self, record: &QueuedDraftRecord) -> QueueResult<()> {
        let snapshot = serde_json::to_string(&record.snapshot)?;
        self.conn().execute(
            "INSERT INTO drafts (attempt_id, revision, snapshot, queued_at, attempts)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(attempt_id) DO UPDATE SET
                 revision = excluded.revision,
                 snapshot = excluded.snapshot,
                 queued_at = excluded.queued_at,
                 attempts = excluded.attempts",
            params![
                record.attempt_id(),
                revision_param(record.snapshot.revision),
                snapshot,
                record.queued_at.to_rfc3339(),
                record.attempts,
            ],
        )?;
        Ok(())
    }

    /// Put back a draft whose replay failed.
    ///
    /// If a newer revision was queued while the replay was in flight, the
    /// newer one stays and this record is dropped.
    pub fn requeue_draft(&self, record: &QueuedDraftRecord) -> QueueResult<()> {
        let snapshot = serde_json::to_string(&record.snapshot)?;
        self.conn().execute(
            "INSERT INTO drafts (attempt_id, revision, snapshot, queued_at, attempts)
             VALUES (?1, ?2, ?3, ?4, ?5)
             ON CONFLICT(attempt_id) DO UPDATE SET
                 revision = excluded.revision,
                 snapshot = excluded.snapshot,
                 queued_at = excluded.queued_at,
                 attempts = excluded.attempts
             WHERE excluded.revision >= drafts.revision",
            params![
                record.attempt_id(),
                revision_param(record.snapshot.revision),
                snapshot,
                record.queued_at.to_rfc3339(),
                record.attempts,
            ],
        )?;
        Ok(())
    }

    /// Append an event. Returns its local id.
    pub fn put_event(&self, record: &QueuedEventRecord) -> QueueResult<i64> {
        let payload = serde_json::to_string(&record.payload)?;
        let conn = self.conn();
        conn.execute(
            "INSERT INTO events (attempt_id, event_type, payload, occurred_at, offline_id, attempts)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                record.attempt_id,
                record.event_type.as_str(),
                payload,
                record.occurred_at,
                record.offline_id,
                record.attempts,
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Put back events whose replay failed, keeping their original ids.
    pub fn requeue_events(&self, records: &[QueuedEventRecord]) -> QueueResult<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        for record in records {
            let payload = serde_json::to_string(&record.payload)?;
            tx.execute(
                "INSERT OR REPLACE INTO events
                     (id, attempt_id, event_type, payload, occurred_at, offline_id, attempts)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.attempt_id,
                    record.event_type.as_str(),
                    payload,
                    record.occurred_at,
                    record.offline_id,
                    record.attempts,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    /// Read and delete everything queued for an attempt, atomically.
    pub fn take_all_for_attempt(&self, attempt_id: &str) -> QueueResult<TakenRecords> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;

        let draft = tx
            .query_row(
                "SELECT snapshot, queued_at, attempts FROM drafts WHERE attempt_id = ?1",
                params![attempt_id],
                draft_from_row,
            )
            .optional()?;

        let events = {
            let mut stmt = tx.prepare(
                "SELECT id, attempt_id, event_type, payload, occurred_at, offline_id, attempts
                 FROM events WHERE attempt_id = ?1
                 ORDER BY occurred_at ASC, id ASC",
            )?;
            let rows = stmt.query_map(params![attempt_id], event_from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        tx.execute("DELETE FROM drafts WHERE attempt_id = ?1", params![attempt_id])?;
        tx.execute("DELETE FROM events WHERE attempt_id = ?1", params![attempt_id])?;
        tx.commit()?;

        Ok(TakenRecords { draft, events })
    }

    /// Read the queued draft for an attempt without removing it.
    pub fn peek_draft(&self, attempt_id: &str) -> QueueResult<Option<QueuedDraftRecord>> {
        let draft = self
            .conn()
            .query_row(
                "SELECT snapshot, queued_at, attempts FROM drafts WHERE attempt_id = ?1",
                params![attempt_id],
                draft_from_row,
            )
            .optional()?;
        Ok(draft)
    }

    /// Whether anything is waiting for replay.
    pub fn has_pending(&self) -> QueueResult<bool> {
        let pending: bool = self.conn().query_row(
            "SELECT EXISTS(SELECT 1 FROM drafts) OR EXISTS(SELECT 1 FROM events)",
            [],
            |row| row.get(0),
        )?;
        Ok(pending)
    }

    /// Attempts with queued records, sorted.
    pub fn pending_attempts(&self) -> QueueResult<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT attempt_id FROM drafts
             UNION
             SELECT attempt_id FROM events
             ORDER BY attempt_id",
        )?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<String>, _>>()?;
        Ok(ids)
    }

    pub fn pending_counts(&self) -> QueueResult<PendingCounts> {
        let conn = self.conn();
        let count = |sql: &str| -> QueueResult<usize> {
            let n: i64 = conn.query_row(sql, [], |row| row.get(0))?;
            Ok(usize::try_from(n).unwrap_or(0))
        };
        Ok(PendingCounts {
            drafts: count("SELECT COUNT(*) FROM drafts")?,
            events: count("SELECT COUNT(*) FROM events")?,
            dead_letters: count("SELECT COUNT(*) FROM dead_letters")?,
        })
    }

    /// Move a record that replay gave up on into the dead letters.
    pub fn abandon<T: Serialize>(
        &self,
        attempt_id: &str,
        kind: RecordKind,
        record: &T,
        reason: &str,
        abandoned_at: DateTime<Utc>,
    ) -> QueueResult<()> {
        let record = serde_json::to_string(record)?;
        self.conn().execute(
            "INSERT INTO dead_letters (attempt_id, kind, record, reason, abandoned_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                attempt_id,
                kind.as_str(),
                record,
                reason,
                abandoned_at.to_rfc3339()
            ],
        )?;
        Ok(())
    }

    /// All abandoned records, oldest first.
    pub fn dead_letters(&self) -> QueueResult<Vec<DeadLetter>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, attempt_id, kind, record, reason, abandoned_at
             FROM dead_letters ORDER BY id",
        )?;
        let letters = stmt
            .query_map([], |row| {
                let kind: String = row.get(2)?;
                let record: String = row.get(3)?;
                let abandoned_at: String = row.get(5)?;
                Ok(DeadLetter {
                    id: row.get(0)?,
                    attempt_id: row.get(1)?,
                    kind: match kind.as_str() {
                        "draft" => RecordKind::Draft,
                        "event" => RecordKind::Event,
                        _ => return Err(corrupted("kind", &kind)),
                    },
                    record: parse_json(&record, "record")?,
                    reason: row.get(4)?,
                    abandoned_at: parse_timestamp(&abandoned_at, "abandoned_at")?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(letters)
    }

    /// Drop abandoned records once the user has been told about them.
    pub fn clear_dead_letters(&self, attempt_id: &str) -> QueueResult<usize> {
        let removed = self.conn().execute(
            "DELETE FROM dead_letters WHERE attempt_id = ?1",
            params![attempt_id],
        )?;
        Ok(removed)
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
