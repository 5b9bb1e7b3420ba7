// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Draft and telemetry types shared by the autosave client and the server.
//!
//! A [`DraftSnapshot`] is the full editor state of one exam attempt. Snapshots
//! are never merged: a newer revision replaces an older one wholesale. Exam
//! events, by contrast, form a log and are kept individually.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Identifies a writing task within an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKey {
    /// The short report/letter task.
    Task1,
    /// The long essay task.
    Task2,
}

impl TaskKey {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            TaskKey::Task1 => "task1",
            TaskKey::Task2 => "task2",
        }
    }
}

impl fmt::Display for TaskKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for TaskKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "task1" => Ok(TaskKey::Task1),
            "task2" => Ok(TaskKey::Task2),
            _ => Err(Error::InvalidTaskKey(s.to_string())),
        }
    }
}

/// Content of a single task at the time of a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskSnapshot {
    pub content: String,
    pub word_count: u32,
}

impl TaskSnapshot {
    /// Builds a task snapshot, counting whitespace-separated words.
    pub fn from_content(content: impl Into<String>) -> Self {
        let content = content.into();
        let word_count = count_words(&content);
        TaskSnapshot {
            content,
            word_count,
        }
    }
}

/// Counts whitespace-separated words.
pub fn count_words(text: &str) -> u32 {
    u32::try_from(text.split_whitespace().count()).unwrap_or(u32::MAX)
}

/// Full editor state of one attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DraftSnapshot {
    pub attempt_id: String,
    #[serde(default)]
    pub tasks: BTreeMap<TaskKey, TaskSnapshot>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub active_task: Option<TaskKey>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elapsed_seconds: Option<u64>,
    /// Monotonic per-attempt revision; higher supersedes lower.
    #[serde(default)]
    pub revision: u64,
}

impl DraftSnapshot {
    /// Creates an empty snapshot for the given attempt.
    pub fn new(attempt_id: impl Into<String>) -> Self {
        DraftSnapshot {
            attempt_id: attempt_id.into(),
            tasks: BTreeMap::new(),
            active_task: None,
            elapsed_seconds: None,
            revision: 0,
        }
    }

    /// Sets the content of a task, recomputing its word count.
    pub fn with_task(mut self, task: TaskKey, content: impl Into<String>) -> Self {
        self.tasks.insert(task, TaskSnapshot::from_content(content));
        self
    }

    pub fn with_active_task(mut self, task: TaskKey) -> Self {
        self.active_task = Some(task);
        self
    }

    pub fn with_elapsed_seconds(mut self, elapsed: u64) -> Self {
        self.elapsed_seconds = Some(elapsed);
        self
    }

    pub fn with_revision(mut self, revision: u64) -> Self {
        self.revision = revision;
        self
    }

    /// Validates fields that the server and queue rely on.
    pub fn validate(&self) -> Result<()> {
        if self.attempt_id.trim().is_empty() {
            return Err(Error::EmptyAttemptId);
        }
        Ok(())
    }
}

/// A draft snapshot waiting in the local queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueuedDraftRecord {
    pub snapshot: DraftSnapshot,
    pub queued_at: DateTime<Utc>,
    /// Number of failed replay attempts so far.
    pub attempts: u32,
}

impl QueuedDraftRecord {
    pub fn new(snapshot: DraftSnapshot, queued_at: DateTime<Utc>) -> Self {
        QueuedDraftRecord {
            snapshot,
            queued_at,
            attempts: 0,
        }
    }

    pub fn attempt_id(&self) -> &str {
        &self.snapshot.attempt_id
    }
}

/// Kinds of exam telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    /// The exam window regained focus.
    Focus,
    /// The exam window lost focus.
    Blur,
    /// A burst of typing activity.
    Typing,
}

impl EventType {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            EventType::Focus => "focus",
            EventType::Blur => "blur",
            EventType::Typing => "typing",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EventType {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "focus" => Ok(EventType::Focus),
            "blur" => Ok(EventType::Blur),
            "typing" => Ok(EventType::Typing),
            _ => Err(Error::InvalidEventType(s.to_string())),
        }
    }
}

/// An exam event waiting in the local queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueuedEventRecord {
    /// Local auto-increment id, assigned by the queue store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    pub attempt_id: String,
    pub event_type: EventType,
    #[serde(default)]
    pub payload: serde_json::Value,
    /// Emission time in milliseconds since Unix epoch.
    pub occurred_at: i64,
    /// Client-generated id the server deduplicates on.
    pub offline_id: String,
    pub attempts: u32,
}

impl QueuedEventRecord {
    pub fn new(
        attempt_id: impl Into<String>,
        event_type: EventType,
        payload: serde_json::Value,
        occurred_at: i64,
        offline_id: impl Into<String>,
    ) -> Self {
        QueuedEventRecord {
            id: None,
            attempt_id: attempt_id.into(),
            event_type,
            payload,
            occurred_at,
            offline_id: offline_id.into(),
            attempts: 0,
        }
    }
}

/// Outcome of a save, identical in shape whether the server persisted the
/// draft, deferred it, or the client queued it locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveAcknowledgement {
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub queued: Option<bool>,
}

impl SaveAcknowledgement {
    /// The server persisted the write.
    pub fn confirmed(saved_at: DateTime<Utc>) -> Self {
        SaveAcknowledgement {
            ok: true,
            saved_at: Some(saved_at),
            queued: None,
        }
    }

    /// The write was accepted but not persisted yet (locally queued, or
    /// deferred/ignored by the server).
    pub fn queued() -> Self {
        SaveAcknowledgement {
            ok: true,
            saved_at: None,
            queued: Some(true),
        }
    }

    pub fn is_queued(&self) -> bool {
        self.queued.unwrap_or(false)
    }
}

/// Server-side lifecycle of an attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttemptStatus {
    /// In progress; accepts writes.
    Draft,
    /// Handed in by the learner.
    Submitted,
    /// Timed out.
    Expired,
}

impl AttemptStatus {
    /// Returns the string representation used in storage and display.
    pub fn as_str(&self) -> &'static str {
        match self {
            AttemptStatus::Draft => "draft",
            AttemptStatus::Submitted => "submitted",
            AttemptStatus::Expired => "expired",
        }
    }

    /// Only draft attempts may be written to.
    pub fn accepts_writes(&self) -> bool {
        matches!(self, AttemptStatus::Draft)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for AttemptStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "draft" => Ok(AttemptStatus::Draft),
            "submitted" => Ok(AttemptStatus::Submitted),
            "expired" => Ok(AttemptStatus::Expired),
            _ => Err(Error::InvalidAttemptStatus(s.to_string())),
        }
    }
}

#[cfg(test)]
#[path = "draft_tests.rs"]
mod tests;
