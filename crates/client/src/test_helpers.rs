// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Shared test helpers for client module tests.

use chrono::{TimeZone, Utc};
use serde_json::json;

use qr_core::{DraftSnapshot, EventType, QueuedDraftRecord, QueuedEventRecord, TaskKey};

/// Create a queued draft with essay text in task 2.
pub fn make_draft(attempt_id: &str, revision: u64, text: &str) -> QueuedDraftRecord {
    let snapshot = DraftSnapshot::new(attempt_id)
        .with_task(TaskKey::Task2, text)
        .with_active_task(TaskKey::Task2)
        .with_revision(revision);
    let queued_at = Utc
        .timestamp_millis_opt(1_700_000_000_000)
        .single()
        .unwrap_or_default();
    QueuedDraftRecord::new(snapshot, queued_at)
}

/// Create a queued typing event emitted at the given time.
pub fn make_event(attempt_id: &str, occurred_at: i64) -> QueuedEventRecord {
    QueuedEventRecord::new(
        attempt_id,
        EventType::Typing,
        json!({ "seq": occurred_at }),
        occurred_at,
        format!("{attempt_id}-{occurred_at}"),
    )
}
