// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Server state and the throttled save endpoint.
//!
//! Every request runs against the attempt store under one lock, so the
//! throttle check and the write it guards cannot interleave with another
//! save for the same attempt.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex;
use tracing::{debug, error, info};

use qr_core::clock::ms_to_utc;
use qr_core::protocol::{ErrorKind, ServerMessage};
use qr_core::{ClockSource, DraftSnapshot, EventType, SaveAcknowledgement, SystemClock};

use crate::error::Result;
use crate::session::SessionVerifier;
use crate::store::{AttemptRecord, AttemptStore, NewEvent};

/// Default minimum spacing between persisted draft writes per attempt.
pub const DEFAULT_MIN_SAVE_INTERVAL_MS: u64 = 2_000;

const DB_FILE_NAME: &str = "attempts.db";

/// An exam event as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct IncomingEvent {
    pub attempt_id: String,
    pub event_type: EventType,
    pub payload: serde_json::Value,
    pub occurred_at: i64,
    pub offline_id: String,
}

/// Shared server state.
#[derive(Clone)]
pub struct ServerState {
    inner: Arc<ServerStateInner>,
}

struct ServerStateInner {
    store: Mutex<AttemptStore>,
    sessions: Box<dyn SessionVerifier>,
    clock: Box<dyn ClockSource>,
    min_save_interval: Duration,
}

impl ServerState {
    /// Open the attempt store in `data_dir`.
    pub fn open(
        data_dir: &Path,
        sessions: impl SessionVerifier + 'static,
        min_save_interval: Duration,
    ) -> Result<Self> {
        let store = AttemptStore::open(&data_dir.join(DB_FILE_NAME))?;
        Ok(Self::new(store, sessions, SystemClock, min_save_interval))
    }

    pub fn new(
        store: AttemptStore,
        sessions: impl SessionVerifier + 'static,
        clock: impl ClockSource + 'static,
        min_save_interval: Duration,
    ) -> Self {
        ServerState {
            inner: Arc::new(ServerStateInner {
                store: Mutex::new(store),
                sessions: Box::new(sessions),
                clock: Box::new(clock),
                min_save_interval,
            }),
        }
    }

    /// Run `f` against the attempt store.
    pub async fn with_store<R>(&self, f: impl FnOnce(&mut AttemptStore) -> R) -> R {
        let mut store = self.inner.store.lock().await;
        f(&mut store)
    }

    pub fn authenticate(&self, token: &str) -> Option<String> {
        self.inner.sessions.verify(token)
    }

    /// Save a draft for `user_id`.
    ///
    /// Finalized attempts and saves inside the throttle window are
    /// acknowledged as queued without writing anything.
    pub async fn save_draft(&self, user_id: &str, snapshot: DraftSnapshot) -> ServerMessage {
        if let Err(e) = snapshot.validate() {
            return ServerMessage::error(ErrorKind::InvalidRequest, e.to_string());
        }

        let mut store = self.inner.store.lock().await;
        let attempt = match authorize(&store, user_id, &snapshot.attempt_id) {
            Ok(attempt) => attempt,
            Err(rejection) => return rejection,
        };

        if !attempt.status.accepts_writes() {
            debug!(
                "ignoring save for {} attempt {}",
                attempt.status, attempt.id
            );
            return ServerMessage::saved(SaveAcknowledgement::queued());
        }

        let now = self.inner.clock.now_ms();
        if let Some(last) = attempt.last_update_ms {
            if u128::from(now.saturating_sub(last)) < self.inner.min_save_interval.as_millis() {
                debug!(
                    "throttled save for {} rev {} ({}ms since last write)",
                    attempt.id,
                    snapshot.revision,
                    now.saturating_sub(last)
                );
                return ServerMessage::saved(SaveAcknowledgement::queued());
            }
        }

        match store.write_draft(&snapshot, now) {
            Ok(written) => {
                debug!(
                    "saved {} rev {} ({} task(s) written)",
                    attempt.id, snapshot.revision, written
                );
                ServerMessage::saved(SaveAcknowledgement::confirmed(ms_to_utc(now)))
            }
            Err(e) => internal("write draft", e),
        }
    }

    pub async fn load_draft(&self, user_id: &str, attempt_id: &str) -> ServerMessage {
        let store = self.inner.store.lock().await;
        if let Err(rejection) = authorize(&store, user_id, attempt_id) {
            return rejection;
        }
        match store.load_draft(attempt_id) {
            Ok(draft) => ServerMessage::draft(draft),
            Err(e) => internal("load draft", e),
        }
    }

    /// Record an exam event. Events are never throttled.
    pub async fn record_event(&self, user_id: &str, event: IncomingEvent) -> ServerMessage {
        if event.offline_id.trim().is_empty() {
            return ServerMessage::error(ErrorKind::InvalidRequest, "offline_id cannot be empty");
        }

        let store = self.inner.store.lock().await;
        let attempt = match authorize(&store, user_id, &event.attempt_id) {
            Ok(attempt) => attempt,
            Err(rejection) => return rejection,
        };

        if !attempt.status.accepts_writes() {
            debug!(
                "ignoring {} event for {} attempt {}",
                event.event_type, attempt.status, attempt.id
            );
            return ServerMessage::event_recorded(true);
        }

        let new_event = NewEvent {
            attempt_id: &event.attempt_id,
            event_type: event.event_type,
            payload: &event.payload,
            occurred_at: event.occurred_at,
            offline_id: &event.offline_id,
        };
        match store.record_event(new_event, self.inner.clock.now_utc()) {
            Ok(true) => ServerMessage::event_recorded(false),
            Ok(false) => {
                debug!("duplicate event {} ignored", event.offline_id);
                ServerMessage::event_recorded(false)
            }
            Err(e) => internal("record event", e),
        }
    }
}

/// Look up an attempt and check that `user_id` owns it.
fn authorize(
    store: &AttemptStore,
    user_id: &str,
    attempt_id: &str,
) -> std::result::Result<AttemptRecord, ServerMessage> {
    match store.attempt(attempt_id) {
        Ok(Some(attempt)) if attempt.user_id == user_id => Ok(attempt),
        Ok(Some(attempt)) => {
            info!(
                "user {} denied access to attempt {} owned by {}",
                user_id, attempt.id, attempt.user_id
            );
            Err(ServerMessage::error(
                ErrorKind::Forbidden,
                format!("attempt {attempt_id} belongs to another user"),
            ))
        }
        Ok(None) => Err(ServerMessage::error(
            ErrorKind::NotFound,
            format!("attempt {attempt_id} not found"),
        )),
        Err(e) => Err(internal("look up attempt", e)),
    }
}

fn internal(action: &str, e: crate::error::Error) -> ServerMessage {
    error!("failed to {}: {}", action, e);
    ServerMessage::error(ErrorKind::Internal, format!("failed to {action}"))
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
