// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Client-side save path: network first, durable queue on transient failure.

use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tracing::{debug, info, warn};

use qr_core::{
    ClockSource, DraftSnapshot, EventType, QueuedDraftRecord, QueuedEventRecord,
    SaveAcknowledgement,
};

use crate::delivery::{deliver_draft, deliver_event, fetch_draft, DeliveryError, FailureClass};
use crate::id::OfflineIdGenerator;
use crate::orchestrator::{SyncOrchestrator, SyncReason};
use crate::queue::{QueueError, QueueStore};
use crate::transport::Transport;

/// Errors surfaced to the caller of a save.
#[derive(Debug, thiserror::Error)]
pub enum AutosaveError {
    #[error("invalid request: {0}")]
    Invalid(#[from] qr_core::Error),

    /// Retrying would never succeed; nothing was queued.
    #[error("save rejected: {0}")]
    Rejected(DeliveryError),

    /// The server is unreachable and there is no durable queue to fall back on.
    #[error("server unreachable and offline storage is unavailable: {0}")]
    Degraded(DeliveryError),

    #[error("offline queue failure: {0}")]
    Storage(#[from] QueueError),

    /// A read could not reach the server and nothing is queued locally.
    #[error("server unreachable: {0}")]
    Unreachable(DeliveryError),
}

pub type Result<T> = std::result::Result<T, AutosaveError>;

/// Where the save state machine sits for this session.
///
/// `Confirmed`, `Queued` and `Failed` hold until the next save starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SaveState {
    Idle,
    Saving { revision: u64 },
    Confirmed { revision: u64 },
    Queued { revision: u64 },
    Failed { revision: u64 },
}

/// Whether edits survive a failed network save.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Durability {
    /// Transient failures are queued in the local store.
    Durable,
    /// No local store; transient failures are reported, never hidden.
    NetworkOnly,
}

/// Result of persisting one exam event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventReceipt {
    pub offline_id: String,
    /// Queued locally or deferred by the server.
    pub queued: bool,
}

/// The durable half of the client.
pub struct OfflineSupport {
    pub store: Arc<QueueStore>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

#[derive(Debug)]
struct Session {
    state: SaveState,
    last_revision: u64,
    last_confirmed: Option<u64>,
}

pub struct AutosaveClient {
    transport: Arc<dyn Transport>,
    offline: Option<OfflineSupport>,
    clock: Arc<dyn ClockSource>,
    ids: OfflineIdGenerator,
    session: Mutex<Session>,
}

impl AutosaveClient {
    /// A network-only client. Use [`with_offline`](Self::with_offline) to add
    /// the durable queue.
    pub fn new(transport: Arc<dyn Transport>, clock: Arc<dyn ClockSource>) -> Self {
        let ids = OfflineIdGenerator::new(clock.now_ms());
        AutosaveClient {
            transport,
            offline: None,
            clock,
            ids,
            session: Mutex::new(Session {
                state: SaveState::Idle,
                last_revision: 0,
                last_confirmed: None,
            }),
        }
    }

    pub fn with_offline(
        mut self,
        store: Arc<QueueStore>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        self.offline = Some(OfflineSupport {
            store,
            orchestrator,
        });
        self
    }

    pub fn durability(&self) -> Durability {
        if self.offline.is_some() {
            Durability::Durable
        } else {
            Durability::NetworkOnly
        }
    }

    pub fn state(&self) -> SaveState {
        self.session().state
    }

    /// Highest revision the server has acknowledged in this session.
    pub fn last_confirmed_revision(&self) -> Option<u64> {
        self.session().last_confirmed
    }

    /// Save a draft snapshot.
    ///
    /// The snapshot's revision is restamped so revisions strictly increase
    /// within the session and stay ahead of earlier sessions.
    pub async fn save_draft(&self, snapshot: DraftSnapshot) -> Result<SaveAcknowledgement> {
        snapshot.validate()?;
        let revision = self.begin_save(snapshot.revision);
        let snapshot = snapshot.with_revision(revision);
        let attempt_id = snapshot.attempt_id.clone();

        let err = match deliver_draft(self.transport.as_ref(), snapshot.clone()).await {
            Ok(ack) => {
                self.finish_save(revision, SaveState::Confirmed { revision });
                debug!("draft {} rev {} saved", attempt_id, revision);
                self.drain_if_pending(&attempt_id);
                return Ok(ack);
            }
            Err(err) => err,
        };

        let offline = match self.queue_fallback(err) {
            Ok(offline) => offline,
            Err(e) => {
                self.finish_save(revision, SaveState::Failed { revision });
                return Err(e);
            }
        };
        let record = QueuedDraftRecord::new(snapshot, self.clock.now_utc());
        if let Err(e) = offline.store.put_draft(&record) {
            self.finish_save(revision, SaveState::Failed { revision });
            return Err(AutosaveError::Storage(e));
        }
        self.finish_save(revision, SaveState::Queued { revision });
        info!("draft {} rev {} queued for replay", attempt_id, revision);
        self.nudge(offline);
        Ok(SaveAcknowledgement::queued())
    }

    /// Record one exam event, queueing it if the server is unreachable.
    pub async fn persist_exam_event(
        &self,
        attempt_id: &str,
        event_type: EventType,
        payload: serde_json::Value,
    ) -> Result<EventReceipt> {
        if attempt_id.trim().is_empty() {
            return Err(qr_core::Error::EmptyAttemptId.into());
        }
        let occurred_at = i64::try_from(self.clock.now_ms()).unwrap_or(i64::MAX);
        let offline_id = self.ids.next(attempt_id, event_type, occurred_at);
        let record = QueuedEventRecord::new(
            attempt_id,
            event_type,
            payload,
            occurred_at,
            offline_id.clone(),
        );

        let err = match deliver_event(self.transport.as_ref(), &record).await {
            Ok(queued) => return Ok(EventReceipt { offline_id, queued }),
            Err(err) => err,
        };

        let offline = self.queue_fallback(err)?;
        offline.store.put_event(&record)?;
        debug!("{} event for {} queued for replay", event_type, attempt_id);
        self.nudge(offline);
        Ok(EventReceipt {
            offline_id,
            queued: true,
        })
    }

    /// Load the draft to resume from.
    ///
    /// A locally queued draft newer than the server's copy wins; it has not
    /// been replayed yet.
    pub async fn load_draft(&self, attempt_id: &str) -> Result<Option<DraftSnapshot>> {
        let queued = match &self.offline {
            Some(offline) => offline
                .store
                .peek_draft(attempt_id)?
                .map(|record| record.snapshot),
            None => None,
        };

        match fetch_draft(self.transport.as_ref(), attempt_id).await {
            Ok(server) => Ok(newest(server, queued)),
            Err(err) => match err.classify() {
                FailureClass::Permanent => Err(AutosaveError::Rejected(err)),
                FailureClass::Transient => match queued {
                    Some(draft) => {
                        warn!(
                            "cannot load draft {} from server, using queued copy: {}",
                            attempt_id, err
                        );
                        Ok(Some(draft))
                    }
                    None => Err(AutosaveError::Unreachable(err)),
                },
            },
        }
    }

    /// Pick the durable queue for a failed delivery, or the error to surface.
    fn queue_fallback(&self, err: DeliveryError) -> Result<&OfflineSupport> {
        if err.classify() == FailureClass::Permanent {
            warn!("save rejected, not queued: {}", err);
            return Err(AutosaveError::Rejected(err));
        }
        match &self.offline {
            Some(offline) => {
                debug!("transient save failure, queueing: {}", err);
                Ok(offline)
            }
            None => {
                warn!("transient save failure with no offline storage: {}", err);
                Err(AutosaveError::Degraded(err))
            }
        }
    }

    /// Ask for a replay right away so a short outage drains without waiting
    /// for a host signal. The orchestrator skips it while known offline.
    fn nudge(&self, offline: &OfflineSupport) {
        offline.orchestrator.spawn_sync(SyncReason::Queued);
    }

    /// A confirmed save means the link works; flush anything left behind.
    fn drain_if_pending(&self, attempt_id: &str) {
        let Some(offline) = &self.offline else {
            return;
        };
        match offline.store.has_pending() {
            Ok(true) => {
                debug!("network save for {} succeeded, replaying queue", attempt_id);
                offline.orchestrator.spawn_sync(SyncReason::Queued);
            }
            Ok(false) => {}
            Err(e) => warn!("cannot inspect offline queue: {}", e),
        }
    }

    fn begin_save(&self, requested: u64) -> u64 {
        let now = self.clock.now_ms();
        let mut session = self.session();
        let revision = (session.last_revision + 1).max(now).max(requested);
        session.last_revision = revision;
        session.state = SaveState::Saving { revision };
        revision
    }

    /// Settle a save. Results for superseded revisions only move the
    /// confirmed high-water mark forward; they never touch the state.
    fn finish_save(&self, revision: u64, state: SaveState) {
        let mut session = self.session();
        if let SaveState::Confirmed { .. } = state {
            if session.last_confirmed.map_or(true, |c| revision > c) {
                session.last_confirmed = Some(revision);
            }
        }
        if revision == session.last_revision {
            session.state = state;
        }
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }
}

fn newest(server: Option<DraftSnapshot>, queued: Option<DraftSnapshot>) -> Option<DraftSnapshot> {
    match (server, queued) {
        (Some(server), Some(queued)) if queued.revision > server.revision => Some(queued),
        (Some(server), _) => Some(server),
        (None, queued) => queued,
    }
}

#[cfg(test)]
#[path = "autosave_tests.rs"]
mod tests;
