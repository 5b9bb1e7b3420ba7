// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Replay of queued drafts and events once delivery is possible again.
//!
//! The orchestrator decides *when* to drain the queue and guarantees that at
//! most one replay pass runs at a time. A request that arrives during a pass
//! is folded into a single follow-up pass.
//!
//! There is no retry timer. A failed pass waits for the next
//! trigger: connectivity restored, visibility restored, a background wake,
//! or a fresh queued record.
//!
//! A pass started only because something was just queued usually runs
//! while the link is still flaky, so its transient failures do not count
//! against a record's retry budget.
//!
//! # Lifecycle
//!
//! ```text
//! new() ──► init(signals) ──► [listening: HostSignal ─► spawn_sync] ──► reset()
//! ```

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use qr_core::{ClockSource, QueuedDraftRecord, QueuedEventRecord, SystemClock};

use crate::delivery::{deliver_draft, deliver_event, DeliveryError, FailureClass};
use crate::queue::{QueueResult, QueueStore, RecordKind};
use crate::transport::Transport;

/// Tag used when asking the host for background wake-ups.
pub const DEFAULT_SYNC_TAG: &str = "quire-draft-sync";

/// Default number of failed replays before a record is abandoned.
pub const DEFAULT_MAX_REPLAY_ATTEMPTS: u32 = 8;

/// Why a sync was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncReason {
    /// Records left over from a previous run.
    Startup,
    ConnectivityRestored,
    VisibilityRestored,
    BackgroundWake,
    /// Something was just queued.
    Queued,
    Manual,
}

impl SyncReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncReason::Startup => "startup",
            SyncReason::ConnectivityRestored => "online",
            SyncReason::VisibilityRestored => "visible",
            SyncReason::BackgroundWake => "background",
            SyncReason::Queued => "queued",
            SyncReason::Manual => "manual",
        }
    }

    /// Whether a transient failure during this pass uses up a retry.
    pub fn charges_retry(&self) -> bool {
        !matches!(self, SyncReason::Queued)
    }
}

impl fmt::Display for SyncReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Notifications from the host environment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostSignal {
    ConnectivityLost,
    ConnectivityRestored,
    VisibilityRestored,
    /// The host woke the engine for a registered background sync.
    BackgroundWake { tag: String },
}

/// Asks the host to wake the engine while it is not in the foreground.
///
/// Registration is best effort; replay never depends on it.
pub trait WakeRegistrar: Send + Sync {
    fn register(&self, tag: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>>;
}

/// Events surfaced to the user interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncNotice {
    /// Everything queued for an attempt reached the server.
    Replayed {
        attempt_id: String,
        drafts: usize,
        events: usize,
    },
    /// Records were moved to dead letters and will not be retried.
    Abandoned {
        attempt_id: String,
        records: usize,
        reason: String,
    },
    /// The queue could not be read or written during replay.
    StorageFailure {
        attempt_id: Option<String>,
        message: String,
    },
}

/// Totals for one `request_sync` call, across all of its passes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReplayReport {
    pub passes: u32,
    pub drafts_delivered: usize,
    pub events_delivered: usize,
    pub attempts_failed: usize,
    pub records_abandoned: usize,
}

/// Result of a sync request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    /// This call ran the replay.
    Completed(ReplayReport),
    /// A replay was already running; it will run once more.
    Coalesced,
    /// Known to be offline; nothing attempted.
    Offline,
}

/// Tunables for replay.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    pub max_replay_attempts: u32,
    pub background_sync_tag: String,
}

impl Default for OrchestratorSettings {
    fn default() -> Self {
        OrchestratorSettings {
            max_replay_attempts: DEFAULT_MAX_REPLAY_ATTEMPTS,
            background_sync_tag: DEFAULT_SYNC_TAG.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct RunState {
    running: bool,
    /// Reason for the follow-up pass, if one was requested mid-pass.
    rerun: Option<SyncReason>,
}

/// Clears the running flag if a replay future is dropped mid-pass.
struct RunGuard<'a> {
    run: &'a Mutex<RunState>,
    idle: &'a Notify,
    armed: bool,
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            let mut run = self.run.lock().unwrap_or_else(|e| e.into_inner());
            *run = RunState::default();
            drop(run);
            self.idle.notify_waiters();
        }
    }
}

/// A failed delivery and whether it uses up a retry.
struct ReplayFailure<'a> {
    err: &'a DeliveryError,
    charge: bool,
}

/// Process-scoped replay service.
pub struct SyncOrchestrator {
    store: Arc<QueueStore>,
    transport: Arc<dyn Transport>,
    settings: OrchestratorSettings,
    clock: Arc<dyn ClockSource>,
    run: Mutex<RunState>,
    idle: Notify,
    online: AtomicBool,
    notices: broadcast::Sender<SyncNotice>,
    listener: Mutex<Option<JoinHandle<()>>>,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<QueueStore>,
        transport: Arc<dyn Transport>,
        settings: OrchestratorSettings,
    ) -> Self {
        let (notices, _) = broadcast::channel(64);
        SyncOrchestrator {
            store,
            transport,
            settings,
            clock: Arc::new(SystemClock),
            run: Mutex::new(RunState::default()),
            idle: Notify::new(),
            online: AtomicBool::new(true),
            notices,
            listener: Mutex::new(None),
        }
    }

    /// Use `clock` to timestamp dead letters.
    pub fn with_clock(mut self, clock: Arc<dyn ClockSource>) -> Self {
        self.clock = clock;
        self
    }

    /// Start listening for host signals.
    ///
    /// Registers for background wake-ups (best effort) and kicks off a replay
    /// if records survived from a previous run. Calling `init` again replaces
    /// the previous subscription.
    pub fn init(
        self: &Arc<Self>,
        signals: mpsc::Receiver<HostSignal>,
        registrar: Option<&dyn WakeRegistrar>,
    ) {
        self.reset();

        if let Some(registrar) = registrar {
            if let Err(e) = registrar.register(&self.settings.background_sync_tag) {
                warn!(
                    "background sync registration failed, relying on foreground triggers: {}",
                    e
                );
            }
        }

        let this = Arc::clone(self);
        let handle = tokio::spawn(this.listen(signals));
        *self.listener_slot() = Some(handle);
        info!("sync orchestrator listening for host signals");

        match self.store.has_pending() {
            Ok(true) => {
                self.spawn_sync(SyncReason::Startup);
            }
            Ok(false) => {}
            Err(e) => {
                error!("cannot inspect offline queue at startup: {}", e);
                self.notify(SyncNotice::StorageFailure {
                    attempt_id: None,
                    message: e.to_string(),
                });
            }
        }
    }

    /// Tear down the signal subscription and clear replay state.
    ///
    /// Intended for shutdown and tests; call it when no replay is in flight.
    pub fn reset(&self) {
        if let Some(handle) = self.listener_slot().take() {
            handle.abort();
        }
        *self.run_state() = RunState::default();
        self.online.store(true, Ordering::SeqCst);
    }

    /// Subscribe to replay notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<SyncNotice> {
        self.notices.subscribe()
    }

    pub fn is_online(&self) -> bool {
        self.online.load(Ordering::SeqCst)
    }

    pub fn set_online(&self, online: bool) {
        self.online.store(online, Ordering::SeqCst);
    }

    pub fn is_running(&self) -> bool {
        self.run_state().running
    }

    /// Wait until no replay is running.
    pub async fn settled(&self) {
        loop {
            let notified = self.idle.notified();
            if !self.is_running() {
                return;
            }
            notified.await;
        }
    }

    /// Fire-and-forget variant of [`request_sync`](Self::request_sync).
    pub fn spawn_sync(self: &Arc<Self>, reason: SyncReason) -> JoinHandle<SyncOutcome> {
        let this = Arc::clone(self);
        tokio::spawn(async move { this.request_sync(reason).await })
    }

    /// Drain the queue, or fold into the replay already running.
    pub async fn request_sync(&self, reason: SyncReason) -> SyncOutcome {
        if !self.is_online() {
            debug!("sync requested ({}) while offline, deferring", reason);
            return SyncOutcome::Offline;
        }

        {
            let mut run = self.run_state();
            if run.running {
                // A charging reason wins so the follow-up still counts.
                if run.rerun.map_or(true, |prev| !prev.charges_retry()) {
                    run.rerun = Some(reason);
                }
                debug!("sync requested ({}) during replay, coalesced", reason);
                return SyncOutcome::Coalesced;
            }
            run.running = true;
        }

        debug!("replay started ({})", reason);
        let mut guard = RunGuard {
            run: &self.run,
            idle: &self.idle,
            armed: true,
        };
        let mut report = ReplayReport::default();
        let mut pass_reason = reason;

        loop {
            report.passes += 1;
            self.replay_pass(pass_reason, &mut report).await;

            let mut run = self.run_state();
            if let Some(next) = run.rerun.take() {
                if self.is_online() {
                    pass_reason = next;
                    continue;
                }
            }
            *run = RunState::default();
            guard.armed = false;
            break;
        }
        self.idle.notify_waiters();

        info!(
            "replay finished ({}): {} pass(es), {} draft(s), {} event(s), {} failed, {} abandoned",
            reason,
            report.passes,
            report.drafts_delivered,
            report.events_delivered,
            report.attempts_failed,
            report.records_abandoned
        );
        SyncOutcome::Completed(report)
    }

    async fn listen(self: Arc<Self>, mut signals: mpsc::Receiver<HostSignal>) {
        while let Some(signal) = signals.recv().await {
            debug!("host signal: {:?}", signal);
            match signal {
                HostSignal::ConnectivityLost => self.set_online(false),
                HostSignal::ConnectivityRestored => {
                    self.set_online(true);
                    self.spawn_sync(SyncReason::ConnectivityRestored);
                }
                HostSignal::VisibilityRestored => {
                    self.spawn_sync(SyncReason::VisibilityRestored);
                }
                HostSignal::BackgroundWake { tag } => {
                    if tag == self.settings.background_sync_tag {
                        self.spawn_sync(SyncReason::BackgroundWake);
                    } else {
                        debug!("ignoring background wake for tag {}", tag);
                    }
                }
            }
        }
        debug!("host signal channel closed");
    }

    async fn replay_pass(&self, reason: SyncReason, report: &mut ReplayReport) {
        let attempts = match self.store.pending_attempts() {
            Ok(attempts) => attempts,
            Err(e) => {
                error!("cannot list pending attempts: {}", e);
                self.notify(SyncNotice::StorageFailure {
                    attempt_id: None,
                    message: e.to_string(),
                });
                return;
            }
        };

        for attempt_id in attempts {
            if !self.is_online() {
                debug!("went offline mid-replay, stopping pass");
                break;
            }
            self.replay_attempt(&attempt_id, reason, report).await;
        }
    }

    async fn replay_attempt(
        &self,
        attempt_id: &str,
        reason: SyncReason,
        report: &mut ReplayReport,
    ) {
        let taken = match self.store.take_all_for_attempt(attempt_id) {
            Ok(taken) => taken,
            Err(e) => {
                error!("cannot take queued records for {}: {}", attempt_id, e);
                self.notify(SyncNotice::StorageFailure {
                    attempt_id: Some(attempt_id.to_string()),
                    message: e.to_string(),
                });
                return;
            }
        };
        if taken.is_empty() {
            return;
        }

        let mut drafts = 0;
        if let Some(draft) = taken.draft {
            match deliver_draft(self.transport.as_ref(), draft.snapshot.clone()).await {
                Ok(_) => drafts += 1,
                Err(err) => {
                    let failed = ReplayFailure {
                        err: &err,
                        charge: reason.charges_retry(),
                    };
                    self.settle_failure(attempt_id, Some(draft), taken.events, failed, report);
                    return;
                }
            }
        }
        report.drafts_delivered += drafts;

        let events = taken.events;
        for (index, event) in events.iter().enumerate() {
            if let Err(err) = deliver_event(self.transport.as_ref(), event).await {
                let undelivered = events[index..].to_vec();
                let failed = ReplayFailure {
                    err: &err,
                    charge: reason.charges_retry(),
                };
                self.settle_failure(attempt_id, None, undelivered, failed, report);
                return;
            }
            report.events_delivered += 1;
        }
        let total_events = events.len();

        debug!(
            "replayed {}: {} draft(s), {} event(s)",
            attempt_id, drafts, total_events
        );
        self.notify(SyncNotice::Replayed {
            attempt_id: attempt_id.to_string(),
            drafts,
            events: total_events,
        });
    }

    /// Put undelivered records back, or abandon them once retrying is futile.
    fn settle_failure(
        &self,
        attempt_id: &str,
        draft: Option<QueuedDraftRecord>,
        events: Vec<QueuedEventRecord>,
        failed: ReplayFailure<'_>,
        report: &mut ReplayReport,
    ) {
        let err = failed.err;
        report.attempts_failed += 1;
        let permanent = err.classify() == FailureClass::Permanent;
        if permanent {
            warn!("replay for {} rejected: {}", attempt_id, err);
        } else {
            warn!(
                "replay for {} failed, retrying on next trigger: {}",
                attempt_id, err
            );
        }

        let reason = err.to_string();
        let max = self.settings.max_replay_attempts;
        let charge = u32::from(failed.charge || permanent);
        let abandoned_at = self.clock.now_utc();
        let mut abandoned = 0;

        if let Some(mut draft) = draft {
            draft.attempts = draft.attempts.saturating_add(charge);
            if permanent || draft.attempts >= max {
                abandoned += 1;
                self.check_store(
                    attempt_id,
                    self.store.abandon(
                        attempt_id,
                        RecordKind::Draft,
                        &draft,
                        &reason,
                        abandoned_at,
                    ),
                );
            } else {
                self.check_store(attempt_id, self.store.requeue_draft(&draft));
            }
        }

        let (dead, retry): (Vec<_>, Vec<_>) = events
            .into_iter()
            .map(|mut event| {
                event.attempts = event.attempts.saturating_add(charge);
                event
            })
            .partition(|event| permanent || event.attempts >= max);

        for event in &dead {
            abandoned += 1;
            self.check_store(
                attempt_id,
                self.store.abandon(
                    attempt_id,
                    RecordKind::Event,
                    event,
                    &reason,
                    abandoned_at,
                ),
            );
        }
        if !retry.is_empty() {
            self.check_store(attempt_id, self.store.requeue_events(&retry));
        }

        if abandoned > 0 {
            report.records_abandoned += abandoned;
            warn!(
                "abandoned {} record(s) for {} after replay failure",
                abandoned, attempt_id
            );
            self.notify(SyncNotice::Abandoned {
                attempt_id: attempt_id.to_string(),
                records: abandoned,
                reason,
            });
        }
    }

    fn check_store(&self, attempt_id: &str, result: QueueResult<()>) {
        if let Err(e) = result {
            error!("cannot write back records for {}: {}", attempt_id, e);
            self.notify(SyncNotice::StorageFailure {
                attempt_id: Some(attempt_id.to_string()),
                message: e.to_string(),
            });
        }
    }

    fn notify(&self, notice: SyncNotice) {
        if self.notices.send(notice).is_err() {
            debug!("no subscribers for sync notice");
        }
    }

    fn run_state(&self) -> MutexGuard<'_, RunState> {
        self.run.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn listener_slot(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.listener.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl Drop for SyncOrchestrator {
    fn drop(&mut self) {
        if let Some(handle) = self.listener_slot().take() {
            handle.abort();
        }
    }
}

#[cfg(test)]
#[path = "orchestrator_tests.rs"]
mod tests;
