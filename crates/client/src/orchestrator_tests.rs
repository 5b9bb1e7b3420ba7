// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use super::*;
use crate::test_helpers::{make_draft, make_event};
use crate::transport::tests::{MockTransport, Scripted};
use qr_core::protocol::ErrorKind;
use std::time::Duration;

struct Harness {
    store: Arc<QueueStore>,
    transport: Arc<MockTransport>,
    orchestrator: Arc<SyncOrchestrator>,
}

fn harness_with(settings: OrchestratorSettings) -> Harness {
    let store = Arc::new(QueueStore::open_in_memory().unwrap());
    let transport = Arc::new(MockTransport::new());
    let dyn_transport: Arc<dyn Transport> = transport.clone();
    let orchestrator = Arc::new(SyncOrchestrator::new(
        Arc::clone(&store),
        dyn_transport,
        settings,
    ));
    Harness {
        store,
        transport,
        orchestrator,
    }
}

fn harness() -> Harness {
    harness_with(OrchestratorSettings::default())
}

fn completed(outcome: SyncOutcome) -> ReplayReport {
    match outcome {
        SyncOutcome::Completed(report) => report,
        other => panic!("expected completed replay, got {other:?}"),
    }
}

async fn next_notice(rx: &mut broadcast::Receiver<SyncNotice>) -> SyncNotice {
    tokio::time::timeout(Duration::from_secs(2), rx.recv())
        .await
        .expect("timed out waiting for notice")
        .unwrap()
}

#[tokio::test]
async fn replays_draft_then_events_in_order() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 2, "Queued text.")).unwrap();
    for occurred_at in [3, 1, 2] {
        h.store.put_event(&make_event("A1", occurred_at)).unwrap();
    }

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);

    assert_eq!(report.passes, 1);
    assert_eq!(report.drafts_delivered, 1);
    assert_eq!(report.events_delivered, 3);
    assert_eq!(h.transport.delivered_drafts(), vec![("A1".to_string(), 2)]);
    assert_eq!(h.transport.delivered_event_times(), vec![1, 2, 3]);
    assert!(!h.store.has_pending().unwrap());
}

#[tokio::test]
async fn empty_queue_completes_without_requests() {
    let h = harness();
    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(report, ReplayReport { passes: 1, ..Default::default() });
    assert!(h.transport.requests().is_empty());
}

#[tokio::test]
async fn offline_request_is_skipped() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "Text.")).unwrap();
    h.orchestrator.set_online(false);

    let outcome = h.orchestrator.request_sync(SyncReason::Queued).await;

    assert_eq!(outcome, SyncOutcome::Offline);
    assert!(h.transport.requests().is_empty());
    assert!(h.store.has_pending().unwrap());
}

#[tokio::test]
async fn concurrent_requests_coalesce_into_one_follow_up_pass() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "Text.")).unwrap();
    let gate = h.transport.hold();
    let entered = h.transport.entered();

    let first = h.orchestrator.spawn_sync(SyncReason::Manual);
    entered.notified().await;
    assert!(h.orchestrator.is_running());

    // Both land while the first pass is stuck in the transport.
    assert_eq!(
        h.orchestrator.request_sync(SyncReason::Queued).await,
        SyncOutcome::Coalesced
    );
    assert_eq!(
        h.orchestrator.request_sync(SyncReason::VisibilityRestored).await,
        SyncOutcome::Coalesced
    );

    gate.add_permits(100);
    let report = completed(first.await.unwrap());

    assert_eq!(report.passes, 2);
    assert_eq!(h.transport.requests().len(), 1);
    assert!(!h.orchestrator.is_running());
}

#[tokio::test]
async fn records_queued_during_replay_are_picked_up_by_follow_up_pass() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "First.")).unwrap();
    let gate = h.transport.hold();
    let entered = h.transport.entered();

    let first = h.orchestrator.spawn_sync(SyncReason::Manual);
    entered.notified().await;

    h.store.put_draft(&make_draft("B2", 1, "Second.")).unwrap();
    assert_eq!(
        h.orchestrator.request_sync(SyncReason::Queued).await,
        SyncOutcome::Coalesced
    );

    gate.add_permits(100);
    let report = completed(first.await.unwrap());

    assert_eq!(report.drafts_delivered, 2);
    assert_eq!(
        h.transport.delivered_drafts(),
        vec![("A1".to_string(), 1), ("B2".to_string(), 1)]
    );
}

#[tokio::test]
async fn failure_requeues_and_does_not_block_other_attempts() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.store.put_event(&make_event("A1", 5)).unwrap();
    h.store.put_draft(&make_draft("B2", 1, "B.")).unwrap();
    // Attempts replay in sorted order, so A1 takes the failure.
    h.transport.push_script(Scripted::Fail);

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);

    assert_eq!(report.attempts_failed, 1);
    assert_eq!(h.transport.delivered_drafts(), vec![("B2".to_string(), 1)]);
    assert_eq!(h.store.pending_attempts().unwrap(), vec!["A1"]);

    let taken = h.store.take_all_for_attempt("A1").unwrap();
    assert_eq!(taken.draft.unwrap().attempts, 1);
    assert_eq!(taken.events[0].attempts, 1);
}

#[tokio::test]
async fn failed_pass_waits_for_next_trigger() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.transport.set_offline(true);

    let _ = h.orchestrator.request_sync(SyncReason::Manual).await;
    let after_failure = h.transport.requests().len();
    tokio::time::sleep(Duration::from_millis(50)).await;

    assert_eq!(h.transport.requests().len(), after_failure);
    assert!(h.store.has_pending().unwrap());

    h.transport.set_offline(false);
    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(report.drafts_delivered, 1);
}

#[tokio::test]
async fn event_failure_keeps_remaining_events_in_order() {
    let h = harness();
    for occurred_at in [1, 2, 3] {
        h.store.put_event(&make_event("A1", occurred_at)).unwrap();
    }
    h.transport
        .push_script(Scripted::Respond(qr_core::ServerMessage::event_recorded(false)));
    h.transport.push_script(Scripted::Timeout);

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(report.events_delivered, 1);
    assert_eq!(h.transport.delivered_event_times(), vec![1]);

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(report.events_delivered, 2);
    assert_eq!(h.transport.delivered_event_times(), vec![1, 2, 3]);
    assert!(!h.store.has_pending().unwrap());
}

#[tokio::test]
async fn unauthenticated_rejection_stays_queued() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.transport.reject_next(ErrorKind::Unauthenticated);

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);

    assert_eq!(report.records_abandoned, 0);
    assert!(h.store.has_pending().unwrap());
    assert!(h.store.dead_letters().unwrap().is_empty());
}

#[tokio::test]
async fn permanent_rejection_abandons_attempt_and_notifies() {
    let h = harness();
    let mut notices = h.orchestrator.subscribe();
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.store.put_event(&make_event("A1", 1)).unwrap();
    h.transport.reject_next(ErrorKind::Forbidden);

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);

    assert_eq!(report.records_abandoned, 2);
    assert!(!h.store.has_pending().unwrap());
    let letters = h.store.dead_letters().unwrap();
    assert_eq!(letters.len(), 2);
    assert!(letters.iter().all(|l| l.reason.contains("forbidden")));

    match next_notice(&mut notices).await {
        SyncNotice::Abandoned {
            attempt_id,
            records,
            ..
        } => {
            assert_eq!(attempt_id, "A1");
            assert_eq!(records, 2);
        }
        other => panic!("unexpected notice: {other:?}"),
    }
}

#[tokio::test]
async fn transient_failures_abandon_after_max_attempts() {
    let h = harness_with(OrchestratorSettings {
        max_replay_attempts: 2,
        ..Default::default()
    });
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.transport.set_offline(true);

    let first = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(first.records_abandoned, 0);
    assert_eq!(h.store.peek_draft("A1").unwrap().unwrap().attempts, 1);

    let second = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(second.records_abandoned, 1);
    assert!(!h.store.has_pending().unwrap());
    assert_eq!(h.store.dead_letters().unwrap()[0].kind, RecordKind::Draft);
}

#[tokio::test]
async fn successful_replay_emits_replayed_notice() {
    let h = harness();
    let mut notices = h.orchestrator.subscribe();
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.store.put_event(&make_event("A1", 1)).unwrap();

    let _ = h.orchestrator.request_sync(SyncReason::Manual).await;

    assert_eq!(
        next_notice(&mut notices).await,
        SyncNotice::Replayed {
            attempt_id: "A1".to_string(),
            drafts: 1,
            events: 1,
        }
    );
}

#[tokio::test]
async fn init_replays_leftovers_from_previous_run() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 4, "Left over.")).unwrap();
    let mut notices = h.orchestrator.subscribe();
    let (_tx, rx) = mpsc::channel(8);

    h.orchestrator.init(rx, None);

    assert!(matches!(
        next_notice(&mut notices).await,
        SyncNotice::Replayed { .. }
    ));
    assert_eq!(h.transport.delivered_drafts(), vec![("A1".to_string(), 4)]);
}

#[tokio::test]
async fn connectivity_signals_gate_and_trigger_replay() {
    let h = harness();
    let mut notices = h.orchestrator.subscribe();
    let (tx, rx) = mpsc::channel(8);
    h.orchestrator.init(rx, None);

    tx.send(HostSignal::ConnectivityLost).await.unwrap();
    tokio::time::timeout(Duration::from_secs(2), async {
        while h.orchestrator.is_online() {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    h.store.put_draft(&make_draft("A1", 1, "Offline.")).unwrap();
    assert_eq!(
        h.orchestrator.request_sync(SyncReason::Queued).await,
        SyncOutcome::Offline
    );

    tx.send(HostSignal::ConnectivityRestored).await.unwrap();
    assert!(matches!(
        next_notice(&mut notices).await,
        SyncNotice::Replayed { .. }
    ));
    assert!(h.orchestrator.is_online());
    assert!(!h.store.has_pending().unwrap());
}

#[tokio::test]
async fn background_wake_only_for_registered_tag() {
    let h = harness();
    let mut notices = h.orchestrator.subscribe();
    let (tx, rx) = mpsc::channel(8);
    h.orchestrator.init(rx, None);
    h.store.put_draft(&make_draft("A1", 1, "Bg.")).unwrap();

    tx.send(HostSignal::BackgroundWake {
        tag: "someone-else".to_string(),
    })
    .await
    .unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(h.transport.requests().is_empty());

    tx.send(HostSignal::BackgroundWake {
        tag: DEFAULT_SYNC_TAG.to_string(),
    })
    .await
    .unwrap();
    assert!(matches!(
        next_notice(&mut notices).await,
        SyncNotice::Replayed { .. }
    ));
}

struct RecordingRegistrar {
    tags: std::sync::Mutex<Vec<String>>,
    fail: bool,
}

impl WakeRegistrar for RecordingRegistrar {
    fn register(&self, tag: &str) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.tags.lock().unwrap().push(tag.to_string());
        if self.fail {
            return Err("background sync unsupported".into());
        }
        Ok(())
    }
}

#[tokio::test]
async fn init_registers_wake_tag_best_effort() {
    let h = harness();
    let registrar = RecordingRegistrar {
        tags: std::sync::Mutex::new(Vec::new()),
        fail: true,
    };
    let (tx, rx) = mpsc::channel(8);

    h.orchestrator.init(rx, Some(&registrar));

    assert_eq!(*registrar.tags.lock().unwrap(), vec![DEFAULT_SYNC_TAG]);
    // Registration failure leaves the signal path working.
    h.store.put_draft(&make_draft("A1", 1, "Still syncs.")).unwrap();
    let mut notices = h.orchestrator.subscribe();
    tx.send(HostSignal::VisibilityRestored).await.unwrap();
    assert!(matches!(
        next_notice(&mut notices).await,
        SyncNotice::Replayed { .. }
    ));
}

#[tokio::test]
async fn reset_stops_listening() {
    let h = harness();
    let (tx, rx) = mpsc::channel(8);
    h.orchestrator.init(rx, None);

    h.orchestrator.reset();

    tokio::time::timeout(Duration::from_secs(2), tx.closed())
        .await
        .expect("listener should drop its receiver");
    assert!(h.orchestrator.is_online());
    assert!(!h.orchestrator.is_running());
}

#[tokio::test]
async fn queued_pass_failure_keeps_retry_budget() {
    let h = harness_with(OrchestratorSettings {
        max_replay_attempts: 1,
        ..Default::default()
    });
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    h.transport.set_offline(true);

    let report = completed(h.orchestrator.request_sync(SyncReason::Queued).await);

    assert_eq!(report.attempts_failed, 1);
    assert_eq!(report.records_abandoned, 0);
    assert_eq!(h.store.peek_draft("A1").unwrap().unwrap().attempts, 0);

    let report = completed(h.orchestrator.request_sync(SyncReason::Manual).await);
    assert_eq!(report.records_abandoned, 1);
    assert!(!h.store.has_pending().unwrap());
}

#[tokio::test]
async fn queued_pass_still_abandons_permanent_rejection() {
    let h = harness();
    h.store.put_event(&make_event("A1", 1)).unwrap();
    h.transport.reject_next(ErrorKind::NotFound);

    let report = completed(h.orchestrator.request_sync(SyncReason::Queued).await);

    assert_eq!(report.records_abandoned, 1);
    assert!(!h.store.has_pending().unwrap());
}

#[tokio::test]
async fn follow_up_pass_charges_when_any_trigger_does() {
    let h = harness();
    h.store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    let gate = h.transport.hold();
    let entered = h.transport.entered();

    let first = h.orchestrator.spawn_sync(SyncReason::Manual);
    entered.notified().await;

    h.store.put_draft(&make_draft("B2", 1, "B.")).unwrap();
    h.transport
        .push_script(Scripted::Respond(qr_core::ServerMessage::saved(
            qr_core::SaveAcknowledgement::confirmed(qr_core::clock::ms_to_utc(1)),
        )));
    h.transport.push_script(Scripted::Fail);
    let _ = h.orchestrator.request_sync(SyncReason::VisibilityRestored).await;
    let _ = h.orchestrator.request_sync(SyncReason::Queued).await;

    gate.add_permits(100);
    let report = completed(first.await.unwrap());

    assert_eq!(report.passes, 2);
    assert_eq!(h.transport.delivered_drafts(), vec![("A1".to_string(), 1)]);
    assert_eq!(h.store.peek_draft("B2").unwrap().unwrap().attempts, 1);
}

#[tokio::test]
async fn dead_letters_are_stamped_with_orchestrator_clock() {
    let store = Arc::new(QueueStore::open_in_memory().unwrap());
    let transport = Arc::new(MockTransport::new());
    let orchestrator = SyncOrchestrator::new(
        Arc::clone(&store),
        transport.clone(),
        OrchestratorSettings::default(),
    )
    .with_clock(Arc::new(qr_core::ManualClock::new(7_000)));
    store.put_draft(&make_draft("A1", 1, "A.")).unwrap();
    transport.reject_next(ErrorKind::Forbidden);

    let _ = orchestrator.request_sync(SyncReason::Manual).await;

    let letters = store.dead_letters().unwrap();
    assert_eq!(letters.len(), 1);
    assert_eq!(letters[0].abandoned_at, qr_core::clock::ms_to_utc(7_000));
}
