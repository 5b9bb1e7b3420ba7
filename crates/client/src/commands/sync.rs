// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::orchestrator::{ReplayReport, SyncOutcome, SyncReason};

use super::{print_json, Engine};

#[derive(Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
enum SyncOutput {
    Completed {
        #[serde(flatten)]
        report: ReplayReport,
    },
    Coalesced,
    Offline,
}

pub async fn run(engine: &Engine, output: OutputFormat) -> Result<()> {
    let orchestrator = engine.orchestrator()?;
    let mut notices = orchestrator.subscribe();

    let outcome = orchestrator.request_sync(SyncReason::Manual).await;
    engine.settle().await;

    while let Ok(notice) = notices.try_recv() {
        tracing::info!("{:?}", notice);
    }

    match output {
        OutputFormat::Json => print_json(&match outcome {
            SyncOutcome::Completed(report) => SyncOutput::Completed { report },
            SyncOutcome::Coalesced => SyncOutput::Coalesced,
            SyncOutcome::Offline => SyncOutput::Offline,
        }),
        OutputFormat::Text => {
            println!("{}", describe(outcome));
            Ok(())
        }
    }
}

pub(crate) fn describe(outcome: SyncOutcome) -> String {
    match outcome {
        SyncOutcome::Completed(report) => {
            let mut line = format!(
                "replayed {} draft(s) and {} event(s)",
                report.drafts_delivered, report.events_delivered
            );
            if report.attempts_failed > 0 {
                line.push_str(&format!(
                    ", {} attempt(s) failed and stay queued",
                    report.attempts_failed
                ));
            }
            if report.records_abandoned > 0 {
                line.push_str(&format!(
                    ", {} record(s) abandoned (see `quire pending`)",
                    report.records_abandoned
                ));
            }
            line
        }
        SyncOutcome::Coalesced => "a replay is already running".to_string(),
        SyncOutcome::Offline => "offline, nothing replayed".to_string(),
    }
}

#[cfg(test)]
#[path = "sync_tests.rs"]
mod tests;
