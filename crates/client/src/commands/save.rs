// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::PathBuf;

use serde::Serialize;

use qr_core::{DraftSnapshot, SaveAcknowledgement, TaskKey};

use crate::autosave::SaveState;
use crate::cli::OutputFormat;
use crate::error::{Error, Result};

use super::{print_json, Engine};

#[derive(Serialize)]
struct SaveOutput<'a> {
    attempt_id: &'a str,
    state: SaveState,
    ack: &'a SaveAcknowledgement,
}

/// Inputs of `quire save`.
pub struct SaveArgs {
    pub attempt: String,
    pub task1: Option<PathBuf>,
    pub task2: Option<PathBuf>,
    pub active: Option<TaskKey>,
    pub elapsed: Option<u64>,
}

pub async fn run(engine: &Engine, args: SaveArgs, output: OutputFormat) -> Result<()> {
    let snapshot = build_snapshot(args)?;
    let attempt_id = snapshot.attempt_id.clone();

    let result = engine.client.save_draft(snapshot).await;
    engine.settle().await;
    let ack = result?;
    let state = engine.client.state();

    match output {
        OutputFormat::Json => print_json(&SaveOutput {
            attempt_id: &attempt_id,
            state,
            ack: &ack,
        }),
        OutputFormat::Text => {
            println!("{}", describe(&attempt_id, state, &ack));
            Ok(())
        }
    }
}

pub(crate) fn build_snapshot(args: SaveArgs) -> Result<DraftSnapshot> {
    if args.task1.is_none() && args.task2.is_none() {
        return Err(Error::InvalidInput(
            "nothing to save\n  hint: pass --task1 and/or --task2 with a file".into(),
        ));
    }
    let mut snapshot = DraftSnapshot::new(args.attempt);
    for (task, path) in [(TaskKey::Task1, args.task1), (TaskKey::Task2, args.task2)] {
        if let Some(path) = path {
            snapshot = snapshot.with_task(task, fs::read_to_string(&path)?);
        }
    }
    if let Some(active) = args.active {
        snapshot = snapshot.with_active_task(active);
    }
    if let Some(elapsed) = args.elapsed {
        snapshot = snapshot.with_elapsed_seconds(elapsed);
    }
    Ok(snapshot)
}

fn describe(attempt_id: &str, state: SaveState, ack: &SaveAcknowledgement) -> String {
    match state {
        SaveState::Queued { revision } => {
            format!("queued {attempt_id} rev {revision} (offline, will replay)")
        }
        SaveState::Confirmed { revision } if ack.is_queued() => {
            format!("accepted {attempt_id} rev {revision} (deferred by server)")
        }
        SaveState::Confirmed { revision } => format!("saved {attempt_id} rev {revision}"),
        other => format!("{attempt_id}: {other:?}"),
    }
}

#[cfg(test)]
#[path = "save_tests.rs"]
mod tests;
