// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use serde::Serialize;

use crate::cli::OutputFormat;
use crate::error::Result;
use crate::queue::{DeadLetter, PendingCounts, QueueStore};

use super::print_json;

#[derive(Serialize)]
struct PendingOutput {
    counts: PendingCounts,
    attempts: Vec<String>,
    dead_letters: Vec<DeadLetter>,
}

pub fn run(store: &QueueStore, output: OutputFormat) -> Result<()> {
    let pending = PendingOutput {
        counts: store.pending_counts()?,
        attempts: store.pending_attempts()?,
        dead_letters: store.dead_letters()?,
    };
    match output {
        OutputFormat::Json => print_json(&pending),
        OutputFormat::Text => {
            print!("{}", format_pending(&pending));
            Ok(())
        }
    }
}

/// Drop the dead letters of one attempt once the user has dealt with them.
pub fn discard(store: &QueueStore, attempt: &str) -> Result<()> {
    let removed = store.clear_dead_letters(attempt)?;
    println!("discarded {} dead letter(s) for {}", removed, attempt);
    Ok(())
}

fn format_pending(pending: &PendingOutput) -> String {
    let counts = &pending.counts;
    if counts.drafts == 0 && counts.events == 0 && counts.dead_letters == 0 {
        return "nothing pending\n".to_string();
    }
    let mut out = format!(
        "{} draft(s), {} event(s) queued",
        counts.drafts, counts.events
    );
    if !pending.attempts.is_empty() {
        out.push_str(&format!(" for {}", pending.attempts.join(", ")));
    }
    out.push('\n');
    for letter in &pending.dead_letters {
        out.push_str(&format!(
            "abandoned {} {} at {}: {}\n",
            letter.attempt_id,
            letter.kind.as_str(),
            letter.abandoned_at.format("%Y-%m-%d %H:%M:%S"),
            letter.reason
        ));
    }
    out
}

#[cfg(test)]
#[path = "pending_tests.rs"]
mod tests;
