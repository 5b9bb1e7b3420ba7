// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use qr_core::DraftSnapshot;

use crate::cli::OutputFormat;
use crate::error::Result;

use super::{print_json, Engine};

pub async fn run(engine: &Engine, attempt: &str, output: OutputFormat) -> Result<()> {
    let draft = engine.client.load_draft(attempt).await?;
    match output {
        OutputFormat::Json => print_json(&draft),
        OutputFormat::Text => {
            match draft {
                Some(draft) => print!("{}", format_draft(&draft)),
                None => println!("no draft saved for {}", attempt),
            }
            Ok(())
        }
    }
}

pub(crate) fn format_draft(draft: &DraftSnapshot) -> String {
    let mut out = format!("{} rev {}", draft.attempt_id, draft.revision);
    if let Some(active) = draft.active_task {
        out.push_str(&format!(", active {}", active));
    }
    if let Some(elapsed) = draft.elapsed_seconds {
        out.push_str(&format!(", {}s elapsed", elapsed));
    }
    out.push('\n');
    for (task, snapshot) in &draft.tasks {
        out.push_str(&format!(
            "\n[{}] {} words\n{}\n",
            task, snapshot.word_count, snapshot.content
        ));
    }
    out
}

#[cfg(test)]
#[path = "load_tests.rs"]
mod tests;
