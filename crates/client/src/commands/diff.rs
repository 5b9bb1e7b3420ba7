// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::fs;
use std::path::Path;

use serde::Serialize;

use qr_core::{diff_sentences, ChangeKind, DiffChunk, DiffSummary};

use crate::cli::OutputFormat;
use crate::error::Result;

use super::print_json;

#[derive(Serialize)]
struct DiffOutput {
    chunks: Option<Vec<DiffChunk>>,
    summary: Option<DiffSummary>,
}

pub fn run(previous: &Path, current: &Path, output: OutputFormat) -> Result<()> {
    let previous = fs::read_to_string(previous)?;
    let current = fs::read_to_string(current)?;
    let chunks = diff_sentences(&previous, &current);

    match output {
        OutputFormat::Json => print_json(&DiffOutput {
            summary: chunks.as_deref().map(DiffSummary::from_chunks),
            chunks,
        }),
        OutputFormat::Text => {
            print!("{}", format_diff(chunks.as_deref()));
            Ok(())
        }
    }
}

/// Render chunks one sentence per line with `+`/`-` markers.
pub(crate) fn format_diff(chunks: Option<&[DiffChunk]>) -> String {
    let Some(chunks) = chunks else {
        return "no previous version to compare against\n".to_string();
    };
    let mut out = String::new();
    for chunk in chunks {
        let marker = match chunk.kind {
            ChangeKind::Same => ' ',
            ChangeKind::Added => '+',
            ChangeKind::Removed => '-',
        };
        out.push_str(&format!("{} {}\n", marker, chunk.value));
    }
    let summary = DiffSummary::from_chunks(chunks);
    out.push_str(&format!(
        "\n{} unchanged, {} added, {} removed\n",
        summary.same, summary.added, summary.removed
    ));
    out
}

#[cfg(test)]
#[path = "diff_tests.rs"]
mod tests;
