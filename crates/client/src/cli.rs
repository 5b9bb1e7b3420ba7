// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};

use qr_core::{EventType, TaskKey};

/// Output format for commands supporting structured output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

const QUICKSTART_HELP: &str = "\
Get started:
  quire save --attempt A1 --task2 essay.txt   Save a draft (queued if offline)
  quire pending                               Show what is waiting to replay
  quire sync                                  Replay queued drafts and events
  quire diff old.txt new.txt                  Compare two versions of an essay";

#[derive(Parser)]
#[command(name = "quire")]
#[command(about = "Offline-resilient draft autosave for timed writing exams")]
#[command(version)]
#[command(after_help = QUICKSTART_HELP)]
pub struct Cli {
    /// Config file (default: <config dir>/quire/config.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Save a draft snapshot for an attempt
    #[command(after_help = "Examples:\n  \
        quire save --attempt A1 --task2 essay.txt\n  \
        quire save --attempt A1 --task1 letter.txt --task2 essay.txt --active task2 --elapsed 900")]
    Save {
        /// Attempt id
        #[arg(long)]
        attempt: String,

        /// File holding the task 1 response
        #[arg(long)]
        task1: Option<PathBuf>,

        /// File holding the task 2 response
        #[arg(long)]
        task2: Option<PathBuf>,

        /// Task the learner is working on
        #[arg(long)]
        active: Option<TaskKey>,

        /// Seconds elapsed in the attempt
        #[arg(long)]
        elapsed: Option<u64>,

        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Record an exam event (focus, blur, typing)
    Event {
        #[arg(long)]
        attempt: String,

        /// Event type
        #[arg(long)]
        kind: EventType,

        /// JSON payload
        #[arg(long)]
        payload: Option<String>,
    },

    /// Replay queued drafts and events now
    Sync {
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Show queued records and dead letters
    Pending {
        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Load the draft to resume from
    Load {
        #[arg(long)]
        attempt: String,

        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },

    /// Drop dead letters for an attempt
    Discard {
        #[arg(long)]
        attempt: String,
    },

    /// Sentence-level diff between two versions of a text
    Diff {
        previous: PathBuf,
        current: PathBuf,

        #[arg(long, value_enum, default_value_t)]
        output: OutputFormat,
    },
}

#[cfg(test)]
#[path = "cli_tests.rs"]
mod tests;
