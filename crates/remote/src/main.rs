// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! qr-remote: draft save endpoint for quire clients.
//!
//! Authenticates WebSocket connections against a session table, writes
//! throttled draft snapshots per task and records exam telemetry.

mod error;
mod server;
mod session;
mod state;
mod store;

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use clap::Parser;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use session::{parse_pair, StaticSessions};
use state::ServerState;

/// qr-remote: Draft autosave endpoint
#[derive(Parser, Debug)]
#[command(name = "qr-remote")]
#[command(about = "WebSocket save endpoint for quire exam drafts")]
struct Args {
    /// Address to bind the server to
    #[arg(short, long, default_value = "0.0.0.0:7890")]
    bind: SocketAddr,

    /// Directory for the attempt database
    #[arg(short, long, default_value = ".")]
    data: PathBuf,

    /// Minimum spacing between persisted draft writes per attempt
    #[arg(long, default_value_t = state::DEFAULT_MIN_SAVE_INTERVAL_MS)]
    min_save_interval_ms: u64,

    /// Accept a session token for a user (TOKEN=USER, repeatable)
    #[arg(long = "session", value_parser = parse_pair)]
    sessions: Vec<(String, String)>,

    /// Create a draft attempt owned by a user if missing (ID=USER, repeatable)
    #[arg(long = "attempt", value_parser = parse_pair)]
    attempts: Vec<(String, String)>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    let subscriber = FmtSubscriber::builder().with_max_level(level).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    info!("Starting qr-remote server");
    info!("  Bind address: {}", args.bind);
    info!("  Data directory: {}", args.data.display());
    info!("  Minimum save interval: {}ms", args.min_save_interval_ms);

    let sessions: StaticSessions = args.sessions.into_iter().collect();
    if sessions.is_empty() {
        warn!("no sessions configured; every request will be unauthenticated");
    } else {
        info!("  Sessions: {}", sessions.len());
    }

    let state = ServerState::open(
        &args.data,
        sessions,
        Duration::from_millis(args.min_save_interval_ms),
    )?;

    for (attempt_id, user_id) in &args.attempts {
        let created = state
            .with_store(|store| store.create_attempt(attempt_id, user_id, Utc::now()))
            .await?;
        if created {
            info!("  Seeded attempt {} for {}", attempt_id, user_id);
        }
    }

    server::run(args.bind, state).await?;

    Ok(())
}
