// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! quire - offline-resilient draft autosave client.
//!
//! Saves go to the server first. When the server cannot be reached the
//! snapshot or event is written to a local SQLite queue and replayed later,
//! one attempt at a time, when the host reports that delivery is possible.
//!
//! # Main Components
//!
//! - [`AutosaveClient`] - network-first save path with durable fallback
//! - [`QueueStore`] - SQLite queue of pending drafts, events and dead letters
//! - [`SyncOrchestrator`] - single-flight replay driven by host signals
//! - [`Transport`] - request/response channel to the save server
//! - [`Config`] - TOML client configuration
//!
//! ```rust,ignore
//! let store = Arc::new(QueueStore::open(&config.queue_path())?);
//! let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new(
//!     config.server_url.clone(),
//!     config.session_token.clone(),
//!     config.request_timeout(),
//! ));
//! let orchestrator = Arc::new(SyncOrchestrator::new(
//!     Arc::clone(&store),
//!     Arc::clone(&transport),
//!     config.orchestrator_settings(),
//! ));
//! orchestrator.init(host_signals, None);
//!
//! let client = AutosaveClient::new(transport, Arc::new(SystemClock))
//!     .with_offline(store, orchestrator);
//! let ack = client.save_draft(snapshot).await?;
//! ```

mod cli;
mod commands;

pub mod autosave;
pub mod config;
pub mod delivery;
pub mod error;
pub mod id;
pub mod orchestrator;
pub mod queue;
pub mod transport;

#[cfg(test)]
mod test_helpers;

pub use autosave::{AutosaveClient, AutosaveError, Durability, EventReceipt, SaveState};
pub use cli::{Cli, Command, OutputFormat};
pub use config::Config;
pub use delivery::{DeliveryError, FailureClass};
pub use error::{Error, Result};
pub use orchestrator::{
    HostSignal, OrchestratorSettings, ReplayReport, SyncNotice, SyncOrchestrator, SyncOutcome,
    SyncReason, WakeRegistrar,
};
pub use queue::{QueueError, QueueStore};
pub use transport::{Transport, TransportError, WebSocketTransport};

use commands::Engine;

/// Execute a CLI command against the configured server and queue.
pub async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        // Purely local; needs neither config nor a queue.
        Command::Diff {
            previous,
            current,
            output,
        } => commands::diff::run(&previous, &current, output),
        command => {
            let config_path = cli.config.unwrap_or_else(config::default_config_path);
            let config = Config::load_or_default(&config_path)?;
            run_with_engine(&Engine::open(&config), command).await
        }
    }
}

async fn run_with_engine(engine: &Engine, command: Command) -> Result<()> {
    match command {
        Command::Save {
            attempt,
            task1,
            task2,
            active,
            elapsed,
            output,
        } => {
            let args = commands::save::SaveArgs {
                attempt,
                task1,
                task2,
                active,
                elapsed,
            };
            commands::save::run(engine, args, output).await
        }
        Command::Event {
            attempt,
            kind,
            payload,
        } => commands::event::run(engine, &attempt, kind, payload.as_deref()).await,
        Command::Sync { output } => commands::sync::run(engine, output).await,
        Command::Pending { output } => commands::pending::run(engine.store()?, output),
        Command::Load { attempt, output } => commands::load::run(engine, &attempt, output).await,
        Command::Discard { attempt } => commands::pending::discard(engine.store()?, &attempt),
        Command::Diff {
            previous,
            current,
            output,
        } => commands::diff::run(&previous, &current, output),
    }
}
