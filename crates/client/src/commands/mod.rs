// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

pub mod diff;
pub mod event;
pub mod load;
pub mod pending;
pub mod save;
pub mod sync;

use std::sync::Arc;

use tracing::warn;

use qr_core::{ClockSource, SystemClock};

use crate::autosave::AutosaveClient;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::orchestrator::SyncOrchestrator;
use crate::queue::QueueStore;
use crate::transport::{Transport, WebSocketTransport};

/// Everything a command needs, wired from the config.
pub struct Engine {
    pub store: Option<Arc<QueueStore>>,
    pub orchestrator: Option<Arc<SyncOrchestrator>>,
    pub client: AutosaveClient,
}

impl Engine {
    /// Wire the engine. An unusable queue database degrades to network-only
    /// saves instead of failing the command.
    pub fn open(config: &Config) -> Self {
        let transport: Arc<dyn Transport> = Arc::new(WebSocketTransport::new(
            config.server_url.clone(),
            config.session_token.clone(),
            config.request_timeout(),
        ));
        let clock: Arc<dyn ClockSource> = Arc::new(SystemClock);
        let client = AutosaveClient::new(Arc::clone(&transport), Arc::clone(&clock));

        match QueueStore::open(&config.queue_path()) {
            Ok(store) => {
                let store = Arc::new(store);
                let orchestrator = Arc::new(
                    SyncOrchestrator::new(
                        Arc::clone(&store),
                        transport,
                        config.orchestrator_settings(),
                    )
                    .with_clock(clock),
                );
                let client = client.with_offline(Arc::clone(&store), Arc::clone(&orchestrator));
                Engine {
                    store: Some(store),
                    orchestrator: Some(orchestrator),
                    client,
                }
            }
            Err(e) => {
                warn!("offline queue unavailable, saving network-only: {}", e);
                Engine {
                    store: None,
                    orchestrator: None,
                    client,
                }
            }
        }
    }

    pub fn store(&self) -> Result<&QueueStore> {
        self.store
            .as_deref()
            .ok_or_else(|| Error::Config("offline queue is unavailable".into()))
    }

    pub fn orchestrator(&self) -> Result<&Arc<SyncOrchestrator>> {
        self.orchestrator
            .as_ref()
            .ok_or_else(|| Error::Config("offline queue is unavailable".into()))
    }

    /// Let a replay started by the last command run to completion so no
    /// taken records are dropped on exit.
    pub async fn settle(&self) {
        if let Some(orchestrator) = &self.orchestrator {
            tokio::task::yield_now().await;
            orchestrator.settled().await;
        }
    }
}

/// Print a value as pretty JSON.
pub(crate) fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
