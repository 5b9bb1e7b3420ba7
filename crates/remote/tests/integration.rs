// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Integration tests for the qr-remote server binary.

#![allow(clippy::panic)]
#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

use std::process::{Child, Command, Stdio};
use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;

use qr_core::protocol::{ClientMessage, ServerMessage};
use qr_core::{DraftSnapshot, SystemClock, TaskKey};
use quire::{AutosaveClient, WebSocketTransport};

/// Helper to spawn a server process and clean it up on drop.
struct ServerProcess {
    child: Child,
    port: u16,
    _temp_dir: tempfile::TempDir,
}

impl ServerProcess {
    fn spawn(offset: u16) -> Self {
        let temp_dir = tempfile::tempdir().expect("create temp dir");

        // High ephemeral range, distinct per test in this binary
        let port = 49152 + (std::process::id() % 1000) as u16 * 2 + offset;

        let child = Command::new(env!("CARGO_BIN_EXE_qr-remote"))
            .arg("--bind")
            .arg(format!("127.0.0.1:{}", port))
            .arg("--data")
            .arg(temp_dir.path())
            .args(["--session", "tok-1=u1"])
            .args(["--attempt", "A1=u1"])
            .args(["--min-save-interval-ms", "0"])
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .spawn()
            .expect("spawn server process");

        ServerProcess {
            child,
            port,
            _temp_dir: temp_dir,
        }
    }

    fn ws_url(&self) -> String {
        format!("ws://127.0.0.1:{}", self.port)
    }

    /// Wait until the server accepts connections.
    async fn wait_ready(&self) {
        // CI runners can be slow, so we use generous timeouts
        for _ in 0..20 {
            if let Ok(Ok(_)) =
                tokio::time::timeout(Duration::from_millis(500), connect_async(&self.ws_url()))
                    .await
            {
                return;
            }
            tokio::time::sleep(Duration::from_millis(200)).await;
        }
        panic!("server did not start within retries");
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        let _ = self.child.kill();
        let _ = self.child.wait();
    }
}

#[tokio::test]
async fn test_server_lifecycle() {
    let server = ServerProcess::spawn(0);
    server.wait_ready().await;

    let (mut ws, _) = connect_async(&server.ws_url()).await.unwrap();
    let ping = ClientMessage::ping(42);
    ws.send(Message::Text(ping.to_json().unwrap().into()))
        .await
        .unwrap();

    match tokio::time::timeout(Duration::from_secs(5), ws.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => {
            let response = ServerMessage::from_json(&text).unwrap();
            assert_eq!(response, ServerMessage::Pong { id: 42 });
        }
        other => panic!("expected pong, got {other:?}"),
    }
}

#[tokio::test]
async fn test_seeded_attempt_accepts_client_saves() {
    let server = ServerProcess::spawn(1);
    server.wait_ready().await;

    let transport = Arc::new(WebSocketTransport::new(
        server.ws_url(),
        Some("tok-1".to_string()),
        Duration::from_secs(5),
    ));
    let client = AutosaveClient::new(transport, Arc::new(SystemClock));

    let snapshot = DraftSnapshot::new("A1").with_task(TaskKey::Task1, "The chart shows growth.");
    let ack = client.save_draft(snapshot).await.unwrap();
    assert!(ack.ok);
    assert!(!ack.is_queued());

    let draft = client.load_draft("A1").await.unwrap().unwrap();
    assert_eq!(draft.tasks[&TaskKey::Task1].content, "The chart shows growth.");
    assert_eq!(draft.tasks[&TaskKey::Task1].word_count, 4);
}
