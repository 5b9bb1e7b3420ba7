// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket server implementation.
//!
//! Each connection is bound to at most one user through `Authenticate`.
//! Every text frame gets exactly one reply.

use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, error, info, warn};

use qr_core::protocol::{ClientMessage, ErrorKind, ServerMessage};

use crate::state::{IncomingEvent, ServerState};

/// Per-connection session.
#[derive(Debug, Default)]
pub(crate) struct Connection {
    user_id: Option<String>,
}

impl Connection {
    fn user(&self) -> Result<&str, ServerMessage> {
        self.user_id
            .as_deref()
            .ok_or_else(|| ServerMessage::error(ErrorKind::Unauthenticated, "authenticate first"))
    }
}

/// Run the WebSocket server on the given address.
pub async fn run(addr: SocketAddr, state: ServerState) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    info!("Listening on: {}", addr);
    serve(listener, state).await?;
    Ok(())
}

/// Accept connections on a bound listener until it fails.
pub(crate) async fn serve(listener: TcpListener, state: ServerState) -> std::io::Result<()> {
    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let state = state.clone();

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, peer_addr, state).await {
                error!("Connection error from {}: {}", peer_addr, e);
            }
        });
    }
}

/// Handle a single WebSocket connection.
pub(crate) async fn handle_connection(
    stream: TcpStream,
    peer_addr: SocketAddr,
    state: ServerState,
) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    debug!("New WebSocket connection from: {}", peer_addr);

    let (mut ws_sink, mut ws_stream) = ws_stream.split();
    let mut conn = Connection::default();

    while let Some(msg) = ws_stream.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                let response = handle_client_message(&text, &state, &mut conn).await;
                let json = response.to_json()?;
                ws_sink.send(Message::Text(json.into())).await?;
            }
            Ok(Message::Close(_)) => {
                debug!("Client {} disconnected", peer_addr);
                break;
            }
            Ok(Message::Ping(data)) => {
                ws_sink.send(Message::Pong(data)).await?;
            }
            Ok(_) => {
                // Binary, Pong and raw frames carry nothing for us
            }
            Err(e) => {
                warn!("WebSocket error from {}: {}", peer_addr, e);
                break;
            }
        }
    }

    debug!("Connection closed: {}", peer_addr);
    Ok(())
}

/// Process one client message and build its reply.
pub(crate) async fn handle_client_message(
    text: &str,
    state: &ServerState,
    conn: &mut Connection,
) -> ServerMessage {
    let msg = match ClientMessage::from_json(text) {
        Ok(msg) => msg,
        Err(e) => {
            debug!("Malformed message: {}", e);
            return ServerMessage::error(ErrorKind::InvalidRequest, format!("malformed message: {e}"));
        }
    };

    match msg {
        ClientMessage::Ping { id } => ServerMessage::pong(id),

        ClientMessage::Authenticate { token } => match state.authenticate(&token) {
            Some(user_id) => {
                debug!("Connection authenticated as {}", user_id);
                conn.user_id = Some(user_id.clone());
                ServerMessage::authenticated(user_id)
            }
            None => {
                conn.user_id = None;
                ServerMessage::error(ErrorKind::Unauthenticated, "invalid session token")
            }
        },

        ClientMessage::SaveDraft { snapshot } => match conn.user() {
            Ok(user_id) => state.save_draft(user_id, snapshot).await,
            Err(reply) => reply,
        },

        ClientMessage::LoadDraft { attempt_id } => match conn.user() {
            Ok(user_id) => state.load_draft(user_id, &attempt_id).await,
            Err(reply) => reply,
        },

        ClientMessage::RecordEvent {
            attempt_id,
            event,
            payload,
            occurred_at,
            offline_id,
        } => match conn.user() {
            Ok(user_id) => {
                let event = IncomingEvent {
                    attempt_id,
                    event_type: event,
                    payload,
                    occurred_at,
                    offline_id,
                };
                state.record_event(user_id, event).await
            }
            Err(reply) => reply,
        },
    }
}

#[cfg(test)]
#[path = "server_tests.rs"]
mod tests;
