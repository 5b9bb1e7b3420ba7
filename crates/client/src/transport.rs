// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Transport abstraction for request/response calls to the save endpoint.
//!
//! Provides a trait-based transport layer that enables:
//! - Real WebSocket connections for production
//! - Mock transports for unit testing

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::Mutex;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;

use qr_core::protocol::{ClientMessage, ServerMessage};

/// Error type for transport operations.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// Connection failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// Connection closed unexpectedly.
    #[error("connection closed")]
    ConnectionClosed,

    /// Send failed.
    #[error("send failed: {0}")]
    SendFailed(String),

    /// Receive failed.
    #[error("receive failed: {0}")]
    ReceiveFailed(String),

    /// The outgoing request could not be serialized.
    #[error("could not encode request: {0}")]
    Encode(String),

    /// The server's reply could not be parsed.
    #[error("could not decode response: {0}")]
    Decode(String),

    /// No response within the request timeout.
    #[error("request timed out after {0:?}")]
    Timeout(Duration),
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;

/// Boxed future returned by [`Transport::request`].
pub type ResponseFuture<'a> = Pin<Box<dyn Future<Output = TransportResult<ServerMessage>> + Send + 'a>>;

/// Request/response transport to the save endpoint.
///
/// This trait abstracts over the actual transport mechanism, allowing
/// for easy testing with mock implementations. Implementations must be
/// shareable: the autosave client and the sync orchestrator call the same
/// transport.
pub trait Transport: Send + Sync {
    /// Send one request and wait for its response.
    fn request(&self, msg: ClientMessage) -> ResponseFuture<'_>;

    /// Check if a connection is currently established.
    fn is_connected(&self) -> bool;
}

type WsStream =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Internal WebSocket connection wrapper.
struct WebSocketConnection {
    sink: futures_util::stream::SplitSink<WsStream, Message>,
    stream: futures_util::stream::SplitStream<WsStream>,
}

impl WebSocketConnection {
    async fn exchange(&mut self, msg: &ClientMessage) -> TransportResult<ServerMessage> {
        let json = msg
            .to_json()
            .map_err(|e| TransportError::Encode(e.to_string()))?;

        self.sink
            .send(Message::Text(json.into()))
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        // Flush to ensure the data is actually sent and we detect connection failures
        self.sink
            .flush()
            .await
            .map_err(|e| TransportError::SendFailed(e.to_string()))?;

        loop {
            match self.stream.next().await {
                Some(Ok(Message::Text(text))) => {
                    return ServerMessage::from_json(&text)
                        .map_err(|e| TransportError::Decode(e.to_string()));
                }
                Some(Ok(Message::Close(_))) | None => {
                    return Err(TransportError::ConnectionClosed);
                }
                Some(Ok(_)) => {
                    // Ignore ping/pong and binary frames, keep waiting
                    continue;
                }
                Some(Err(e)) => {
                    return Err(TransportError::ReceiveFailed(e.to_string()));
                }
            }
        }
    }
}

/// WebSocket transport implementation using tokio-tungstenite.
///
/// Connects lazily on the first request and authenticates the connection
/// with the session token. A failed or timed-out request drops the
/// connection so the next request starts from a clean handshake.
pub struct WebSocketTransport {
    url: String,
    session_token: Option<String>,
    timeout: Duration,
    ws: Mutex<Option<WebSocketConnection>>,
    connected: AtomicBool,
}

impl WebSocketTransport {
    /// Create a new WebSocket transport.
    pub fn new(url: impl Into<String>, session_token: Option<String>, timeout: Duration) -> Self {
        WebSocketTransport {
            url: url.into(),
            session_token,
            timeout,
            ws: Mutex::new(None),
            connected: AtomicBool::new(false),
        }
    }

    /// Opens a connection and runs the authentication handshake.
    ///
    /// A rejected handshake is returned as the server's error message so the
    /// caller can classify it like any other response.
    async fn open(&self) -> TransportResult<Result<WebSocketConnection, ServerMessage>> {
        let (ws_stream, _) = tokio_tungstenite::connect_async(self.url.as_str())
            .await
            .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

        let (sink, stream) = ws_stream.split();
        let mut conn = WebSocketConnection { sink, stream };

        if let Some(token) = &self.session_token {
            match conn.exchange(&ClientMessage::authenticate(token)).await? {
                ServerMessage::Authenticated { user_id } => {
                    debug!("authenticated as {}", user_id);
                }
                other => return Ok(Err(other)),
            }
        }

        Ok(Ok(conn))
    }

    async fn exchange(&self, msg: ClientMessage) -> TransportResult<ServerMessage> {
        let mut guard = self.ws.lock().await;

        if guard.is_none() {
            match self.open().await? {
                Ok(conn) => {
                    *guard = Some(conn);
                    self.connected.store(true, Ordering::SeqCst);
                }
                Err(rejection) => return Ok(rejection),
            }
        }

        let conn = guard.as_mut().ok_or(TransportError::ConnectionClosed)?;
        match conn.exchange(&msg).await {
            Ok(response) => Ok(response),
            Err(e) => {
                // Connection is broken, clear it
                *guard = None;
                self.connected.store(false, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    async fn drop_connection(&self) {
        if let Some(mut conn) = self.ws.lock().await.take() {
            let _ = conn.sink.close().await;
        }
        self.connected.store(false, Ordering::SeqCst);
    }
}

impl Transport for WebSocketTransport {
    fn request(&self, msg: ClientMessage) -> ResponseFuture<'_> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.exchange(msg)).await {
                Ok(result) => result,
                Err(_) => {
                    // A late reply would pair with the next request
                    self.drop_connection().await;
                    Err(TransportError::Timeout(self.timeout))
                }
            }
        })
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "transport_tests.rs"]
pub(crate) mod tests;
