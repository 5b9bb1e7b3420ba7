// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! WebSocket protocol messages for client-server communication.
//!
//! Every client request receives exactly one response:
//! - `SaveDraft` → `Saved`
//! - `LoadDraft` → `Draft`
//! - `RecordEvent` → `EventRecorded`
//! - `Authenticate` → `Authenticated`
//! - `Ping` → `Pong`
//!
//! Any request may instead be answered with `Error`.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::draft::{DraftSnapshot, EventType, SaveAcknowledgement};
use crate::error::Error;

/// Messages sent from client to server.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// Bind the connection to a user session.
    Authenticate { token: String },

    /// Persist the latest draft of an attempt.
    SaveDraft { snapshot: DraftSnapshot },

    /// Fetch the stored draft of an attempt.
    LoadDraft { attempt_id: String },

    /// Append an exam telemetry event.
    RecordEvent {
        attempt_id: String,
        event: EventType,
        #[serde(default)]
        payload: serde_json::Value,
        /// Emission time in milliseconds since Unix epoch.
        occurred_at: i64,
        /// Client-generated id; replays with the same id are ignored.
        offline_id: String,
    },

    /// Ping message for keepalive.
    Ping {
        /// Client-chosen ID echoed in Pong.
        id: u64,
    },
}

/// Messages sent from server to client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerMessage {
    /// Response to Authenticate.
    Authenticated { user_id: String },

    /// Response to SaveDraft.
    ///
    /// `queued: true` means accepted without writing (throttled, or the
    /// attempt no longer accepts writes). Neither case is an error.
    Saved(SaveAcknowledgement),

    /// Response to LoadDraft.
    Draft {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        draft: Option<DraftSnapshot>,
    },

    /// Response to RecordEvent.
    EventRecorded {
        ok: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queued: Option<bool>,
    },

    /// Pong response to client Ping.
    Pong {
        /// Echoed from the Ping message.
        id: u64,
    },

    /// Error message.
    Error {
        kind: ErrorKind,
        /// Human-readable error description.
        message: String,
    },
}

/// Categories of request failure reported by the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// No session bound to the connection, or the session was rejected.
    Unauthenticated,
    /// The attempt belongs to another user.
    Forbidden,
    /// The attempt does not exist.
    NotFound,
    /// The request could not be parsed or failed validation.
    InvalidRequest,
    /// The server failed while handling a valid request.
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Unauthenticated => "unauthenticated",
            ErrorKind::Forbidden => "forbidden",
            ErrorKind::NotFound => "not_found",
            ErrorKind::InvalidRequest => "invalid_request",
            ErrorKind::Internal => "internal",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ErrorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Error> {
        match s {
            "unauthenticated" => Ok(ErrorKind::Unauthenticated),
            "forbidden" => Ok(ErrorKind::Forbidden),
            "not_found" => Ok(ErrorKind::NotFound),
            "invalid_request" => Ok(ErrorKind::InvalidRequest),
            "internal" => Ok(ErrorKind::Internal),
            _ => Err(Error::InvalidErrorKind(s.to_string())),
        }
    }
}

impl ClientMessage {
    /// Creates an Authenticate message.
    pub fn authenticate(token: impl Into<String>) -> Self {
        ClientMessage::Authenticate {
            token: token.into(),
        }
    }

    /// Creates a SaveDraft message.
    pub fn save_draft(snapshot: DraftSnapshot) -> Self {
        ClientMessage::SaveDraft { snapshot }
    }

    /// Creates a LoadDraft message.
    pub fn load_draft(attempt_id: impl Into<String>) -> Self {
        ClientMessage::LoadDraft {
            attempt_id: attempt_id.into(),
        }
    }

    /// Creates a RecordEvent message.
    pub fn record_event(
        attempt_id: impl Into<String>,
        event: EventType,
        payload: serde_json::Value,
        occurred_at: i64,
        offline_id: impl Into<String>,
    ) -> Self {
        ClientMessage::RecordEvent {
            attempt_id: attempt_id.into(),
            event,
            payload,
            occurred_at,
            offline_id: offline_id.into(),
        }
    }

    /// Creates a Ping message.
    pub fn ping(id: u64) -> Self {
        ClientMessage::Ping { id }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

impl ServerMessage {
    /// Creates an Authenticated message.
    pub fn authenticated(user_id: impl Into<String>) -> Self {
        ServerMessage::Authenticated {
            user_id: user_id.into(),
        }
    }

    /// Creates a Saved message.
    pub fn saved(ack: SaveAcknowledgement) -> Self {
        ServerMessage::Saved(ack)
    }

    /// Creates a Draft message.
    pub fn draft(draft: Option<DraftSnapshot>) -> Self {
        ServerMessage::Draft { ok: true, draft }
    }

    /// Creates an EventRecorded message.
    pub fn event_recorded(queued: bool) -> Self {
        ServerMessage::EventRecorded {
            ok: true,
            queued: queued.then_some(true),
        }
    }

    /// Creates a Pong message.
    pub fn pong(id: u64) -> Self {
        ServerMessage::Pong { id }
    }

    /// Creates an Error message.
    pub fn error(kind: ErrorKind, message: impl Into<String>) -> Self {
        ServerMessage::Error {
            kind,
            message: message.into(),
        }
    }

    /// Serializes the message to JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Deserializes the message from JSON.
    pub fn from_json(s: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(s)
    }
}

#[cfg(test)]
#[path = "protocol_tests.rs"]
mod tests;
