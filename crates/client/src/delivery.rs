// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Typed calls to the save endpoint and failure classification.
//!
//! Every failure is either [`FailureClass::Transient`] (queue and retry on
//! the next trigger) or [`FailureClass::Permanent`] (surface to the caller,
//! never queue).

use tracing::debug;

use qr_core::protocol::{ClientMessage, ErrorKind, ServerMessage};
use qr_core::{DraftSnapshot, QueuedEventRecord, SaveAcknowledgement};

use crate::transport::{Transport, TransportError};

/// Whether retrying a failed delivery can ever succeed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureClass {
    /// Network unreachable, timeout, server hiccup. Retry later.
    Transient,
    /// Authorization or state violation. Retrying will never succeed.
    Permanent,
}

/// Error type for endpoint calls.
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// The request never got a response.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The server answered with an error.
    #[error("server rejected request ({kind}): {message}")]
    Rejected { kind: ErrorKind, message: String },

    /// The server answered with a message that does not match the request.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),
}

impl DeliveryError {
    /// Classifies the failure for the queue-or-surface decision.
    pub fn classify(&self) -> FailureClass {
        match self {
            DeliveryError::Transport(TransportError::Encode(_)) => FailureClass::Permanent,
            DeliveryError::Transport(_) => FailureClass::Transient,
            DeliveryError::Rejected { kind, .. } => match kind {
                // Sessions are refreshed outside this engine; keep the data.
                ErrorKind::Unauthenticated | ErrorKind::Internal => FailureClass::Transient,
                ErrorKind::Forbidden | ErrorKind::NotFound | ErrorKind::InvalidRequest => {
                    FailureClass::Permanent
                }
            },
            DeliveryError::UnexpectedResponse(_) => FailureClass::Transient,
        }
    }

    pub fn is_transient(&self) -> bool {
        self.classify() == FailureClass::Transient
    }

    /// The server-reported kind, if the server rejected the request.
    pub fn rejection_kind(&self) -> Option<ErrorKind> {
        match self {
            DeliveryError::Rejected { kind, .. } => Some(*kind),
            _ => None,
        }
    }
}

/// Result type for endpoint calls.
pub type DeliveryResult<T> = Result<T, DeliveryError>;

fn unexpected(expected: &str, got: &ServerMessage) -> DeliveryError {
    DeliveryError::UnexpectedResponse(format!("expected {expected}, got {got:?}"))
}

/// Sends a draft snapshot to the save endpoint.
pub async fn deliver_draft(
    transport: &dyn Transport,
    snapshot: DraftSnapshot,
) -> DeliveryResult<SaveAcknowledgement> {
    let attempt_id = snapshot.attempt_id.clone();
    let revision = snapshot.revision;
    match transport.request(ClientMessage::save_draft(snapshot)).await? {
        ServerMessage::Saved(ack) => {
            debug!(
                "draft {} rev {} acknowledged (queued={})",
                attempt_id,
                revision,
                ack.is_queued()
            );
            Ok(ack)
        }
        ServerMessage::Error { kind, message } => Err(DeliveryError::Rejected { kind, message }),
        other => Err(unexpected("saved", &other)),
    }
}

/// Sends one exam event. Returns whether the server deferred it.
pub async fn deliver_event(
    transport: &dyn Transport,
    record: &QueuedEventRecord,
) -> DeliveryResult<bool> {
    let msg = ClientMessage::record_event(
        record.attempt_id.clone(),
        record.event_type,
        record.payload.clone(),
        record.occurred_at,
        record.offline_id.clone(),
    );
    match transport.request(msg).await? {
        ServerMessage::EventRecorded { queued, .. } => Ok(queued.unwrap_or(false)),
        ServerMessage::Error { kind, message } => Err(DeliveryError::Rejected { kind, message }),
        other => Err(unexpected("event_recorded", &other)),
    }
}

/// Fetches the server's stored draft for an attempt.
pub async fn fetch_draft(
    transport: &dyn Transport,
    attempt_id: &str,
) -> DeliveryResult<Option<DraftSnapshot>> {
    match transport.request(ClientMessage::load_draft(attempt_id)).await? {
        ServerMessage::Draft { draft, .. } => Ok(draft),
        ServerMessage::Error { kind, message } => Err(DeliveryError::Rejected { kind, message }),
        other => Err(unexpected("draft", &other)),
    }
}

#[cfg(test)]
#[path = "delivery_tests.rs"]
mod tests;
