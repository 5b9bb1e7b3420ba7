// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! qr-core: Shared library for the quire draft autosave engine
//!
//! This crate provides the draft and telemetry data model, the client-server
//! wire protocol, the sentence-level diff engine and the clock abstraction
//! used by both the `quire` client and the `qr-remote` server.

pub mod clock;
pub mod diff;
pub mod draft;
pub mod error;
pub mod protocol;

pub use clock::{ClockSource, ManualClock, SystemClock};
pub use diff::{diff_sentences, ChangeKind, DiffChunk, DiffSummary};
pub use draft::{
    AttemptStatus, DraftSnapshot, EventType, QueuedDraftRecord, QueuedEventRecord,
    SaveAcknowledgement, TaskKey, TaskSnapshot,
};
pub use error::{Error, Result};
pub use protocol::{ClientMessage, ErrorKind, ServerMessage};
