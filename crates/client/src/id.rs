// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::atomic::{AtomicU64, Ordering};

use sha2::{Digest, Sha256};

use qr_core::EventType;

/// Generate an offline id for an exam event.
/// Format: {attempt}-{hash} where hash is the first 16 hex chars of
/// SHA256(nonce + attempt + event + occurred_at + seq).
pub fn generate_offline_id(
    nonce: &str,
    attempt_id: &str,
    event_type: EventType,
    occurred_at: i64,
    seq: u64,
) -> String {
    let input = format!("{nonce}:{attempt_id}:{event_type}:{occurred_at}:{seq}");
    let hash = Sha256::digest(input.as_bytes());
    format!("{}-{}", attempt_id, hex::encode(&hash[..8]))
}

/// Issues offline ids unique to one client instance.
///
/// The nonce separates instances (and process restarts); the sequence
/// separates events emitted in the same millisecond.
#[derive(Debug)]
pub struct OfflineIdGenerator {
    nonce: String,
    seq: AtomicU64,
}

impl OfflineIdGenerator {
    pub fn new(started_at_ms: u64) -> Self {
        OfflineIdGenerator {
            nonce: format!("{}-{}", std::process::id(), started_at_ms),
            seq: AtomicU64::new(0),
        }
    }

    pub fn next(&self, attempt_id: &str, event_type: EventType, occurred_at: i64) -> String {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        generate_offline_id(&self.nonce, attempt_id, event_type, occurred_at, seq)
    }
}

#[cfg(test)]
#[path = "id_tests.rs"]
mod tests;
