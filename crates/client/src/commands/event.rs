// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use qr_core::EventType;

use crate::error::{Error, Result};

use super::Engine;

pub async fn run(
    engine: &Engine,
    attempt: &str,
    kind: EventType,
    payload: Option<&str>,
) -> Result<()> {
    let payload = parse_payload(payload)?;
    let result = engine.client.persist_exam_event(attempt, kind, payload).await;
    engine.settle().await;
    let receipt = result?;

    if receipt.queued {
        println!("{} event {} queued", kind, receipt.offline_id);
    } else {
        println!("{} event {} recorded", kind, receipt.offline_id);
    }
    Ok(())
}

pub(crate) fn parse_payload(payload: Option<&str>) -> Result<serde_json::Value> {
    match payload {
        None => Ok(serde_json::Value::Null),
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| Error::InvalidInput(format!("payload is not valid JSON: {}", e))),
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
