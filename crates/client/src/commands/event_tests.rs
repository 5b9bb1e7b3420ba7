// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

#![allow(clippy::unwrap_used)]

use super::*;
use yare::parameterized;

#[parameterized(
    absent = { None, serde_json::Value::Null },
    object = { Some(r#"{"keys": 12}"#), serde_json::json!({"keys": 12}) },
    number = { Some("3"), serde_json::json!(3) },
)]
fn test_parse_payload(raw: Option<&str>, expected: serde_json::Value) {
    assert_eq!(parse_payload(raw).unwrap(), expected);
}

#[test]
fn test_parse_payload_rejects_garbage() {
    assert!(matches!(
        parse_payload(Some("{keys")),
        Err(Error::InvalidInput(_))
    ));
}
