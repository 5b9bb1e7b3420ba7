// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::sync::Arc;

#[test]
fn manual_clock_moves_only_when_told() {
    let clock = ManualClock::new(1_000);
    assert_eq!(clock.now_ms(), 1_000);

    clock.advance(250);
    assert_eq!(clock.now_ms(), 1_250);

    clock.set(10);
    assert_eq!(clock.now_ms(), 10);
}

#[test]
fn shared_clock_delegates() {
    let clock = Arc::new(ManualClock::new(42));
    let shared = Arc::clone(&clock);
    clock.advance(8);
    assert_eq!(shared.now_ms(), 50);
}

#[test]
fn system_clock_is_after_2020() {
    assert!(SystemClock.now_ms() > 1_577_836_800_000);
}

#[test]
fn now_utc_matches_millis() {
    let clock = ManualClock::new(1_700_000_000_123);
    assert_eq!(clock.now_utc().timestamp_millis(), 1_700_000_000_123);
}
