// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use yare::parameterized;

#[parameterized(
    millis = { "250ms", Duration::from_millis(250) },
    bare = { "30", Duration::from_secs(30) },
    seconds = { "30s", Duration::from_secs(30) },
    minutes = { "5m", Duration::from_secs(300) },
    hours = { "1h", Duration::from_secs(3600) },
    days = { "2d", Duration::from_secs(172_800) },
)]
fn parses_durations(input: &str, expected: Duration) {
    assert_eq!(parse_duration(input).unwrap(), expected);
}

#[test]
fn rejects_garbage() {
    assert!(parse_duration("").is_err());
    assert!(parse_duration("5y").is_err());
    assert!(parse_duration("abc").is_err());
}

#[test]
fn formats_epoch() {
    assert_eq!(format_utc_ms(0), "1970-01-01T00:00:00Z");
    // 2024-01-15 12:30:45 UTC
    assert_eq!(format_utc_ms(1_705_321_845_000), "2024-01-15T12:30:45Z");
}
