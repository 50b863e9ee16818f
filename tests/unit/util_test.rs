//! Tests for utility functions

use mirror_scheduler::util::clock::{
    floor_to_minute, format_utc, minute_window, Clock, ManualClock, WINDOW_SECS,
};
use mirror_scheduler::util::init_tracing;

#[test]
fn test_minute_window_bounds() {
    let (start, end) = minute_window(1_700_000_000);
    assert_eq!(start, floor_to_minute(1_700_000_000));
    assert_eq!(end - start, WINDOW_SECS);
    assert!(start <= 1_700_000_000 && 1_700_000_000 < end);
}

#[test]
fn test_manual_clock_advance() {
    let clock = ManualClock::new(100);
    clock.advance(20);
    assert_eq!(clock.now(), 120);
    clock.set(5);
    assert_eq!(clock.now(), 5);
}

#[test]
fn test_format_utc() {
    assert_eq!(format_utc(1_700_002_800), "2023-11-14 23:00:00 UTC");
}

#[test]
fn test_init_tracing_is_idempotent() {
    init_tracing();
    init_tracing();
    tracing::info!("tracing initialised twice without panicking");
}
