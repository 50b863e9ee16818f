//! Wall-clock access and minute-window arithmetic.
//!
//! All scheduling math works on whole unix seconds. The scheduler reads time
//! only through [`Clock`] so tests can pin "now" with [`ManualClock`].

use std::sync::atomic::{AtomicI64, Ordering};

use chrono::{DateTime, Utc};

/// Seconds since the unix epoch.
pub type UnixTime = i64;

/// Seconds in one scheduling window.
pub const WINDOW_SECS: i64 = 60;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Current unix time in whole seconds.
    fn now(&self) -> UnixTime;
}

/// Clock backed by the system wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> UnixTime {
        now_secs()
    }
}

/// Clock whose time only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    /// Create a clock frozen at `now`.
    pub fn new(now: UnixTime) -> Self {
        Self {
            now: AtomicI64::new(now),
        }
    }

    /// Jump to an absolute time.
    pub fn set(&self, now: UnixTime) {
        self.now.store(now, Ordering::Release);
    }

    /// Move forward by `secs`.
    pub fn advance(&self, secs: i64) {
        self.now.fetch_add(secs, Ordering::AcqRel);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> UnixTime {
        self.now.load(Ordering::Acquire)
    }
}

/// Current unix time in seconds.
pub fn now_secs() -> UnixTime {
    Utc::now().timestamp()
}

/// Round `t` down to the start of its minute.
pub const fn floor_to_minute(t: UnixTime) -> UnixTime {
    t - t.rem_euclid(WINDOW_SECS)
}

/// The one-minute window `[start, end)` containing `t`.
pub const fn minute_window(t: UnixTime) -> (UnixTime, UnixTime) {
    let start = floor_to_minute(t);
    (start, start + WINDOW_SECS)
}

/// Render a unix time as `YYYY-MM-DD HH:MM:SS UTC` for log lines.
///
/// Times chrono cannot represent fall back to the raw seconds.
pub fn format_utc(t: UnixTime) -> String {
    DateTime::<Utc>::from_timestamp(t, 0).map_or_else(
        || t.to_string(),
        |dt| dt.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    )
}
