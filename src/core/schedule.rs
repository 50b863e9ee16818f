//! Per-task run schedules.
//!
//! A [`Schedule`] maps a reference instant to the next instant a task may
//! start. Every variant is plain integer arithmetic on unix seconds (UTC), so
//! the result depends only on the reference passed in.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::util::clock::UnixTime;

const MINUTE: i64 = 60;
const HOUR: i64 = 3600;
const DAY: i64 = 86_400;
const WEEK: i64 = 7 * DAY;

/// How often a task should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Schedule {
    /// Run on the grid `offset + k * secs`.
    Interval {
        /// Interval in seconds between runs.
        secs: u64,
        /// Grid offset in seconds from the epoch.
        #[serde(default)]
        offset: u64,
    },
    /// Run once per hour at the given minute.
    Hourly {
        /// Minute of hour (0-59).
        min: u8,
    },
    /// Run once daily at a given hour and minute (UTC).
    Daily {
        /// Hour of day (0-23, UTC).
        hour: u8,
        /// Minute of hour (0-59).
        min: u8,
    },
    /// Run once a week.
    Weekly {
        /// Day of week, 0 = Monday.
        weekday: u8,
        /// Hour of day (0-23, UTC).
        hour: u8,
        /// Minute of hour (0-59).
        min: u8,
    },
}

impl Schedule {
    /// Reject field values that cannot describe a real schedule.
    pub fn validate(&self) -> Result<(), String> {
        let check_time = |hour: u8, min: u8| {
            if hour > 23 {
                return Err(format!("hour must be 0-23, got {hour}"));
            }
            if min > 59 {
                return Err(format!("min must be 0-59, got {min}"));
            }
            Ok(())
        };
        match *self {
            Self::Interval { secs, .. } => {
                if secs == 0 {
                    return Err("interval secs must be greater than 0".into());
                }
                if i64::try_from(secs).is_err() {
                    return Err(format!("interval secs too large: {secs}"));
                }
                Ok(())
            }
            Self::Hourly { min } => check_time(0, min),
            Self::Daily { hour, min } => check_time(hour, min),
            Self::Weekly { weekday, hour, min } => {
                if weekday > 6 {
                    return Err(format!("weekday must be 0-6, got {weekday}"));
                }
                check_time(hour, min)
            }
        }
    }

    /// Earliest instant at or after `reference` matching this schedule.
    pub fn next_at_or_after(&self, reference: UnixTime) -> UnixTime {
        match *self {
            Self::Interval { secs, offset } => {
                let secs = i64::try_from(secs).unwrap_or(i64::MAX).max(1);
                let offset = i64::try_from(offset).unwrap_or(0);
                let rem = (reference - offset).rem_euclid(secs);
                if rem == 0 {
                    reference
                } else {
                    reference + (secs - rem)
                }
            }
            Self::Hourly { min } => {
                let candidate = reference - reference.rem_euclid(HOUR) + i64::from(min) * MINUTE;
                roll_forward(candidate, reference, HOUR)
            }
            Self::Daily { hour, min } => {
                let candidate = reference - reference.rem_euclid(DAY) + time_of_day(hour, min);
                roll_forward(candidate, reference, DAY)
            }
            Self::Weekly { weekday, hour, min } => {
                let day = reference.div_euclid(DAY);
                // 1970-01-01 was a Thursday (index 3 with Monday = 0).
                let today = (day + 3).rem_euclid(7);
                let ahead = (i64::from(weekday) - today).rem_euclid(7);
                let candidate = (day + ahead) * DAY + time_of_day(hour, min);
                roll_forward(candidate, reference, WEEK)
            }
        }
    }
}

fn time_of_day(hour: u8, min: u8) -> i64 {
    i64::from(hour) * HOUR + i64::from(min) * MINUTE
}

const fn roll_forward(candidate: UnixTime, reference: UnixTime, period: i64) -> UnixTime {
    if candidate < reference {
        candidate + period
    } else {
        candidate
    }
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Interval { secs, .. } => {
                if *secs >= 3600 && secs % 3600 == 0 {
                    write!(f, "every {} hours", secs / 3600)
                } else if *secs >= 60 && secs % 60 == 0 {
                    write!(f, "every {} minutes", secs / 60)
                } else {
                    write!(f, "every {secs} seconds")
                }
            }
            Self::Hourly { min } => write!(f, "hourly at :{min:02}"),
            Self::Daily { hour, min } => write!(f, "daily at {hour:02}:{min:02} UTC"),
            Self::Weekly { weekday, hour, min } => {
                const NAMES: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
                let name = NAMES.get(usize::from(*weekday)).copied().unwrap_or("???");
                write!(f, "weekly on {name} at {hour:02}:{min:02} UTC")
            }
        }
    }
}
