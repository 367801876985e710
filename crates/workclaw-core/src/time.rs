//! Civil-time helpers.
//!
//! The portal runs on a fixed UTC+7 wall clock with no daylight saving, so
//! converting between the two is plain offset arithmetic. Timestamps at rest
//! are naive UTC; scheduling decisions (weekday checks, fire times,
//! calendar-day dedup) happen in wall-clock time.

use chrono::{Duration, NaiveDateTime, Utc};

/// Offset of the portal's wall clock from UTC, in hours.
pub const LOCAL_OFFSET_HOURS: i64 = 7;

/// Current time as naive UTC.
pub fn utc_now() -> NaiveDateTime {
    Utc::now().naive_utc()
}

/// Current time on the portal's wall clock.
pub fn local_now() -> NaiveDateTime {
    to_local(utc_now())
}

/// Convert a naive UTC timestamp to wall-clock time.
pub fn to_local(utc: NaiveDateTime) -> NaiveDateTime {
    utc + Duration::hours(LOCAL_OFFSET_HOURS)
}

/// Convert a wall-clock timestamp back to naive UTC.
pub fn to_utc(local: NaiveDateTime) -> NaiveDateTime {
    local - Duration::hours(LOCAL_OFFSET_HOURS)
}
