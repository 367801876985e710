//! Weekly recurrence — fire on configured weekdays at a fixed wall-clock time.
//!
//! All decisions here take the wall clock (UTC+7) as input; only the final
//! due date is converted back to UTC for storage.

use chrono::{Datelike, Duration, NaiveDateTime, NaiveTime};

use workclaw_core::time;

/// Decide whether a weekly template fires now. Returns the wall-clock fire
/// instant (today at `fire_at`) when it does.
///
/// A template fires at most once per calendar day: once the anchor's local
/// date reaches today, later sweeps the same day are no-ops.
pub fn fire_today(
    weekdays: &[u8],
    fire_at: NaiveTime,
    anchor_utc: NaiveDateTime,
    local_now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let today = local_now.date();
    let weekday = today.weekday().num_days_from_monday() as u8;
    if !weekdays.contains(&weekday) {
        return None;
    }
    if time::to_local(anchor_utc).date() >= today {
        return None;
    }
    let fire_local = today.and_time(fire_at);
    if local_now < fire_local {
        return None;
    }
    Some(fire_local)
}

/// Due timestamp for an occurrence fired at `fire_local`: the fire instant
/// plus the configured duration, stored as UTC.
pub fn due_at_utc(fire_local: NaiveDateTime, duration_days: i64) -> NaiveDateTime {
    time::to_utc(fire_local + Duration::days(duration_days))
}
