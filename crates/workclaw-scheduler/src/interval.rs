//! Interval recurrence — fire every N days, locked to the original cadence.
//!
//! The anchor advances by whole intervals, never to the sweep time, so a
//! sweep that runs hours late cannot push every following occurrence later.

use chrono::{Duration, NaiveDateTime};

/// UTC instant at which the next occurrence falls due.
pub fn next_fire(anchor_utc: NaiveDateTime, every_days: i64) -> NaiveDateTime {
    anchor_utc + Duration::days(every_days)
}

/// Decide whether the interval has elapsed at `now`. Returns the scheduled
/// fire instant (not `now`) when it has.
pub fn fire_now(
    anchor_utc: NaiveDateTime,
    every_days: i64,
    now: NaiveDateTime,
) -> Option<NaiveDateTime> {
    let fire = next_fire(anchor_utc, every_days);
    (now >= fire).then_some(fire)
}

/// Due date for the spawned occurrence: the template's due-minus-anchor
/// offset carried forward onto the fire instant.
pub fn child_due(
    template_due: NaiveDateTime,
    anchor_utc: NaiveDateTime,
    fire: NaiveDateTime,
) -> NaiveDateTime {
    fire + (template_due - anchor_utc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_not_due_before_interval_elapses() {
        let anchor = dt(2025, 1, 1, 0, 0);
        assert_eq!(fire_now(anchor, 7, dt(2025, 1, 7, 23, 59)), None);
    }

    #[test]
    fn test_fires_at_exact_boundary() {
        let anchor = dt(2025, 1, 1, 0, 0);
        assert_eq!(fire_now(anchor, 7, dt(2025, 1, 8, 0, 0)), Some(dt(2025, 1, 8, 0, 0)));
    }

    #[test]
    fn test_late_sweep_reports_scheduled_instant() {
        let anchor = dt(2025, 1, 1, 0, 0);
        // Sweep runs half a day late; the fire instant is still on cadence.
        assert_eq!(fire_now(anchor, 7, dt(2025, 1, 8, 12, 30)), Some(dt(2025, 1, 8, 0, 0)));
    }

    #[test]
    fn test_child_due_preserves_offset() {
        let anchor = dt(2025, 1, 1, 0, 0);
        let template_due = dt(2025, 1, 3, 12, 0); // 2.5 days after anchor
        let fire = next_fire(anchor, 7);
        assert_eq!(child_due(template_due, anchor, fire), dt(2025, 1, 10, 12, 0));
    }

    #[test]
    fn test_three_generations_stay_on_cadence() {
        let every = 7;
        let mut anchor = dt(2025, 1, 1, 0, 0);
        let mut due = dt(2025, 1, 2, 6, 0);
        // Sweeps arrive at sloppy times; anchors and dues must not drift.
        let sweeps = [dt(2025, 1, 8, 3, 17), dt(2025, 1, 15, 11, 59), dt(2025, 1, 22, 0, 0)];
        let mut spawned = Vec::new();

        for now in sweeps {
            let fire = fire_now(anchor, every, now).unwrap();
            spawned.push((fire, child_due(due, anchor, fire)));
            due += Duration::days(every);
            anchor = fire;
        }

        assert_eq!(
            spawned,
            vec![
                (dt(2025, 1, 8, 0, 0), dt(2025, 1, 9, 6, 0)),
                (dt(2025, 1, 15, 0, 0), dt(2025, 1, 16, 6, 0)),
                (dt(2025, 1, 22, 0, 0), dt(2025, 1, 23, 6, 0)),
            ]
        );
    }
}
