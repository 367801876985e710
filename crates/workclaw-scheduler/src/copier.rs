//! Copies accepted assignees from a template onto a fresh occurrence.

use chrono::NaiveDateTime;
use rusqlite::Connection;

use workclaw_core::error::Result;
use workclaw_store::db;
use workclaw_store::models::{Notification, TaskAssignment};

/// Copy every accepted assignment on `template_id` onto `occurrence_id`.
///
/// Each copy starts accepted — the user already opted in on the template —
/// with the acceptance stamped at `now`, and is announced with exactly one
/// notification. Pending or declined assignees are not carried over; a
/// template whose assignees never accepted simply spawns unassigned
/// occurrences. Returns how many assignees were copied.
pub fn copy_accepted(
    conn: &Connection,
    template_id: i64,
    occurrence_id: i64,
    occurrence_title: &str,
    now: NaiveDateTime,
) -> Result<usize> {
    let mut copied = 0;
    for source in db::accepted_assignments(conn, template_id)? {
        let assignment = TaskAssignment {
            id: 0,
            task_id: occurrence_id,
            user_id: source.user_id,
            assigned_by: source.assigned_by,
            assigned_group: source.assigned_group.clone(),
            accepted: true,
            accepted_at: Some(now),
            seen: false,
            created_at: now,
        };
        if db::insert_assignment(conn, &assignment)? {
            db::insert_notification(
                conn,
                &Notification::task_reassigned(source.user_id, occurrence_title, occurrence_id, now),
            )?;
            copied += 1;
        }
    }
    Ok(copied)
}
