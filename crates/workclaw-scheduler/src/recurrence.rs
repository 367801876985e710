//! Recurrence generation sweep — spawns occurrences from due templates.

use chrono::{Duration, NaiveDateTime};
use rusqlite::Connection;

use workclaw_core::error::{Result, WorkClawError};
use workclaw_core::time;
use workclaw_store::WorkflowDb;
use workclaw_store::db;
use workclaw_store::models::{RecurrenceRule, Task, TaskStatus};

use crate::copier;
use crate::interval;
use crate::weekly;

/// What one generation sweep did.
#[derive(Debug, Default, Clone, Copy)]
pub struct SweepReport {
    pub spawned: usize,
    pub skipped: usize,
    pub failed: usize,
}

enum Outcome {
    Spawned(i64),
    NotDue,
}

/// Sweep all recurring templates once.
///
/// The whole sweep is one transaction; each template runs inside its own
/// savepoint, so one broken template rolls back alone — anchor untouched,
/// no half-spawned occurrence — while the rest of the sweep carries on.
pub fn run(store: &mut WorkflowDb, now: NaiveDateTime) -> Result<SweepReport> {
    let local_now = time::to_local(now);

    store.with_tx(|tx| {
        let templates = db::recurring_candidates(tx)?;
        let mut report = SweepReport::default();

        for template in &templates {
            let sp = tx
                .savepoint()
                .map_err(|e| WorkClawError::Store(format!("Savepoint: {e}")))?;

            match spawn_if_due(&sp, template, now, local_now) {
                Ok(Outcome::Spawned(occurrence_id)) => {
                    sp.commit()
                        .map_err(|e| WorkClawError::Store(format!("Savepoint commit: {e}")))?;
                    report.spawned += 1;
                    tracing::info!("🔁 Task {} spawned occurrence {}", template.id, occurrence_id);
                }
                Ok(Outcome::NotDue) => {
                    sp.commit()
                        .map_err(|e| WorkClawError::Store(format!("Savepoint commit: {e}")))?;
                    report.skipped += 1;
                }
                Err(e) => {
                    // Dropping the savepoint rolls this template back.
                    drop(sp);
                    report.failed += 1;
                    tracing::warn!("⚠️ Task {} skipped: {e}", template.id);
                }
            }
        }

        Ok(report)
    })
}

fn spawn_if_due(
    conn: &Connection,
    template: &Task,
    now: NaiveDateTime,
    local_now: NaiveDateTime,
) -> Result<Outcome> {
    let rule = template.rule()?;
    let Some(anchor) = template.last_occurrence else {
        return Ok(Outcome::NotDue);
    };

    match rule {
        RecurrenceRule::Weekly { weekdays, fire_at, duration_days } => {
            let Some(fire_local) = weekly::fire_today(&weekdays, fire_at, anchor, local_now) else {
                return Ok(Outcome::NotDue);
            };
            let due = weekly::due_at_utc(fire_local, duration_days);
            let occurrence_id = spawn(conn, template, Some(due), now)?;
            // Weekly anchors on the sweep instant; the calendar-day dedup is
            // what keeps the cadence. The template's own due date stays put.
            db::advance_recurrence(conn, template.id, now, template.due_at, now)?;
            Ok(Outcome::Spawned(occurrence_id))
        }
        RecurrenceRule::Interval { every_days } => {
            if every_days < 1 {
                return Err(WorkClawError::Schedule(format!(
                    "task {}: interval of {every_days} days",
                    template.id
                )));
            }
            let Some(fire) = interval::fire_now(anchor, every_days, now) else {
                return Ok(Outcome::NotDue);
            };
            let occurrence_due = template.due_at.map(|due| interval::child_due(due, anchor, fire));
            let occurrence_id = spawn(conn, template, occurrence_due, now)?;
            // Anchor moves to the scheduled fire instant, and the template's
            // due date rides along one interval, so the offset never shrinks.
            let template_due = template.due_at.map(|due| due + Duration::days(every_days));
            db::advance_recurrence(conn, template.id, fire, template_due, now)?;
            Ok(Outcome::Spawned(occurrence_id))
        }
    }
}

/// Insert the occurrence and hand it the template's accepted assignees.
fn spawn(
    conn: &Connection,
    template: &Task,
    due_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<i64> {
    let occurrence = Task {
        id: 0,
        title: template.title.clone(),
        description: template.description.clone(),
        creator_id: template.creator_id,
        status: TaskStatus::Pending,
        due_at,
        recurrence_enabled: false,
        recurrence_rule: None,
        last_occurrence: None,
        parent_task_id: Some(template.id),
        created_at: now,
        updated_at: now,
    };
    let occurrence_id = db::insert_task(conn, &occurrence)?;
    copier::copy_accepted(conn, template.id, occurrence_id, &template.title, now)?;
    Ok(occurrence_id)
}
