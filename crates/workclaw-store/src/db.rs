//! Workflow database — SQLite schema and queries for the portal store.
//!
//! Query helpers take a plain `&Connection` so the same code runs inside a
//! transaction or savepoint (both deref to `Connection`) as well as in
//! autocommit mode. Mutating more than one row atomically goes through
//! [`WorkflowDb::with_tx`].

use chrono::NaiveDateTime;
use rusqlite::{Connection, OptionalExtension, Transaction, params};
use std::path::Path;

use workclaw_core::error::{Result, WorkClawError};
use workclaw_core::time;

use crate::models::{
    Notification, Salary, SalaryItem, SalaryShareLink, Task, TaskAssignment, TaskStatus,
};

/// Timestamp format for TEXT columns. Lexicographic order matches
/// chronological order, so SQL can compare timestamps directly.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn fmt_ts(ts: NaiveDateTime) -> String {
    ts.format(TS_FORMAT).to_string()
}

pub fn fmt_ts_opt(ts: Option<NaiveDateTime>) -> Option<String> {
    ts.map(fmt_ts)
}

pub fn parse_ts(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, TS_FORMAT).ok()
}

fn parse_ts_or_now(s: &str) -> NaiveDateTime {
    parse_ts(s).unwrap_or_else(time::utc_now)
}

/// Workflow database handle.
pub struct WorkflowDb {
    conn: Connection,
}

impl WorkflowDb {
    /// Open or create the workflow database.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .map_err(|e| WorkClawError::Store(format!("DB open error: {e}")))?;
        let db = Self::from_connection(conn)?;
        tracing::debug!("💾 Workflow store ready at {}", path.display());
        Ok(db)
    }

    /// In-memory database, used by tests and dry runs.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| WorkClawError::Store(format!("DB open error: {e}")))?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // WAL lets the portal keep reading while a sweep writes.
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(|e| WorkClawError::Store(format!("DB pragma error: {e}")))?;

        let db = Self { conn };
        db.migrate()?;
        Ok(db)
    }

    /// Run schema migrations.
    fn migrate(&self) -> Result<()> {
        self.conn
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS tasks (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                creator_id INTEGER NOT NULL,
                status TEXT NOT NULL DEFAULT 'pending',
                due_at TEXT,
                recurrence_enabled INTEGER NOT NULL DEFAULT 0,
                recurrence_rule TEXT,
                last_occurrence TEXT,
                parent_task_id INTEGER REFERENCES tasks(id) ON DELETE SET NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS task_assignments (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                task_id INTEGER NOT NULL REFERENCES tasks(id) ON DELETE CASCADE,
                user_id INTEGER NOT NULL,
                assigned_by INTEGER NOT NULL,
                assigned_group TEXT,
                accepted INTEGER NOT NULL DEFAULT 0,
                accepted_at TEXT,
                seen INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                UNIQUE(task_id, user_id)
            );

            CREATE TABLE IF NOT EXISTS notifications (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                user_id INTEGER NOT NULL,
                kind TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL DEFAULT '',
                read INTEGER NOT NULL DEFAULT 0,
                link TEXT,
                created_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS salaries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                employee_name TEXT NOT NULL,
                month TEXT NOT NULL,
                work_days_in_month REAL NOT NULL,
                actual_work_days REAL NOT NULL,
                basic_salary REAL NOT NULL,
                responsibility_salary REAL NOT NULL DEFAULT 0,
                capacity_bonuses TEXT NOT NULL DEFAULT '[]',
                deductions TEXT NOT NULL DEFAULT '[]',
                basic_salary_per_day REAL NOT NULL DEFAULT 0,
                responsibility_salary_per_day REAL NOT NULL DEFAULT 0,
                main_salary REAL NOT NULL DEFAULT 0,
                total_capacity_bonus REAL NOT NULL DEFAULT 0,
                total_income REAL NOT NULL DEFAULT 0,
                total_deduction REAL NOT NULL DEFAULT 0,
                net_salary REAL NOT NULL DEFAULT 0,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS salary_share_links (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                salary_id INTEGER NOT NULL REFERENCES salaries(id) ON DELETE CASCADE,
                token TEXT UNIQUE NOT NULL,
                created_by INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                expires_at TEXT NOT NULL,
                max_views INTEGER,
                view_count INTEGER NOT NULL DEFAULT 0,
                is_active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS scheduler_lease (
                name TEXT PRIMARY KEY,
                holder TEXT NOT NULL,
                expires_at TEXT NOT NULL
            );
        ",
            )
            .map_err(|e| WorkClawError::Store(format!("Migration error: {e}")))?;

        // Safe ALTER TABLE migrations for databases created before these columns
        let alter_stmts = [
            "ALTER TABLE tasks ADD COLUMN recurrence_rule TEXT",
            "ALTER TABLE task_assignments ADD COLUMN assigned_group TEXT",
        ];
        for stmt in &alter_stmts {
            let _ = self.conn.execute(stmt, []);
        }

        Ok(())
    }

    /// Borrow the underlying connection for read or single-statement use.
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run `f` inside one transaction: committed when it returns Ok, rolled
    /// back when it returns Err (or the closure panics and the transaction is
    /// dropped).
    pub fn with_tx<T>(&mut self, f: impl FnOnce(&mut Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut tx = self
            .conn
            .transaction()
            .map_err(|e| WorkClawError::Store(format!("Begin tx: {e}")))?;
        let out = f(&mut tx)?;
        tx.commit()
            .map_err(|e| WorkClawError::Store(format!("Commit tx: {e}")))?;
        Ok(out)
    }
}

// ── Tasks ────────────────────────────────────

/// Shared SELECT column list for task queries — single source of truth.
const TASK_SELECT: &str = "SELECT id,title,description,creator_id,status,due_at,recurrence_enabled,recurrence_rule,last_occurrence,parent_task_id,created_at,updated_at FROM tasks";

fn row_to_task(row: &rusqlite::Row) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        creator_id: row.get(3)?,
        status: TaskStatus::parse(&row.get::<_, String>(4)?),
        due_at: row.get::<_, Option<String>>(5)?.as_deref().and_then(parse_ts),
        recurrence_enabled: row.get::<_, i64>(6)? != 0,
        recurrence_rule: row.get(7)?,
        last_occurrence: row.get::<_, Option<String>>(8)?.as_deref().and_then(parse_ts),
        parent_task_id: row.get(9)?,
        created_at: parse_ts_or_now(&row.get::<_, String>(10)?),
        updated_at: parse_ts_or_now(&row.get::<_, String>(11)?),
    })
}

/// Insert a task and return its id.
pub fn insert_task(conn: &Connection, task: &Task) -> Result<i64> {
    conn.execute(
        "INSERT INTO tasks (title, description, creator_id, status, due_at, recurrence_enabled, recurrence_rule, last_occurrence, parent_task_id, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11)",
        params![
            task.title,
            task.description,
            task.creator_id,
            task.status.as_str(),
            fmt_ts_opt(task.due_at),
            task.recurrence_enabled as i64,
            task.recurrence_rule,
            fmt_ts_opt(task.last_occurrence),
            task.parent_task_id,
            fmt_ts(task.created_at),
            fmt_ts(task.updated_at),
        ],
    )
    .map_err(|e| WorkClawError::Store(format!("Insert task: {e}")))?;
    Ok(conn.last_insert_rowid())
}

/// Get a task by id.
pub fn get_task(conn: &Connection, id: i64) -> Result<Option<Task>> {
    conn.query_row(&format!("{TASK_SELECT} WHERE id=?1"), params![id], row_to_task)
        .optional()
        .map_err(|e| WorkClawError::Store(format!("Get task: {e}")))
}

/// List all tasks, newest first.
pub fn list_tasks(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn
        .prepare(&format!("{TASK_SELECT} ORDER BY created_at DESC, id DESC"))
        .map_err(|e| WorkClawError::Store(format!("Prepare: {e}")))?;
    let tasks = stmt
        .query_map([], row_to_task)
        .map_err(|e| WorkClawError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(tasks)
}

/// List the occurrences spawned from a template.
pub fn children_of(conn: &Connection, parent_id: i64) -> Result<Vec<Task>> {
    let mut stmt = conn
        .prepare(&format!("{TASK_SELECT} WHERE parent_task_id=?1 ORDER BY id"))
        .map_err(|e| WorkClawError::Store(format!("Prepare: {e}")))?;
    let tasks = stmt
        .query_map(params![parent_id], row_to_task)
        .map_err(|e| WorkClawError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(tasks)
}

/// Templates the generator should look at: recurrence switched on and the
/// anchor primed. Templates with a NULL anchor are never touched.
pub fn recurring_candidates(conn: &Connection) -> Result<Vec<Task>> {
    let mut stmt = conn
        .prepare(&format!(
            "{TASK_SELECT} WHERE recurrence_enabled=1 AND last_occurrence IS NOT NULL ORDER BY id"
        ))
        .map_err(|e| WorkClawError::Store(format!("Prepare: {e}")))?;
    let tasks = stmt
        .query_map([], row_to_task)
        .map_err(|e| WorkClawError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(tasks)
}

/// Update a task's status.
pub fn update_task_status(
    conn: &Connection,
    id: i64,
    status: TaskStatus,
    now: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET status=?1, updated_at=?2 WHERE id=?3",
        params![status.as_str(), fmt_ts(now), id],
    )
    .map_err(|e| WorkClawError::Store(format!("Update status: {e}")))?;
    Ok(())
}

/// Switch recurrence on or off for a template.
pub fn set_recurrence_enabled(
    conn: &Connection,
    id: i64,
    enabled: bool,
    now: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET recurrence_enabled=?1, updated_at=?2 WHERE id=?3",
        params![enabled as i64, fmt_ts(now), id],
    )
    .map_err(|e| WorkClawError::Store(format!("Set recurrence: {e}")))?;
    Ok(())
}

/// Move a template's anchor (and due date) forward after a spawn.
pub fn advance_recurrence(
    conn: &Connection,
    id: i64,
    last_occurrence: NaiveDateTime,
    due_at: Option<NaiveDateTime>,
    now: NaiveDateTime,
) -> Result<()> {
    conn.execute(
        "UPDATE tasks SET last_occurrence=?1, due_at=?2, updated_at=?3 WHERE id=?4",
        params![fmt_ts(last_occurrence), fmt_ts_opt(due_at), fmt_ts(now), id],
    )
    .map_err(|e| WorkClawError::Store(format!("Advance recurrence: {e}")))?;
    Ok(())
}

/// Delete a task. Assignments cascade; spawned occurrences are kept and
/// orphaned (their parent_task_id becomes NULL).
pub fn delete_task(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM tasks WHERE id=?1", params![id])
        .map_err(|e| WorkClawError::Store(format!("Delete task: {e}")))?;
    Ok(n > 0)
}

// ── Task assignments ────────────────────────────────────

const ASSIGNMENT_SELECT: &str = "SELECT id,task_id,user_id,assigned_by,assigned_group,accepted,accepted_at,seen,created_at FROM task_assignments";

fn row_to_assignment(row: &rusqlite::Row) -> rusqlite::Result<TaskAssignment> {
    Ok(TaskAssignment {
        id: row.get(0)?,
        task_id: row.get(1)?,
        user_id: row.get(2)?,
        assigned_by: row.get(3)?,
        assigned_group: row.get(4)?,
        accepted: row.get::<_, i64>(5)? != 0,
        accepted_at: row.get::<_, Option<String>>(6)?.as_deref().and_then(parse_ts),
        seen: row.get::<_, i64>(7)? != 0,
        created_at: parse_ts_or_now(&row.get::<_, String>(8)?),
    })
}

/// Insert an assignment. Returns false when the (task, user) pair already
/// exists — at most one assignment per user per task.
pub fn insert_assignment(conn: &Connection, a: &TaskAssignment) -> Result<bool> {
    let n = conn
        .execute(
            "INSERT OR IGNORE INTO task_assignments (task_id, user_id, assigned_by, assigned_group, accepted, accepted_at, seen, created_at)
             VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
            params![
                a.task_id,
                a.user_id,
                a.assigned_by,
                a.assigned_group,
                a.accepted as i64,
                fmt_ts_opt(a.accepted_at),
                a.seen as i64,
                fmt_ts(a.created_at),
            ],
        )
        .map_err(|e| WorkClawError::Store(format!("Insert assignment: {e}")))?;
    Ok(n > 0)
}

/// Assign a user to a task, pending their acceptance.
pub fn assign_user(
    conn: &Connection,
    task_id: i64,
    user_id: i64,
    assigned_by: i64,
    assigned_group: Option<&str>,
    now: NaiveDateTime,
) -> Result<bool> {
    insert_assignment(
        conn,
        &TaskAssignment::pending(task_id, user_id, assigned_by, assigned_group, now),
    )
}

/// Mark an assignment accepted. Returns false when there was nothing to accept.
pub fn accept_assignment(
    conn: &Connection,
    task_id: i64,
    user_id: i64,
    now: NaiveDateTime,
) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE task_assignments SET accepted=1, accepted_at=?1 WHERE task_id=?2 AND user_id=?3 AND accepted=0",
            params![fmt_ts(now), task_id, user_id],
        )
        .map_err(|e| WorkClawError::Store(format!("Accept assignment: {e}")))?;
    Ok(n > 0)
}

/// Assignments on a task that the user has accepted.
pub fn accepted_assignments(conn: &Connection, task_id: i64) -> Result<Vec<TaskAssignment>> {
    let mut stmt = conn
        .prepare(&format!(
            "{ASSIGNMENT_SELECT} WHERE task_id=?1 AND accepted=1 ORDER BY user_id"
        ))
        .map_err(|e| WorkClawError::Store(format!("Prepare: {e}")))?;
    let rows = stmt
        .query_map(params![task_id], row_to_assignment)
        .map_err(|e| WorkClawError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// All assignments on a task.
pub fn assignments_for_task(conn: &Connection, task_id: i64) -> Result<Vec<TaskAssignment>> {
    let mut stmt = conn
        .prepare(&format!("{ASSIGNMENT_SELECT} WHERE task_id=?1 ORDER BY user_id"))
        .map_err(|e| WorkClawError::Store(format!("Prepare: {e}")))?;
    let rows = stmt
        .query_map(params![task_id], row_to_assignment)
        .map_err(|e| WorkClawError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

// ── Notifications ────────────────────────────────────

const NOTIFICATION_SELECT: &str =
    "SELECT id,user_id,kind,title,body,read,link,created_at FROM notifications";

fn row_to_notification(row: &rusqlite::Row) -> rusqlite::Result<Notification> {
    Ok(Notification {
        id: row.get(0)?,
        user_id: row.get(1)?,
        kind: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        read: row.get::<_, i64>(5)? != 0,
        link: row.get(6)?,
        created_at: parse_ts_or_now(&row.get::<_, String>(7)?),
    })
}

/// Insert a notification and return its id.
pub fn insert_notification(conn: &Connection, n: &Notification) -> Result<i64> {
    conn.execute(
        "INSERT INTO notifications (user_id, kind, title, body, read, link, created_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7)",
        params![
            n.user_id,
            n.kind,
            n.title,
            n.body,
            n.read as i64,
            n.link,
            fmt_ts(n.created_at),
        ],
    )
    .map_err(|e| WorkClawError::Store(format!("Insert notification: {e}")))?;
    Ok(conn.last_insert_rowid())
}

/// A user's notifications, newest first.
pub fn notifications_for_user(conn: &Connection, user_id: i64) -> Result<Vec<Notification>> {
    let mut stmt = conn
        .prepare(&format!("{NOTIFICATION_SELECT} WHERE user_id=?1 ORDER BY id DESC"))
        .map_err(|e| WorkClawError::Store(format!("Prepare: {e}")))?;
    let rows = stmt
        .query_map(params![user_id], row_to_notification)
        .map_err(|e| WorkClawError::Store(format!("Query: {e}")))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(rows)
}

/// Count a user's unread notifications.
pub fn unread_count(conn: &Connection, user_id: i64) -> Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM notifications WHERE user_id=?1 AND read=0",
        params![user_id],
        |row| row.get(0),
    )
    .map_err(|e| WorkClawError::Store(format!("Unread count: {e}")))
}

/// Mark one notification read.
pub fn mark_notification_read(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn
        .execute("UPDATE notifications SET read=1 WHERE id=?1 AND read=0", params![id])
        .map_err(|e| WorkClawError::Store(format!("Mark read: {e}")))?;
    Ok(n > 0)
}

/// Mark all of a user's notifications read. Returns how many changed.
pub fn mark_all_read(conn: &Connection, user_id: i64) -> Result<usize> {
    conn.execute(
        "UPDATE notifications SET read=1 WHERE user_id=?1 AND read=0",
        params![user_id],
    )
    .map_err(|e| WorkClawError::Store(format!("Mark all read: {e}")))
}

/// Delete one notification.
pub fn delete_notification(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM notifications WHERE id=?1", params![id])
        .map_err(|e| WorkClawError::Store(format!("Delete notification: {e}")))?;
    Ok(n > 0)
}

// ── Salaries ────────────────────────────────────

const SALARY_SELECT: &str = "SELECT id,employee_name,month,work_days_in_month,actual_work_days,basic_salary,responsibility_salary,capacity_bonuses,deductions,basic_salary_per_day,responsibility_salary_per_day,main_salary,total_capacity_bonus,total_income,total_deduction,net_salary,created_by,created_at,updated_at FROM salaries";

fn row_to_salary(row: &rusqlite::Row) -> rusqlite::Result<Salary> {
    let bonuses: Vec<SalaryItem> =
        serde_json::from_str(&row.get::<_, String>(7)?).unwrap_or_default();
    let deductions: Vec<SalaryItem> =
        serde_json::from_str(&row.get::<_, String>(8)?).unwrap_or_default();
    Ok(Salary {
        id: row.get(0)?,
        employee_name: row.get(1)?,
        month: row.get(2)?,
        work_days_in_month: row.get(3)?,
        actual_work_days: row.get(4)?,
        basic_salary: row.get(5)?,
        responsibility_salary: row.get(6)?,
        capacity_bonuses: bonuses,
        deductions,
        basic_salary_per_day: row.get(9)?,
        responsibility_salary_per_day: row.get(10)?,
        main_salary: row.get(11)?,
        total_capacity_bonus: row.get(12)?,
        total_income: row.get(13)?,
        total_deduction: row.get(14)?,
        net_salary: row.get(15)?,
        created_by: row.get(16)?,
        created_at: parse_ts_or_now(&row.get::<_, String>(17)?),
        updated_at: parse_ts_or_now(&row.get::<_, String>(18)?),
    })
}

/// Insert a salary sheet. Derived figures are recomputed first so the stored
/// row is always self-consistent. Sets `salary.id` and returns it.
pub fn insert_salary(conn: &Connection, salary: &mut Salary) -> Result<i64> {
    salary.calculate();
    let bonuses = serde_json::to_string(&salary.capacity_bonuses).unwrap_or_else(|_| "[]".into());
    let deductions = serde_json::to_string(&salary.deductions).unwrap_or_else(|_| "[]".into());
    conn.execute(
        "INSERT INTO salaries (employee_name, month, work_days_in_month, actual_work_days, basic_salary, responsibility_salary, capacity_bonuses, deductions, basic_salary_per_day, responsibility_salary_per_day, main_salary, total_capacity_bonus, total_income, total_deduction, net_salary, created_by, created_at, updated_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18)",
        params![
            salary.employee_name,
            salary.month,
            salary.work_days_in_month,
            salary.actual_work_days,
            salary.basic_salary,
            salary.responsibility_salary,
            bonuses,
            deductions,
            salary.basic_salary_per_day,
            salary.responsibility_salary_per_day,
            salary.main_salary,
            salary.total_capacity_bonus,
            salary.total_income,
            salary.total_deduction,
            salary.net_salary,
            salary.created_by,
            fmt_ts(salary.created_at),
            fmt_ts(salary.updated_at),
        ],
    )
    .map_err(|e| WorkClawError::Store(format!("Insert salary: {e}")))?;
    salary.id = conn.last_insert_rowid();
    Ok(salary.id)
}

/// Get a salary sheet by id.
pub fn get_salary(conn: &Connection, id: i64) -> Result<Option<Salary>> {
    conn.query_row(&format!("{SALARY_SELECT} WHERE id=?1"), params![id], row_to_salary)
        .optional()
        .map_err(|e| WorkClawError::Store(format!("Get salary: {e}")))
}

/// Delete a salary sheet. Share links cascade.
pub fn delete_salary(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn
        .execute("DELETE FROM salaries WHERE id=?1", params![id])
        .map_err(|e| WorkClawError::Store(format!("Delete salary: {e}")))?;
    Ok(n > 0)
}

// ── Salary share links ────────────────────────────────────

const LINK_SELECT: &str = "SELECT id,salary_id,token,created_by,created_at,expires_at,max_views,view_count,is_active FROM salary_share_links";

fn row_to_link(row: &rusqlite::Row) -> rusqlite::Result<SalaryShareLink> {
    Ok(SalaryShareLink {
        id: row.get(0)?,
        salary_id: row.get(1)?,
        token: row.get(2)?,
        created_by: row.get(3)?,
        created_at: parse_ts_or_now(&row.get::<_, String>(4)?),
        expires_at: parse_ts_or_now(&row.get::<_, String>(5)?),
        max_views: row.get(6)?,
        view_count: row.get(7)?,
        is_active: row.get::<_, i64>(8)? != 0,
    })
}

/// Mint a share link for a salary sheet and store it.
pub fn create_share_link(
    conn: &Connection,
    salary_id: i64,
    created_by: i64,
    expires_at: NaiveDateTime,
    max_views: Option<i64>,
    now: NaiveDateTime,
) -> Result<SalaryShareLink> {
    let mut link = SalaryShareLink::new(salary_id, created_by, expires_at, max_views, now);
    conn.execute(
        "INSERT INTO salary_share_links (salary_id, token, created_by, created_at, expires_at, max_views, view_count, is_active)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8)",
        params![
            link.salary_id,
            link.token,
            link.created_by,
            fmt_ts(link.created_at),
            fmt_ts(link.expires_at),
            link.max_views,
            link.view_count,
            link.is_active as i64,
        ],
    )
    .map_err(|e| WorkClawError::Store(format!("Create share link: {e}")))?;
    link.id = conn.last_insert_rowid();
    Ok(link)
}

/// Look up a share link by its token.
pub fn share_link_by_token(conn: &Connection, token: &str) -> Result<Option<SalaryShareLink>> {
    conn.query_row(&format!("{LINK_SELECT} WHERE token=?1"), params![token], row_to_link)
        .optional()
        .map_err(|e| WorkClawError::Store(format!("Get share link: {e}")))
}

/// Bump a link's view counter. Call only after `is_valid` passed.
pub fn record_view(conn: &Connection, id: i64) -> Result<()> {
    conn.execute(
        "UPDATE salary_share_links SET view_count = view_count + 1 WHERE id=?1",
        params![id],
    )
    .map_err(|e| WorkClawError::Store(format!("Record view: {e}")))?;
    Ok(())
}

/// Revoke a link without deleting it.
pub fn deactivate_share_link(conn: &Connection, id: i64) -> Result<bool> {
    let n = conn
        .execute(
            "UPDATE salary_share_links SET is_active=0 WHERE id=?1 AND is_active=1",
            params![id],
        )
        .map_err(|e| WorkClawError::Store(format!("Deactivate link: {e}")))?;
    Ok(n > 0)
}

/// Hard-delete links whose expiry has passed. Returns how many were removed.
pub fn delete_expired_links(conn: &Connection, now: NaiveDateTime) -> Result<usize> {
    conn.execute(
        "DELETE FROM salary_share_links WHERE expires_at < ?1",
        params![fmt_ts(now)],
    )
    .map_err(|e| WorkClawError::Store(format!("Delete expired links: {e}")))
}

/// Hard-delete links that have used up their view budget, expired or not.
pub fn delete_exhausted_links(conn: &Connection) -> Result<usize> {
    conn.execute(
        "DELETE FROM salary_share_links WHERE max_views IS NOT NULL AND view_count >= max_views",
        [],
    )
    .map_err(|e| WorkClawError::Store(format!("Delete exhausted links: {e}")))
}

/// Count all share links.
pub fn count_share_links(conn: &Connection) -> Result<i64> {
    conn.query_row("SELECT COUNT(*) FROM salary_share_links", [], |row| row.get(0))
        .map_err(|e| WorkClawError::Store(format!("Count links: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn temp_store() -> WorkflowDb {
        WorkflowDb::open_in_memory().unwrap()
    }

    fn dt(y: i32, m: u32, d: u32, h: u32, min: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, min, 0)
            .unwrap()
    }

    #[test]
    fn test_file_backed_store_persists_across_reopen() {
        let path = std::env::temp_dir().join(format!("workclaw-db-test-{}.db", std::process::id()));
        let _ = std::fs::remove_file(&path);

        let now = dt(2025, 1, 6, 2, 0);
        let id = {
            let store = WorkflowDb::open(&path).unwrap();
            insert_task(store.conn(), &Task::new("Báo cáo quý", "", 1, now)).unwrap()
        };

        let store = WorkflowDb::open(&path).unwrap();
        let got = get_task(store.conn(), id).unwrap().unwrap();
        assert_eq!(got.title, "Báo cáo quý");

        drop(store);
        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_insert_and_get_task_roundtrip() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let task = Task::recurring_interval("Báo cáo tuần", "Gửi báo cáo cho quản lý", 1, 7, now)
            .with_due(dt(2025, 1, 8, 10, 0));
        let id = insert_task(store.conn(), &task).unwrap();

        let got = get_task(store.conn(), id).unwrap().unwrap();
        assert_eq!(got.title, "Báo cáo tuần");
        assert_eq!(got.due_at, Some(dt(2025, 1, 8, 10, 0)));
        assert_eq!(got.last_occurrence, Some(now));
        assert!(got.recurrence_enabled);
        assert!(matches!(
            got.rule().unwrap(),
            crate::models::RecurrenceRule::Interval { every_days: 7 }
        ));
    }

    #[test]
    fn test_get_task_missing_is_none() {
        let store = temp_store();
        assert!(get_task(store.conn(), 99).unwrap().is_none());
    }

    #[test]
    fn test_recurring_candidates_filter() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);

        insert_task(store.conn(), &Task::new("one-off", "", 1, now)).unwrap();
        let wanted =
            insert_task(store.conn(), &Task::recurring_interval("recurring", "", 1, 3, now))
                .unwrap();
        // Enabled but never primed: the generator must not pick it up.
        let mut unprimed = Task::recurring_interval("unprimed", "", 1, 3, now);
        unprimed.last_occurrence = None;
        insert_task(store.conn(), &unprimed).unwrap();

        let candidates = recurring_candidates(store.conn()).unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, wanted);
    }

    #[test]
    fn test_assignment_unique_per_user() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let task_id = insert_task(store.conn(), &Task::new("t", "", 1, now)).unwrap();

        assert!(assign_user(store.conn(), task_id, 5, 1, Some("Kế toán"), now).unwrap());
        assert!(!assign_user(store.conn(), task_id, 5, 1, None, now).unwrap());
        assert_eq!(assignments_for_task(store.conn(), task_id).unwrap().len(), 1);
    }

    #[test]
    fn test_accept_assignment() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let task_id = insert_task(store.conn(), &Task::new("t", "", 1, now)).unwrap();
        assign_user(store.conn(), task_id, 5, 1, None, now).unwrap();

        let later = dt(2025, 1, 6, 3, 30);
        assert!(accept_assignment(store.conn(), task_id, 5, later).unwrap());
        // Already accepted: nothing left to do.
        assert!(!accept_assignment(store.conn(), task_id, 5, later).unwrap());

        let accepted = accepted_assignments(store.conn(), task_id).unwrap();
        assert_eq!(accepted.len(), 1);
        assert_eq!(accepted[0].accepted_at, Some(later));
    }

    #[test]
    fn test_delete_task_cascades_assignments() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let task_id = insert_task(store.conn(), &Task::new("t", "", 1, now)).unwrap();
        assign_user(store.conn(), task_id, 5, 1, None, now).unwrap();

        assert!(delete_task(store.conn(), task_id).unwrap());
        assert!(assignments_for_task(store.conn(), task_id).unwrap().is_empty());
    }

    #[test]
    fn test_delete_parent_orphans_children() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let parent_id =
            insert_task(store.conn(), &Task::recurring_interval("tmpl", "", 1, 7, now)).unwrap();
        let mut child = Task::new("occurrence", "", 1, now);
        child.parent_task_id = Some(parent_id);
        let child_id = insert_task(store.conn(), &child).unwrap();

        assert!(delete_task(store.conn(), parent_id).unwrap());
        let orphan = get_task(store.conn(), child_id).unwrap().unwrap();
        assert_eq!(orphan.parent_task_id, None);
    }

    #[test]
    fn test_notification_flow() {
        let store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);

        insert_notification(store.conn(), &Notification::task_reassigned(5, "Báo cáo", 9, now))
            .unwrap();
        insert_notification(store.conn(), &Notification::new(5, "info", "Chào", "", None, now))
            .unwrap();
        insert_notification(store.conn(), &Notification::new(6, "info", "Khác", "", None, now))
            .unwrap();

        assert_eq!(unread_count(store.conn(), 5).unwrap(), 2);

        let mine = notifications_for_user(store.conn(), 5).unwrap();
        assert_eq!(mine.len(), 2);
        assert_eq!(mine[1].kind, "task_assigned");
        assert_eq!(mine[1].link.as_deref(), Some("/tasks/9"));

        assert!(mark_notification_read(store.conn(), mine[0].id).unwrap());
        assert_eq!(unread_count(store.conn(), 5).unwrap(), 1);

        assert_eq!(mark_all_read(store.conn(), 5).unwrap(), 1);
        assert_eq!(unread_count(store.conn(), 5).unwrap(), 0);

        assert!(delete_notification(store.conn(), mine[0].id).unwrap());
        assert!(!delete_notification(store.conn(), mine[0].id).unwrap());
        assert_eq!(notifications_for_user(store.conn(), 5).unwrap().len(), 1);
    }

    #[test]
    fn test_salary_insert_runs_calculate() {
        let store = temp_store();
        let now = dt(2025, 2, 1, 0, 0);
        let mut salary = Salary::new("Trần Thị B", "2025-01", 22.0, 22.0, 11_000_000.0, 0.0, 1, now);
        salary.capacity_bonuses = vec![SalaryItem { name: "Thưởng".into(), amount: 1_000_000.0 }];
        let id = insert_salary(store.conn(), &mut salary).unwrap();

        let got = get_salary(store.conn(), id).unwrap().unwrap();
        assert_eq!(got.main_salary, 11_000_000.0);
        assert_eq!(got.net_salary, 12_000_000.0);
        assert_eq!(got.capacity_bonuses.len(), 1);
    }

    #[test]
    fn test_share_link_roundtrip_and_views() {
        let store = temp_store();
        let now = dt(2025, 3, 1, 12, 0);
        let mut salary = Salary::new("C", "2025-02", 22.0, 22.0, 1.0, 0.0, 1, now);
        let salary_id = insert_salary(store.conn(), &mut salary).unwrap();

        let link =
            create_share_link(store.conn(), salary_id, 1, dt(2025, 3, 8, 12, 0), Some(2), now)
                .unwrap();
        let got = share_link_by_token(store.conn(), &link.token).unwrap().unwrap();
        assert_eq!(got.id, link.id);
        assert_eq!(got.view_count, 0);

        record_view(store.conn(), link.id).unwrap();
        record_view(store.conn(), link.id).unwrap();
        let got = share_link_by_token(store.conn(), &link.token).unwrap().unwrap();
        assert_eq!(got.view_count, 2);
        assert!(!got.is_valid(now));
    }

    #[test]
    fn test_deactivate_share_link() {
        let store = temp_store();
        let now = dt(2025, 3, 1, 12, 0);
        let mut salary = Salary::new("C", "2025-02", 22.0, 22.0, 1.0, 0.0, 1, now);
        let salary_id = insert_salary(store.conn(), &mut salary).unwrap();
        let link =
            create_share_link(store.conn(), salary_id, 1, dt(2025, 3, 8, 12, 0), None, now)
                .unwrap();

        assert!(deactivate_share_link(store.conn(), link.id).unwrap());
        assert!(!deactivate_share_link(store.conn(), link.id).unwrap());
        let got = share_link_by_token(store.conn(), &link.token).unwrap().unwrap();
        assert!(!got.is_valid(now));
    }

    #[test]
    fn test_delete_salary_cascades_links() {
        let store = temp_store();
        let now = dt(2025, 3, 1, 12, 0);
        let mut salary = Salary::new("C", "2025-02", 22.0, 22.0, 1.0, 0.0, 1, now);
        let salary_id = insert_salary(store.conn(), &mut salary).unwrap();
        create_share_link(store.conn(), salary_id, 1, dt(2025, 3, 8, 12, 0), None, now).unwrap();

        assert!(delete_salary(store.conn(), salary_id).unwrap());
        assert_eq!(count_share_links(store.conn()).unwrap(), 0);
    }

    #[test]
    fn test_delete_expired_and_exhausted_links() {
        let store = temp_store();
        let now = dt(2025, 3, 10, 12, 0);
        let mut salary = Salary::new("C", "2025-02", 22.0, 22.0, 1.0, 0.0, 1, now);
        let salary_id = insert_salary(store.conn(), &mut salary).unwrap();

        // Expired yesterday.
        create_share_link(store.conn(), salary_id, 1, dt(2025, 3, 9, 12, 0), None, now).unwrap();
        // Far from expiry but out of views.
        let maxed =
            create_share_link(store.conn(), salary_id, 1, dt(2025, 4, 1, 0, 0), Some(1), now)
                .unwrap();
        record_view(store.conn(), maxed.id).unwrap();
        // Healthy.
        create_share_link(store.conn(), salary_id, 1, dt(2025, 4, 1, 0, 0), Some(5), now).unwrap();

        assert_eq!(delete_expired_links(store.conn(), now).unwrap(), 1);
        assert_eq!(delete_exhausted_links(store.conn()).unwrap(), 1);
        assert_eq!(count_share_links(store.conn()).unwrap(), 1);

        // Nothing left to remove the second time around.
        assert_eq!(delete_expired_links(store.conn(), now).unwrap(), 0);
        assert_eq!(delete_exhausted_links(store.conn()).unwrap(), 0);
    }

    #[test]
    fn test_with_tx_commits_on_ok() {
        let mut store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let id = store
            .with_tx(|tx| insert_task(tx, &Task::new("atomic", "", 1, now)))
            .unwrap();
        assert!(get_task(store.conn(), id).unwrap().is_some());
    }

    #[test]
    fn test_with_tx_rolls_back_on_err() {
        let mut store = temp_store();
        let now = dt(2025, 1, 6, 2, 0);
        let result: Result<()> = store.with_tx(|tx| {
            insert_task(tx, &Task::new("ghost", "", 1, now))?;
            Err(WorkClawError::Store("forced failure".into()))
        });
        assert!(result.is_err());
        assert!(list_tasks(store.conn()).unwrap().is_empty());
    }
}
