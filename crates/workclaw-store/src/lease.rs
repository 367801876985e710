//! Single-writer lease for the scheduler.
//!
//! Several nodes may run the scheduler binary against the same database, but
//! only one may sweep at a time. The lease is one row in the shared store: a
//! node takes or renews it with a single conditional upsert, and a holder that
//! stops renewing is replaced once its grant lapses.

use chrono::{Duration, NaiveDateTime};
use rusqlite::{Connection, OptionalExtension, params};

use workclaw_core::error::{Result, WorkClawError};

use crate::db::{fmt_ts, parse_ts};

/// Name of the lease row the scheduler service contends for.
pub const SCHEDULER_LEASE: &str = "scheduler";

/// Try to take or renew a lease. Succeeds when the row is free, already ours,
/// or held by a node whose grant has lapsed.
pub fn try_acquire(
    conn: &Connection,
    name: &str,
    holder: &str,
    ttl_secs: i64,
    now: NaiveDateTime,
) -> Result<bool> {
    let expires_at = now + Duration::seconds(ttl_secs);
    let n = conn
        .execute(
            "INSERT INTO scheduler_lease (name, holder, expires_at) VALUES (?1,?2,?3)
             ON CONFLICT(name) DO UPDATE SET holder=excluded.holder, expires_at=excluded.expires_at
             WHERE scheduler_lease.holder=excluded.holder OR scheduler_lease.expires_at < ?4",
            params![name, holder, fmt_ts(expires_at), fmt_ts(now)],
        )
        .map_err(|e| WorkClawError::Store(format!("Acquire lease: {e}")))?;
    Ok(n > 0)
}

/// Give the lease up if we still hold it.
pub fn release(conn: &Connection, name: &str, holder: &str) -> Result<()> {
    conn.execute(
        "DELETE FROM scheduler_lease WHERE name=?1 AND holder=?2",
        params![name, holder],
    )
    .map_err(|e| WorkClawError::Store(format!("Release lease: {e}")))?;
    Ok(())
}

/// Current holder and expiry, if any node holds the lease.
pub fn current_holder(conn: &Connection, name: &str) -> Result<Option<(String, NaiveDateTime)>> {
    let row = conn
        .query_row(
            "SELECT holder, expires_at FROM scheduler_lease WHERE name=?1",
            params![name],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()
        .map_err(|e| WorkClawError::Store(format!("Read lease: {e}")))?;
    Ok(row.and_then(|(holder, expires)| parse_ts(&expires).map(|e| (holder, e))))
}
