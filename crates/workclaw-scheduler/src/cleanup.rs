//! Share-link cleanup sweep.

use chrono::NaiveDateTime;

use workclaw_core::error::Result;
use workclaw_store::WorkflowDb;
use workclaw_store::db;

/// What one cleanup sweep removed.
#[derive(Debug, Default, Clone, Copy)]
pub struct CleanupReport {
    pub expired: usize,
    pub exhausted: usize,
}

impl CleanupReport {
    pub fn total(&self) -> usize {
        self.expired + self.exhausted
    }
}

/// Hard-delete dead share links: past their expiry, or out of views even
/// before expiry. Both deletes ride one transaction. Running the sweep again
/// right away removes nothing.
pub fn run(store: &mut WorkflowDb, now: NaiveDateTime) -> Result<CleanupReport> {
    let report = store.with_tx(|tx| {
        let expired = db::delete_expired_links(tx, now)?;
        let exhausted = db::delete_exhausted_links(tx)?;
        Ok(CleanupReport { expired, exhausted })
    })?;

    if report.total() > 0 {
        tracing::info!(
            "🧹 Share links cleaned: {} expired, {} out of views",
            report.expired,
            report.exhausted
        );
    }
    Ok(report)
}
