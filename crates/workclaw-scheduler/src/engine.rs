//! Scheduler engine — holds the writer lease and drives the job loop.

use chrono::NaiveDateTime;

use workclaw_core::config::SchedulerConfig;
use workclaw_core::error::Result;
use workclaw_core::time;
use workclaw_store::WorkflowDb;
use workclaw_store::lease;

use crate::cleanup::{self, CleanupReport};
use crate::jobs::{Job, JobKind};
use crate::recurrence::{self, SweepReport};

pub struct SchedulerService {
    store: WorkflowDb,
    jobs: Vec<Job>,
    holder: String,
    lease_ttl_secs: i64,
    tick_every: std::time::Duration,
    leading: bool,
}

impl SchedulerService {
    pub fn new(store: WorkflowDb, config: &SchedulerConfig, holder: String) -> Self {
        Self::new_at(store, config, holder, time::utc_now())
    }

    fn new_at(
        store: WorkflowDb,
        config: &SchedulerConfig,
        holder: String,
        now: NaiveDateTime,
    ) -> Self {
        let every = chrono::Duration::minutes(config.sweep_every_mins);
        let jobs = vec![
            Job::new(JobKind::CleanupLinks, every, None, now),
            Job::new(
                JobKind::GenerateRecurring,
                every,
                Some((config.window_start_hour, config.window_end_hour)),
                now,
            ),
        ];
        Self {
            store,
            jobs,
            holder,
            lease_ttl_secs: config.lease_ttl_secs,
            tick_every: std::time::Duration::from_secs(config.tick_secs),
            leading: false,
        }
    }

    /// Main loop. Ticks until Ctrl-C, then releases the lease.
    pub async fn run(mut self) {
        tracing::info!(
            "⏰ Scheduler started (tick every {}s, node {})",
            self.tick_every.as_secs(),
            self.holder
        );
        let mut ticker = tokio::time::interval(self.tick_every);
        loop {
            tokio::select! {
                _ = ticker.tick() => self.tick(),
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("🛑 Shutdown signal received");
                    break;
                }
            }
        }
        self.shutdown();
    }

    /// Run every job immediately, ignoring lease, window, and schedule.
    pub fn run_all_once(&mut self) -> Result<(CleanupReport, SweepReport)> {
        let now = time::utc_now();
        let cleaned = cleanup::run(&mut self.store, now)?;
        let swept = recurrence::run(&mut self.store, now)?;
        Ok((cleaned, swept))
    }

    fn tick(&mut self) {
        self.tick_at(time::utc_now());
    }

    fn tick_at(&mut self, now: NaiveDateTime) {
        match lease::try_acquire(
            self.store.conn(),
            lease::SCHEDULER_LEASE,
            &self.holder,
            self.lease_ttl_secs,
            now,
        ) {
            Ok(true) => {
                if !self.leading {
                    tracing::info!("🔑 Writer lease acquired by {}", self.holder);
                    self.leading = true;
                }
            }
            Ok(false) => {
                if self.leading {
                    tracing::warn!("⚠️ Writer lease lost, standing by");
                    self.leading = false;
                } else {
                    tracing::debug!("⏸️ Standby: lease held by another node");
                }
                return;
            }
            Err(e) => {
                tracing::warn!("⚠️ Lease check failed: {e}");
                return;
            }
        }

        let local_now = time::to_local(now);
        for i in 0..self.jobs.len() {
            let (kind, due, in_window) = {
                let job = &self.jobs[i];
                (job.kind, job.due(now), job.in_window(local_now))
            };
            if !due {
                continue;
            }
            if !in_window {
                tracing::debug!("🌙 {} outside its hours, skipping this slot", kind.name());
                self.jobs[i].advance(now);
                continue;
            }
            match self.fire(kind, now) {
                Ok(summary) => tracing::info!("✅ {}: {}", kind.name(), summary),
                Err(e) => tracing::warn!("⚠️ {} failed: {e}", kind.name()),
            }
            // A failed sweep waits for the next slot, not the next tick.
            self.jobs[i].advance(now);
        }
    }

    fn fire(&mut self, kind: JobKind, now: NaiveDateTime) -> Result<String> {
        match kind {
            JobKind::CleanupLinks => {
                let report = cleanup::run(&mut self.store, now)?;
                Ok(format!("{} expired, {} out of views", report.expired, report.exhausted))
            }
            JobKind::GenerateRecurring => {
                let report = recurrence::run(&mut self.store, now)?;
                Ok(format!(
                    "{} spawned, {} not due, {} failed",
                    report.spawned, report.skipped, report.failed
                ))
            }
        }
    }

    fn shutdown(&mut self) {
        if self.leading {
            if let Err(e) = lease::release(self.store.conn(), lease::SCHEDULER_LEASE, &self.holder)
            {
                tracing::warn!("⚠️ Lease release failed: {e}");
            }
        }
        tracing::info!("👋 Scheduler stopped");
    }
}
