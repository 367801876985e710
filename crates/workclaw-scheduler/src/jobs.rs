//! Periodic job bookkeeping for the scheduler loop.

use chrono::{Duration, NaiveDateTime, Timelike};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobKind {
    CleanupLinks,
    GenerateRecurring,
}

impl JobKind {
    pub fn name(&self) -> &'static str {
        match self {
            JobKind::CleanupLinks => "cleanup-links",
            JobKind::GenerateRecurring => "generate-recurring",
        }
    }
}

/// One recurring job: what to run, how often, and inside which local hours.
#[derive(Debug, Clone)]
pub struct Job {
    pub kind: JobKind,
    pub every: Duration,
    /// Inclusive local-hour window, e.g. (6, 19). None means around the clock.
    pub window: Option<(u32, u32)>,
    pub next_run: NaiveDateTime,
}

impl Job {
    /// First run is due immediately, so a fresh process sweeps on boot.
    pub fn new(kind: JobKind, every: Duration, window: Option<(u32, u32)>, now: NaiveDateTime) -> Self {
        Self { kind, every, window, next_run: now }
    }

    pub fn due(&self, now: NaiveDateTime) -> bool {
        now >= self.next_run
    }

    pub fn in_window(&self, local_now: NaiveDateTime) -> bool {
        match self.window {
            Some((start, end)) => (start..=end).contains(&local_now.hour()),
            None => true,
        }
    }

    pub fn advance(&mut self, now: NaiveDateTime) {
        self.next_run = now + self.every;
    }
}
