//! # WorkClaw Scheduler
//!
//! Background service that keeps the portal's recurring work flowing:
//! respawns recurring tasks on their schedules and retires dead salary
//! share links.
//!
//! ## Design principles
//! - One sweeping process at a time — enforced by a DB lease, not by
//!   deployment convention
//! - One transaction per sweep, one savepoint per template — a broken
//!   template is rolled back and logged, never fatal to the sweep
//! - Decisions on the UTC+7 wall clock, storage in naive UTC
//! - Anchor-locked cadence — a late sweep never shifts the schedule
//!
//! ## Architecture
//! ```text
//! SchedulerService (tokio interval, every tick_secs)
//!   ├── lease: take or renew the single-writer row, else stand by
//!   ├── Job: cleanup-links (hourly)
//!   │     └── delete expired + out-of-view share links
//!   └── Job: generate-recurring (hourly, 06–19 wall clock)
//!         └── per template, inside a savepoint:
//!               weekly / interval due decision
//!               → insert occurrence
//!               → copy accepted assignees + notify them
//!               → advance the template's anchor
//! ```

pub mod cleanup;
pub mod copier;
pub mod engine;
pub mod interval;
pub mod jobs;
pub mod recurrence;
pub mod weekly;

pub use cleanup::CleanupReport;
pub use engine::SchedulerService;
pub use jobs::{Job, JobKind};
pub use recurrence::SweepReport;
