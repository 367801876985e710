//! SQLite-backed storage shared by the WorkClaw portal and its scheduler.
//!
//! - [`models`]: plain records (tasks, assignments, notifications, salaries)
//! - [`db`]: the [`WorkflowDb`] handle, schema migration, and query helpers
//! - [`lease`]: the single-writer lease used by the scheduler service

pub mod db;
pub mod lease;
pub mod models;

pub use db::WorkflowDb;
pub use models::{
    Notification, RecurrenceRule, Salary, SalaryItem, SalaryShareLink, Task, TaskAssignment,
    TaskStatus,
};
