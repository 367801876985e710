//! WorkClaw error types.

use thiserror::Error;

/// All errors that WorkClaw crates can produce.
#[derive(Error, Debug)]
pub enum WorkClawError {
    #[error("Config error: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Schedule error: {0}")]
    Schedule(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience result type used across WorkClaw.
pub type Result<T> = std::result::Result<T, WorkClawError>;
