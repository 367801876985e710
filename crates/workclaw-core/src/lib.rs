//! WorkClaw core: the pieces every other crate leans on.
//!
//! - [`config`]: TOML configuration (`~/.workclaw/config.toml`)
//! - [`error`]: the [`error::WorkClawError`] enum and shared `Result`
//! - [`time`]: conversions between UTC and portal-local civil time

pub mod config;
pub mod error;
pub mod time;

pub use config::WorkClawConfig;
pub use error::{Result, WorkClawError};
