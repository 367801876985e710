//! WorkClaw configuration system.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Root configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkClawConfig {
    #[serde(default = "default_db_path")]
    pub db_path: String,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

fn default_db_path() -> String { "~/.workclaw/workclaw.db".into() }

impl Default for WorkClawConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl WorkClawConfig {
    /// Load config from the default path (~/.workclaw/config.toml).
    pub fn load() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::WorkClawError::Config(format!("Failed to read config: {e}")))?;
        let config: Self = toml::from_str(&content)
            .map_err(|e| crate::error::WorkClawError::Config(format!("Failed to parse config: {e}")))?;
        Ok(config)
    }

    /// Save config to the default path.
    pub fn save(&self) -> Result<()> {
        let path = Self::default_path();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| crate::error::WorkClawError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(&path, content)?;
        Ok(())
    }

    /// Get the default config path.
    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".workclaw")
            .join("config.toml")
    }

    /// Get the WorkClaw home directory.
    pub fn home_dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".workclaw")
    }
}

/// Scheduler service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    #[serde(default = "default_tick_secs")]
    pub tick_secs: u64,
    /// Minutes between sweeps of each job.
    #[serde(default = "default_sweep_every_mins")]
    pub sweep_every_mins: i64,
    /// First wall-clock hour (inclusive) at which recurring tasks may spawn.
    #[serde(default = "default_window_start_hour")]
    pub window_start_hour: u32,
    /// Last wall-clock hour (inclusive) at which recurring tasks may spawn.
    #[serde(default = "default_window_end_hour")]
    pub window_end_hour: u32,
    /// Seconds before an unrenewed writer lease can be taken over.
    #[serde(default = "default_lease_ttl_secs")]
    pub lease_ttl_secs: i64,
    /// Node name used in the lease holder identity (defaults to the hostname).
    #[serde(default)]
    pub node: Option<String>,
}

fn default_tick_secs() -> u64 { 60 }
fn default_sweep_every_mins() -> i64 { 60 }
fn default_window_start_hour() -> u32 { 6 }
fn default_window_end_hour() -> u32 { 19 }
fn default_lease_ttl_secs() -> i64 { 180 }

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            tick_secs: default_tick_secs(),
            sweep_every_mins: default_sweep_every_mins(),
            window_start_hour: default_window_start_hour(),
            window_end_hour: default_window_end_hour(),
            lease_ttl_secs: default_lease_ttl_secs(),
            node: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WorkClawConfig::default();
        assert_eq!(config.db_path, "~/.workclaw/workclaw.db");
        assert_eq!(config.scheduler.tick_secs, 60);
        assert_eq!(config.scheduler.window_start_hour, 6);
        assert_eq!(config.scheduler.window_end_hour, 19);
        assert!(config.scheduler.node.is_none());
    }

    #[test]
    fn test_config_from_toml() {
        let toml_str = r#"
            db_path = "/var/lib/workclaw/portal.db"

            [scheduler]
            tick_secs = 30
            node = "sched-a"
        "#;

        let config: WorkClawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.db_path, "/var/lib/workclaw/portal.db");
        assert_eq!(config.scheduler.tick_secs, 30);
        assert_eq!(config.scheduler.node.as_deref(), Some("sched-a"));
        // Untouched fields keep their defaults.
        assert_eq!(config.scheduler.sweep_every_mins, 60);
        assert_eq!(config.scheduler.lease_ttl_secs, 180);
    }

    #[test]
    fn test_config_missing_fields_use_defaults() {
        let toml_str = "";
        let config: WorkClawConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.db_path, "~/.workclaw/workclaw.db");
        assert_eq!(config.scheduler.sweep_every_mins, 60);
    }

    #[test]
    fn test_home_dir() {
        let home = WorkClawConfig::home_dir();
        assert!(home.to_string_lossy().contains("workclaw"));
    }
}
