use serde::{Deserialize, Serialize};

use crate::constants;

// ============================================================================
// GuildConfig
// ============================================================================

/// Per-guild moderation settings. One record per guild id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuildConfig {
    /// A thread whose newest message is older than this (seconds) is inactive.
    #[serde(default = "default_inactive_time")]
    pub inactive_time: u64,
}

fn default_inactive_time() -> u64 {
    constants::DEFAULT_INACTIVE_TIME_SECS
}

impl Default for GuildConfig {
    fn default() -> Self {
        Self {
            inactive_time: default_inactive_time(),
        }
    }
}

impl GuildConfig {
    pub fn with_inactive_time(inactive_time: u64) -> Self {
        Self { inactive_time }
    }
}

impl std::fmt::Display for GuildConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "inactive_time={}", self.inactive_time)
    }
}

// ============================================================================
// DaemonConfig
// ============================================================================

/// Where guild configs are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ConfigBackend {
    /// One `{guild_id}_config.json` per guild under `{data_dir}/guilds/`.
    #[default]
    File,
    /// `guild_configs` table in `{data_dir}/configs.db`.
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Interval between full sweeps (seconds).
    #[serde(default = "default_sweep_interval")]
    pub sweep_interval_secs: u64,
    /// Worker threads consuming platform events.
    #[serde(default = "default_event_workers")]
    pub event_workers: usize,
    /// Max buffered events. If full, new events are dropped (the next sweep covers them).
    #[serde(default = "default_event_queue_capacity")]
    pub event_queue_capacity: usize,
    #[serde(default)]
    pub config_backend: ConfigBackend,
    /// Override for the platform mirror database path.
    #[serde(default)]
    pub platform_db: Option<String>,
}

fn default_sweep_interval() -> u64 {
    constants::SWEEP_INTERVAL_SECS
}

fn default_event_workers() -> usize {
    constants::EVENT_WORKERS
}

fn default_event_queue_capacity() -> usize {
    constants::EVENT_QUEUE_CAPACITY
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            sweep_interval_secs: default_sweep_interval(),
            event_workers: default_event_workers(),
            event_queue_capacity: default_event_queue_capacity(),
            config_backend: ConfigBackend::default(),
            platform_db: None,
        }
    }
}

impl DaemonConfig {
    /// Load daemon config from `{data_dir}/daemon_config.json`.
    /// Returns defaults if file is missing or invalid.
    pub fn load() -> Self {
        let config_path = crate::storage::path_utils::daemon_config_path();
        match std::fs::read_to_string(&config_path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!(
                    path = %config_path.display(),
                    error = %e,
                    "Invalid daemon config, using defaults"
                );
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    /// Platform mirror path: explicit override or `{data_dir}/platform.db`.
    pub fn platform_db_path(&self) -> std::path::PathBuf {
        match &self.platform_db {
            Some(p) => std::path::PathBuf::from(crate::storage::path_utils::expand_tilde(p)),
            None => crate::storage::path_utils::platform_db_path(),
        }
    }
}
