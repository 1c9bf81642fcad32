//! Configuration schema definitions.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

mod sync;

pub use sync::*;

/// Shared default helper used by submodules.
pub(crate) fn default_true() -> bool {
    true
}

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub scheduler: SchedulerConfig,

    #[serde(default)]
    pub sync: SyncToolConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8000
}

/// Where the job table and run logs live.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Base data directory.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Job table file name, relative to `data_dir`.
    #[serde(default = "default_jobs_file")]
    pub jobs_file: String,

    /// Run log directory, relative to `data_dir`.
    #[serde(default = "default_log_dir")]
    pub log_dir: String,
}

impl StorageConfig {
    /// Full path of the persisted job table.
    pub fn jobs_path(&self) -> PathBuf {
        self.data_dir.join(&self.jobs_file)
    }

    /// Full path of the run log directory.
    pub fn log_path(&self) -> PathBuf {
        self.data_dir.join(&self.log_dir)
    }

    /// PID file marking the process that owns this data directory.
    pub fn lock_path(&self) -> PathBuf {
        self.data_dir.join("treesync.pid")
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            jobs_file: default_jobs_file(),
            log_dir: default_log_dir(),
        }
    }
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_jobs_file() -> String {
    "backups.json".to_string()
}

fn default_log_dir() -> String {
    "logs".to_string()
}

/// Scheduler configuration for cron jobs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA timezone all cron expressions are evaluated in.
    #[serde(default = "default_timezone")]
    pub timezone: String,

    /// A firing delayed by more than this many seconds is dropped.
    #[serde(default = "default_misfire_grace_secs")]
    pub misfire_grace_secs: u64,
}

fn default_timezone() -> String {
    "Europe/Berlin".to_string()
}

fn default_misfire_grace_secs() -> u64 {
    3600
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            misfire_grace_secs: default_misfire_grace_secs(),
        }
    }
}

#[cfg(test)]
#[path = "schema_tests.rs"]
mod tests;
