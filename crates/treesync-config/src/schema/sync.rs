//! External sync tool configuration.

use serde::{Deserialize, Serialize};

use super::default_true;

/// How the external directory-synchronization tool is invoked.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncToolConfig {
    /// Program to execute.
    #[serde(default = "default_program")]
    pub program: String,

    /// Flags passed on every invocation (archive, delete target-only entries).
    #[serde(default = "default_base_args")]
    pub base_args: Vec<String>,

    /// Flags added for the non-mutating preview probe.
    #[serde(default = "default_preview_args")]
    pub preview_args: Vec<String>,

    /// Exit codes treated as success.
    ///
    /// rsync uses 23 for a partial transfer and 24 for files that vanished
    /// while the source was scanned.
    #[serde(default = "default_accepted_exit_codes")]
    pub accepted_exit_codes: Vec<i32>,

    /// Whether attribute-only differences (permissions, times) warrant a real run.
    #[serde(default = "default_true")]
    pub metadata_changes_trigger_sync: bool,
}

impl SyncToolConfig {
    /// Whether `code` is in the accepted set.
    pub fn is_accepted(&self, code: i32) -> bool {
        self.accepted_exit_codes.contains(&code)
    }
}

impl Default for SyncToolConfig {
    fn default() -> Self {
        Self {
            program: default_program(),
            base_args: default_base_args(),
            preview_args: default_preview_args(),
            accepted_exit_codes: default_accepted_exit_codes(),
            metadata_changes_trigger_sync: default_true(),
        }
    }
}

fn default_program() -> String {
    "rsync".to_string()
}

fn default_base_args() -> Vec<String> {
    vec!["-a".to_string(), "--delete".to_string()]
}

fn default_preview_args() -> Vec<String> {
    vec!["--dry-run".to_string(), "--itemize-changes".to_string()]
}

fn default_accepted_exit_codes() -> Vec<i32> {
    vec![0, 23, 24]
}
