//! Pre-flight change detection.

use async_trait::async_trait;
use tokio::fs;
use tracing::debug;
use treesync_config::SyncToolConfig;

use crate::error::EngineError;
use crate::sync_tool::{self, SyncMode};

/// Decides whether a mirror run is needed.
#[async_trait]
pub trait ChangeDetector: Send + Sync {
    /// Whether `target` differs from `source`.
    async fn detect(&self, source: &str, target: &str) -> Result<bool, EngineError>;
}

/// Runs the sync tool in preview mode and inspects its itemized output.
pub struct RsyncDetector {
    config: SyncToolConfig,
}

impl RsyncDetector {
    pub fn new(config: SyncToolConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ChangeDetector for RsyncDetector {
    async fn detect(&self, source: &str, target: &str) -> Result<bool, EngineError> {
        fs::create_dir_all(target).await?;

        let output = sync_tool::build_command(&self.config, SyncMode::Preview, source, target)
            .output()
            .await
            .map_err(|e| {
                EngineError::Detection(format!("failed to start {}: {}", self.config.program, e))
            })?;

        match output.status.code() {
            Some(code) if self.config.is_accepted(code) => {
                let stdout = String::from_utf8_lossy(&output.stdout);
                let changes = stdout
                    .lines()
                    .filter(|line| {
                        sync_tool::is_change_line(line, self.config.metadata_changes_trigger_sync)
                    })
                    .count();
                debug!("Preview of {} -> {} found {} changes", source, target, changes);
                Ok(changes > 0)
            }
            code => {
                let stderr = String::from_utf8_lossy(&output.stderr);
                let stderr = stderr.trim();
                let message = if stderr.is_empty() {
                    let status = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                    format!("{} exited with {}", self.config.program, status)
                } else {
                    stderr.to_string()
                };
                Err(EngineError::Detection(message))
            }
        }
    }
}

#[cfg(test)]
#[path = "detector_tests.rs"]
mod tests;
