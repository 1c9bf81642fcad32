//! Detect-then-sync execution of one job.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::Utc;
use chrono_tz::Tz;
use tracing::{debug, warn};
use treesync_config::SyncToolConfig;

use crate::detector::{ChangeDetector, RsyncDetector};
use crate::executor::{RsyncExecutor, SyncExecutor};
use crate::job::Job;
use crate::outcome::{RunRecord, RunResult};

/// Glues change detection and sync execution together.
#[derive(Clone)]
pub struct Pipeline {
    detector: Arc<dyn ChangeDetector>,
    executor: Arc<dyn SyncExecutor>,
}

impl Pipeline {
    pub fn new(detector: Arc<dyn ChangeDetector>, executor: Arc<dyn SyncExecutor>) -> Self {
        Self { detector, executor }
    }

    /// Pipeline backed by the external sync tool for both stages.
    pub fn rsync(config: SyncToolConfig, log_dir: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self::new(
            Arc::new(RsyncDetector::new(config.clone())),
            Arc::new(RsyncExecutor::new(config, log_dir, timezone)),
        )
    }

    /// Run one job once. Never fails; every failure becomes part of the record.
    #[tracing::instrument(skip(self, job), fields(job_id = %job.id))]
    pub async fn run(&self, job: &Job) -> RunRecord {
        let started_at = Utc::now();

        let result = match self.detector.detect(&job.source, &job.target).await {
            Err(e) => {
                warn!("Change detection failed: {}", e);
                RunResult::DetectionFailed {
                    error: e.to_string(),
                }
            }
            Ok(false) => {
                debug!("No changes, skipping sync");
                RunResult::Skipped
            }
            Ok(true) => match self.executor.execute(&job.source, &job.target, &job.id).await {
                Ok(outcome) => RunResult::Synced { outcome },
                Err(e) => {
                    warn!("Sync execution failed: {}", e);
                    RunResult::ExecutionFailed {
                        error: e.to_string(),
                    }
                }
            },
        };

        RunRecord::new(job.id.clone(), started_at, result)
    }
}

#[cfg(test)]
#[path = "pipeline_tests.rs"]
mod tests;
