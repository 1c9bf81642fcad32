//! Real mirror runs with a per-run log artifact.

use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};
use treesync_config::SyncToolConfig;

use crate::error::EngineError;
use crate::outcome::RunOutcome;
use crate::sync_tool::{self, SyncMode};

/// Upper bound on `-N` suffixes tried for one log name.
const MAX_LOG_SUFFIX: u32 = 1000;

/// Performs the mirror.
#[async_trait]
pub trait SyncExecutor: Send + Sync {
    /// Mirror `source` onto `target`.
    ///
    /// A tool failure is reported as [`RunOutcome::Failed`]; `Err` is reserved
    /// for faults that prevent the run or its log from happening at all.
    async fn execute(
        &self,
        source: &str,
        target: &str,
        job_id: &str,
    ) -> Result<RunOutcome, EngineError>;
}

/// Runs the sync tool and streams its output into `<log_dir>/<job>-<stamp>.log`.
pub struct RsyncExecutor {
    config: SyncToolConfig,
    log_dir: PathBuf,
    timezone: Tz,
}

impl RsyncExecutor {
    pub fn new(config: SyncToolConfig, log_dir: impl Into<PathBuf>, timezone: Tz) -> Self {
        Self {
            config,
            log_dir: log_dir.into(),
            timezone,
        }
    }

    /// Create a fresh log file; existing artifacts are never overwritten.
    async fn create_log(
        &self,
        job_id: &str,
        started_at: DateTime<Utc>,
    ) -> Result<(PathBuf, fs::File), EngineError> {
        let stamp = started_at
            .with_timezone(&self.timezone)
            .format("%Y%m%d-%H%M%S");
        let base = format!("{}-{}", sync_tool::sanitize_id(job_id), stamp);

        for n in 0..MAX_LOG_SUFFIX {
            let name = if n == 0 {
                format!("{}.log", base)
            } else {
                format!("{}-{}.log", base, n)
            };
            let path = self.log_dir.join(name);
            match OpenOptions::new().write(true).create_new(true).open(&path).await {
                Ok(file) => return Ok((path, file)),
                Err(e) if e.kind() == ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Err(EngineError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("no free log name for {} in {}", base, self.log_dir.display()),
        )))
    }
}

#[async_trait]
impl SyncExecutor for RsyncExecutor {
    async fn execute(
        &self,
        source: &str,
        target: &str,
        job_id: &str,
    ) -> Result<RunOutcome, EngineError> {
        fs::create_dir_all(target).await?;
        fs::create_dir_all(&self.log_dir).await?;

        let started_at = Utc::now();
        let (log, mut file) = self.create_log(job_id, started_at).await?;

        let header = format!(
            "# {} {} {} -> {}\n\n",
            started_at.to_rfc3339(),
            self.config.program,
            source,
            target
        );
        file.write_all(header.as_bytes()).await?;
        file.flush().await?;

        let stderr = file.into_std().await;
        let stdout = stderr.try_clone()?;

        debug!("Mirroring {} -> {} (log {:?})", source, target, log);
        let status = sync_tool::build_command(&self.config, SyncMode::Mirror, source, target)
            .stdout(Stdio::from(stdout))
            .stderr(Stdio::from(stderr))
            .status()
            .await
            .map_err(|e| {
                EngineError::Io(std::io::Error::new(
                    e.kind(),
                    format!("failed to start {}: {}", self.config.program, e),
                ))
            })?;

        match status.code() {
            Some(code) if self.config.is_accepted(code) => {
                info!("Mirror {} -> {} finished with code {}", source, target, code);
                Ok(RunOutcome::Succeeded { log, code })
            }
            code => {
                warn!("Mirror {} -> {} failed with {:?}", source, target, code);
                Ok(RunOutcome::Failed { log, code })
            }
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
