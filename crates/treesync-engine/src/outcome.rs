//! Run outcomes and records.

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of a real mirror run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunOutcome {
    /// The tool exited with an accepted status.
    Succeeded { log: PathBuf, code: i32 },
    /// The tool exited with any other status; `code` is `None` when killed by a signal.
    Failed { log: PathBuf, code: Option<i32> },
}

impl RunOutcome {
    /// Whether the mirror succeeded.
    pub fn is_ok(&self) -> bool {
        matches!(self, RunOutcome::Succeeded { .. })
    }

    /// Path of the run log artifact.
    pub fn log(&self) -> &Path {
        match self {
            RunOutcome::Succeeded { log, .. } | RunOutcome::Failed { log, .. } => log,
        }
    }
}

/// What happened during one pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RunResult {
    /// The preview found nothing to do.
    Skipped,
    /// The preview found changes and the mirror ran.
    Synced { outcome: RunOutcome },
    /// The preview probe failed; no mirror was attempted.
    DetectionFailed { error: String },
    /// The mirror could not be started or logged.
    ExecutionFailed { error: String },
}

/// A completed pipeline execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunRecord {
    pub job_id: String,
    pub started_at: DateTime<Utc>,
    pub result: RunResult,
}

impl RunRecord {
    pub fn new(job_id: impl Into<String>, started_at: DateTime<Utc>, result: RunResult) -> Self {
        Self {
            job_id: job_id.into(),
            started_at,
            result,
        }
    }

    /// Text stored as the job's `last_result`.
    pub fn summary(&self) -> String {
        match &self.result {
            RunResult::Skipped => "No changes - skipped".to_string(),
            RunResult::Synced {
                outcome: RunOutcome::Succeeded { log, .. },
            } => format!("OK - log: {}", log.display()),
            RunResult::Synced {
                outcome: RunOutcome::Failed { log, code },
            } => {
                let rc = code.map_or_else(|| "signal".to_string(), |c| c.to_string());
                format!("FAILED (rc={}) - details: {}", rc, log.display())
            }
            RunResult::DetectionFailed { error } | RunResult::ExecutionFailed { error } => {
                format!("ERROR: {}", error)
            }
        }
    }

    /// Value stored as the job's `last_change_detected`.
    pub fn change_detected(&self) -> Option<bool> {
        match &self.result {
            RunResult::Skipped => Some(false),
            RunResult::Synced { .. } => Some(true),
            RunResult::DetectionFailed { .. } | RunResult::ExecutionFailed { .. } => None,
        }
    }

    /// Whether the run ended without any error.
    pub fn is_ok(&self) -> bool {
        match &self.result {
            RunResult::Skipped => true,
            RunResult::Synced { outcome } => outcome.is_ok(),
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(result: RunResult) -> RunRecord {
        RunRecord::new("job1", Utc::now(), result)
    }

    #[test]
    fn test_summary_texts() {
        assert_eq!(record(RunResult::Skipped).summary(), "No changes - skipped");

        let ok = record(RunResult::Synced {
            outcome: RunOutcome::Succeeded {
                log: "/logs/job1-20240101-020000.log".into(),
                code: 0,
            },
        });
        assert_eq!(ok.summary(), "OK - log: /logs/job1-20240101-020000.log");

        let failed = record(RunResult::Synced {
            outcome: RunOutcome::Failed {
                log: "/logs/x.log".into(),
                code: Some(12),
            },
        });
        assert_eq!(failed.summary(), "FAILED (rc=12) - details: /logs/x.log");

        let killed = record(RunResult::Synced {
            outcome: RunOutcome::Failed {
                log: "/logs/x.log".into(),
                code: None,
            },
        });
        assert!(killed.summary().contains("rc=signal"));
    }

    #[test]
    fn test_change_detected_tri_state() {
        assert_eq!(record(RunResult::Skipped).change_detected(), Some(false));
        assert_eq!(
            record(RunResult::ExecutionFailed {
                error: "spawn failed".to_string()
            })
            .change_detected(),
            None
        );
        let failed_sync = record(RunResult::Synced {
            outcome: RunOutcome::Failed {
                log: "/l".into(),
                code: Some(1),
            },
        });
        assert_eq!(failed_sync.change_detected(), Some(true));
        assert!(!failed_sync.is_ok());
    }

    #[test]
    fn test_record_serialization() {
        let rec = record(RunResult::Synced {
            outcome: RunOutcome::Succeeded {
                log: "/logs/a.log".into(),
                code: 24,
            },
        });
        let json = serde_json::to_value(&rec).unwrap();
        assert_eq!(json["job_id"], "job1");
        assert_eq!(json["result"]["kind"], "synced");
        assert_eq!(json["result"]["outcome"]["status"], "succeeded");
        assert_eq!(json["result"]["outcome"]["code"], 24);
    }
}
