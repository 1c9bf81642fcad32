//! Job definition and run history.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::EngineError;
use crate::outcome::RunRecord;

/// The whole job table, keyed by job ID.
pub type JobTable = BTreeMap<String, Job>;

/// Length of generated job IDs.
const JOB_ID_LEN: usize = 12;

/// Generate a new job ID (12 lowercase hex characters).
pub fn generate_job_id() -> String {
    let mut id = Uuid::new_v4().simple().to_string();
    id.truncate(JOB_ID_LEN);
    id
}

fn default_enabled() -> bool {
    true
}

/// The caller-supplied part of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobSpec {
    /// Source directory (absolute).
    pub source: String,
    /// Target directory (absolute).
    pub target: String,
    /// Five-field cron expression.
    pub cron: String,
    /// Whether the job is scheduled.
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

impl JobSpec {
    /// Create a new enabled job spec.
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        cron: impl Into<String>,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            cron: cron.into(),
            enabled: true,
        }
    }

    /// Set enabled state.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Check that both paths are absolute.
    pub fn validate(&self) -> Result<(), EngineError> {
        for (field, value) in [("source", &self.source), ("target", &self.target)] {
            if !Path::new(value).is_absolute() {
                return Err(EngineError::InvalidJob(format!(
                    "{} must be an absolute path, got '{}'",
                    field, value
                )));
            }
        }
        Ok(())
    }

    /// Validation applied when a job is first created: the source must exist.
    pub fn validate_for_create(&self) -> Result<(), EngineError> {
        self.validate()?;
        if !Path::new(&self.source).exists() {
            return Err(EngineError::InvalidJob(format!(
                "source '{}' does not exist",
                self.source
            )));
        }
        Ok(())
    }
}

/// A scheduled mirroring job and its most recent run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    /// Unique job ID.
    pub id: String,
    /// Source directory.
    pub source: String,
    /// Target directory.
    pub target: String,
    /// Cron schedule expression.
    pub cron: String,
    /// Whether the job is scheduled.
    pub enabled: bool,
    /// Start time of the most recent attempt.
    #[serde(default)]
    pub last_run: Option<DateTime<Utc>>,
    /// Human-readable outcome of the most recent attempt.
    #[serde(default)]
    pub last_result: Option<String>,
    /// Whether the most recent attempt found changes; `None` if it failed first.
    #[serde(default)]
    pub last_change_detected: Option<bool>,
}

impl Job {
    /// Create a new job with a generated ID and no history.
    pub fn new(spec: JobSpec) -> Self {
        Self::with_id(generate_job_id(), spec)
    }

    /// Create a new job with a known ID and no history.
    pub fn with_id(id: impl Into<String>, spec: JobSpec) -> Self {
        Self {
            id: id.into(),
            source: spec.source,
            target: spec.target,
            cron: spec.cron,
            enabled: spec.enabled,
            last_run: None,
            last_result: None,
            last_change_detected: None,
        }
    }

    /// The caller-supplied part of this job.
    pub fn spec(&self) -> JobSpec {
        JobSpec {
            source: self.source.clone(),
            target: self.target.clone(),
            cron: self.cron.clone(),
            enabled: self.enabled,
        }
    }

    /// Replace the definition, keeping ID and history.
    pub fn apply_spec(&mut self, spec: JobSpec) {
        self.source = spec.source;
        self.target = spec.target;
        self.cron = spec.cron;
        self.enabled = spec.enabled;
    }

    /// Write the outcome of a run. All three history fields change together.
    pub fn record(&mut self, record: &RunRecord) {
        self.last_run = Some(record.started_at);
        self.last_result = Some(record.summary());
        self.last_change_detected = record.change_detected();
    }
}
