//! # treesync Engine
//!
//! Job scheduling and execution engine for periodic directory mirroring.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Scheduler                              │
//! │  cron timers ──┐                                              │
//! │                ├──► per-job slot ──► Pipeline ──► JobStore    │
//! │  run_now() ────┘                     │                        │
//! │                          ┌───────────┴───────────┐            │
//! │                          ▼                       ▼            │
//! │                   ChangeDetector           SyncExecutor       │
//! │                  (preview probe)          (mirror + log)      │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! A cron tick or a manual trigger takes the job's execution slot, runs a
//! non-mutating preview of the external sync tool, and only performs the real
//! mirror when the preview reports changes. The outcome is written back into
//! the job record and the whole job table is persisted atomically.

pub mod cron_schedule;
pub mod detector;
pub mod error;
pub mod executor;
pub mod instance;
pub mod job;
pub mod outcome;
pub mod pipeline;
pub mod scheduler;
pub mod store;
pub mod sync_tool;
mod timer;

#[cfg(test)]
mod test_support;

pub use cron_schedule::CronSchedule;
pub use detector::{ChangeDetector, RsyncDetector};
pub use error::EngineError;
pub use executor::{RsyncExecutor, SyncExecutor};
pub use instance::InstanceLock;
pub use job::{generate_job_id, Job, JobSpec, JobTable};
pub use outcome::{RunOutcome, RunRecord, RunResult};
pub use pipeline::Pipeline;
pub use scheduler::{ScheduleSettings, Scheduler};
pub use store::{FileJobStore, JobStore, MemoryJobStore};
pub use sync_tool::SyncMode;
