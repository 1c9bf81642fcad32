//! Scheduler core: owns the job table, the cron timers and the per-job
//! execution slots.

use std::collections::HashMap;
use std::sync::{Arc, Weak};

use chrono::{DateTime, Duration, Utc};
use chrono_tz::Tz;
use dashmap::DashMap;
use tracing::{debug, error, info, warn};
use treesync_config::SchedulerConfig;

use crate::cron_schedule::CronSchedule;
use crate::error::EngineError;
use crate::job::{Job, JobSpec, JobTable};
use crate::outcome::RunRecord;
use crate::pipeline::Pipeline;
use crate::store::JobStore;
use crate::timer::{spawn_timer, system_clock, ArmedTimer, Clock};

/// Scheduling parameters shared by all jobs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleSettings {
    /// Timezone cron expressions are evaluated in.
    pub timezone: Tz,
    /// A firing delayed by more than this is dropped.
    pub misfire_grace: Duration,
}

impl ScheduleSettings {
    pub fn from_config(config: &SchedulerConfig) -> Result<Self, EngineError> {
        let timezone: Tz = config.timezone.parse().map_err(|_| {
            EngineError::InvalidSettings(format!("unknown timezone '{}'", config.timezone))
        })?;
        let misfire_grace = i64::try_from(config.misfire_grace_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| {
                EngineError::InvalidSettings(format!(
                    "misfire grace of {}s is out of range",
                    config.misfire_grace_secs
                ))
            })?;
        Ok(Self {
            timezone,
            misfire_grace,
        })
    }
}

impl Default for ScheduleSettings {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Berlin,
            misfire_grace: Duration::seconds(3600),
        }
    }
}

type Slot = Arc<tokio::sync::Mutex<()>>;

/// Owner of the job table and the timers derived from it.
///
/// Every table mutation clones the table, applies the change, persists the
/// clone and only then swaps it in, so memory never runs ahead of disk.
/// Timers are armed and disarmed while the table lock is held.
///
/// Cron firings and [`Scheduler::run_now`] share one execution slot per job,
/// so at most one run of a job is in flight at any time.
pub struct Scheduler {
    store: Arc<dyn JobStore>,
    pipeline: Pipeline,
    settings: ScheduleSettings,
    jobs: tokio::sync::Mutex<JobTable>,
    timers: parking_lot::Mutex<HashMap<String, ArmedTimer>>,
    slots: DashMap<String, Slot>,
    clock: Clock,
    me: Weak<Scheduler>,
}

impl Scheduler {
    pub fn new(
        store: Arc<dyn JobStore>,
        pipeline: Pipeline,
        settings: ScheduleSettings,
    ) -> Arc<Self> {
        Self::with_clock(store, pipeline, settings, system_clock())
    }

    /// Like [`Scheduler::new`], with timers reading time from `clock`.
    pub(crate) fn with_clock(
        store: Arc<dyn JobStore>,
        pipeline: Pipeline,
        settings: ScheduleSettings,
        clock: Clock,
    ) -> Arc<Self> {
        Arc::new_cyclic(|me| Self {
            store,
            pipeline,
            settings,
            jobs: tokio::sync::Mutex::new(JobTable::new()),
            timers: parking_lot::Mutex::new(HashMap::new()),
            slots: DashMap::new(),
            clock,
            me: me.clone(),
        })
    }

    pub fn settings(&self) -> &ScheduleSettings {
        &self.settings
    }

    /// Load the table from the store without arming any timer.
    ///
    /// Used for one-shot runs. Returns the number of jobs.
    pub async fn load(&self) -> Result<usize, EngineError> {
        let table = self.store.load().await?;
        let mut jobs = self.jobs.lock().await;
        *jobs = table;
        debug!("Job table loaded: {} jobs", jobs.len());
        Ok(jobs.len())
    }

    /// Load the table from the store and arm every enabled job.
    ///
    /// Jobs whose schedule cannot be parsed stay in the table unarmed.
    /// Returns the number of armed jobs.
    pub async fn start(&self) -> Result<usize, EngineError> {
        self.load().await?;
        let jobs = self.jobs.lock().await;

        let mut armed = 0;
        for job in jobs.values().filter(|j| j.enabled) {
            match self.arm(job) {
                Ok(()) => armed += 1,
                Err(e) => warn!("Job {} not scheduled: {}", job.id, e),
            }
        }

        info!("Scheduler started: {} jobs, {} armed", jobs.len(), armed);
        Ok(armed)
    }

    /// All jobs, ordered by ID.
    pub async fn snapshot(&self) -> Vec<Job> {
        self.jobs.lock().await.values().cloned().collect()
    }

    /// One job.
    pub async fn get(&self, id: &str) -> Option<Job> {
        self.jobs.lock().await.get(id).cloned()
    }

    /// Insert or replace a job and bring its timer in line with it.
    ///
    /// The job is persisted even when its cron expression is invalid; in that
    /// case any previous timer is removed and `InvalidSchedule` is returned.
    pub async fn create_or_replace_schedule(&self, job: Job) -> Result<Job, EngineError> {
        job.spec().validate()?;

        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        next.insert(job.id.clone(), job.clone());
        self.commit(&mut jobs, next).await?;

        self.sync_timer(&job)?;
        Ok(job)
    }

    /// Replace the definition of an existing job, keeping its ID and run
    /// history.
    ///
    /// The read and the write happen under one table lock, so an outcome
    /// recorded concurrently is never overwritten. As with
    /// [`Scheduler::create_or_replace_schedule`], an invalid cron expression is
    /// persisted and reported as `InvalidSchedule`.
    pub async fn update_spec(&self, id: &str, spec: JobSpec) -> Result<Job, EngineError> {
        spec.validate()?;

        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        let job = next
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        job.apply_spec(spec);
        let job = job.clone();

        self.commit(&mut jobs, next).await?;
        info!("Job {} updated: {} -> {} ({})", id, job.source, job.target, job.cron);
        self.sync_timer(&job)?;
        Ok(job)
    }

    /// Enable a job and arm its timer.
    pub async fn enable_schedule(&self, id: &str) -> Result<Job, EngineError> {
        self.set_enabled(id, |_| true).await
    }

    /// Disable a job and remove its timer.
    pub async fn disable_schedule(&self, id: &str) -> Result<Job, EngineError> {
        self.set_enabled(id, |_| false).await
    }

    /// Flip a job's enabled flag.
    pub async fn toggle_schedule(&self, id: &str) -> Result<Job, EngineError> {
        self.set_enabled(id, |enabled| !enabled).await
    }

    async fn set_enabled(
        &self,
        id: &str,
        enabled: impl FnOnce(bool) -> bool,
    ) -> Result<Job, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        let job = next
            .get_mut(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;
        job.enabled = enabled(job.enabled);
        let job = job.clone();

        self.commit(&mut jobs, next).await?;
        self.sync_timer(&job)?;
        Ok(job)
    }

    /// Delete a job and its timer. A run already in flight finishes but its
    /// outcome is not stored, and it keeps the job's execution slot until it
    /// ends.
    pub async fn remove_schedule(&self, id: &str) -> Result<Job, EngineError> {
        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        let removed = next
            .remove(id)
            .ok_or_else(|| EngineError::NotFound(id.to_string()))?;

        self.commit(&mut jobs, next).await?;
        self.disarm(id);
        self.slots.remove_if(id, |_, slot| slot.try_lock().is_ok());
        info!("Job {} removed", id);
        Ok(removed)
    }

    /// Run an enabled job immediately.
    ///
    /// Fails with `Disabled` for a disabled job and with `AlreadyRunning` if a
    /// run of the same job is in flight.
    pub async fn run_now(&self, id: &str) -> Result<RunRecord, EngineError> {
        self.runnable(id).await?;

        let _guard = self
            .try_take_slot(id)
            .ok_or_else(|| EngineError::AlreadyRunning(id.to_string()))?;

        // The job may have changed or vanished while the slot was taken.
        let job = self.runnable(id).await?;

        info!("Job {}: manual run", id);
        let record = self.pipeline.run(&job).await;
        self.record_outcome(&record).await?;
        Ok(record)
    }

    /// Handle a cron tick for `id`.
    ///
    /// Missing or disabled jobs are ignored, and so is a tick that finds a run
    /// already in flight.
    pub async fn fire(&self, id: &str) {
        if !self.get(id).await.is_some_and(|j| j.enabled) {
            debug!("Job {}: tick ignored, job missing or disabled", id);
            return;
        }

        let Some(_guard) = self.try_take_slot(id) else {
            debug!("Job {}: tick coalesced, run already in flight", id);
            return;
        };

        let job = match self.get(id).await {
            Some(job) if job.enabled => job,
            _ => return,
        };

        let record = self.pipeline.run(&job).await;
        info!("Job {}: {}", id, record.summary());
        if let Err(e) = self.record_outcome(&record).await {
            error!("Job {}: failed to persist run outcome: {}", id, e);
        }
    }

    /// The job `id`, if it exists and is enabled.
    async fn runnable(&self, id: &str) -> Result<Job, EngineError> {
        match self.get(id).await {
            Some(job) if job.enabled => Ok(job),
            Some(_) => Err(EngineError::Disabled(id.to_string())),
            None => Err(EngineError::NotFound(id.to_string())),
        }
    }

    /// Write a run's outcome into its job and persist the table.
    async fn record_outcome(&self, record: &RunRecord) -> Result<(), EngineError> {
        let mut jobs = self.jobs.lock().await;
        let mut next = jobs.clone();
        let Some(job) = next.get_mut(&record.job_id) else {
            warn!(
                "Job {} was removed during its run; outcome dropped: {}",
                record.job_id,
                record.summary()
            );
            return Ok(());
        };
        job.record(record);
        self.commit(&mut jobs, next).await
    }

    /// Persist `next`, then make it the live table.
    async fn commit(&self, live: &mut JobTable, next: JobTable) -> Result<(), EngineError> {
        self.store.save(&next).await?;
        *live = next;
        Ok(())
    }

    /// Arm or disarm according to `job.enabled`.
    fn sync_timer(&self, job: &Job) -> Result<(), EngineError> {
        if !job.enabled {
            self.disarm(&job.id);
            return Ok(());
        }
        self.arm(job).inspect_err(|_| {
            self.disarm(&job.id);
        })
    }

    /// Start a timer for `job`, replacing any existing one.
    pub fn arm(&self, job: &Job) -> Result<(), EngineError> {
        let schedule = CronSchedule::parse(&job.cron, self.settings.timezone)?;

        let me = self.me.clone();
        let timer = spawn_timer(
            job.id.clone(),
            schedule,
            self.settings.misfire_grace,
            self.clock.clone(),
            move |id| {
                if let Some(scheduler) = me.upgrade() {
                    let id = id.to_string();
                    tokio::spawn(async move { scheduler.fire(&id).await });
                }
            },
        );

        let next = timer.next_fire();
        self.timers.lock().insert(job.id.clone(), timer);
        match next {
            Some(at) => info!("Job {} armed ({}), next run {}", job.id, job.cron, at.to_rfc3339()),
            None => info!("Job {} armed ({}), no upcoming run", job.id, job.cron),
        }
        Ok(())
    }

    /// Stop the timer for `id`. Returns whether one was running.
    pub fn disarm(&self, id: &str) -> bool {
        let removed = self.timers.lock().remove(id).is_some();
        if removed {
            debug!("Job {} disarmed", id);
        }
        removed
    }

    pub fn is_armed(&self, id: &str) -> bool {
        self.timers.lock().contains_key(id)
    }

    pub fn armed_count(&self) -> usize {
        self.timers.lock().len()
    }

    /// Next scheduled firing of an armed job.
    pub fn next_fire(&self, id: &str) -> Option<DateTime<Utc>> {
        self.timers.lock().get(id).and_then(|t| t.next_fire())
    }

    /// Whether a run of `id` is in flight.
    pub fn is_running(&self, id: &str) -> bool {
        self.slots
            .get(id)
            .is_some_and(|slot| slot.try_lock().is_err())
    }

    /// Stop all timers. Runs already in flight finish.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock();
        let count = timers.len();
        timers.clear();
        info!("Scheduler stopped, {} timers disarmed", count);
    }

    /// Take the execution slot of `id` if it is free.
    fn try_take_slot(&self, id: &str) -> Option<tokio::sync::OwnedMutexGuard<()>> {
        // The shard lock is held across try_lock so removal cannot race a take.
        let slot = self.slots.entry(id.to_string()).or_default();
        slot.value().clone().try_lock_owned().ok()
    }
}

#[cfg(test)]
#[path = "scheduler_tests.rs"]
mod tests;
