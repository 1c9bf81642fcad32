//! Per-job cron timer tasks.
//!
//! Each armed job owns one tokio task that sleeps until the next cron tick and
//! then invokes a callback. Ticks that elapsed while the task was not polled
//! are coalesced into a single firing for the latest one; a firing later than
//! the misfire grace window is dropped.

use std::sync::Arc;
use std::time::Duration as StdDuration;

use chrono::{DateTime, Duration, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::cron_schedule::CronSchedule;

/// Longest single sleep, so wall-clock adjustments are noticed.
const MAX_SLEEP: StdDuration = StdDuration::from_secs(60);

/// Upper bound on backlog ticks examined in one planning step.
const MAX_BACKLOG_SCAN: usize = 10_000;

/// Source of the current wall-clock time for timer tasks.
pub(crate) type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

pub(crate) fn system_clock() -> Clock {
    Arc::new(Utc::now)
}

/// What the timer task should do next.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum FirePlan {
    /// No tick is due; wait until the given time.
    Sleep(DateTime<Utc>),
    /// Fire for tick `at`; `skipped` earlier ticks were folded into it.
    Fire { at: DateTime<Utc>, skipped: usize },
    /// Tick `at` is past the grace window.
    Missed { at: DateTime<Utc>, late_by: Duration },
    /// The schedule has no further ticks.
    Exhausted,
}

/// Decide the next step given the last handled tick and the current time.
pub(crate) fn plan(
    schedule: &CronSchedule,
    last_tick: DateTime<Utc>,
    now: DateTime<Utc>,
    grace: Duration,
) -> FirePlan {
    let mut due = None;
    let mut skipped = 0;

    for tick in schedule.upcoming_after(last_tick).take(MAX_BACKLOG_SCAN) {
        if tick > now {
            return match due {
                Some(at) => due_plan(at, skipped, now, grace),
                None => FirePlan::Sleep(tick),
            };
        }
        if due.is_some() {
            skipped += 1;
        }
        due = Some(tick);
    }

    match due {
        Some(at) => due_plan(at, skipped, now, grace),
        None => FirePlan::Exhausted,
    }
}

fn due_plan(at: DateTime<Utc>, skipped: usize, now: DateTime<Utc>, grace: Duration) -> FirePlan {
    let late_by = now - at;
    if late_by > grace {
        FirePlan::Missed { at, late_by }
    } else {
        FirePlan::Fire { at, skipped }
    }
}

/// A running timer task. Dropping it stops the timer.
pub(crate) struct ArmedTimer {
    schedule: CronSchedule,
    clock: Clock,
    handle: JoinHandle<()>,
}

impl ArmedTimer {
    /// The schedule this timer follows.
    pub(crate) fn schedule(&self) -> &CronSchedule {
        &self.schedule
    }

    /// Next tick after now.
    pub(crate) fn next_fire(&self) -> Option<DateTime<Utc>> {
        if self.handle.is_finished() {
            return None;
        }
        self.schedule.next_after((self.clock)())
    }
}

impl Drop for ArmedTimer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Start a timer task for `job_id` that calls `on_fire` on every due tick.
///
/// `on_fire` must not block; it is expected to hand work off to another task.
pub(crate) fn spawn_timer<F>(
    job_id: String,
    schedule: CronSchedule,
    grace: Duration,
    clock: Clock,
    on_fire: F,
) -> ArmedTimer
where
    F: Fn(&str) + Send + Sync + 'static,
{
    let task_schedule = schedule.clone();
    let task_clock = clock.clone();
    let handle = tokio::spawn(async move {
        let mut last_tick = task_clock();
        loop {
            let now = task_clock();
            match plan(&task_schedule, last_tick, now, grace) {
                FirePlan::Sleep(until) => {
                    let wait = (until - now).to_std().unwrap_or_default().min(MAX_SLEEP);
                    tokio::time::sleep(wait).await;
                }
                FirePlan::Fire { at, skipped } => {
                    if skipped > 0 {
                        warn!(
                            "Job {}: {} missed ticks coalesced into the {} firing",
                            job_id,
                            skipped,
                            at.to_rfc3339()
                        );
                    }
                    debug!("Job {}: cron tick {}", job_id, at.to_rfc3339());
                    last_tick = at;
                    on_fire(&job_id);
                }
                FirePlan::Missed { at, late_by } => {
                    warn!(
                        "Job {}: run scheduled for {} missed by {}s, skipping",
                        job_id,
                        at.to_rfc3339(),
                        late_by.num_seconds()
                    );
                    last_tick = at;
                }
                FirePlan::Exhausted => {
                    debug!("Job {}: schedule has no further ticks", job_id);
                    break;
                }
            }
        }
    });

    ArmedTimer {
        schedule,
        clock,
        handle,
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
