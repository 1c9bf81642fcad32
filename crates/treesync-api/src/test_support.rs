//! Scheduler fixtures for handler tests.

use std::sync::Arc;

use async_trait::async_trait;
use treesync_engine::{
    ChangeDetector, EngineError, MemoryJobStore, Pipeline, RunOutcome, ScheduleSettings,
    Scheduler, SyncExecutor,
};

use crate::state::AppState;

struct AlwaysChanged;

#[async_trait]
impl ChangeDetector for AlwaysChanged {
    async fn detect(&self, _source: &str, _target: &str) -> Result<bool, EngineError> {
        Ok(true)
    }
}

struct InstantSync;

#[async_trait]
impl SyncExecutor for InstantSync {
    async fn execute(
        &self,
        _source: &str,
        _target: &str,
        job_id: &str,
    ) -> Result<RunOutcome, EngineError> {
        Ok(RunOutcome::Succeeded {
            log: format!("/logs/{}.log", job_id).into(),
            code: 0,
        })
    }
}

pub(crate) fn test_state() -> (Arc<AppState>, Arc<MemoryJobStore>) {
    let store = Arc::new(MemoryJobStore::new());
    let pipeline = Pipeline::new(Arc::new(AlwaysChanged), Arc::new(InstantSync));
    let scheduler = Scheduler::new(store.clone(), pipeline, ScheduleSettings::default());
    (Arc::new(AppState::new(scheduler)), store)
}
