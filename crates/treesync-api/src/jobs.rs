//! Job HTTP route handlers.
//!
//! - GET    /jobs              - List jobs
//! - POST   /jobs              - Create job
//! - GET    /jobs/{id}         - Get job
//! - PUT    /jobs/{id}         - Replace job definition, keeping history
//! - DELETE /jobs/{id}         - Delete job
//! - POST   /jobs/{id}/toggle  - Flip enabled
//! - POST   /jobs/{id}/run     - Run once and wait for the outcome

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};
use treesync_engine::{EngineError, Job, JobSpec, RunRecord};

use crate::error::ApiError;
use crate::state::AppState;

/// Response for listing jobs.
#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub count: usize,
    pub jobs: Vec<Job>,
}

/// Response for a single job.
#[derive(Debug, Serialize)]
pub struct JobResponse {
    pub job: Job,
}

/// Response for a manual run.
#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub record: RunRecord,
    pub summary: String,
    pub job: Option<Job>,
}

type JsonResult = Result<(StatusCode, Json<Value>), ApiError>;

/// List all jobs.
///
/// GET /jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<JobListResponse> {
    let jobs = state.scheduler.snapshot().await;
    Json(JobListResponse {
        count: jobs.len(),
        jobs,
    })
}

/// Get a job by ID.
///
/// GET /jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state
        .scheduler
        .get(&id)
        .await
        .ok_or(EngineError::NotFound(id))?;
    Ok(Json(JobResponse { job }))
}

/// Create a new job.
///
/// POST /jobs
///
/// A job with an unparseable cron expression is still stored (unscheduled);
/// the 400 response carries it so the caller can fix or delete it.
pub async fn create_job(
    State(state): State<Arc<AppState>>,
    Json(spec): Json<JobSpec>,
) -> JsonResult {
    spec.validate_for_create()?;
    let job = Job::new(spec);
    info!("Creating job {}: {} -> {} ({})", job.id, job.source, job.target, job.cron);

    let id = job.id.clone();
    let result = state.scheduler.create_or_replace_schedule(job).await;
    respond(&state, &id, result, StatusCode::CREATED).await
}

/// Replace a job's definition, keeping its run history.
///
/// PUT /jobs/{id}
pub async fn update_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    Json(spec): Json<JobSpec>,
) -> JsonResult {
    info!("Updating job {}", id);
    let result = state.scheduler.update_spec(&id, spec).await;
    respond(&state, &id, result, StatusCode::OK).await
}

/// Map a create/update result; an unschedulable job was still stored and is
/// returned alongside the error.
async fn respond(
    state: &AppState,
    id: &str,
    result: Result<Job, EngineError>,
    status: StatusCode,
) -> JsonResult {
    match result {
        Ok(job) => Ok((status, Json(json!(JobResponse { job })))),
        Err(e @ EngineError::InvalidSchedule { .. }) => {
            warn!("Job {} stored without schedule: {}", id, e);
            let job = state.scheduler.get(id).await;
            Ok((
                StatusCode::BAD_REQUEST,
                Json(json!({"error": e.to_string(), "job": job})),
            ))
        }
        Err(e) => Err(e.into()),
    }
}

/// Delete a job.
///
/// DELETE /jobs/{id}
pub async fn delete_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.scheduler.remove_schedule(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Flip a job's enabled flag.
///
/// POST /jobs/{id}/toggle
pub async fn toggle_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<JobResponse>, ApiError> {
    let job = state.scheduler.toggle_schedule(&id).await?;
    info!("Job {} {}", job.id, if job.enabled { "enabled" } else { "disabled" });
    Ok(Json(JobResponse { job }))
}

/// Run an enabled job now and wait for it to finish.
///
/// POST /jobs/{id}/run
pub async fn run_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<RunResponse>, ApiError> {
    let record = state.scheduler.run_now(&id).await?;
    let job = state.scheduler.get(&id).await;
    Ok(Json(RunResponse {
        summary: record.summary(),
        record,
        job,
    }))
}

#[cfg(test)]
#[path = "jobs_tests.rs"]
mod tests;
