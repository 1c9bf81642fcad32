//! One-shot job commands.

use tracing::info;
use treesync_config::{Config, ServerConfig};
use treesync_engine::{EngineError, FileJobStore, InstanceLock, JobStore, RunRecord};

use crate::server::build_scheduler;

/// Print the persisted job table.
pub(crate) async fn list_jobs(config: &Config, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let table = FileJobStore::new(config.storage.jobs_path()).load().await?;

    if table.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    match format {
        "json" => {
            let jobs: Vec<_> = table.values().collect();
            println!("{}", serde_json::to_string_pretty(&jobs)?);
        }
        _ => {
            println!(
                "{:<14} {:<8} {:<16} {:<40} {}",
                "ID", "ENABLED", "CRON", "SOURCE -> TARGET", "LAST RESULT"
            );
            println!("{}", "-".repeat(110));
            for job in table.values() {
                println!(
                    "{:<14} {:<8} {:<16} {:<40} {}",
                    job.id,
                    if job.enabled { "yes" } else { "no" },
                    job.cron,
                    format!("{} -> {}", job.source, job.target),
                    job.last_result.as_deref().unwrap_or("-")
                );
            }
        }
    }

    Ok(())
}

/// Run one job once and print the run record.
///
/// While a server owns the data directory the run goes through its HTTP API,
/// sharing the server's per-job slot. Otherwise this process takes the data
/// directory lock and runs the job itself without arming any timer.
pub(crate) async fn run_job(config: &Config, id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let record = match InstanceLock::acquire(config.storage.lock_path()) {
        Ok(_lock) => run_here(config, id).await?,
        Err(EngineError::InstanceLocked { pid, .. }) => {
            info!(
                "treesync (PID {}) owns {}, running job {} through its API",
                pid,
                config.storage.data_dir.display(),
                id
            );
            run_on_server(&config.server, id).await?
        }
        Err(e) => return Err(e.into()),
    };

    println!("{}", serde_json::to_string_pretty(&record)?);
    println!("{}", record.summary());
    if record.is_ok() {
        Ok(())
    } else {
        Err(format!("job {} did not complete cleanly", id).into())
    }
}

async fn run_here(config: &Config, id: &str) -> Result<RunRecord, Box<dyn std::error::Error>> {
    let scheduler = build_scheduler(config)?;
    scheduler.load().await?;
    Ok(scheduler.run_now(id).await?)
}

async fn run_on_server(
    server: &ServerConfig,
    id: &str,
) -> Result<RunRecord, Box<dyn std::error::Error>> {
    let url = format!("{}/jobs/{}/run", server_url(server), id);
    let response = reqwest::Client::new()
        .post(&url)
        .send()
        .await
        .map_err(|e| format!("treesync server not reachable at {}: {}", url, e))?;

    let status = response.status();
    let body: serde_json::Value = response.json().await?;
    if !status.is_success() {
        let message = body["error"].as_str().unwrap_or("no error message");
        return Err(format!("server refused to run job {} ({}): {}", id, status, message).into());
    }
    Ok(serde_json::from_value(body["record"].clone())?)
}

/// Base URL of the configured API; a wildcard listen address is reached
/// over loopback.
fn server_url(server: &ServerConfig) -> String {
    let host = match server.host.as_str() {
        "0.0.0.0" => "127.0.0.1",
        host => host,
    };
    format!("http://{}:{}", host, server.port)
}

#[cfg(test)]
#[path = "cmd_jobs_tests.rs"]
mod tests;
