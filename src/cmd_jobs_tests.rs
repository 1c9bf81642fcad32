use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use super::*;
use tempfile::TempDir;
use treesync_api::{ApiConfig, ApiServer, AppState};
use treesync_engine::{Job, JobSpec, JobTable};

/// Config rooted in `dir` whose sync tool reports no changes.
fn config_in(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.data_dir = dir.path().join("data");
    config.sync.program = "true".to_string();
    config.server.port = free_port();
    config
}

fn free_port() -> u16 {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap().port()
}

async fn seed(config: &Config, dir: &Path, enabled: bool) {
    let source = dir.join("src");
    std::fs::create_dir_all(&source).unwrap();
    let spec = JobSpec::new(
        source.to_string_lossy(),
        dir.join("dst").to_string_lossy(),
        "0 2 * * *",
    )
    .with_enabled(enabled);
    let table: JobTable = [("a".to_string(), Job::with_id("a", spec))].into_iter().collect();
    FileJobStore::new(config.storage.jobs_path())
        .save(&table)
        .await
        .unwrap();
}

async fn stored_job(config: &Config) -> Job {
    let table = FileJobStore::new(config.storage.jobs_path()).load().await.unwrap();
    table["a"].clone()
}

#[test]
fn test_server_url() {
    let mut server = ServerConfig::default();
    assert_eq!(server_url(&server), "http://127.0.0.1:8000");

    server.host = "0.0.0.0".to_string();
    server.port = 9000;
    assert_eq!(server_url(&server), "http://127.0.0.1:9000");

    server.host = "backup.local".to_string();
    assert_eq!(server_url(&server), "http://backup.local:9000");
}

#[tokio::test]
async fn test_run_without_server_runs_here() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    seed(&config, dir.path(), true).await;

    run_job(&config, "a").await.unwrap();

    let job = stored_job(&config).await;
    assert_eq!(job.last_result.as_deref(), Some("No changes - skipped"));
    assert_eq!(job.last_change_detected, Some(false));
    assert!(!config.storage.lock_path().exists());
}

#[tokio::test]
async fn test_run_here_rejects_disabled_job() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    seed(&config, dir.path(), false).await;

    let err = run_job(&config, "a").await.unwrap_err();

    assert!(err.to_string().contains("disabled"));
    assert!(stored_job(&config).await.last_run.is_none());
    assert!(!config.storage.lock_path().exists());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_run_goes_through_running_server() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    seed(&config, dir.path(), true).await;

    // Stand in for `serve`: hold the lock and expose the scheduler over HTTP.
    let _lock = InstanceLock::acquire(config.storage.lock_path()).unwrap();
    let scheduler = build_scheduler(&config).unwrap();
    scheduler.load().await.unwrap();
    let server = ApiServer::new(
        ApiConfig::new(&config.server.host, config.server.port),
        Arc::new(AppState::new(scheduler.clone())),
    );
    tokio::spawn(async move {
        let _ = server.run_until(std::future::pending()).await;
    });

    let health = format!("{}/health", server_url(&config.server));
    for _ in 0..100 {
        if reqwest::get(&health).await.is_ok() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    run_job(&config, "a").await.unwrap();

    let job = scheduler.get("a").await.unwrap();
    assert_eq!(job.last_result.as_deref(), Some("No changes - skipped"));
    assert_eq!(stored_job(&config).await.last_result, job.last_result);
    assert!(config.storage.lock_path().exists());
}

#[tokio::test]
async fn test_run_fails_when_lock_holder_is_unreachable() {
    let dir = TempDir::new().unwrap();
    let config = config_in(&dir);
    seed(&config, dir.path(), true).await;
    let _lock = InstanceLock::acquire(config.storage.lock_path()).unwrap();

    let err = run_job(&config, "a").await.unwrap_err();

    assert!(err.to_string().contains("not reachable"));
    assert!(stored_job(&config).await.last_run.is_none());
}
