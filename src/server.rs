//! Startup, tracing and shutdown for the treesync service.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use treesync_api::{ApiConfig, ApiServer, AppState};
use treesync_config::{Config, ConfigValidator};
use treesync_engine::{FileJobStore, InstanceLock, Pipeline, ScheduleSettings, Scheduler};

/// Initialize tracing with console and file output.
///
/// Log files are written to `<data_dir>/debug/` with daily rotation.
pub(crate) fn init_tracing(data_dir: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let log_dir = data_dir.join("debug");
    std::fs::create_dir_all(&log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix("treesync")
        .filename_suffix("log")
        .max_log_files(30)
        .build(&log_dir)?;

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    // The guard flushes the file writer on drop, so it lives for the whole program.
    static GUARD: std::sync::OnceLock<tracing_appender::non_blocking::WorkerGuard> =
        std::sync::OnceLock::new();
    let _ = GUARD.set(guard);

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_target(true).with_ansi(true))
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .init();

    Ok(())
}

/// Log validation warnings and fail on errors.
pub(crate) fn validate_config(config: &Config) -> Result<(), Box<dyn std::error::Error>> {
    let result = ConfigValidator::validate(config);
    for warning in &result.warnings {
        warn!("Config {}: {}", warning.path, warning.message);
    }
    if !result.is_valid() {
        let errors: Vec<String> = result.errors.iter().map(|e| e.to_string()).collect();
        return Err(format!("invalid configuration: {}", errors.join("; ")).into());
    }
    Ok(())
}

/// Build a scheduler backed by the configured job file and sync tool.
pub(crate) fn build_scheduler(config: &Config) -> Result<Arc<Scheduler>, Box<dyn std::error::Error>> {
    let settings = ScheduleSettings::from_config(&config.scheduler)?;
    let pipeline = Pipeline::rsync(
        config.sync.clone(),
        config.storage.log_path(),
        settings.timezone,
    );
    let store = Arc::new(FileJobStore::new(config.storage.jobs_path()));
    Ok(Scheduler::new(store, pipeline, settings))
}

/// Run the scheduler and HTTP API until SIGINT or SIGTERM.
pub(crate) async fn run_server(config: Config) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting treesync v{}", env!("CARGO_PKG_VERSION"));
    info!("Job table: {}", config.storage.jobs_path().display());
    info!("Run logs:  {}", config.storage.log_path().display());

    let _lock = InstanceLock::acquire(config.storage.lock_path())?;
    let scheduler = build_scheduler(&config)?;
    scheduler.start().await?;

    let state = Arc::new(AppState::new(scheduler.clone()));
    let server = ApiServer::new(
        ApiConfig::new(&config.server.host, config.server.port),
        state,
    );

    server.run_until(shutdown_signal()).await?;

    info!("Shutting down...");
    scheduler.shutdown();
    Ok(())
}

/// Resolve on SIGINT or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C"),
        _ = terminate => info!("Received SIGTERM"),
    }
}
