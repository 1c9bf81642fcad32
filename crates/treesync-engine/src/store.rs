//! Job table persistence.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::EngineError;
use crate::job::JobTable;

/// Durable storage for the whole job table.
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Load the last committed table.
    async fn load(&self) -> Result<JobTable, EngineError>;

    /// Replace the stored table.
    async fn save(&self, table: &JobTable) -> Result<(), EngineError>;
}

/// In-memory job store for testing.
pub struct MemoryJobStore {
    table: tokio::sync::RwLock<JobTable>,
    fail_saves: AtomicBool,
    saves: AtomicUsize,
}

impl MemoryJobStore {
    /// Create an empty memory store.
    pub fn new() -> Self {
        Self::with_table(JobTable::new())
    }

    /// Create a memory store holding `table`.
    pub fn with_table(table: JobTable) -> Self {
        Self {
            table: tokio::sync::RwLock::new(table),
            fail_saves: AtomicBool::new(false),
            saves: AtomicUsize::new(0),
        }
    }

    /// Make subsequent saves fail.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    /// Number of successful saves.
    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    /// Current stored table.
    pub async fn stored(&self) -> JobTable {
        self.table.read().await.clone()
    }
}

impl Default for MemoryJobStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobStore for MemoryJobStore {
    async fn load(&self) -> Result<JobTable, EngineError> {
        Ok(self.table.read().await.clone())
    }

    async fn save(&self, table: &JobTable) -> Result<(), EngineError> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(EngineError::Persistence("injected save failure".to_string()));
        }
        *self.table.write().await = table.clone();
        self.saves.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Single-file JSON job store.
///
/// A save writes the full table to `<file>.tmp`, syncs it to disk and renames
/// it over the canonical file, so readers only ever see a complete table.
pub struct FileJobStore {
    path: PathBuf,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileJobStore {
    /// Create a store for the given file. Parent directories are created on save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: tokio::sync::Mutex::new(()),
        }
    }

    /// Canonical file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    /// Write the table to the temporary file and sync it.
    pub(crate) async fn stage(&self, table: &JobTable) -> Result<PathBuf, EngineError> {
        let json = serde_json::to_string_pretty(table)
            .map_err(|e| EngineError::Persistence(format!("failed to encode job table: {}", e)))?;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent).await?;
            }
        }

        let tmp = self.tmp_path();
        let mut file = fs::File::create(&tmp).await?;
        file.write_all(json.as_bytes()).await?;
        file.sync_all().await?;
        Ok(tmp)
    }

    /// Move a staged file over the canonical one.
    pub(crate) async fn publish(&self, tmp: &Path) -> Result<(), EngineError> {
        fs::rename(tmp, &self.path).await?;
        Ok(())
    }
}

#[async_trait]
impl JobStore for FileJobStore {
    async fn load(&self) -> Result<JobTable, EngineError> {
        let content = match fs::read_to_string(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!("No job table at {:?}, starting empty", self.path);
                return Ok(JobTable::new());
            }
            Err(e) => return Err(e.into()),
        };

        if content.trim().is_empty() {
            return Ok(JobTable::new());
        }

        serde_json::from_str(&content).map_err(|e| {
            EngineError::Persistence(format!("failed to parse {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, table: &JobTable) -> Result<(), EngineError> {
        let _guard = self.write_lock.lock().await;
        let tmp = self.stage(table).await?;
        self.publish(&tmp).await?;
        debug!("Saved {} jobs to {:?}", table.len(), self.path);
        Ok(())
    }
}

#[cfg(test)]
#[path = "store_tests.rs"]
mod tests;
