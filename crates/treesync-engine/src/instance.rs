//! Single-owner lock on a data directory.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::EngineError;

/// PID file held by the process that owns a data directory.
///
/// Only the owner mutates the job table and runs jobs; other processes go
/// through the owner's HTTP API. Dropping the lock removes the file.
#[derive(Debug)]
pub struct InstanceLock {
    path: PathBuf,
}

impl InstanceLock {
    /// Take the lock at `path`, replacing a PID file left by a dead process.
    ///
    /// Fails with `InstanceLocked` while a live process holds it, including
    /// the calling process.
    pub fn acquire(path: impl AsRef<Path>) -> Result<Self, EngineError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let pid = std::process::id();

        for _ in 0..2 {
            match publish(&path, pid) {
                Ok(()) => {
                    info!("Instance lock taken: {} (PID: {})", path.display(), pid);
                    return Ok(Self { path });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {}
                Err(e) => return Err(e.into()),
            }

            match read_pid(&path)? {
                Some(holder) if is_process_running(holder) => {
                    return Err(EngineError::InstanceLocked { path, pid: holder });
                }
                stale => {
                    warn!(
                        "Removing stale PID file {} (PID {:?} not running)",
                        path.display(),
                        stale
                    );
                    remove_if_present(&path)?;
                }
            }
        }

        Err(EngineError::Io(std::io::Error::new(
            ErrorKind::AlreadyExists,
            format!("{} was recreated while being taken", path.display()),
        )))
    }

    /// PID of the live process holding the lock at `path`, if any.
    pub fn holder(path: impl AsRef<Path>) -> Result<Option<u32>, EngineError> {
        Ok(read_pid(path.as_ref())?.filter(|pid| is_process_running(*pid)))
    }

    /// Get the PID file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for InstanceLock {
    fn drop(&mut self) {
        // Only remove the file while it still names this process.
        if !matches!(read_pid(&self.path), Ok(Some(pid)) if pid == std::process::id()) {
            return;
        }
        match fs::remove_file(&self.path) {
            Ok(()) => debug!("Instance lock released: {}", self.path.display()),
            Err(e) => warn!("Failed to remove PID file {}: {}", self.path.display(), e),
        }
    }
}

/// Write `pid` to a private file, then hard-link it to `path`.
///
/// The link fails with `AlreadyExists` if `path` exists, so the lock file
/// never appears without its PID.
fn publish(path: &Path, pid: u32) -> std::io::Result<()> {
    let staged = path.with_extension(format!("{}.tmp", pid));
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(&staged)?;
    write!(file, "{}", pid)?;
    file.sync_all()?;
    drop(file);

    let linked = fs::hard_link(&staged, path);
    if let Err(e) = fs::remove_file(&staged) {
        debug!("Failed to remove {}: {}", staged.display(), e);
    }
    linked
}

fn read_pid(path: &Path) -> Result<Option<u32>, EngineError> {
    match fs::read_to_string(path) {
        Ok(contents) => Ok(contents.trim().parse().ok()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn remove_if_present(path: &Path) -> Result<(), EngineError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Check if a process with the given PID is running.
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    use nix::errno::Errno;
    use nix::sys::signal::kill;
    use nix::unistd::Pid;

    let Ok(raw) = i32::try_from(pid) else {
        return false;
    };
    if raw <= 0 {
        return false;
    }
    // Signal 0 probes for existence; EPERM means it exists under another user.
    matches!(kill(Pid::from_raw(raw), None), Ok(()) | Err(Errno::EPERM))
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}

#[cfg(test)]
#[path = "instance_tests.rs"]
mod tests;
