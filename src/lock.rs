//! Queue Lock File Module
//!
//! Prevents two processes from draining the same upload queue, which would
//! upload logs twice and race on removal.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

/// Errors from acquiring the queue lock
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error("another event-logging instance is already using this queue (PID: {pid}); if it is not running, remove {}", path.display())]
    Held { pid: u32, path: PathBuf },
    #[error("lock file I/O failed at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// PID lock file inside the queue directory, removed on drop
#[derive(Debug)]
pub struct QueueLock {
    lock_path: PathBuf,
    owned: bool,
}

impl QueueLock {
    const LOCK_FILE_NAME: &'static str = ".event-logging.lock";

    /// Acquire the lock for `queue_dir`, creating the directory if needed.
    ///
    /// A lock file left by a process that is no longer running is treated
    /// as stale and replaced.
    pub fn acquire<P: AsRef<Path>>(queue_dir: P) -> Result<Self, LockError> {
        let queue_dir = queue_dir.as_ref();
        fs::create_dir_all(queue_dir).map_err(|source| LockError::Io {
            path: queue_dir.to_path_buf(),
            source,
        })?;

        let lock_path = queue_dir.join(Self::LOCK_FILE_NAME);

        if lock_path.exists() {
            match Self::existing_owner(&lock_path) {
                Some(pid) if pid != std::process::id() && is_process_running(pid) => {
                    return Err(LockError::Held {
                        pid,
                        path: lock_path,
                    });
                }
                _ => {
                    tracing::info!(path = %lock_path.display(), "Removing stale queue lock");
                    let _ = fs::remove_file(&lock_path);
                }
            }
        }

        let pid = std::process::id();
        let io_err = |source| LockError::Io {
            path: lock_path.clone(),
            source,
        };
        let mut file = File::create(&lock_path).map_err(io_err)?;
        writeln!(file, "{pid}").map_err(io_err)?;

        tracing::debug!(pid, path = %lock_path.display(), "Acquired queue lock");

        Ok(Self {
            lock_path,
            owned: true,
        })
    }

    /// PID recorded in an existing lock file; `None` if unreadable
    fn existing_owner(lock_path: &Path) -> Option<u32> {
        fs::read_to_string(lock_path).ok()?.trim().parse().ok()
    }

    /// Release the lock (called automatically on drop)
    pub fn release(&mut self) {
        if self.owned {
            if let Err(e) = fs::remove_file(&self.lock_path) {
                tracing::warn!(error = %e, "Failed to remove queue lock file");
            } else {
                tracing::debug!(path = %self.lock_path.display(), "Released queue lock");
            }
            self.owned = false;
        }
    }

    pub fn path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for QueueLock {
    fn drop(&mut self) {
        self.release();
    }
}

/// Whether `pid` is a live event-logging process
#[cfg(unix)]
fn is_process_running(pid: u32) -> bool {
    fs::read_to_string(format!("/proc/{pid}/cmdline"))
        .map(|cmdline| cmdline.contains("event-logging") || cmdline.contains("event_logging"))
        .unwrap_or(false)
}

#[cfg(not(unix))]
fn is_process_running(_pid: u32) -> bool {
    true
}
