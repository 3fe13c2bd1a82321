//! Cross-process mutual exclusion for sync cycles.
//!
//! The lock is a file created with `create_new` at `<state_dir>/cycle.lock`
//! and removed when the guard drops. It holds the owner's pid for diagnosis.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::{Duration, Instant};

use crate::error::{io_err, SyncError};

const POLL_INTERVAL: Duration = Duration::from_millis(50);

/// `<state_dir>/cycle.lock`
pub fn lock_path_at(state_dir: &Path) -> PathBuf {
    state_dir.join("cycle.lock")
}

/// Held for the duration of one cycle.
#[derive(Debug)]
pub struct CycleLock {
    path: PathBuf,
}

impl CycleLock {
    /// Acquire the lock, polling for up to `wait` while another cycle holds it.
    pub fn acquire(state_dir: &Path, wait: Duration) -> Result<Self, SyncError> {
        std::fs::create_dir_all(state_dir).map_err(|e| io_err(state_dir, e))?;
        let path = lock_path_at(state_dir);
        let started = Instant::now();
        loop {
            match OpenOptions::new().create_new(true).write(true).open(&path) {
                Ok(mut file) => {
                    if let Err(err) = writeln!(file, "{}", std::process::id()) {
                        tracing::warn!("failed to write pid to cycle lock {}: {err}", path.display());
                    }
                    tracing::debug!("acquired cycle lock {}", path.display());
                    return Ok(Self { path });
                }
                Err(err) if err.kind() == ErrorKind::AlreadyExists => {
                    if started.elapsed() >= wait {
                        return Err(SyncError::LockHeld { path });
                    }
                    thread::sleep(POLL_INTERVAL);
                }
                Err(err) => return Err(io_err(&path, err)),
            }
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for CycleLock {
    fn drop(&mut self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            tracing::warn!("failed to remove cycle lock {}: {err}", self.path.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn second_acquire_times_out_while_held() {
        let tmp = TempDir::new().unwrap();
        let held = CycleLock::acquire(tmp.path(), Duration::ZERO).unwrap();
        let err = CycleLock::acquire(tmp.path(), Duration::from_millis(120)).unwrap_err();
        assert!(matches!(err, SyncError::LockHeld { .. }));
        drop(held);
        assert!(!lock_path_at(tmp.path()).exists());
        CycleLock::acquire(tmp.path(), Duration::ZERO).unwrap();
    }

    #[test]
    fn lock_file_records_holder_pid() {
        let tmp = TempDir::new().unwrap();
        let held = CycleLock::acquire(tmp.path(), Duration::ZERO).unwrap();
        let contents = std::fs::read_to_string(held.path()).unwrap();
        assert_eq!(contents.trim(), std::process::id().to_string());
    }

    #[test]
    fn waiter_gets_lock_after_release() {
        let tmp = TempDir::new().unwrap();
        let held = CycleLock::acquire(tmp.path(), Duration::ZERO).unwrap();
        let dir = tmp.path().to_path_buf();
        let waiter = thread::spawn(move || CycleLock::acquire(&dir, Duration::from_secs(5)).map(|_| ()));
        thread::sleep(Duration::from_millis(100));
        drop(held);
        waiter.join().unwrap().unwrap();
    }
}
